/// Boltzmann constant in J/K, rounded the way the RAN noise floor is calibrated.
pub const BOLTZMANN: f64 = 1.38e-23;

/// Reference receiver temperature in kelvin.
pub const REFERENCE_TEMPERATURE_K: f64 = 290.0;

/// Fixed UE noise figure in dB used by the noise floor.
pub const UE_NOISE_FIGURE_DB: f64 = 1.5;

/// Transmitter to receiver distances are floored here (meters).
pub const MIN_LINK_DISTANCE_M: f64 = 20.0;

/// Only the strongest interferers contribute to the aggregated interference.
pub const MAX_AGGREGATED_INTERFERERS: usize = 3;

/// Speed of light in m/s.
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Subcarriers in one NR resource block.
pub const SUBCARRIERS_PER_RB: f64 = 12.0;

/// OFDM symbols in one NR slot (normal cyclic prefix).
pub const SYMBOLS_PER_SLOT: f64 = 14.0;

/// LDPC maximum code rate, 948/1024.
pub const R_MAX: f64 = 0.925_781_25;
