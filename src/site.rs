use crate::error::{Error, Result};
use crate::geometry::Feature;
use crate::params::{AntennaType, SimulationParameters};

/// Whether a transmitter serves the receivers or only interferes with them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransmitterRole {
    Serving,
    Interfering,
}

/// A radio site. Height, power, gain and losses are fixed at construction
/// from the antenna class.
#[derive(Clone, Debug, PartialEq)]
pub struct Transmitter {
    pub id: String,
    pub coordinates: [f64; 2],
    pub role: TransmitterRole,
    pub ant_type: AntennaType,
    pub ant_height: f64, // m
    pub power: f64,      // dBm
    pub gain: f64,       // dBi
    pub losses: f64,     // dB
}

impl Transmitter {
    pub fn new(
        id: String,
        coordinates: [f64; 2],
        role: TransmitterRole,
        ant_type: AntennaType,
        params: &SimulationParameters,
    ) -> Transmitter {
        let profile = params.antenna_profile(ant_type);
        Transmitter {
            id,
            coordinates,
            role,
            ant_type,
            ant_height: profile.height,
            power: profile.power,
            gain: profile.gain,
            losses: profile.losses,
        }
    }

    /// Build from a GeoJSON point with a `site_id` property.
    pub fn from_feature(
        feature: &Feature,
        role: TransmitterRole,
        ant_type: AntennaType,
        params: &SimulationParameters,
    ) -> Result<Transmitter> {
        Ok(Transmitter::new(
            feature.str_property("site_id")?,
            feature.point_coordinates()?,
            role,
            ant_type,
            params,
        ))
    }

    /// Equivalent isotropically radiated power in dBm.
    pub fn eirp(&self) -> f64 {
        self.power + self.gain - self.losses
    }
}

/// User equipment.
#[derive(Clone, Debug, PartialEq)]
pub struct Receiver {
    pub id: String,
    pub coordinates: [f64; 2],
    pub ue_height: f64,   // m
    pub gain: f64,        // dBi
    pub losses: f64,      // dB
    pub misc_losses: f64, // dB
    pub indoor: bool,
}

impl Receiver {
    /// Build from a GeoJSON point with a `ue_id` property. Missing height,
    /// gain and loss properties fall back to the `rx_*` parameters.
    pub fn from_feature(feature: &Feature, params: &SimulationParameters) -> Result<Receiver> {
        Ok(Receiver {
            id: feature.str_property("ue_id")?,
            coordinates: feature.point_coordinates()?,
            ue_height: feature.f64_property_or("ue_height", params.rx_height)?,
            gain: feature.f64_property_or("gain", params.rx_gain)?,
            losses: feature.f64_property_or("losses", params.rx_losses)?,
            misc_losses: feature.f64_property_or("misc_losses", params.rx_misc_losses)?,
            indoor: feature.bool_property_or("indoor", false)?,
        })
    }
}

/// Coverage polygon of the serving site.
#[derive(Clone, Debug, PartialEq)]
pub struct SiteArea {
    pub id: String,
    pub area: f64, // m^2
}

impl SiteArea {
    pub fn new(id: String, area: f64) -> Result<SiteArea> {
        if !(area > 0.0) {
            return Err(Error::DegenerateInput(format!(
                "site area `{id}` has non-positive area {area} m^2"
            )));
        }
        Ok(SiteArea { id, area })
    }

    pub fn from_feature(feature: &Feature) -> Result<SiteArea> {
        let id = feature
            .str_property("site_id")
            .unwrap_or_else(|_| String::from("site_area"));
        SiteArea::new(id, feature.area()?)
    }

    pub fn area_km2(&self) -> f64 {
        self.area / 1e6
    }
}
