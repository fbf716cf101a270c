use thiserror::Error;

/// Errors raised by the link budget, traffic, CPU and cost models.
///
/// Every variant carries the offending key so a misconfigured scenario can
/// be diagnosed from the message alone.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing lookup entry or invalid enum value in the configuration.
    #[error("configuration error: {key}: {reason}")]
    Configuration { key: String, reason: String },

    /// No catalog entry satisfies the requested constraints.
    #[error("no `{category}` item satisfies {constraints}")]
    NotFound {
        category: String,
        constraints: String,
    },

    /// Inputs that leave a result undefined (empty sets, zero areas).
    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    /// Regression artifact missing or inconsistent with the feature set.
    #[error("regression artifact error: {0}")]
    Artifact(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("toml serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    pub fn configuration(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Configuration {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
