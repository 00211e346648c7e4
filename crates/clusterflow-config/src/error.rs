use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing Scaleway {0}; set it in the profile file, a flag or the SCW_* environment")]
    MissingSetting(&'static str),

    #[error("profile {0} not found in the Scaleway config file")]
    ProfileNotFound(String),

    #[error("unknown Scaleway zone: {0}")]
    UnknownZone(String),

    #[error("zone {zone} is not in region {region}")]
    ZoneRegionMismatch { zone: String, region: String },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid Scaleway config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
