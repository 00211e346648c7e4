//! Scaleway account settings
//!
//! A [`ScalewayConfig`] is resolved once, from the Scaleway CLI profile file
//! and explicit overrides, and handed to the API client. Nothing reads the
//! environment after that.

pub mod error;

pub use error::*;

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.scaleway.com";
pub const DEFAULT_ZONE: &str = "fr-par-1";

/// Overrides the location of the profile file
pub const CONFIG_PATH_ENV: &str = "SCW_CONFIG_PATH";

const ZONES: [(&str, &str); 9] = [
    ("fr-par-1", "fr-par"),
    ("fr-par-2", "fr-par"),
    ("fr-par-3", "fr-par"),
    ("nl-ams-1", "nl-ams"),
    ("nl-ams-2", "nl-ams"),
    ("nl-ams-3", "nl-ams"),
    ("pl-waw-1", "pl-waw"),
    ("pl-waw-2", "pl-waw"),
    ("pl-waw-3", "pl-waw"),
];

/// Region a zone belongs to
pub fn region_for_zone(zone: &str) -> Result<&'static str> {
    ZONES
        .iter()
        .find(|(z, _)| *z == zone)
        .map(|(_, region)| *region)
        .ok_or_else(|| ConfigError::UnknownZone(zone.to_string()))
}

/// Resolved settings for one Scaleway project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalewayConfig {
    pub access_key: String,
    pub secret_key: String,
    pub project_id: String,
    pub region: String,
    pub zone: String,
    pub api_url: String,
}

/// One profile of the Scaleway CLI config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Profile {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub default_project_id: Option<String>,
    pub default_region: Option<String>,
    pub default_zone: Option<String>,
    pub api_url: Option<String>,
}

impl Profile {
    /// Fields set in `other` win
    fn merged_with(&self, other: &Profile) -> Profile {
        Profile {
            access_key: other.access_key.clone().or_else(|| self.access_key.clone()),
            secret_key: other.secret_key.clone().or_else(|| self.secret_key.clone()),
            default_project_id: other
                .default_project_id
                .clone()
                .or_else(|| self.default_project_id.clone()),
            default_region: other
                .default_region
                .clone()
                .or_else(|| self.default_region.clone()),
            default_zone: other
                .default_zone
                .clone()
                .or_else(|| self.default_zone.clone()),
            api_url: other.api_url.clone().or_else(|| self.api_url.clone()),
        }
    }
}

/// `~/.config/scw/config.yaml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileFile {
    #[serde(flatten)]
    pub default: Profile,
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl ProfileFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// The named profile (or the active one) layered over the top-level fields
    pub fn profile(&self, name: Option<&str>) -> Result<Profile> {
        let Some(name) = name.or(self.active_profile.as_deref()) else {
            return Ok(self.default.clone());
        };
        if name == "default" {
            return Ok(self.default.clone());
        }
        let named = self
            .profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound(name.to_string()))?;
        Ok(self.default.merged_with(named))
    }
}

/// Where the profile file is looked up: `SCW_CONFIG_PATH`, then
/// `~/.config/scw/config.yaml`
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".config").join("scw").join("config.yaml"))
}

/// Values given explicitly, typically CLI flags filled from `SCW_*` variables
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub profile: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub project_id: Option<String>,
    pub region: Option<String>,
    pub zone: Option<String>,
    pub api_url: Option<String>,
}

impl ScalewayConfig {
    /// Read the profile file if there is one and apply `overrides` on top
    pub fn load(overrides: &ConfigOverrides) -> Result<Self> {
        let file = match config_file_path() {
            Some(path) if path.exists() => {
                debug!(path = %path.display(), "reading Scaleway profile file");
                Some(ProfileFile::load(&path)?)
            }
            _ => None,
        };
        Self::resolve(file.as_ref(), overrides)
    }

    pub fn resolve(file: Option<&ProfileFile>, overrides: &ConfigOverrides) -> Result<Self> {
        let profile = match (file, &overrides.profile) {
            (Some(file), name) => file.profile(name.as_deref())?,
            (None, Some(name)) => return Err(ConfigError::ProfileNotFound(name.clone())),
            (None, None) => Profile::default(),
        };

        let pick = |explicit: &Option<String>, from_file: Option<String>, name: &'static str| {
            explicit
                .clone()
                .or(from_file)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingSetting(name))
        };

        let access_key = pick(&overrides.access_key, profile.access_key, "access key")?;
        let secret_key = pick(&overrides.secret_key, profile.secret_key, "secret key")?;
        let project_id = pick(&overrides.project_id, profile.default_project_id, "project ID")?;

        let zone = overrides
            .zone
            .clone()
            .or(profile.default_zone)
            .unwrap_or_else(|| DEFAULT_ZONE.to_string());
        let zone_region = region_for_zone(&zone)?;
        let region = overrides
            .region
            .clone()
            .or(profile.default_region)
            .unwrap_or_else(|| zone_region.to_string());
        if region != zone_region {
            return Err(ConfigError::ZoneRegionMismatch { zone, region });
        }

        let api_url = overrides
            .api_url
            .clone()
            .or(profile.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            access_key,
            secret_key,
            project_id,
            region,
            zone,
            api_url,
        })
    }
}
