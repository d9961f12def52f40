use std::{fs, path::Path};

use anyhow::Result;
use layerlink::SliceSettings;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_PATH: &str = "layerlink.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub slice: SliceSettings,
    pub pretty: bool,
}

impl Config {
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                warn!("Failed to load config, using defaults: {}", err);
                Config::default()
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(if path.exists() {
            let string = fs::read_to_string(path)?;
            let config: Config = toml::from_str(&string)?;
            config.slice.validate()?;
            info!("Loaded config from {}", path.display());
            config
        } else {
            info!("No config file found, using defaults");
            Self::default()
        })
    }
}
