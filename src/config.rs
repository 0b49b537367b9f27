use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("docket")
}

fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("docket")
        .join("config.json")
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct DocketConfig {
    pub data_directory: PathBuf,
    pub debug_logging: bool,
}

impl Default for DocketConfig {
    fn default() -> Self {
        Self {
            data_directory: default_data_dir(),
            debug_logging: false,
        }
    }
}

impl DocketConfig {
    /// Load the config file, falling back to defaults when it is missing or
    /// unreadable.
    pub fn load() -> Self {
        Self::read_from(&config_path())
    }

    pub fn save(&self) -> std::io::Result<()> {
        self.write_to(&config_path())
    }

    fn read_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    log::error!("Unreadable config {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    fn write_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_directory.join("store.json")
    }
}
