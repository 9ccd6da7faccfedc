//! Preferences at ~/.config/fleetdesk/config.toml
//!
//! Values come from the file, then `FLEETDESK_*` environment variables
//! (`FLEETDESK_SERVER_URL`, `FLEETDESK_PAGE_SIZE`, `FLEETDESK_SOUND`,
//! `FLEETDESK_DATA_DIR`). Callers load them once and pass them along.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PAGE_SIZE, DEFAULT_SERVER_PORT};
use crate::error::{FleetError, FleetResult};

static DEFAULT_DATA_DIR: &str = "~/.local/share/fleetdesk";

fn default_server_url() -> String {
    format!("http://127.0.0.1:{}", DEFAULT_SERVER_PORT)
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_sound() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Preferences {
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Rows per history page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Ring the terminal bell when a new booking request arrives
    #[serde(default = "default_sound")]
    pub sound: bool,

    /// Where the server keeps its store and lock file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            server_url: default_server_url(),
            page_size: default_page_size(),
            sound: default_sound(),
            data_dir: default_data_dir(),
        }
    }
}

impl Preferences {
    pub fn config_path() -> FleetResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| FleetError::Config("Could not determine config directory".into()))?
            .join("fleetdesk");

        Ok(config_dir.join("config.toml"))
    }

    /// Load from the default path, writing a commented template on first run.
    pub fn load() -> FleetResult<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path, None)
    }

    /// Load from `path`. `env` replaces the process environment when given.
    pub fn load_from(path: &Path, env: Option<HashMap<String, String>>) -> FleetResult<Self> {
        let prefs: Preferences = Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(
                Environment::with_prefix("FLEETDESK")
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .map_err(|e| FleetError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| FleetError::Config(e.to_string()))?;

        tracing::debug!(path = %path.display(), server_url = %prefs.server_url, "loaded preferences");
        Ok(prefs)
    }

    /// Port named in `server_url`, or the default port.
    pub fn server_port(&self) -> u16 {
        let authority = self
            .server_url
            .split_once("://")
            .map_or(self.server_url.as_str(), |(_, rest)| rest);
        authority
            .split('/')
            .next()
            .and_then(|host| host.rsplit_once(':'))
            .and_then(|(_, port)| port.parse().ok())
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    /// Never zero.
    pub fn page_size(&self) -> usize {
        self.page_size.max(1)
    }

    pub fn data_path(&self) -> PathBuf {
        let full_path_str = shellexpand::tilde(&self.data_dir.to_string_lossy()).into_owned();

        PathBuf::from(full_path_str)
    }

    /// Apply `edit` to the preferences stored at `path` and write them back.
    ///
    /// Only the file is read, so environment overrides never end up saved.
    pub fn update_file(
        path: &Path,
        edit: impl FnOnce(&mut Preferences),
    ) -> FleetResult<Preferences> {
        let mut stored = Self::load_from(path, Some(HashMap::new()))?;
        edit(&mut stored);
        stored.save_to(path)?;
        Ok(stored)
    }

    pub fn save_to(&self, path: &Path) -> FleetResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| FleetError::Config(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                FleetError::Config(format!("Could not create config directory: {e}"))
            })?;
        }
        std::fs::write(path, content)
            .map_err(|e| FleetError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> FleetResult<()> {
        let contents = format!(
            "\
# fleetdesk configuration

# Server the CLI talks to:
# server_url = \"{}\"

# Rows per history page:
# page_size = {}

# Ring the bell on new booking requests while watching:
# sound = true

# Where the server keeps its data:
# data_dir = \"{}\"
",
            default_server_url(),
            DEFAULT_PAGE_SIZE,
            DEFAULT_DATA_DIR
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                FleetError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| FleetError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }
}
