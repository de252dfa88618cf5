//! OSC connection settings and loader
//!
//! Settings are stored as YAML.
//! Default location: ~/.config/vrc-osc/settings.yaml (platform config dir)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Port the runtime sends to (we listen here)
pub const DEFAULT_RECEIVE_PORT: u16 = 9001;
/// Port the runtime listens on (we send here)
pub const DEFAULT_SEND_PORT: u16 = 9000;
pub const DEFAULT_VRC_IP: &str = "127.0.0.1";

/// Root settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OscSettings {
    /// Local UDP port for inbound messages
    pub receive_port: u16,
    /// Remote UDP port for outbound messages
    pub send_port: u16,
    /// IP address of the machine running the avatar runtime
    pub vrc_ip: String,
}

impl Default for OscSettings {
    fn default() -> Self {
        Self {
            receive_port: DEFAULT_RECEIVE_PORT,
            send_port: DEFAULT_SEND_PORT,
            vrc_ip: DEFAULT_VRC_IP.to_string(),
        }
    }
}

/// Get the default settings file path
pub fn default_osc_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vrc-osc")
        .join("settings.yaml")
}

/// Load settings from a YAML file
///
/// If the file doesn't exist, returns the defaults.
/// If the file exists but is invalid, logs a warning and returns the defaults.
pub fn load_osc_settings(path: &Path) -> OscSettings {
    log::info!("load_osc_settings: Loading from {:?}", path);

    if !path.exists() {
        log::info!("load_osc_settings: Settings file doesn't exist, using defaults");
        return OscSettings::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<OscSettings>(&contents) {
            Ok(settings) => {
                log::info!(
                    "load_osc_settings: receive {}, send {}:{}",
                    settings.receive_port,
                    settings.vrc_ip,
                    settings.send_port
                );
                settings
            }
            Err(e) => {
                log::warn!("load_osc_settings: Failed to parse settings: {}", e);
                OscSettings::default()
            }
        },
        Err(e) => {
            log::warn!("load_osc_settings: Failed to read settings file: {}", e);
            OscSettings::default()
        }
    }
}

/// Save settings to a YAML file
///
/// Creates parent directories if they don't exist.
pub fn save_osc_settings(settings: &OscSettings, path: &Path) -> anyhow::Result<()> {
    use anyhow::Context;

    log::info!("save_osc_settings: Saving to {:?}", path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create settings directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(settings).context("Failed to serialize OSC settings to YAML")?;

    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write OSC settings file: {:?}", path))?;

    log::info!("save_osc_settings: Settings saved successfully");
    Ok(())
}
