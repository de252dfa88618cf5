//! Avatar OSC config files
//!
//! VRChat writes one JSON file per avatar under
//! `<LocalLow>/VRChat/VRChat/OSC/<user id>/Avatars/<avatar id>.json`. Each file
//! lists the avatar's parameters with an optional input (host → runtime) and
//! an output (runtime → host) endpoint.

use crate::types::ParameterType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Error type for avatar config loading
#[derive(Debug, thiserror::Error)]
pub enum AvatarConfigError {
    #[error("Failed to read avatar config {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse avatar config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No config found for avatar '{0}'")]
    NotFound(String),
}

/// Root of an avatar config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<AvatarParameterEntry>,
}

/// One parameter as written in the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarParameterEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<EndpointEntry>,
    pub output: EndpointEntry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointEntry {
    pub address: String,
    #[serde(rename = "type")]
    pub parameter_type: ParameterType,
}

/// A parameter the avatar declares, independent of any traffic
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeclaredParameter {
    pub name: String,
    pub parameter_type: ParameterType,
    /// Whether the runtime accepts writes for this parameter. Advisory only.
    pub has_input: bool,
}

impl DeclaredParameter {
    pub fn new(name: impl Into<String>, parameter_type: ParameterType, has_input: bool) -> Self {
        Self {
            name: name.into(),
            parameter_type,
            has_input,
        }
    }
}

impl AvatarConfig {
    /// Parse a config file's contents (a leading BOM is tolerated)
    pub fn from_json(json: &str) -> Result<Self, AvatarConfigError> {
        let json = json.strip_prefix('\u{feff}').unwrap_or(json);
        Ok(serde_json::from_str(json)?)
    }

    /// The declared parameter list, in file order
    pub fn declared_parameters(&self) -> Vec<DeclaredParameter> {
        self.parameters
            .iter()
            .map(|entry| DeclaredParameter {
                name: entry.name.clone(),
                parameter_type: entry.output.parameter_type,
                has_input: entry.input.is_some(),
            })
            .collect()
    }
}

/// Default VRChat OSC config directory
pub fn default_osc_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("AppData")
        .join("LocalLow")
        .join("VRChat")
        .join("VRChat")
        .join("OSC")
}

/// Load and parse one avatar config file
pub fn load_avatar_config(path: &Path) -> Result<AvatarConfig, AvatarConfigError> {
    log::info!("load_avatar_config: Loading from {:?}", path);

    let contents = std::fs::read_to_string(path).map_err(|source| AvatarConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = AvatarConfig::from_json(&contents)?;

    log::info!(
        "load_avatar_config: Loaded '{}' ({}) with {} parameter(s)",
        config.name,
        config.id,
        config.parameters.len()
    );
    Ok(config)
}

/// Find the config file for an avatar under any user directory of `root`
pub fn find_avatar_config(root: &Path, avatar_id: &str) -> Result<PathBuf, AvatarConfigError> {
    let file_name = format!("{}.json", avatar_id);
    let users = std::fs::read_dir(root).map_err(|source| AvatarConfigError::Io {
        path: root.to_path_buf(),
        source,
    })?;

    users
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path().join("Avatars").join(&file_name))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| AvatarConfigError::NotFound(avatar_id.to_string()))
}
