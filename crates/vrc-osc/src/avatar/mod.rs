//! Avatar parameters
//!
//! Typed access to the parameters an avatar declares in its OSC config, and
//! the PhysBone groups inferred from their names.

mod config;
mod parameters;
mod physbone;

pub use config::{
    default_osc_config_dir, find_avatar_config, load_avatar_config, AvatarConfig,
    AvatarConfigError, AvatarParameterEntry, DeclaredParameter, EndpointEntry,
};
pub use parameters::{AvatarParameter, AvatarParameters, ParameterChannel, ParameterError};
pub use physbone::{classify_physbones, PhysBone};

/// Address space shared by every avatar parameter, in both directions
pub const AVATAR_PARAMETER_ADDRESS_SPACE: &str = "/avatar/parameters/";

/// Full OSC address of an avatar parameter
pub fn avatar_parameter_address(name: &str) -> String {
    format!("{}{}", AVATAR_PARAMETER_ADDRESS_SPACE, name)
}
