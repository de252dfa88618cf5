//! Name-based access to an avatar's declared parameters

use super::config::{AvatarConfig, DeclaredParameter};
use super::physbone::{classify_physbones, PhysBone};
use super::{avatar_parameter_address, AVATAR_PARAMETER_ADDRESS_SPACE};
use crate::dispatch::{ParameterChange, SubscriptionToken};
use crate::registry::ParameterRegistry;
use crate::types::{ParameterType, ParameterValue};
use std::sync::{Arc, OnceLock};

/// Error type for avatar parameter lookups
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParameterError {
    #[error("Avatar parameter not found: {0}")]
    NotFound(String),

    #[error("Avatar parameter declared more than once: {0}")]
    Ambiguous(String),
}

/// One direction of a parameter's traffic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterChannel {
    pub address: String,
    pub parameter_type: ParameterType,
}

/// A declared parameter resolved to its OSC channels
///
/// Receive (runtime → host) is always present. Send (host → runtime) is only
/// present when the avatar accepts input for the parameter. Both use the same
/// address; direction is decided by the port the message travels on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarParameter {
    pub name: String,
    pub receive: Option<ParameterChannel>,
    pub send: Option<ParameterChannel>,
}

impl AvatarParameter {
    fn from_declared(declared: &DeclaredParameter) -> Self {
        let channel = ParameterChannel {
            address: avatar_parameter_address(&declared.name),
            parameter_type: declared.parameter_type,
        };
        Self {
            name: declared.name.clone(),
            send: declared.has_input.then(|| channel.clone()),
            receive: Some(channel),
        }
    }

    /// OSC address of this parameter
    pub fn address(&self) -> &str {
        self.receive
            .as_ref()
            .or(self.send.as_ref())
            .map(|c| c.address.as_str())
            .unwrap_or_default()
    }

    /// Last value received or sent for this parameter
    pub fn value(&self, registry: &ParameterRegistry) -> Option<ParameterValue> {
        registry.get(self.address())
    }
}

/// Declared parameters of the current avatar, backed by the shared registry
///
/// The declared list is fixed for the session; PhysBone groups are computed on
/// first access and cached.
pub struct AvatarParameters {
    declared: Arc<[DeclaredParameter]>,
    registry: Arc<ParameterRegistry>,
    physbones: OnceLock<Vec<PhysBone>>,
}

impl AvatarParameters {
    pub fn new(declared: Vec<DeclaredParameter>, registry: Arc<ParameterRegistry>) -> Self {
        Self {
            declared: declared.into(),
            registry,
            physbones: OnceLock::new(),
        }
    }

    pub fn from_config(config: &AvatarConfig, registry: Arc<ParameterRegistry>) -> Self {
        Self::new(config.declared_parameters(), registry)
    }

    /// Look up a declared parameter by name
    pub fn get(&self, name: &str) -> Result<AvatarParameter, ParameterError> {
        resolve(&self.declared, name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.declared.iter().any(|p| p.name == name)
    }

    pub fn declared(&self) -> &[DeclaredParameter] {
        &self.declared
    }

    /// Current value of a declared parameter
    pub fn value(&self, name: &str) -> Result<Option<ParameterValue>, ParameterError> {
        Ok(self.get(name)?.value(&self.registry))
    }

    /// PhysBone groups of this avatar
    pub fn physbones(&self) -> &[PhysBone] {
        self.physbones
            .get_or_init(|| classify_physbones(&self.declared))
    }

    pub fn registry(&self) -> &Arc<ParameterRegistry> {
        &self.registry
    }

    /// Subscribe to changes of this avatar's declared parameters
    ///
    /// Changes to other addresses (undeclared parameters, inputs, ...) are not
    /// delivered. Neither are changes to a name the config declares more than
    /// once, since it doesn't resolve to one parameter; those are logged at
    /// debug level.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionToken
    where
        F: Fn(&AvatarParameter, &ParameterChange) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let declared = self.declared.clone();
        self.registry.subscribe(move |change| {
            let Some(name) = change.address.strip_prefix(AVATAR_PARAMETER_ADDRESS_SPACE) else {
                return Ok(());
            };
            match resolve(&declared, name) {
                Ok(parameter) => handler(&parameter, change),
                Err(ParameterError::Ambiguous(name)) => {
                    log::debug!("OSC: Skipping change of ambiguous parameter '{}'", name);
                    Ok(())
                }
                Err(ParameterError::NotFound(_)) => Ok(()),
            }
        })
    }

    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        self.registry.unsubscribe(token)
    }
}

fn resolve(declared: &[DeclaredParameter], name: &str) -> Result<AvatarParameter, ParameterError> {
    let mut matches = declared.iter().filter(|p| p.name == name);
    let found = matches
        .next()
        .ok_or_else(|| ParameterError::NotFound(name.to_string()))?;
    if matches.next().is_some() {
        return Err(ParameterError::Ambiguous(name.to_string()));
    }
    Ok(AvatarParameter::from_declared(found))
}
