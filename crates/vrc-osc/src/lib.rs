//! OSC parameter sync and input control for VRChat avatars
//!
//! This crate provides:
//! - UDP send/receive endpoints with OSC encoding via rosc
//! - A shared registry of the last value seen per OSC address
//! - Change notifications with per-subscriber failure isolation
//! - Typed access to an avatar's declared parameters and PhysBone groups
//! - Button and axis input controls
//!
//! # Architecture
//!
//! ```text
//! runtime → UDP → receive thread → ParameterRegistry::update → subscribers
//! app → AvatarParameters / ButtonInput / AxisInput → OscConnection → UDP → runtime
//! ```
//!
//! Subscribers run synchronously on the receive thread. Anything slow should
//! be forwarded elsewhere, e.g. via [`OscConnection::message_receiver`].

pub mod avatar;
mod connection;
mod dispatch;
mod input;
mod registry;
mod settings;
mod types;

pub use avatar::{
    AvatarConfig, AvatarConfigError, AvatarParameter, AvatarParameters, DeclaredParameter,
    ParameterChannel, ParameterError, PhysBone,
};
pub use connection::{
    parse_ip, validate_port, ConnectionError, InboundMessage, MessageCallback, OscConnection,
    OscSender,
};
pub use dispatch::{ChangeDispatcher, ParameterChange, SubscriptionToken};
pub use input::{AxisInput, ButtonInput, INPUT_ADDRESS_SPACE};
pub use registry::ParameterRegistry;
pub use settings::{
    default_osc_settings_path, load_osc_settings, save_osc_settings, OscSettings,
    DEFAULT_RECEIVE_PORT, DEFAULT_SEND_PORT, DEFAULT_VRC_IP,
};
pub use types::{Color32, MidiMessage, ParameterType, ParameterValue};

use std::path::Path;
use std::sync::Arc;

/// Error type for session operations
#[derive(Debug, thiserror::Error)]
pub enum OscError {
    #[error("OSC connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("{0}")]
    Parameter(#[from] ParameterError),

    #[error("Failed to load avatar config: {0}")]
    AvatarConfig(#[from] AvatarConfigError),
}

/// Main OSC session
///
/// Owns the connection and the parameter registry, and keeps the registry
/// fed from the receive endpoint.
pub struct OscSession {
    registry: Arc<ParameterRegistry>,
    connection: OscConnection,
}

impl OscSession {
    /// Create a session and start listening on the receive port
    pub fn new(settings: &OscSettings) -> Result<Self, OscError> {
        let registry = Arc::new(ParameterRegistry::new());
        let connection = OscConnection::new(settings)?;

        let sink = registry.clone();
        connection.add_monitor_callback(move |address, value| {
            sink.update(address, value.clone());
        })?;

        log::info!(
            "OSC: Session started (receive {}, send {}:{})",
            settings.receive_port,
            settings.vrc_ip,
            settings.send_port
        );

        Ok(Self {
            registry,
            connection,
        })
    }

    /// Create a session from a settings file (default location if `None`)
    pub fn from_settings_file(path: Option<&Path>) -> Result<Self, OscError> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(default_osc_settings_path);
        Self::new(&load_osc_settings(&path))
    }

    pub fn registry(&self) -> &Arc<ParameterRegistry> {
        &self.registry
    }

    pub fn connection(&self) -> &OscConnection {
        &self.connection
    }

    /// Send a value to an arbitrary address
    pub fn send_value(
        &self,
        address: &str,
        value: impl Into<ParameterValue>,
    ) -> Result<(), OscError> {
        Ok(self.connection.send(address, &value.into())?)
    }

    /// Record a value for an avatar parameter and send it to the runtime
    ///
    /// The registry is updated before sending, so local readers see the value
    /// even if the runtime never echoes it back.
    pub fn send_avatar_parameter(
        &self,
        name: &str,
        value: impl Into<ParameterValue>,
    ) -> Result<(), OscError> {
        let address = avatar::avatar_parameter_address(name);
        let value = value.into();
        self.registry.update(address.as_str(), value.clone());
        Ok(self.connection.send(&address, &value)?)
    }

    /// Typed parameter access for an avatar config
    pub fn avatar_parameters(&self, config: &AvatarConfig) -> AvatarParameters {
        AvatarParameters::from_config(config, self.registry.clone())
    }

    /// Find, load and wrap the config of an avatar under VRChat's OSC directory
    pub fn load_avatar(&self, avatar_id: &str) -> Result<AvatarParameters, OscError> {
        let path = avatar::find_avatar_config(&avatar::default_osc_config_dir(), avatar_id)?;
        let config = avatar::load_avatar_config(&path)?;
        Ok(self.avatar_parameters(&config))
    }
}

impl OscSender for OscSession {
    fn send(&self, address: &str, value: &ParameterValue) -> Result<(), ConnectionError> {
        self.connection.send(address, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosc::{OscMessage, OscPacket, OscType};
    use std::net::UdpSocket;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(2);

    /// Session on an ephemeral receive port, sending to a local test socket
    fn session_with_runtime() -> (OscSession, UdpSocket) {
        let runtime = UdpSocket::bind("127.0.0.1:0").unwrap();
        runtime.set_read_timeout(Some(TIMEOUT)).unwrap();
        let settings = OscSettings {
            receive_port: 0,
            send_port: runtime.local_addr().unwrap().port(),
            vrc_ip: "127.0.0.1".to_string(),
        };
        (OscSession::new(&settings).unwrap(), runtime)
    }

    fn receive_port(session: &OscSession) -> u16 {
        session.connection().local_receive_addr().unwrap().port()
    }

    fn send_from_runtime(port: u16, address: &str, args: Vec<OscType>) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let bytes = rosc::encoder::encode(&OscPacket::Message(OscMessage {
            addr: address.to_string(),
            args,
        }))
        .unwrap();
        socket.send_to(&bytes, ("127.0.0.1", port)).unwrap();
    }

    fn recv_at_runtime(runtime: &UdpSocket) -> OscMessage {
        let mut buf = [0u8; 4096];
        let len = runtime.recv(&mut buf).unwrap();
        match rosc::decoder::decode_udp(&buf[..len]).unwrap().1 {
            OscPacket::Message(message) => message,
            other => panic!("Expected message, got {:?}", other),
        }
    }

    fn test_avatar() -> AvatarConfig {
        AvatarConfig::from_json(
            r#"{
                "id": "avtr_TestAvatar",
                "name": "TestAvatar",
                "parameters": [
                    {
                        "name": "TestParam",
                        "input": { "address": "/avatar/parameters/TestParam", "type": "Float" },
                        "output": { "address": "/avatar/parameters/TestParam", "type": "Float" }
                    }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_inbound_values_reach_registry() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (session, _runtime) = session_with_runtime();
        let (tx, rx) = flume::unbounded();
        session.registry().subscribe(move |change| {
            let _ = tx.send(change.clone());
            Ok(())
        });

        let cases = vec![
            (vec![OscType::Int(123)], ParameterValue::Int32(123)),
            (vec![OscType::Float(123.4)], ParameterValue::Float32(123.4)),
            (vec![OscType::Double(123.5)], ParameterValue::Float64(123.5)),
            (vec![OscType::Bool(true)], ParameterValue::Bool(true)),
            (vec![OscType::Bool(false)], ParameterValue::Bool(false)),
            (
                vec![OscType::String("value".to_string())],
                ParameterValue::String("value".to_string()),
            ),
            (
                vec![OscType::Blob(vec![1, 2, 3, 4])],
                ParameterValue::Blob(vec![1, 2, 3, 4]),
            ),
        ];

        let address = "/avatar/parameters/paramName";
        let port = receive_port(&session);
        let mut previous = None;
        for (args, expected) in cases {
            send_from_runtime(port, address, args);
            let change = rx.recv_timeout(TIMEOUT).unwrap();
            assert_eq!(change.address, address);
            assert_eq!(change.old_value, previous);
            assert_eq!(change.new_value, expected);
            assert_eq!(session.registry().get(address), Some(expected.clone()));
            previous = Some(expected);
        }
    }

    #[test]
    fn test_send_avatar_parameter_updates_registry() {
        let (session, runtime) = session_with_runtime();
        let address = "/avatar/parameters/paramName";

        let values = vec![
            ParameterValue::Int32(123),
            ParameterValue::Float32(123.4),
            ParameterValue::Float64(123.5),
            ParameterValue::Bool(true),
            ParameterValue::Bool(false),
            ParameterValue::String("value".to_string()),
            ParameterValue::Blob(vec![1, 2, 3, 4]),
        ];
        for value in values {
            session
                .send_avatar_parameter("paramName", value.clone())
                .unwrap();
            assert_eq!(session.registry().get(address), Some(value.clone()));

            let message = recv_at_runtime(&runtime);
            assert_eq!(message.addr, address);
            assert_eq!(message.args, value.to_osc_args());
        }
    }

    #[test]
    fn test_send_value_does_not_touch_registry() {
        let (session, runtime) = session_with_runtime();
        session.send_value("/test/address", 1.2f32).unwrap();

        let message = recv_at_runtime(&runtime);
        assert_eq!(message.addr, "/test/address");
        assert_eq!(message.args, vec![OscType::Float(1.2)]);
        assert!(session.registry().is_empty());
    }

    #[test]
    fn test_avatar_parameter_changed() {
        let (session, _runtime) = session_with_runtime();
        let params = session.avatar_parameters(&test_avatar());
        let (tx, rx) = flume::unbounded();
        let token = params.subscribe(move |param, change| {
            let _ = tx.send((param.name.clone(), change.old_value.clone(), change.new_value.clone()));
            Ok(())
        });

        send_from_runtime(receive_port(&session), "/avatar/parameters/TestParam", vec![OscType::Int(100)]);

        let (name, old, new) = rx.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(name, "TestParam");
        assert_eq!(old, None);
        assert_eq!(new, ParameterValue::Int32(100));
        assert!(params.unsubscribe(token));
    }

    #[test]
    fn test_failing_subscriber_over_network() {
        let (session, _runtime) = session_with_runtime();
        let params = session.avatar_parameters(&test_avatar());
        let failures = Arc::new(AtomicUsize::new(0));

        let f = failures.clone();
        params.subscribe(move |_, _| {
            f.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("subscriber bug")
        });
        let (tx, rx) = flume::unbounded();
        params.subscribe(move |_, change| {
            let _ = tx.send(change.new_value.clone());
            Ok(())
        });

        let port = receive_port(&session);
        send_from_runtime(port, "/avatar/parameters/TestParam", vec![OscType::Int(1)]);
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), ParameterValue::Int32(1));
        send_from_runtime(port, "/avatar/parameters/TestParam", vec![OscType::Int(2)]);
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), ParameterValue::Int32(2));

        assert_eq!(failures.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_inputs_over_network() {
        let (session, runtime) = session_with_runtime();

        ButtonInput::Jump.press(&session).unwrap();
        let message = recv_at_runtime(&runtime);
        assert_eq!(message.addr, "/input/Jump");
        assert_eq!(message.args, vec![OscType::Int(1)]);

        ButtonInput::Jump.release(&session).unwrap();
        assert_eq!(recv_at_runtime(&runtime).args, vec![OscType::Int(0)]);

        AxisInput::Vertical.send(&session, 2.5).unwrap();
        let message = recv_at_runtime(&runtime);
        assert_eq!(message.addr, "/input/Vertical");
        assert_eq!(message.args, vec![OscType::Float(1.0)]);
    }

    #[test]
    fn test_session_from_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "receive_port: 0\nvrc_ip: \"127.0.0.1\"\n").unwrap();

        let session = OscSession::from_settings_file(Some(&path)).unwrap();
        assert!(session.connection().is_receiving());
        assert_eq!(session.connection().send_port(), DEFAULT_SEND_PORT);
    }
}
