//! OSC endpoints over UDP
//!
//! Two independent endpoints: a receive socket bound to the receive port with
//! its own thread, and a send socket aimed at the runtime's address and send
//! port. Packets are encoded/decoded with rosc. Changing one port recreates
//! only that endpoint; registered callbacks live in a table shared with the
//! receive thread, so a recreated endpoint picks them up immediately.

use crate::settings::OscSettings;
use crate::types::ParameterValue;
use flume::Receiver;
use rosc::{OscMessage, OscPacket};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How often the receive thread wakes up to check for shutdown
const RECV_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Largest UDP payload over IPv4, so bundles are never truncated
const RECV_BUFFER_SIZE: usize = 65507;

/// Error type for OSC connection operations
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Port out of range [0, 65535]: {0}")]
    InvalidPort(i64),

    #[error("Invalid IP address: {0}")]
    InvalidAddress(String),

    #[error("Failed to bind OSC receive port {port}: {source}")]
    Bind { port: u16, source: std::io::Error },

    #[error("Failed to open OSC send socket for {target}: {source}")]
    Connect {
        target: SocketAddr,
        source: std::io::Error,
    },

    #[error("Failed to send OSC message to {address}: {source}")]
    Send {
        address: String,
        source: std::io::Error,
    },

    #[error("Failed to encode OSC message: {0}")]
    Encode(String),

    #[error("Failed to spawn OSC receive thread: {0}")]
    Spawn(std::io::Error),
}

/// Anything that can deliver a value to an OSC address
pub trait OscSender {
    fn send(&self, address: &str, value: &ParameterValue) -> Result<(), ConnectionError>;
}

/// Callback for inbound messages: (address, decoded value)
pub type MessageCallback = Arc<dyn Fn(&str, &ParameterValue) + Send + Sync>;

/// A decoded inbound message, as delivered through [`OscConnection::message_receiver`]
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub address: String,
    pub value: ParameterValue,
}

/// Validate a port number before any state is touched
pub fn validate_port(port: i64) -> Result<u16, ConnectionError> {
    u16::try_from(port).map_err(|_| ConnectionError::InvalidPort(port))
}

/// Parse an IP address string
pub fn parse_ip(ip: &str) -> Result<IpAddr, ConnectionError> {
    ip.trim()
        .parse()
        .map_err(|_| ConnectionError::InvalidAddress(ip.to_string()))
}

/// Callbacks shared between the connection and its receive thread
#[derive(Default)]
struct CallbackTable {
    /// Called for every inbound message
    monitors: RwLock<Vec<MessageCallback>>,
    /// Called for inbound messages on one exact address
    methods: RwLock<HashMap<String, Vec<MessageCallback>>>,
}

impl CallbackTable {
    fn dispatch(&self, address: &str, value: &ParameterValue) {
        let mut targets: Vec<MessageCallback> = self
            .monitors
            .read()
            .map(|monitors| monitors.clone())
            .unwrap_or_default();
        if let Ok(methods) = self.methods.read() {
            if let Some(callbacks) = methods.get(address) {
                targets.extend(callbacks.iter().cloned());
            }
        }

        for callback in targets {
            if catch_unwind(AssertUnwindSafe(|| callback(address, value))).is_err() {
                log::warn!("OSC: Callback for '{}' panicked", address);
            }
        }
    }
}

/// Bound receive socket plus the thread reading it
struct ReceiveEndpoint {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ReceiveEndpoint {
    fn bind(port: u16, callbacks: Arc<CallbackTable>) -> Result<Self, ConnectionError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))
            .map_err(|source| ConnectionError::Bind { port, source })?;
        socket
            .set_read_timeout(Some(RECV_POLL_INTERVAL))
            .map_err(|source| ConnectionError::Bind { port, source })?;
        let local_addr = socket
            .local_addr()
            .map_err(|source| ConnectionError::Bind { port, source })?;

        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();
        let thread = thread::Builder::new()
            .name(format!("osc-recv-{}", local_addr.port()))
            .spawn(move || Self::run(socket, thread_running, callbacks))
            .map_err(ConnectionError::Spawn)?;

        log::info!("OSC: Listening on {}", local_addr);

        Ok(Self {
            local_addr,
            running,
            thread: Some(thread),
        })
    }

    fn run(socket: UdpSocket, running: Arc<AtomicBool>, callbacks: Arc<CallbackTable>) {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];

        while running.load(Ordering::Relaxed) {
            let len = match socket.recv_from(&mut buf) {
                Ok((len, _)) => len,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    continue;
                }
                Err(e) => {
                    log::warn!("OSC: Receive error: {}", e);
                    continue;
                }
            };

            match rosc::decoder::decode_udp(&buf[..len]) {
                Ok((_, packet)) => dispatch_packet(packet, &callbacks),
                Err(e) => log::warn!("OSC: Dropping undecodable datagram: {:?}", e),
            }
        }

        log::info!("OSC: Receive thread stopped");
    }
}

impl Drop for ReceiveEndpoint {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            // A callback may tear down its own endpoint; never join ourselves
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
        log::info!("OSC: Closed receive endpoint {}", self.local_addr);
    }
}

fn dispatch_packet(packet: OscPacket, callbacks: &CallbackTable) {
    match packet {
        OscPacket::Message(message) => match ParameterValue::from_osc_args(&message.args) {
            Some(value) => callbacks.dispatch(&message.addr, &value),
            None => log::debug!(
                "OSC: Ignoring '{}' with unsupported arguments {:?}",
                message.addr,
                message.args
            ),
        },
        OscPacket::Bundle(bundle) => {
            for packet in bundle.content {
                dispatch_packet(packet, callbacks);
            }
        }
    }
}

/// Socket aimed at the runtime's receive port
struct SendEndpoint {
    socket: UdpSocket,
    target: SocketAddr,
}

impl SendEndpoint {
    fn connect(target: SocketAddr) -> Result<Self, ConnectionError> {
        let local: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (std::net::Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket =
            UdpSocket::bind(local).map_err(|source| ConnectionError::Connect { target, source })?;
        socket
            .connect(target)
            .map_err(|source| ConnectionError::Connect { target, source })?;

        log::info!("OSC: Sending to {}", target);
        Ok(Self { socket, target })
    }

    fn send(&self, address: &str, value: &ParameterValue) -> Result<(), ConnectionError> {
        let packet = OscPacket::Message(OscMessage {
            addr: address.to_string(),
            args: value.to_osc_args(),
        });
        let bytes =
            rosc::encoder::encode(&packet).map_err(|e| ConnectionError::Encode(format!("{:?}", e)))?;

        self.socket
            .send(&bytes)
            .map_err(|source| ConnectionError::Send {
                address: address.to_string(),
                source,
            })?;
        log::debug!("OSC: Sent {} {:?} to {}", address, value, self.target);
        Ok(())
    }
}

struct ConnectionState {
    receive_port: u16,
    send_port: u16,
    vrc_ip: IpAddr,
    receiver: Option<ReceiveEndpoint>,
    sender: Option<SendEndpoint>,
}

/// OSC client/server pair talking to the avatar runtime
///
/// The send socket is opened lazily on first send. The receive socket is
/// opened by [`start_receiving`](Self::start_receiving) or implicitly when the
/// first callback is registered.
pub struct OscConnection {
    state: Mutex<ConnectionState>,
    callbacks: Arc<CallbackTable>,
}

impl OscConnection {
    /// Create a connection from settings; no socket is opened yet
    pub fn new(settings: &OscSettings) -> Result<Self, ConnectionError> {
        let vrc_ip = parse_ip(&settings.vrc_ip)?;
        Ok(Self {
            state: Mutex::new(ConnectionState {
                receive_port: settings.receive_port,
                send_port: settings.send_port,
                vrc_ip,
                receiver: None,
                sender: None,
            }),
            callbacks: Arc::new(CallbackTable::default()),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current settings (configured values, not the resolved ephemeral port)
    pub fn settings(&self) -> OscSettings {
        let state = self.lock();
        OscSettings {
            receive_port: state.receive_port,
            send_port: state.send_port,
            vrc_ip: state.vrc_ip.to_string(),
        }
    }

    pub fn receive_port(&self) -> u16 {
        self.lock().receive_port
    }

    pub fn send_port(&self) -> u16 {
        self.lock().send_port
    }

    pub fn vrc_ip(&self) -> IpAddr {
        self.lock().vrc_ip
    }

    /// Open the receive endpoint if it isn't already
    pub fn start_receiving(&self) -> Result<(), ConnectionError> {
        let mut state = self.lock();
        if state.receiver.is_none() {
            state.receiver = Some(ReceiveEndpoint::bind(
                state.receive_port,
                self.callbacks.clone(),
            )?);
        }
        Ok(())
    }

    pub fn is_receiving(&self) -> bool {
        self.lock().receiver.is_some()
    }

    /// Actual bound address of the receive endpoint, if open
    pub fn local_receive_addr(&self) -> Option<SocketAddr> {
        self.lock().receiver.as_ref().map(|r| r.local_addr)
    }

    /// Change the receive port
    ///
    /// Out-of-range ports are rejected before anything changes. If the new
    /// port can't be bound, the old endpoint keeps running.
    pub fn set_receive_port(&self, port: i64) -> Result<(), ConnectionError> {
        let port = validate_port(port)?;

        let mut state = self.lock();
        if state.receive_port == port {
            return Ok(());
        }

        let old = if state.receiver.is_some() {
            let new = ReceiveEndpoint::bind(port, self.callbacks.clone())?;
            state.receiver.replace(new)
        } else {
            None
        };
        state.receive_port = port;
        drop(state);

        // Joining the old thread happens outside the lock so its in-flight
        // callbacks can still use this connection
        drop(old);
        log::info!("OSC: Receive port set to {}", port);
        Ok(())
    }

    /// Change the send port; the send socket is reopened on next send
    pub fn set_send_port(&self, port: i64) -> Result<(), ConnectionError> {
        let port = validate_port(port)?;

        let mut state = self.lock();
        if state.send_port == port {
            return Ok(());
        }
        state.send_port = port;
        state.sender = None;
        log::info!("OSC: Send port set to {}", port);
        Ok(())
    }

    /// Change the runtime's IP address; the send socket is reopened on next send
    pub fn set_vrc_ip(&self, ip: &str) -> Result<(), ConnectionError> {
        let ip = parse_ip(ip)?;

        let mut state = self.lock();
        state.vrc_ip = ip;
        state.sender = None;
        log::info!("OSC: Runtime address set to {}", ip);
        Ok(())
    }

    /// Register a callback for every inbound message
    pub fn add_monitor_callback<F>(&self, callback: F) -> Result<(), ConnectionError>
    where
        F: Fn(&str, &ParameterValue) + Send + Sync + 'static,
    {
        self.callbacks
            .monitors
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(callback));
        self.start_receiving()
    }

    /// Register a callback for inbound messages on one address
    pub fn add_method<F>(&self, address: &str, callback: F) -> Result<(), ConnectionError>
    where
        F: Fn(&str, &ParameterValue) + Send + Sync + 'static,
    {
        self.callbacks
            .methods
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(address.to_string())
            .or_default()
            .push(Arc::new(callback));
        self.start_receiving()
    }

    /// Channel receiving a copy of every inbound message
    ///
    /// Bounded; messages are dropped when the receiver falls behind.
    pub fn message_receiver(&self) -> Result<Receiver<InboundMessage>, ConnectionError> {
        let (tx, rx) = flume::bounded(256);
        self.add_monitor_callback(move |address, value| {
            let message = InboundMessage {
                address: address.to_string(),
                value: value.clone(),
            };
            if let Err(flume::TrySendError::Full(_)) = tx.try_send(message) {
                log::warn!("OSC: Message channel full, dropping message");
            }
        })?;
        Ok(rx)
    }
}

impl OscSender for OscConnection {
    fn send(&self, address: &str, value: &ParameterValue) -> Result<(), ConnectionError> {
        let mut state = self.lock();
        if state.sender.is_none() {
            let target = SocketAddr::new(state.vrc_ip, state.send_port);
            state.sender = Some(SendEndpoint::connect(target)?);
        }
        match state.sender.as_ref() {
            Some(sender) => sender.send(address, value),
            None => Ok(()),
        }
    }
}
