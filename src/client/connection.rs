//! Client connection
//!
//! A handle to one TCP session with the store. Clones share the session, so
//! closing any clone closes it for every reader and writer bound through it.

use std::io::{BufReader, BufWriter, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::ClientConfig;
use crate::error::{Result, RiverError};
use crate::protocol::{encode_command, read_response, Command, Reply, Response};

/// Lifecycle of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created but never connected
    Unopened,
    Open,
    /// Closed by its owner
    Closed,
    /// The session died mid-operation
    Lost,
}

struct Channel {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    peer: SocketAddr,
}

impl Channel {
    fn hang_up(&self) {
        let _ = self.writer.get_ref().shutdown(Shutdown::Both);
    }
}

enum SessionSlot {
    Unopened,
    Open(Channel),
    Closed,
    Lost(String),
}

struct Shared {
    config: ClientConfig,
    /// One request in flight at a time; frames never interleave
    session: Mutex<SessionSlot>,
}

/// Connection to a River store
///
/// ## Lifecycle
/// `Unopened → Open → Closed`, or `Open → Lost` when the session dies.
/// There is no implicit reconnect: after `Closed` or `Lost` open a new
/// connection.
///
/// `close()` is idempotent: closing an already closed (or lost, or never
/// opened) connection is a no-op that returns `Ok(())`.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    /// Create an unopened connection
    pub fn new(config: ClientConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                session: Mutex::new(SessionSlot::Unopened),
            }),
        }
    }

    /// Connect to `host:port` with default settings
    pub fn open(host: &str, port: u16) -> Result<Self> {
        let config = ClientConfig::builder().host(host).port(port).build();
        Self::with_config(config)
    }

    /// Connect using an explicit configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let connection = Self::new(config);
        connection.connect()?;
        Ok(connection)
    }

    /// Establish the session if it is not open yet
    ///
    /// A no-op on an open connection; fails on a closed or lost one.
    pub fn connect(&self) -> Result<()> {
        let mut slot = self.shared.session.lock();
        match &*slot {
            SessionSlot::Open(_) => return Ok(()),
            SessionSlot::Closed => return Err(RiverError::Closed),
            SessionSlot::Lost(reason) => return Err(RiverError::ConnectionLost(reason.clone())),
            SessionSlot::Unopened => {}
        }

        let channel = self.establish()?;
        tracing::debug!("Connected to {}", channel.peer);
        *slot = SessionSlot::Open(channel);
        Ok(())
    }

    fn establish(&self) -> Result<Channel> {
        let config = &self.shared.config;
        config.validate()?;
        let addr = config.addr();
        let connect_error = |reason: String| RiverError::Connect {
            addr: addr.clone(),
            reason,
        };

        let candidates: Vec<SocketAddr> = addr
            .to_socket_addrs()
            .map_err(|e| connect_error(e.to_string()))?
            .collect();

        let mut last_error = String::from("no addresses resolved");
        let mut stream = None;
        for candidate in candidates {
            match TcpStream::connect_timeout(&candidate, config.connect_timeout()) {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => last_error = e.to_string(),
            }
        }
        let stream = stream.ok_or_else(|| connect_error(last_error))?;

        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let mut channel = Channel {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
            peer,
        };

        // Handshake: the store must answer a PING before we call it open
        match exchange(&mut channel, &Command::Ping, config.response_grace()) {
            Ok(Reply::Pong) => Ok(channel),
            Ok(other) => {
                channel.hang_up();
                Err(connect_error(format!("unexpected handshake reply: {:?}", other)))
            }
            Err(e) => {
                channel.hang_up();
                Err(connect_error(e.to_string()))
            }
        }
    }

    /// Close the session
    ///
    /// Invalidates every reader and writer bound through this connection.
    pub fn close(&self) -> Result<()> {
        let mut slot = self.shared.session.lock();
        match std::mem::replace(&mut *slot, SessionSlot::Closed) {
            SessionSlot::Open(channel) => {
                channel.hang_up();
                tracing::debug!("Closed connection to {}", channel.peer);
            }
            SessionSlot::Lost(_) | SessionSlot::Unopened | SessionSlot::Closed => {}
        }
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        match &*self.shared.session.lock() {
            SessionSlot::Unopened => ConnectionState::Unopened,
            SessionSlot::Open(_) => ConnectionState::Open,
            SessionSlot::Closed => ConnectionState::Closed,
            SessionSlot::Lost(_) => ConnectionState::Lost,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// Address of the store, while the session is open
    pub fn peer(&self) -> Option<SocketAddr> {
        match &*self.shared.session.lock() {
            SessionSlot::Open(channel) => Some(channel.peer),
            _ => None,
        }
    }

    /// Round-trip a PING
    pub fn ping(&self) -> Result<()> {
        match self.request(&Command::Ping)? {
            Reply::Pong => Ok(()),
            other => Err(unexpected_reply("PING", &other)),
        }
    }

    /// Send one command and wait for its reply
    ///
    /// Any transport or framing failure marks the session lost, since the
    /// request/response pairing can no longer be trusted.
    pub(crate) fn request(&self, command: &Command) -> Result<Reply> {
        // Encode before touching the socket so a bad request cannot desync it
        let frame = encode_command(command)?;
        let wait = Duration::from_millis(command.wait_ms()) + self.shared.config.response_grace();

        let mut slot = self.shared.session.lock();
        let channel = match &mut *slot {
            SessionSlot::Open(channel) => channel,
            SessionSlot::Closed => return Err(RiverError::Closed),
            SessionSlot::Lost(reason) => return Err(RiverError::ConnectionLost(reason.clone())),
            SessionSlot::Unopened => {
                return Err(RiverError::Connect {
                    addr: self.shared.config.addr(),
                    reason: "connection was never opened".into(),
                })
            }
        };

        match send_frame(channel, &frame, wait) {
            Ok(response) => response.into_reply(),
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!("Connection to {} lost: {}", channel.peer, reason);
                channel.hang_up();
                *slot = SessionSlot::Lost(reason.clone());
                Err(RiverError::ConnectionLost(reason))
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("addr", &self.shared.config.addr())
            .field("state", &self.state())
            .finish()
    }
}

fn send_frame(channel: &mut Channel, frame: &[u8], wait: Duration) -> Result<Response> {
    // A zero read timeout is rejected by the OS
    let wait = wait.max(Duration::from_millis(1));
    channel.reader.get_ref().set_read_timeout(Some(wait))?;
    channel.writer.write_all(frame)?;
    channel.writer.flush()?;
    read_response(&mut channel.reader)
}

/// Handshake helper: encode, send, and decode in one step
fn exchange(channel: &mut Channel, command: &Command, wait: Duration) -> Result<Reply> {
    let frame = encode_command(command)?;
    send_frame(channel, &frame, wait)?.into_reply()
}

pub(crate) fn unexpected_reply(command: &str, reply: &Reply) -> RiverError {
    RiverError::Protocol(format!("unexpected reply to {}: {:?}", command, reply))
}
