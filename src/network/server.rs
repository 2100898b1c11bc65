//! TCP Server
//!
//! Accepts connections and runs each session on its own thread.

use std::collections::HashMap;
use std::io::{BufWriter, ErrorKind};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::ServerConfig;
use crate::engine::Engine;
use crate::error::Result;
use crate::protocol::{write_response, Response};

use super::Session;

/// Sockets of live sessions, so shutdown can hang them up
#[derive(Default)]
struct SessionTracker {
    next_id: AtomicU64,
    live: Mutex<TrackerState>,
}

#[derive(Default)]
struct TrackerState {
    sockets: HashMap<u64, TcpStream>,
    closed: bool,
}

impl SessionTracker {
    /// Register a session socket; `None` once shutdown has begun
    fn register(&self, stream: &TcpStream) -> Result<Option<u64>> {
        let mut live = self.live.lock();
        if live.closed {
            return Ok(None);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        live.sockets.insert(id, stream.try_clone()?);
        Ok(Some(id))
    }

    fn remove(&self, id: u64) {
        self.live.lock().sockets.remove(&id);
    }

    fn count(&self) -> usize {
        self.live.lock().sockets.len()
    }

    fn close_all(&self) {
        let mut live = self.live.lock();
        live.closed = true;
        for (_, socket) in live.sockets.drain() {
            let _ = socket.shutdown(Shutdown::Both);
        }
    }
}

/// Stops a running server from any thread
#[derive(Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    sessions: Arc<SessionTracker>,
    engine: Arc<Engine>,
}

impl ShutdownHandle {
    /// Stop accepting, hang up every live session, then release sessions
    /// parked in WAIT_READY or FETCH
    ///
    /// Sockets go first so clients see the hang-up, not a late reply.
    pub fn shutdown(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            tracing::info!("Server shutdown requested");
        }
        self.sessions.close_all();
        self.engine.registry().close();
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// TCP server for the stream store
pub struct Server {
    config: ServerConfig,
    engine: Arc<Engine>,
    listener: TcpListener,
    shutdown: ShutdownHandle,
}

impl Server {
    /// Bind the listen address; the server does not accept until `run`
    pub fn bind(config: ServerConfig, engine: Arc<Engine>) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(&config.listen_addr)?;
        // Non-blocking accept so the loop can observe shutdown
        listener.set_nonblocking(true)?;

        let shutdown = ShutdownHandle {
            flag: Arc::new(AtomicBool::new(false)),
            sessions: Arc::new(SessionTracker::default()),
            engine: Arc::clone(&engine),
        };

        Ok(Self {
            config,
            engine,
            listener,
            shutdown,
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    /// Number of sessions currently being served
    pub fn active_sessions(&self) -> usize {
        self.shutdown.sessions.count()
    }

    /// Start the server (blocking until shutdown)
    pub fn run(&mut self) -> Result<()> {
        tracing::info!("Listening on {}", self.local_addr()?);
        let poll = Duration::from_millis(self.config.accept_poll_ms.max(1));

        while !self.shutdown.is_shutdown() {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    if let Err(e) = self.dispatch(stream) {
                        tracing::warn!("Failed to start session for {}: {}", addr, e);
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(poll),
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    thread::sleep(poll);
                }
            }
        }

        self.shutdown.sessions.close_all();
        tracing::info!("Server stopped accepting connections");
        Ok(())
    }

    /// Run the accept loop on a background thread
    pub fn spawn(self) -> Result<ServerHandle> {
        let addr = self.local_addr()?;
        let shutdown = self.shutdown_handle();
        let thread = thread::Builder::new()
            .name("river-acceptor".to_string())
            .spawn(move || {
                let mut server = self;
                server.run()
            })?;

        Ok(ServerHandle {
            addr,
            shutdown,
            thread: Some(thread),
        })
    }

    fn dispatch(&self, stream: TcpStream) -> Result<()> {
        stream.set_nonblocking(false)?;

        if self.shutdown.sessions.count() >= self.config.max_connections {
            tracing::warn!(
                "Rejecting connection: {} sessions already open",
                self.config.max_connections
            );
            let mut writer = BufWriter::new(stream);
            write_response(&mut writer, &Response::error("too many connections"))?;
            return Ok(());
        }

        let id = match self.shutdown.sessions.register(&stream)? {
            Some(id) => id,
            None => return Ok(()),
        };

        let engine = Arc::clone(&self.engine);
        let sessions = Arc::clone(&self.shutdown.sessions);
        let spawned = thread::Builder::new()
            .name(format!("river-session-{}", id))
            .spawn(move || {
                match Session::new(stream, engine) {
                    Ok(mut session) => {
                        if let Err(e) = session.handle() {
                            tracing::debug!("Session {} ended with error: {}", id, e);
                        }
                    }
                    Err(e) => tracing::warn!("Session {} setup failed: {}", id, e),
                }
                sessions.remove(id);
            });

        if let Err(e) = spawned {
            self.shutdown.sessions.remove(id);
            return Err(e.into());
        }
        Ok(())
    }
}

/// A server running on a background thread
///
/// Dropping the handle shuts the server down and waits for the accept loop.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: ShutdownHandle,
    thread: Option<JoinHandle<Result<()>>>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn active_sessions(&self) -> usize {
        self.shutdown.sessions.count()
    }

    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    /// Shut down and wait for the accept loop to exit
    pub fn join(mut self) -> Result<()> {
        self.shutdown();
        self.wait()
    }

    fn wait(&mut self) -> Result<()> {
        match self.thread.take() {
            Some(thread) => thread.join().unwrap_or_else(|_| {
                tracing::error!("Acceptor thread panicked");
                Ok(())
            }),
            None => Ok(()),
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Err(e) = self.wait() {
            tracing::warn!("Server exited with error: {}", e);
        }
    }
}
