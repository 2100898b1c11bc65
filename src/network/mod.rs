//! Network Module
//!
//! TCP server and session handling for the stream store.
//!
//! ## Architecture
//! - Single acceptor thread (non-blocking accept, polls for shutdown)
//! - One thread per session; blocking commands park only their own session
//! - Commands routed through Engine

mod server;
mod session;

pub use server::{Server, ServerHandle, ShutdownHandle};
pub use session::Session;
