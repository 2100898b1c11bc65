//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use river::network::{Server, ServerHandle};
use river::{ClientConfig, Connection, Engine, ResolvePolicy, ServerConfig};

/// Start a store on an ephemeral port
pub fn start_server() -> ServerHandle {
    start_server_with(ServerConfig::builder().listen_addr("127.0.0.1:0").build())
}

pub fn start_server_with(config: ServerConfig) -> ServerHandle {
    let engine = Arc::new(Engine::new(config.clone()));
    Server::bind(config, engine).unwrap().spawn().unwrap()
}

pub fn connect(server: &ServerHandle) -> Connection {
    Connection::open("127.0.0.1", server.addr().port()).unwrap()
}

pub fn connect_creating(server: &ServerHandle) -> Connection {
    let config = ClientConfig::builder()
        .host("127.0.0.1")
        .port(server.addr().port())
        .resolve_policy(ResolvePolicy::CreateIfMissing)
        .build();
    Connection::with_config(config).unwrap()
}

/// Poll `check` until it holds or two seconds pass
pub fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    check()
}
