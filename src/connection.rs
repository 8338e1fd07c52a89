//! Connection handle
//!
//! Owns the session to the display server. Every protocol object created
//! during discovery lives in this connection's object graph and is released
//! when the `Session` is dropped.

use std::os::unix::net::UnixStream;

use tracing::info;
use wayland_client::Connection;

use crate::error::{Error, Result};

pub struct Session {
    connection: Connection,
}

impl Session {
    /// Connect using `WAYLAND_SOCKET`, or `WAYLAND_DISPLAY` under `XDG_RUNTIME_DIR`.
    pub fn connect() -> Result<Self> {
        let connection = Connection::connect_to_env().map_err(|e| Error::Connection {
            stage: "connect",
            reason: e.to_string(),
        })?;
        info!("Connected to display server");
        Ok(Self { connection })
    }

    /// Wrap an already connected socket.
    pub fn from_stream(stream: UnixStream) -> Result<Self> {
        let connection = Connection::from_socket(stream).map_err(|e| Error::Connection {
            stage: "connect",
            reason: e.to_string(),
        })?;
        Ok(Self { connection })
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}
