//! Error taxonomy for the discovery and authentication pipeline.
//!
//! Every variant is terminal: the pipeline has no partial-success notion,
//! so each stage hands its error straight back to the caller.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Handshake step that issued a failing ioctl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStep {
    GetMagic,
    AuthMagic,
}

impl fmt::Display for HandshakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeStep::GetMagic => f.write_str("GET_MAGIC"),
            HandshakeStep::AuthMagic => f.write_str("AUTH_MAGIC"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// The display-server session could not be established or broke mid-roundtrip.
    #[error("display server connection failed during {stage}: {reason}")]
    Connection { stage: &'static str, reason: String },

    /// No advertised global matched the requested interface.
    #[error("no global advertises interface {interface} (version >= {min_version})")]
    BindingNotFound { interface: String, min_version: u32 },

    /// The capability object was bound but never announced a device path.
    #[error("{interface} never announced a device path")]
    AnnouncementIncomplete { interface: String },

    /// The render node path cannot be mapped to a primary node.
    #[error("cannot derive a primary node from {}: {reason}", path.display())]
    PathUnresolvable { path: PathBuf, reason: &'static str },

    /// The primary node could not be opened.
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// One of the two handshake ioctls failed.
    #[error("{step} failed on {}: {source}", path.display())]
    Handshake {
        step: HandshakeStep,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Name of the pipeline stage that produced this error, for diagnostics.
    pub fn stage(&self) -> &'static str {
        match self {
            Error::Connection { .. } => "connection",
            Error::BindingNotFound { .. } => "registry",
            Error::AnnouncementIncomplete { .. } => "announcement",
            Error::PathUnresolvable { .. } => "resolver",
            Error::Open { .. } => "open",
            Error::Handshake { .. } => "handshake",
            Error::Config(_) => "config",
        }
    }

    /// Raw OS error code carried by the underlying I/O error, if any.
    pub fn os_error(&self) -> Option<i32> {
        match self {
            Error::Open { source, .. } | Error::Handshake { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
