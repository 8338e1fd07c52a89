//! Pipeline report
//!
//! Collects what discovery and the handshake produced, for printing either
//! as plain text or as JSON.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::auth::Authenticated;
use crate::config::ReportFormat;
use crate::dispatch::Discovery;
use crate::registry::GlobalObjectDescriptor;

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct FormatEntry {
    pub code: u32,
    pub fourcc: String,
}

/// Final state of the handshake
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HandshakeState {
    Authenticated,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Report {
    pub global: GlobalObjectDescriptor,
    pub bound_version: u32,
    pub render_node: PathBuf,
    pub formats: Vec<FormatEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<u32>,
    pub prime: bool,
    /// The compositor sent `wl_drm.authenticated`
    pub compositor_authenticated: bool,
    pub primary_node: PathBuf,
    pub magic: u32,
    pub state: HandshakeState,
}

impl Report {
    pub fn new<D>(discovery: &Discovery, primary_node: PathBuf, auth: &Authenticated<D>) -> Self {
        let announcement = &discovery.announcement;
        Self {
            global: discovery.bound.global.clone(),
            bound_version: discovery.bound.version,
            render_node: announcement.render_node.clone().unwrap_or_default(),
            formats: announcement
                .formats
                .iter()
                .map(|f| FormatEntry {
                    code: f.code(),
                    fourcc: f.to_string(),
                })
                .collect(),
            capabilities: announcement.capabilities.map(|c| c.bits()),
            prime: announcement.supports_prime(),
            compositor_authenticated: announcement.already_authenticated,
            primary_node,
            magic: auth.magic(),
            state: HandshakeState::Authenticated,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "global: {} (name {}, version {}, bound {})",
            self.global.interface, self.global.name, self.global.version, self.bound_version
        )?;
        writeln!(f, "device: {}", self.render_node.display())?;
        for format in &self.formats {
            writeln!(f, "format: {} ({:#010x})", format.fourcc, format.code)?;
        }
        if let Some(caps) = self.capabilities {
            write!(f, "caps: {caps:#x}")?;
            if self.prime {
                write!(f, " PRIME")?;
            }
            writeln!(f)?;
        }
        if self.compositor_authenticated {
            writeln!(f, "compositor: authenticated")?;
        }
        writeln!(f, "primary: {}", self.primary_node.display())?;
        writeln!(f, "magic: {}", self.magic)?;
        write!(f, "state: authenticated")
    }
}

/// Render any report in the configured format.
pub fn render<R: Serialize + fmt::Display>(report: &R, format: ReportFormat) -> serde_json::Result<String> {
    match format {
        ReportFormat::Text => Ok(report.to_string()),
        ReportFormat::Json => serde_json::to_string_pretty(report),
    }
}
