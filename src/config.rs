//! Configuration
//!
//! Defaults, then an optional JSON file, then `WL_DRM_AUTH_*` environment
//! variables. Command-line flags are applied last by the binary.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;
use wayland_client::Proxy;

use crate::error::{Error, Result};
use crate::protocol::WlDrm;
use crate::registry::BindTarget;

/// Environment variable overriding [`Config::interface`]
pub const ENV_INTERFACE: &str = "WL_DRM_AUTH_INTERFACE";
/// Environment variable overriding [`Config::primary_node`]
pub const ENV_PRIMARY_NODE: &str = "WL_DRM_AUTH_PRIMARY_NODE";

/// How the primary node is derived from the announced render node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PrimaryNodePolicy {
    /// Always the literal sibling `card0`
    #[default]
    #[serde(rename = "card0")]
    Card0,
    /// `card<N - 128>` for `renderD<N>`
    #[serde(rename = "numbered")]
    Numbered,
}

impl FromStr for PrimaryNodePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "card0" => Ok(PrimaryNodePolicy::Card0),
            "numbered" => Ok(PrimaryNodePolicy::Numbered),
            other => Err(Error::Config(format!(
                "unknown primary node policy {other:?} (expected \"card0\" or \"numbered\")"
            ))),
        }
    }
}

/// Report rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Interface identity the registry binder looks for
    pub interface: String,
    /// Lowest advertised version accepted for a match
    pub min_version: u32,
    pub primary_node: PrimaryNodePolicy,
    pub format: ReportFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interface: "wl_drm".to_string(),
            min_version: 1,
            primary_node: PrimaryNodePolicy::default(),
            format: ReportFormat::default(),
        }
    }
}

impl Config {
    /// Parse a JSON configuration document. Missing fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_json(&text)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(interface) = lookup(ENV_INTERFACE).filter(|v| !v.is_empty()) {
            self.interface = interface;
        }
        if let Some(policy) = lookup(ENV_PRIMARY_NODE).filter(|v| !v.is_empty()) {
            self.primary_node = policy.parse()?;
        }
        self.validate()
    }

    /// Reject settings the generated `wl_drm` bindings cannot honour: the
    /// bound proxy is always a `WlDrm`, so the interface must be its wire name
    /// and the minimum version must not exceed the version it implements.
    pub fn validate(&self) -> Result<()> {
        let supported = WlDrm::interface();
        if self.interface.is_empty() {
            return Err(Error::Config("interface must not be empty".to_string()));
        }
        if self.interface != supported.name {
            return Err(Error::Config(format!(
                "interface {:?} is not supported (only {:?} can be bound)",
                self.interface, supported.name
            )));
        }
        if self.min_version == 0 {
            return Err(Error::Config("min_version starts at 1".to_string()));
        }
        if self.min_version > supported.version {
            return Err(Error::Config(format!(
                "min_version {} exceeds the highest supported {} version {}",
                self.min_version, supported.name, supported.version
            )));
        }
        Ok(())
    }

    /// The registry binder's target for this configuration.
    ///
    /// The bound version is capped at what the generated `wl_drm` bindings speak.
    pub fn bind_target(&self) -> BindTarget {
        BindTarget::new(
            self.interface.clone(),
            self.min_version,
            WlDrm::interface().version,
        )
    }
}
