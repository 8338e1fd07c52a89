//! Batch inspection of device files
//!
//! Runs without a display server: each path given on the command line is
//! opened directly, its driver version and a fixed list of capabilities are
//! read, and the magic handshake is attempted on the same handle.

use std::fmt;
use std::os::fd::AsFd;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::auth::{CardDevice, Opened};
use crate::drm_ioctl::{self, cap, DriverVersion};
use crate::error::{Error, Result};

/// Capabilities dumped for every device, in output order
pub const CAPABILITIES: &[(&str, u64)] = &[
    ("DRM_CAP_DUMB_BUFFER", cap::DUMB_BUFFER),
    ("DRM_CAP_VBLANK_HIGH_CRTC", cap::VBLANK_HIGH_CRTC),
    ("DRM_CAP_DUMB_PREFERRED_DEPTH", cap::DUMB_PREFERRED_DEPTH),
    ("DRM_CAP_DUMB_PREFER_SHADOW", cap::DUMB_PREFER_SHADOW),
    ("DRM_CAP_PRIME", cap::PRIME),
    ("DRM_CAP_TIMESTAMP_MONOTONIC", cap::TIMESTAMP_MONOTONIC),
    ("DRM_CAP_ASYNC_PAGE_FLIP", cap::ASYNC_PAGE_FLIP),
    ("DRM_CAP_CURSOR_WIDTH", cap::CURSOR_WIDTH),
    ("DRM_CAP_CURSOR_HEIGHT", cap::CURSOR_HEIGHT),
    ("DRM_CAP_ADDFB2_MODIFIERS", cap::ADDFB2_MODIFIERS),
    ("DRM_CAP_PAGE_FLIP_TARGET", cap::PAGE_FLIP_TARGET),
    ("DRM_CAP_CRTC_IN_VBLANK_EVENT", cap::CRTC_IN_VBLANK_EVENT),
    ("DRM_CAP_SYNCOBJ", cap::SYNCOBJ),
    ("DRM_CAP_SYNCOBJ_TIMELINE", cap::SYNCOBJ_TIMELINE),
];

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct CapabilityValue {
    pub name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of the handshake attempted on an inspected handle
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum AuthOutcome {
    Authenticated { magic: u32 },
    Failed { error: String },
}

#[derive(Serialize, Clone, Debug)]
pub struct DeviceInspection {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<DriverVersion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_error: Option<String>,
    pub capabilities: Vec<CapabilityValue>,
    pub auth: AuthOutcome,
}

#[derive(Serialize, Clone, Debug, Default)]
pub struct InspectReport {
    pub devices: Vec<DeviceInspection>,
    /// Paths that were missing or not character devices
    pub skipped: Vec<PathBuf>,
    /// Character devices that could not be opened
    pub failed: Vec<FailedDevice>,
}

#[derive(Serialize, Clone, Debug)]
pub struct FailedDevice {
    pub path: PathBuf,
    pub error: String,
}

impl InspectReport {
    /// True if at least one device was inspected and none failed to open.
    pub fn success(&self) -> bool {
        !self.devices.is_empty() && self.failed.is_empty()
    }
}

fn is_char_device(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|m| m.file_type().is_char_device())
}

/// Inspect every path in order. Errors on one device do not stop the batch.
pub fn inspect_paths(paths: &[PathBuf]) -> InspectReport {
    let mut report = InspectReport::default();
    for path in paths {
        if !is_char_device(path) {
            warn!("Skipping {}: not a character device", path.display());
            report.skipped.push(path.clone());
            continue;
        }
        match inspect_device(path) {
            Ok(device) => report.devices.push(device),
            Err(e) => {
                warn!("{}", e);
                report.failed.push(FailedDevice {
                    path: path.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    report
}

/// Open one device node and dump version, capabilities and handshake result.
pub fn inspect_device(path: &Path) -> Result<DeviceInspection> {
    let device = CardDevice::open(path).map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Inspecting {}", path.display());

    let fd = device.file().as_fd();
    let (version, version_error) = match drm_ioctl::version(fd) {
        Ok(version) => (Some(version), None),
        Err(e) => (None, Some(e.to_string())),
    };

    let capabilities = CAPABILITIES
        .iter()
        .map(|&(name, capability)| match drm_ioctl::get_cap(fd, capability) {
            Ok(value) => CapabilityValue {
                name,
                value: Some(value),
                error: None,
            },
            Err(e) => CapabilityValue {
                name,
                value: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    let handshake = Opened::from_device(device, path)
        .get_magic()
        .and_then(|obtained| obtained.authenticate());
    let auth = match handshake {
        Ok(authenticated) => AuthOutcome::Authenticated {
            magic: authenticated.magic(),
        },
        Err(e) => {
            warn!("{}", e);
            AuthOutcome::Failed {
                error: e.to_string(),
            }
        }
    };

    Ok(DeviceInspection {
        path: path.to_path_buf(),
        version,
        version_error,
        capabilities,
        auth,
    })
}

impl fmt::Display for DeviceInspection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "#".repeat(55))?;
        writeln!(f, "path: {}", self.path.display())?;
        match (&self.version, &self.version_error) {
            (Some(v), _) => writeln!(
                f,
                "drm_version: {}.{}.{} name={} date={} desc={}",
                v.major, v.minor, v.patchlevel, v.name, v.date, v.desc
            )?,
            (None, Some(e)) => writeln!(f, "drm_version: error: {e}")?,
            (None, None) => {}
        }
        for capability in &self.capabilities {
            match (capability.value, &capability.error) {
                (Some(value), _) => writeln!(f, "{}: {}", capability.name, value)?,
                (None, error) => writeln!(
                    f,
                    "{}: error: {}",
                    capability.name,
                    error.as_deref().unwrap_or("unknown")
                )?,
            }
        }
        match &self.auth {
            AuthOutcome::Authenticated { magic } => write!(f, "auth: authenticated (magic {magic})"),
            AuthOutcome::Failed { error } => write!(f, "auth: {error}"),
        }
    }
}

impl fmt::Display for InspectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<String> = self.devices.iter().map(ToString::to_string).collect();
        entries.extend(
            self.failed
                .iter()
                .map(|d| format!("{}: {}", d.path.display(), d.error)),
        );
        entries.extend(self.skipped.iter().map(|p| format!("skipped: {}", p.display())));
        f.write_str(&entries.join("\n"))
    }
}
