//! Device announcement listener
//!
//! The bound `wl_drm` object sends four kinds of events. They are folded into
//! a [`DeviceAnnouncement`] accumulator owned by the dispatch state; the
//! accumulator is only read once the roundtrip that delivered them returns.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use bitflags::bitflags;
use tracing::{debug, info, warn};
use wayland_client::{Connection, Dispatch, QueueHandle};

use crate::dispatch::DiscoveryState;
use crate::error::{Error, Result};
use crate::protocol::{wl_drm, WlDrm};

/// A DRM fourcc pixel format code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fourcc(pub u32);

impl Fourcc {
    pub const XRGB8888: Fourcc = Fourcc(0x3432_5258);
    pub const ARGB8888: Fourcc = Fourcc(0x3432_5241);

    pub fn code(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Fourcc {
    /// Four characters, least significant byte first (`0x34325258` is `XR24`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.to_le_bytes() {
            let c = if byte.is_ascii_graphic() || byte == b' ' {
                byte as char
            } else {
                '?'
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

bitflags! {
    /// `wl_drm.capability` bitmask
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DrmCapabilities: u32 {
        /// Buffers may be shared as PRIME file descriptors
        const PRIME = 1;
    }
}

/// One event received on the bound capability object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Device(PathBuf),
    Format(Fourcc),
    Authenticated,
    Capabilities(u32),
}

impl DeviceEvent {
    pub fn from_protocol(event: wl_drm::Event) -> Option<Self> {
        match event {
            wl_drm::Event::Device { name } => Some(DeviceEvent::Device(PathBuf::from(name))),
            wl_drm::Event::Format { format } => Some(DeviceEvent::Format(Fourcc(format))),
            wl_drm::Event::Authenticated => Some(DeviceEvent::Authenticated),
            wl_drm::Event::Capabilities { value } => Some(DeviceEvent::Capabilities(value)),
            _ => None,
        }
    }
}

/// Everything the compositor told us about its render device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceAnnouncement {
    pub render_node: Option<PathBuf>,
    pub formats: BTreeSet<Fourcc>,
    pub capabilities: Option<DrmCapabilities>,
    /// The compositor sent `authenticated`. Informational only.
    pub already_authenticated: bool,
}

impl DeviceAnnouncement {
    pub fn apply(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Device(path) => {
                debug!("device: {}", path.display());
                if let Some(previous) = self.render_node.replace(path) {
                    warn!("device announced again, replacing {}", previous.display());
                }
            }
            DeviceEvent::Format(format) => {
                debug!("format: {} ({:#010x})", format, format.code());
                self.formats.insert(format);
            }
            DeviceEvent::Authenticated => {
                info!("compositor reports this client as authenticated");
                self.already_authenticated = true;
            }
            DeviceEvent::Capabilities(bits) => {
                debug!("caps: {:#x}", bits);
                self.capabilities = Some(DrmCapabilities::from_bits_retain(bits));
            }
        }
    }

    /// The announced render node, or `AnnouncementIncomplete` if none (or an
    /// empty path) arrived.
    pub fn require_render_node(&self, interface: &str) -> Result<&Path> {
        match self.render_node.as_deref() {
            Some(path) if !path.as_os_str().is_empty() => Ok(path),
            _ => Err(Error::AnnouncementIncomplete {
                interface: interface.to_string(),
            }),
        }
    }

    pub fn supports_prime(&self) -> bool {
        self.capabilities
            .is_some_and(|caps| caps.contains(DrmCapabilities::PRIME))
    }
}

impl Dispatch<WlDrm, ()> for DiscoveryState {
    fn event(
        state: &mut Self,
        _: &WlDrm,
        event: wl_drm::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match DeviceEvent::from_protocol(event) {
            Some(event) => state.announcement.apply(event),
            None => debug!("wl_drm: unhandled event"),
        }
    }
}
