//! Global registry binder
//!
//! Enumerates the globals advertised on `wl_registry` and binds the first one
//! whose interface matches the target. Later matches are logged and left
//! unbound so that a server advertising duplicates cannot make us leak
//! extra proxies.

use serde::Serialize;
use tracing::{debug, info, warn};
use wayland_client::{protocol::wl_registry, Connection, Dispatch, QueueHandle};

use crate::dispatch::DiscoveryState;
use crate::protocol::WlDrm;

/// One `wl_registry.global` advertisement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalObjectDescriptor {
    pub name: u32,
    pub interface: String,
    pub version: u32,
}

/// Which global to bind and at what version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindTarget {
    interface: String,
    min_version: u32,
    max_version: u32,
}

impl BindTarget {
    pub fn new(interface: impl Into<String>, min_version: u32, max_version: u32) -> Self {
        Self {
            interface: interface.into(),
            min_version,
            max_version,
        }
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn min_version(&self) -> u32 {
        self.min_version
    }

    pub fn max_version(&self) -> u32 {
        self.max_version
    }
}

/// Outcome of offering one advertisement to the selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// First acceptable match: bind it at `version`
    Bind { version: u32 },
    /// Different interface
    Mismatch,
    /// Right interface, advertised version below the minimum
    TooOld,
    /// Right interface, but a global has already been selected
    Duplicate,
}

/// Folds `global` events into at most one selected descriptor.
#[derive(Debug)]
pub struct GlobalSelector {
    target: BindTarget,
    selected: Option<GlobalObjectDescriptor>,
}

impl GlobalSelector {
    pub fn new(target: BindTarget) -> Self {
        Self {
            target,
            selected: None,
        }
    }

    pub fn target(&self) -> &BindTarget {
        &self.target
    }

    pub fn selected(&self) -> Option<&GlobalObjectDescriptor> {
        self.selected.as_ref()
    }

    pub fn offer(&mut self, global: &GlobalObjectDescriptor) -> Selection {
        if global.interface != self.target.interface {
            return Selection::Mismatch;
        }
        // A minimum above the supported maximum can never be honoured
        if global.version < self.target.min_version
            || self.target.min_version > self.target.max_version
        {
            warn!(
                "Skipping {} global {}: version {} < required {}",
                global.interface, global.name, global.version, self.target.min_version
            );
            return Selection::TooOld;
        }
        if let Some(selected) = &self.selected {
            warn!(
                "Ignoring duplicate {} global {} (already bound {})",
                global.interface, global.name, selected.name
            );
            return Selection::Duplicate;
        }

        self.selected = Some(global.clone());
        Selection::Bind {
            version: global.version.min(self.target.max_version),
        }
    }
}

/// The bound `wl_drm` proxy together with the advertisement it came from.
///
/// `wl_drm` has no destructor request; the server-side object goes away with
/// the connection, so dropping this only drops the client-side handle.
#[derive(Debug, Clone)]
pub struct BoundCapability {
    pub proxy: WlDrm,
    pub global: GlobalObjectDescriptor,
    /// Version actually bound
    pub version: u32,
}

impl Dispatch<wl_registry::WlRegistry, ()> for DiscoveryState {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => {
                let global = GlobalObjectDescriptor {
                    name,
                    interface,
                    version,
                };
                debug!(
                    "global: name={} interface={} version={}",
                    global.name, global.interface, global.version
                );
                if let Selection::Bind { version } = state.selector.offer(&global) {
                    let proxy = registry.bind::<WlDrm, _, _>(name, version, qh, ());
                    info!("Bound {} global {} at version {}", global.interface, name, version);
                    state.bound = Some(BoundCapability {
                        proxy,
                        global,
                        version,
                    });
                }
            }
            wl_registry::Event::GlobalRemove { name } => {
                if state.bound.as_ref().is_some_and(|b| b.global.name == name) {
                    warn!("Bound global {} was removed by the server", name);
                }
            }
            _ => {}
        }
    }
}
