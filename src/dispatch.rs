//! Event dispatch and roundtrips
//!
//! Discovery is two blocking roundtrips on one event queue:
//!
//! 1. After `get_registry`: every `global` is delivered, and the matching one
//!    is bound from inside the registry handler.
//! 2. After the bind: the server has processed it, so every `wl_drm` event it
//!    sent in response has been folded into the announcement.
//!
//! Handlers run synchronously inside `EventQueue::roundtrip` and only mutate
//! [`DiscoveryState`]; none of them blocks on a nested roundtrip.

use std::fmt;

use tracing::{debug, info};
use wayland_client::EventQueue;

use crate::announcement::DeviceAnnouncement;
use crate::connection::Session;
use crate::error::{Error, Result};
use crate::registry::{BindTarget, BoundCapability, GlobalSelector};

/// Accumulator passed into every dispatch
#[derive(Debug)]
pub struct DiscoveryState {
    pub(crate) selector: GlobalSelector,
    pub(crate) bound: Option<BoundCapability>,
    pub(crate) announcement: DeviceAnnouncement,
}

impl DiscoveryState {
    pub fn new(target: BindTarget) -> Self {
        Self {
            selector: GlobalSelector::new(target),
            bound: None,
            announcement: DeviceAnnouncement::default(),
        }
    }

    pub fn bound(&self) -> Option<&BoundCapability> {
        self.bound.as_ref()
    }

    pub fn announcement(&self) -> &DeviceAnnouncement {
        &self.announcement
    }
}

/// Which synchronization barrier a roundtrip establishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Registry,
    Announcement,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Registry => "registry roundtrip",
            Stage::Announcement => "announcement roundtrip",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Block until the server has handled everything sent so far and all
/// resulting events have been dispatched into `state`.
pub fn roundtrip(
    queue: &mut EventQueue<DiscoveryState>,
    state: &mut DiscoveryState,
    stage: Stage,
) -> Result<usize> {
    let dispatched = queue.roundtrip(state).map_err(|e| Error::Connection {
        stage: stage.name(),
        reason: e.to_string(),
    })?;
    debug!("{}: dispatched {} events", stage, dispatched);
    Ok(dispatched)
}

/// Result of a completed discovery
#[derive(Debug, Clone)]
pub struct Discovery {
    pub bound: BoundCapability,
    pub announcement: DeviceAnnouncement,
}

/// Bind the target global and collect its device announcement.
///
/// Fails with `BindingNotFound` if the first roundtrip saw no acceptable
/// global, and with `AnnouncementIncomplete` if the second one returned
/// without a device path.
pub fn discover(session: &Session, target: BindTarget) -> Result<Discovery> {
    let connection = session.connection();
    let mut queue = connection.new_event_queue::<DiscoveryState>();
    let qh = queue.handle();
    let _registry = connection.display().get_registry(&qh, ());

    let mut state = DiscoveryState::new(target);

    roundtrip(&mut queue, &mut state, Stage::Registry)?;
    let Some(bound) = state.bound.clone() else {
        let target = state.selector.target();
        return Err(Error::BindingNotFound {
            interface: target.interface().to_string(),
            min_version: target.min_version(),
        });
    };

    roundtrip(&mut queue, &mut state, Stage::Announcement)?;
    let render_node = state
        .announcement
        .require_render_node(&bound.global.interface)?;
    info!("Render node: {}", render_node.display());

    Ok(Discovery {
        bound,
        announcement: state.announcement,
    })
}
