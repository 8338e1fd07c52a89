//! wl-drm-auth
//!
//! Becomes an authenticated DRM client of the GPU a Wayland compositor
//! renders on:
//!
//! 1. bind the compositor's `wl_drm` global ([`registry`], [`dispatch`]),
//! 2. collect the device it announces ([`announcement`]),
//! 3. map the render node to its primary node ([`node`]),
//! 4. run the `GET_MAGIC`/`AUTH_MAGIC` handshake on that node ([`auth`]).
//!
//! Each stage needs the previous stage's output; the first error ends the
//! pipeline.

pub mod announcement;
pub mod auth;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod drm_ioctl;
pub mod error;
pub mod inspect;
pub mod node;
pub mod protocol;
pub mod registry;
pub mod report;
pub mod testing;

pub use announcement::{DeviceAnnouncement, DrmCapabilities, Fourcc};
pub use auth::{Authenticated, DeviceOpener, MagicAuth, SystemOpener};
pub use config::{Config, PrimaryNodePolicy, ReportFormat};
pub use connection::Session;
pub use error::{Error, HandshakeStep, Result};
pub use report::Report;

use tracing::info;

/// A completed run: the report plus the authenticated handle, which must stay
/// open for the authentication to remain valid.
#[derive(Debug)]
pub struct Outcome<D> {
    pub report: Report,
    pub device: Authenticated<D>,
}

/// Run the whole pipeline on an established session.
pub fn run<O: DeviceOpener>(
    session: &Session,
    config: &Config,
    opener: &O,
) -> Result<Outcome<O::Device>> {
    config.validate()?;

    let discovery = dispatch::discover(session, config.bind_target())?;
    let render_node = discovery
        .announcement
        .require_render_node(&discovery.bound.global.interface)?;

    let primary_node = node::primary_node_path(render_node, config.primary_node)?;
    info!("Primary node: {}", primary_node.display());

    let device = auth::authenticate(opener, &primary_node)?;
    let report = Report::new(&discovery, primary_node, &device);

    Ok(Outcome { report, device })
}
