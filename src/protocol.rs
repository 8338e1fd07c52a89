//! Client-side `wl_drm` bindings
//!
//! `wl_drm` is Mesa's legacy buffer-sharing protocol. It is not shipped by
//! any of the wayland-protocols crates, so the bindings are generated here
//! from `protocols/wayland-drm.xml`.

#![allow(missing_docs, unused_imports, clippy::all)]

pub mod wl_drm_v2 {
    use wayland_client;
    use wayland_client::protocol::*;

    pub mod __interfaces {
        use wayland_client::backend as wayland_backend;
        use wayland_client::protocol::__interfaces::*;
        wayland_scanner::generate_interfaces!("protocols/wayland-drm.xml");
    }
    use self::__interfaces::*;

    wayland_scanner::generate_client_code!("protocols/wayland-drm.xml");
}

pub use wl_drm_v2::wl_drm;
pub use wl_drm_v2::wl_drm::WlDrm;
