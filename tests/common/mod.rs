//! In-process compositor for pipeline tests
//!
//! Runs a `wayland-server` display on its own thread, connected to the test
//! over a `UnixStream` pair, and advertises whatever `wl_drm` globals the
//! test asks for. Each global sends its configured announcement as soon as
//! it is bound.

use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use wayland_server::backend::ClientData;
use wayland_server::{Client, DataInit, Dispatch, Display, DisplayHandle, GlobalDispatch, New};

use wl_drm_auth::Session;

pub mod server_protocol {
    #![allow(missing_docs, unused_imports, clippy::all)]

    use wayland_server;
    use wayland_server::protocol::*;

    pub mod __interfaces {
        use wayland_server::backend as wayland_backend;
        use wayland_server::protocol::__interfaces::*;
        wayland_scanner::generate_interfaces!("protocols/wayland-drm.xml");
    }
    use self::__interfaces::*;

    wayland_scanner::generate_server_code!("protocols/wayland-drm.xml");
}

use server_protocol::wl_drm::{self, WlDrm};

/// What one advertised `wl_drm` global announces when bound
#[derive(Debug, Clone, Default)]
pub struct DrmGlobal {
    pub version: u32,
    pub device: Option<String>,
    pub formats: Vec<u32>,
    pub capabilities: Option<u32>,
    pub authenticated: bool,
}

impl DrmGlobal {
    /// The reference deployment: renderD128, XR24, PRIME.
    pub fn reference() -> Self {
        Self {
            version: 2,
            device: Some("/dev/dri/renderD128".to_string()),
            formats: vec![0x3432_5258],
            capabilities: Some(1),
            authenticated: false,
        }
    }

    /// Bound fine, but never says which device it uses.
    pub fn silent() -> Self {
        Self {
            version: 2,
            ..Self::default()
        }
    }
}

struct ServerState {
    binds: Arc<AtomicUsize>,
}

struct TestClientData;

impl ClientData for TestClientData {}

impl GlobalDispatch<WlDrm, DrmGlobal> for ServerState {
    fn bind(
        state: &mut Self,
        _: &DisplayHandle,
        _: &Client,
        resource: New<WlDrm>,
        global: &DrmGlobal,
        data_init: &mut DataInit<'_, Self>,
    ) {
        state.binds.fetch_add(1, Ordering::SeqCst);
        let drm = data_init.init(resource, ());

        if let Some(device) = &global.device {
            drm.device(device.clone());
        }
        for &format in &global.formats {
            drm.format(format);
        }
        if let Some(capabilities) = global.capabilities {
            drm.capabilities(capabilities);
        }
        if global.authenticated {
            drm.authenticated();
        }
    }
}

impl Dispatch<WlDrm, ()> for ServerState {
    fn request(
        _: &mut Self,
        _: &Client,
        _: &WlDrm,
        _: wl_drm::Request,
        _: &(),
        _: &DisplayHandle,
        _: &mut DataInit<'_, Self>,
    ) {
    }
}

/// A compositor thread plus the client end of its socket
pub struct FakeCompositor {
    client: Option<UnixStream>,
    binds: Arc<AtomicUsize>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl FakeCompositor {
    pub fn start(globals: Vec<DrmGlobal>) -> Self {
        let (client, server) = UnixStream::pair().expect("Failed to create socket pair");
        let binds = Arc::new(AtomicUsize::new(0));
        let stop = Arc::new(AtomicBool::new(false));

        let thread = {
            let binds = binds.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let mut display: Display<ServerState> =
                    Display::new().expect("Failed to create display");
                let mut handle = display.handle();
                for global in globals {
                    handle.create_global::<ServerState, WlDrm, DrmGlobal>(global.version, global);
                }
                server
                    .set_nonblocking(true)
                    .expect("Failed to set socket non-blocking");
                handle
                    .insert_client(server, Arc::new(TestClientData))
                    .expect("Failed to insert client");

                let mut state = ServerState { binds };
                while !stop.load(Ordering::SeqCst) {
                    let _ = display.dispatch_clients(&mut state);
                    let _ = display.flush_clients();
                    thread::sleep(Duration::from_millis(1));
                }
            })
        };

        Self {
            client: Some(client),
            binds,
            stop,
            thread: Some(thread),
        }
    }

    /// Connect to the compositor. Only one session per compositor.
    pub fn session(&mut self) -> Session {
        let stream = self.client.take().expect("session already taken");
        Session::from_stream(stream).expect("Failed to wrap socket")
    }

    /// How many times any advertised global was bound
    pub fn binds(&self) -> usize {
        self.binds.load(Ordering::SeqCst)
    }
}

impl Drop for FakeCompositor {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
