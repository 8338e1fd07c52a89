//! End-to-end pipeline tests
//!
//! Discovery runs against a real wayland-server instance; the DRM side uses
//! the in-memory device from `wl_drm_auth::testing`.

mod common;

use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

use common::{DrmGlobal, FakeCompositor};
use wl_drm_auth::testing::{Call, MockDevice, MockOpener};
use wl_drm_auth::{run, Config, Error, HandshakeStep, PrimaryNodePolicy, Session};

/// Scenario A: one wl_drm global, full announcement, handshake succeeds
#[test]
fn test_reference_flow_authenticates() {
    let mut compositor = FakeCompositor::start(vec![DrmGlobal::reference()]);
    let session = compositor.session();
    let opener = MockOpener::new(MockDevice::with_magic(42));

    let outcome = run(&session, &Config::default(), &opener).expect("pipeline failed");
    let report = &outcome.report;

    assert_eq!(report.global.interface, "wl_drm");
    assert_eq!(report.global.version, 2);
    assert_eq!(report.bound_version, 2);
    assert_eq!(report.render_node, PathBuf::from("/dev/dri/renderD128"));
    assert_eq!(report.formats.len(), 1);
    assert_eq!(report.formats[0].fourcc, "XR24");
    assert_eq!(report.capabilities, Some(1));
    assert!(report.prime);
    assert_eq!(report.primary_node, PathBuf::from("/dev/dri/card0"));
    assert_eq!(report.magic, 42);
    assert_eq!(outcome.device.magic(), 42);

    assert_eq!(
        opener.calls(),
        vec![
            Call::Open("/dev/dri/card0".into()),
            Call::GetMagic,
            Call::AuthMagic(42),
        ]
    );
    assert_eq!(compositor.binds(), 1);

    let text = report.to_string();
    assert!(text.contains("device: /dev/dri/renderD128"));
    assert!(text.contains("primary: /dev/dri/card0"));
    assert!(text.ends_with("state: authenticated"));
}

/// Scenario B: nothing advertises the interface
#[test]
fn test_missing_global_is_binding_not_found() {
    let mut compositor = FakeCompositor::start(Vec::new());
    let session = compositor.session();
    let opener = MockOpener::new(MockDevice::with_magic(42));

    let err = run(&session, &Config::default(), &opener).unwrap_err();

    assert!(matches!(err, Error::BindingNotFound { ref interface, .. } if interface == "wl_drm"));
    assert!(opener.calls().is_empty());
}

/// Only `wl_drm` can be bound, so any other interface is refused up front
/// instead of failing as a protocol error mid-roundtrip.
#[test]
fn test_other_interface_is_config_error() {
    let mut compositor = FakeCompositor::start(vec![DrmGlobal::reference()]);
    let session = compositor.session();
    let opener = MockOpener::new(MockDevice::with_magic(42));
    let config = Config {
        interface: "zwp_test_drm".to_string(),
        ..Config::default()
    };

    let err = run(&session, &config, &opener).unwrap_err();

    assert!(matches!(err, Error::Config(_)));
    assert_eq!(compositor.binds(), 0);
    assert!(opener.calls().is_empty());
}

#[test]
fn test_min_version_above_binding_is_config_error() {
    let mut compositor = FakeCompositor::start(vec![DrmGlobal::reference()]);
    let session = compositor.session();
    let opener = MockOpener::new(MockDevice::with_magic(42));
    let config = Config {
        min_version: 3,
        ..Config::default()
    };

    let err = run(&session, &config, &opener).unwrap_err();

    assert_eq!(err.stage(), "config");
    assert_eq!(compositor.binds(), 0);
}

#[test]
fn test_version_below_minimum_is_not_bound() {
    let mut compositor = FakeCompositor::start(vec![DrmGlobal {
        version: 1,
        ..DrmGlobal::reference()
    }]);
    let session = compositor.session();
    let opener = MockOpener::new(MockDevice::with_magic(42));
    let config = Config {
        min_version: 2,
        ..Config::default()
    };

    let err = run(&session, &config, &opener).unwrap_err();

    assert!(matches!(err, Error::BindingNotFound { min_version: 2, .. }));
    assert_eq!(compositor.binds(), 0);
}

/// Scenario C: bound, but no device path ever arrives
#[test]
fn test_silent_global_is_announcement_incomplete() {
    let mut compositor = FakeCompositor::start(vec![DrmGlobal::silent()]);
    let session = compositor.session();
    let opener = MockOpener::new(MockDevice::with_magic(42));

    let err = run(&session, &Config::default(), &opener).unwrap_err();

    assert!(matches!(err, Error::AnnouncementIncomplete { .. }));
    assert_eq!(compositor.binds(), 1);
    assert!(opener.calls().is_empty());
}

/// Scenario D: GET_MAGIC is refused, AUTH_MAGIC is never attempted
#[test]
fn test_get_magic_failure_is_handshake_error() {
    let mut compositor = FakeCompositor::start(vec![DrmGlobal::reference()]);
    let session = compositor.session();
    let opener = MockOpener::new(MockDevice::failing_get_magic(libc::EACCES));

    let err = run(&session, &Config::default(), &opener).unwrap_err();

    assert!(matches!(
        err,
        Error::Handshake {
            step: HandshakeStep::GetMagic,
            ..
        }
    ));
    assert_eq!(err.os_error(), Some(libc::EACCES));
    assert_eq!(
        opener.calls(),
        vec![Call::Open("/dev/dri/card0".into()), Call::GetMagic]
    );
}

#[test]
fn test_open_failure_is_open_error() {
    let mut compositor = FakeCompositor::start(vec![DrmGlobal::reference()]);
    let session = compositor.session();
    let opener = MockOpener::failing_open(libc::EACCES);

    let err = run(&session, &Config::default(), &opener).unwrap_err();

    assert!(matches!(err, Error::Open { ref path, .. } if path == Path::new("/dev/dri/card0")));
    assert_eq!(err.os_error(), Some(libc::EACCES));
}

#[test]
fn test_duplicate_globals_bind_once() {
    let mut compositor = FakeCompositor::start(vec![
        DrmGlobal::reference(),
        DrmGlobal {
            device: Some("/dev/dri/renderD129".to_string()),
            ..DrmGlobal::reference()
        },
    ]);
    let session = compositor.session();
    let opener = MockOpener::new(MockDevice::with_magic(42));

    let outcome = run(&session, &Config::default(), &opener).expect("pipeline failed");

    assert_eq!(compositor.binds(), 1);
    assert_eq!(outcome.report.render_node, PathBuf::from("/dev/dri/renderD128"));
}

#[test]
fn test_compositor_authenticated_notice_does_not_skip_handshake() {
    let mut compositor = FakeCompositor::start(vec![DrmGlobal {
        authenticated: true,
        ..DrmGlobal::reference()
    }]);
    let session = compositor.session();
    let opener = MockOpener::new(MockDevice::with_magic(7));

    let outcome = run(&session, &Config::default(), &opener).expect("pipeline failed");

    assert!(outcome.report.compositor_authenticated);
    assert_eq!(
        opener.calls(),
        vec![
            Call::Open("/dev/dri/card0".into()),
            Call::GetMagic,
            Call::AuthMagic(7),
        ]
    );
}

#[test]
fn test_formats_are_deduplicated_and_optional_kinds_absent() {
    let mut compositor = FakeCompositor::start(vec![DrmGlobal {
        formats: vec![0x3432_5241, 0x3432_5258, 0x3432_5241],
        capabilities: None,
        ..DrmGlobal::reference()
    }]);
    let session = compositor.session();
    let opener = MockOpener::new(MockDevice::with_magic(1));

    let report = run(&session, &Config::default(), &opener)
        .expect("pipeline failed")
        .report;

    let fourccs: Vec<&str> = report.formats.iter().map(|f| f.fourcc.as_str()).collect();
    assert_eq!(fourccs, vec!["AR24", "XR24"]);
    assert_eq!(report.capabilities, None);
    assert!(!report.prime);
}

#[test]
fn test_numbered_policy_follows_render_minor() {
    let mut compositor = FakeCompositor::start(vec![DrmGlobal {
        device: Some("/dev/dri/renderD129".to_string()),
        ..DrmGlobal::reference()
    }]);
    let session = compositor.session();
    let opener = MockOpener::new(MockDevice::with_magic(3));
    let config = Config {
        primary_node: PrimaryNodePolicy::Numbered,
        ..Config::default()
    };

    let report = run(&session, &config, &opener).expect("pipeline failed").report;

    assert_eq!(report.primary_node, PathBuf::from("/dev/dri/card1"));
    assert_eq!(opener.calls()[0], Call::Open("/dev/dri/card1".into()));
}

#[test]
fn test_broken_connection_is_connection_error() {
    let (client, server) = UnixStream::pair().expect("Failed to create socket pair");
    drop(server);
    let session = Session::from_stream(client).expect("Failed to wrap socket");
    let opener = MockOpener::new(MockDevice::with_magic(42));

    let err = run(&session, &Config::default(), &opener).unwrap_err();

    assert!(matches!(err, Error::Connection { .. }));
    assert!(opener.calls().is_empty());
}
