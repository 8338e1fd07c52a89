//! Testing infrastructure
//!
//! An in-memory stand-in for a DRM primary node, so the handshake can be
//! exercised without hardware or DRM master.
//!
//! The double enforces the kernel's rules rather than just replaying canned
//! answers:
//!
//! 1. **Per-handle magic**: each opened device issues its own magic value.
//! 2. **Causal ordering**: `AUTH_MAGIC` on a handle that never issued a magic
//!    fails with `EINVAL`.
//! 3. **One-shot tokens**: presenting an already accepted magic fails.
//!
//! Every operation is recorded in a call log shared by all handles of one
//! [`MockOpener`].
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//! use wl_drm_auth::auth::authenticate;
//! use wl_drm_auth::testing::{Call, MockDevice, MockOpener};
//!
//! let opener = MockOpener::new(MockDevice::with_magic(42));
//! let authenticated = authenticate(&opener, Path::new("/dev/dri/card0")).unwrap();
//! assert_eq!(authenticated.magic(), 42);
//! assert_eq!(opener.calls().last(), Some(&Call::AuthMagic(42)));
//! ```

use std::cell::{Cell, RefCell};
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::auth::{DeviceOpener, MagicAuth};

/// One recorded operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(PathBuf),
    GetMagic,
    AuthMagic(u32),
}

type CallLog = Rc<RefCell<Vec<Call>>>;

/// Behaviour template for devices handed out by a [`MockOpener`]
#[derive(Debug, Clone)]
pub struct MockDevice {
    magic: u32,
    get_magic_errno: Option<i32>,
    auth_errno: Option<i32>,
}

impl MockDevice {
    /// A device whose first handle issues `magic`; later handles count up from it.
    pub fn with_magic(magic: u32) -> Self {
        Self {
            magic,
            get_magic_errno: None,
            auth_errno: None,
        }
    }

    pub fn failing_get_magic(errno: i32) -> Self {
        Self {
            get_magic_errno: Some(errno),
            ..Self::with_magic(0)
        }
    }

    /// Issue magic normally but refuse every `AUTH_MAGIC` with `errno`.
    pub fn rejecting_auth(mut self, errno: i32) -> Self {
        self.auth_errno = Some(errno);
        self
    }
}

/// One open handle on the in-memory device
#[derive(Debug)]
pub struct MockHandle {
    template: MockDevice,
    magic: u32,
    issued: Cell<Option<u32>>,
    accepted: Cell<bool>,
    log: CallLog,
}

impl MagicAuth for MockHandle {
    fn get_magic(&self) -> io::Result<u32> {
        self.log.borrow_mut().push(Call::GetMagic);
        if let Some(errno) = self.template.get_magic_errno {
            return Err(io::Error::from_raw_os_error(errno));
        }
        self.issued.set(Some(self.magic));
        Ok(self.magic)
    }

    fn auth_magic(&self, magic: u32) -> io::Result<()> {
        self.log.borrow_mut().push(Call::AuthMagic(magic));
        if let Some(errno) = self.template.auth_errno {
            return Err(io::Error::from_raw_os_error(errno));
        }
        if self.issued.get() != Some(magic) || self.accepted.get() {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        self.accepted.set(true);
        Ok(())
    }
}

/// Hands out [`MockHandle`]s and records every call made through them
#[derive(Debug)]
pub struct MockOpener {
    template: MockDevice,
    open_errno: Option<i32>,
    opened: Cell<u32>,
    log: CallLog,
}

impl MockOpener {
    pub fn new(template: MockDevice) -> Self {
        Self {
            template,
            open_errno: None,
            opened: Cell::new(0),
            log: CallLog::default(),
        }
    }

    /// Every `open` fails with `errno`.
    pub fn failing_open(errno: i32) -> Self {
        Self {
            open_errno: Some(errno),
            ..Self::new(MockDevice::with_magic(0))
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.borrow().clone()
    }

    /// Number of handles successfully opened
    pub fn opened(&self) -> u32 {
        self.opened.get()
    }
}

impl DeviceOpener for MockOpener {
    type Device = MockHandle;

    fn open(&self, path: &Path) -> io::Result<MockHandle> {
        self.log.borrow_mut().push(Call::Open(path.to_path_buf()));
        if let Some(errno) = self.open_errno {
            return Err(io::Error::from_raw_os_error(errno));
        }

        let index = self.opened.get();
        self.opened.set(index + 1);
        Ok(MockHandle {
            template: self.template.clone(),
            magic: self.template.magic.wrapping_add(index),
            issued: Cell::new(None),
            accepted: Cell::new(false),
            log: self.log.clone(),
        })
    }
}
