//! Magic-cookie authentication against the primary node
//!
//! The handshake is encoded as a chain of types, each consumed by the next
//! step:
//!
//! ```text
//! Opened --get_magic--> MagicObtained --authenticate--> Authenticated
//!    \                       \
//!     `-- Err(Handshake)      `-- Err(Handshake)
//! ```
//!
//! The token lives inside `MagicObtained`, so it can only ever be presented
//! on the handle that issued it, and only once. A failed step drops the
//! device, closing the descriptor; a new attempt starts from a fresh `Opened`.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsFd;
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::drm_ioctl;
use crate::error::{Error, HandshakeStep, Result};

/// The two kernel operations the handshake needs from a device handle
pub trait MagicAuth {
    /// `DRM_IOCTL_GET_MAGIC`
    fn get_magic(&self) -> io::Result<u32>;
    /// `DRM_IOCTL_AUTH_MAGIC`
    fn auth_magic(&self, magic: u32) -> io::Result<()>;
}

/// Opens primary nodes
pub trait DeviceOpener {
    type Device: MagicAuth;

    fn open(&self, path: &Path) -> io::Result<Self::Device>;
}

/// A primary node opened read-write. Closed on drop.
#[derive(Debug)]
pub struct CardDevice {
    file: File,
}

impl CardDevice {
    /// Open `path` read-write, rejecting anything that is not a character device.
    ///
    /// `O_NONBLOCK` keeps FIFOs and similar nodes from stalling the open before
    /// the file type is checked. DRM ioctls ignore it.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)?;
        if !file.metadata()?.file_type().is_char_device() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a character device",
            ));
        }
        Ok(Self { file })
    }

    pub fn file(&self) -> &File {
        &self.file
    }
}

impl MagicAuth for CardDevice {
    fn get_magic(&self) -> io::Result<u32> {
        drm_ioctl::get_magic(self.file.as_fd())
    }

    fn auth_magic(&self, magic: u32) -> io::Result<()> {
        drm_ioctl::auth_magic(self.file.as_fd(), magic)
    }
}

/// Opens real device files
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl DeviceOpener for SystemOpener {
    type Device = CardDevice;

    fn open(&self, path: &Path) -> io::Result<CardDevice> {
        CardDevice::open(path)
    }
}

/// A magic cookie issued for one open handle. Deliberately neither `Clone`
/// nor `Copy`.
#[derive(Debug, PartialEq, Eq)]
pub struct AuthToken {
    magic: u32,
}

impl AuthToken {
    pub fn magic(&self) -> u32 {
        self.magic
    }
}

/// Primary node open, no magic requested yet
#[derive(Debug)]
pub struct Opened<D> {
    device: D,
    path: PathBuf,
}

/// Magic obtained from this handle, not yet presented
#[derive(Debug)]
pub struct MagicObtained<D> {
    device: D,
    path: PathBuf,
    token: AuthToken,
}

/// Terminal success. Keeps the handle open: closing it ends the authentication.
#[derive(Debug)]
pub struct Authenticated<D> {
    device: D,
    path: PathBuf,
    magic: u32,
}

impl<D: MagicAuth> Opened<D> {
    pub fn open<O>(opener: &O, path: &Path) -> Result<Self>
    where
        O: DeviceOpener<Device = D>,
    {
        let device = opener.open(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Opened {}", path.display());
        Ok(Self {
            device,
            path: path.to_path_buf(),
        })
    }

    /// Wrap a handle opened elsewhere.
    pub fn from_device(device: D, path: impl Into<PathBuf>) -> Self {
        Self {
            device,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_magic(self) -> Result<MagicObtained<D>> {
        match self.device.get_magic() {
            Ok(magic) => {
                debug!("GET_MAGIC on {}: {}", self.path.display(), magic);
                Ok(MagicObtained {
                    device: self.device,
                    path: self.path,
                    token: AuthToken { magic },
                })
            }
            Err(source) => Err(Error::Handshake {
                step: HandshakeStep::GetMagic,
                path: self.path,
                source,
            }),
        }
    }
}

impl<D: MagicAuth> MagicObtained<D> {
    pub fn token(&self) -> &AuthToken {
        &self.token
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Present this handle's own token. The token is spent either way.
    pub fn authenticate(self) -> Result<Authenticated<D>> {
        let magic = self.token.magic;
        match self.device.auth_magic(magic) {
            Ok(()) => {
                info!("Authenticated on {} with magic {}", self.path.display(), magic);
                Ok(Authenticated {
                    device: self.device,
                    path: self.path,
                    magic,
                })
            }
            Err(source) => Err(Error::Handshake {
                step: HandshakeStep::AuthMagic,
                path: self.path,
                source,
            }),
        }
    }
}

impl<D> Authenticated<D> {
    pub fn magic(&self) -> u32 {
        self.magic
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }
}

/// Open `path` and run the whole handshake on the new handle.
pub fn authenticate<O: DeviceOpener>(opener: &O, path: &Path) -> Result<Authenticated<O::Device>> {
    Opened::open(opener, path)?.get_magic()?.authenticate()
}
