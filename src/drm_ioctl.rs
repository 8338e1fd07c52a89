//! Raw DRM ioctls
//!
//! Request numbers and argument structs from `include/uapi/drm/drm.h`.
//! Only the handful this crate issues are declared.

use std::ffi::c_char;
use std::io;
use std::mem::size_of;
use std::os::fd::{AsRawFd, BorrowedFd};

const DRM_IOCTL_BASE: u32 = b'd' as u32;

const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

const fn ioc(dir: u32, nr: u32, size: usize) -> u64 {
    ((dir << 30) | ((size as u32) << 16) | (DRM_IOCTL_BASE << 8) | nr) as u64
}

/// `struct drm_auth`
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct DrmAuth {
    pub magic: u32,
}

/// `struct drm_get_cap`
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct DrmGetCap {
    pub capability: u64,
    pub value: u64,
}

/// `struct drm_version`
#[repr(C)]
#[derive(Debug)]
pub struct DrmVersion {
    pub version_major: i32,
    pub version_minor: i32,
    pub version_patchlevel: i32,
    pub name_len: usize,
    pub name: *mut c_char,
    pub date_len: usize,
    pub date: *mut c_char,
    pub desc_len: usize,
    pub desc: *mut c_char,
}

impl Default for DrmVersion {
    fn default() -> Self {
        Self {
            version_major: 0,
            version_minor: 0,
            version_patchlevel: 0,
            name_len: 0,
            name: std::ptr::null_mut(),
            date_len: 0,
            date: std::ptr::null_mut(),
            desc_len: 0,
            desc: std::ptr::null_mut(),
        }
    }
}

pub const DRM_IOCTL_VERSION: u64 = ioc(IOC_READ | IOC_WRITE, 0x00, size_of::<DrmVersion>());
pub const DRM_IOCTL_GET_MAGIC: u64 = ioc(IOC_READ, 0x02, size_of::<DrmAuth>());
pub const DRM_IOCTL_GET_CAP: u64 = ioc(IOC_READ | IOC_WRITE, 0x0c, size_of::<DrmGetCap>());
pub const DRM_IOCTL_AUTH_MAGIC: u64 = ioc(IOC_WRITE, 0x11, size_of::<DrmAuth>());

/// `DRM_CAP_*` values
pub mod cap {
    pub const DUMB_BUFFER: u64 = 0x1;
    pub const VBLANK_HIGH_CRTC: u64 = 0x2;
    pub const DUMB_PREFERRED_DEPTH: u64 = 0x3;
    pub const DUMB_PREFER_SHADOW: u64 = 0x4;
    pub const PRIME: u64 = 0x5;
    pub const TIMESTAMP_MONOTONIC: u64 = 0x6;
    pub const ASYNC_PAGE_FLIP: u64 = 0x7;
    pub const CURSOR_WIDTH: u64 = 0x8;
    pub const CURSOR_HEIGHT: u64 = 0x9;
    pub const ADDFB2_MODIFIERS: u64 = 0x10;
    pub const PAGE_FLIP_TARGET: u64 = 0x11;
    pub const CRTC_IN_VBLANK_EVENT: u64 = 0x12;
    pub const SYNCOBJ: u64 = 0x13;
    pub const SYNCOBJ_TIMELINE: u64 = 0x14;
}

/// Issue `request` with `arg`, retrying on EINTR like libdrm's `drmIoctl`.
///
/// # Safety
///
/// `T` must be the argument type the kernel expects for `request`, and any
/// pointers inside `arg` must be valid for the lengths it declares.
unsafe fn ioctl<T>(fd: BorrowedFd<'_>, request: u64, arg: &mut T) -> io::Result<()> {
    loop {
        let ret = libc::ioctl(fd.as_raw_fd(), request as _, arg as *mut T);
        if ret == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINTR) | Some(libc::EAGAIN) => continue,
            _ => return Err(err),
        }
    }
}

pub fn get_magic(fd: BorrowedFd<'_>) -> io::Result<u32> {
    let mut auth = DrmAuth::default();
    // SAFETY: GET_MAGIC takes a struct drm_auth.
    unsafe { ioctl(fd, DRM_IOCTL_GET_MAGIC, &mut auth)? };
    Ok(auth.magic)
}

pub fn auth_magic(fd: BorrowedFd<'_>, magic: u32) -> io::Result<()> {
    let mut auth = DrmAuth { magic };
    // SAFETY: AUTH_MAGIC takes a struct drm_auth.
    unsafe { ioctl(fd, DRM_IOCTL_AUTH_MAGIC, &mut auth) }
}

pub fn get_cap(fd: BorrowedFd<'_>, capability: u64) -> io::Result<u64> {
    let mut arg = DrmGetCap {
        capability,
        value: 0,
    };
    // SAFETY: GET_CAP takes a struct drm_get_cap.
    unsafe { ioctl(fd, DRM_IOCTL_GET_CAP, &mut arg)? };
    Ok(arg.value)
}

/// Driver version as reported by `DRM_IOCTL_VERSION`
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DriverVersion {
    pub major: i32,
    pub minor: i32,
    pub patchlevel: i32,
    pub name: String,
    pub date: String,
    pub desc: String,
}

/// Two calls: the first returns the string lengths, the second fills them in.
pub fn version(fd: BorrowedFd<'_>) -> io::Result<DriverVersion> {
    let mut probe = DrmVersion::default();
    // SAFETY: VERSION takes a struct drm_version; null buffers with zero lengths are allowed.
    unsafe { ioctl(fd, DRM_IOCTL_VERSION, &mut probe)? };

    let mut name = vec![0u8; probe.name_len];
    let mut date = vec![0u8; probe.date_len];
    let mut desc = vec![0u8; probe.desc_len];
    let mut full = DrmVersion {
        name_len: name.len(),
        name: name.as_mut_ptr().cast(),
        date_len: date.len(),
        date: date.as_mut_ptr().cast(),
        desc_len: desc.len(),
        desc: desc.as_mut_ptr().cast(),
        ..DrmVersion::default()
    };
    // SAFETY: every buffer pointer is valid for the length stored next to it.
    unsafe { ioctl(fd, DRM_IOCTL_VERSION, &mut full)? };

    let text = |mut bytes: Vec<u8>, len: usize| {
        bytes.truncate(len);
        String::from_utf8_lossy(&bytes).into_owned()
    };
    Ok(DriverVersion {
        major: full.version_major,
        minor: full.version_minor,
        patchlevel: full.version_patchlevel,
        name: text(name, full.name_len),
        date: text(date, full.date_len),
        desc: text(desc, full.desc_len),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_numbers_match_kernel_headers() {
        assert_eq!(DRM_IOCTL_GET_MAGIC, 0x8004_6402);
        assert_eq!(DRM_IOCTL_AUTH_MAGIC, 0x4004_6411);
        assert_eq!(DRM_IOCTL_GET_CAP, 0xc010_640c);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_version_request_number_64bit() {
        assert_eq!(size_of::<DrmVersion>(), 64);
        assert_eq!(DRM_IOCTL_VERSION, 0xc040_6400);
    }

    #[test]
    fn test_ioctl_on_regular_file_fails() {
        let path = std::env::temp_dir().join(format!("wl-drm-auth-ioctl-{}", std::process::id()));
        let file = std::fs::File::create(&path).unwrap();
        let fd = std::os::fd::AsFd::as_fd(&file);

        let err = get_magic(fd).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENOTTY));

        std::fs::remove_file(&path).unwrap();
    }
}
