//! Linux capture device: `/dev/videocap` via ioctl and mmap.
//!
//! # How the control call works (for beginners)
//!
//! The driver exposes one ioctl, `ASTCAP_IOCCMD`.  Its argument is a small C
//! struct the driver reads the opcode from and writes the result code and a
//! size back into.  The ioctl number encodes the struct size, so the struct
//! below must match the driver's layout exactly (`#[repr(C)]`).
//!
//! The frame and cursor data are not copied through the ioctl.  The driver
//! writes them into memory that we map read-only with `mmap(MAP_SHARED)`.

use std::ffi::c_void;
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::Path;

use tracing::debug;

use super::{CaptureDevice, CaptureError, CaptureOpcode, CaptureStatus, ControlReply};

/// Argument of `ASTCAP_IOCCMD`.
#[repr(C)]
struct AstCapIoctl {
    op_code: u32,
    err_code: i32,
    size: libc::c_ulong,
    v_ptr: *mut c_void,
    reserved: [u8; 2],
}

const IOC_READ_WRITE: libc::c_ulong = 3;

/// `_IOWR('a', 0, struct AstCapIoctl)`.
const ASTCAP_IOCCMD: libc::c_ulong = (IOC_READ_WRITE << 30)
    | (((std::mem::size_of::<AstCapIoctl>() as libc::c_ulong) & 0x3FFF) << 16)
    | ((b'a' as libc::c_ulong) << 8);

/// Open capture device with its memory mapped.
pub struct LinuxCaptureDevice {
    file: File,
    map: *const u8,
    map_len: usize,
}

// SAFETY: the mapping is read-only and owned by this value; the pointer is
// only dereferenced through `memory(&self)`.
unsafe impl Send for LinuxCaptureDevice {}

impl LinuxCaptureDevice {
    /// Opens `path` and maps `map_len` bytes of capture memory.
    ///
    /// # Errors
    ///
    /// [`CaptureError::Open`] if the node cannot be opened,
    /// [`CaptureError::Map`] if `mmap` fails.
    pub fn open(path: &Path, map_len: usize) -> Result<Self, CaptureError> {
        let file = OpenOptions::new()
            .read(true)
            .open(path)
            .map_err(|source| CaptureError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        // SAFETY: plain mmap of an open descriptor; the result is checked
        // against MAP_FAILED before use.
        let map = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                map_len,
                libc::PROT_READ,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if map == libc::MAP_FAILED {
            return Err(CaptureError::Map(std::io::Error::last_os_error()));
        }

        debug!(path = %path.display(), map_len, "capture device mapped");
        Ok(Self {
            file,
            map: map as *const u8,
            map_len,
        })
    }
}

impl CaptureDevice for LinuxCaptureDevice {
    fn control(&mut self, opcode: CaptureOpcode) -> Result<ControlReply, CaptureError> {
        let mut arg = AstCapIoctl {
            op_code: opcode as u32,
            err_code: 0,
            size: 0,
            v_ptr: std::ptr::null_mut(),
            reserved: [0; 2],
        };

        // SAFETY: `arg` is a live, correctly laid out AstCapIoctl for the
        // duration of the call.
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), ASTCAP_IOCCMD as _, &mut arg) };
        if rc < 0 {
            return Err(CaptureError::Control {
                opcode,
                source: std::io::Error::last_os_error(),
            });
        }

        Ok(ControlReply::new(
            CaptureStatus::from_raw(arg.err_code),
            arg.size as usize,
        ))
    }

    fn memory(&self) -> &[u8] {
        // SAFETY: `map` points to `map_len` readable bytes until drop.
        unsafe { std::slice::from_raw_parts(self.map, self.map_len) }
    }
}

impl Drop for LinuxCaptureDevice {
    fn drop(&mut self) {
        // SAFETY: unmaps exactly the region mapped in `open`.
        unsafe {
            libc::munmap(self.map as *mut c_void, self.map_len);
        }
    }
}
