//! Linux HID redirection device: ioctls on `/dev/usb`.

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::Path;

use tracing::trace;

use super::{HidDevice, HidError, HidRequest};

/// Open `/dev/usb` descriptor.
#[derive(Debug)]
pub struct LinuxHidDevice {
    file: File,
}

impl LinuxHidDevice {
    /// # Errors
    ///
    /// [`HidError::Open`] if the node cannot be opened.
    pub fn open(path: &Path) -> Result<Self, HidError> {
        let file = OpenOptions::new()
            .read(true)
            .open(path)
            .map_err(|source| HidError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self { file })
    }
}

impl HidDevice for LinuxHidDevice {
    fn call(&mut self, request: HidRequest, buf: &mut [u8]) -> Result<(), HidError> {
        trace!(?request, len = buf.len(), "hid ioctl");

        // SAFETY: the driver reads and writes at most the record size of
        // `request`, and every caller passes a buffer of that size.
        let rc = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                request.ioctl_number() as _,
                buf.as_mut_ptr(),
            )
        };
        if rc < 0 {
            return Err(HidError::Request {
                request,
                source: std::io::Error::last_os_error(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_node_is_open_error() {
        let result = LinuxHidDevice::open(Path::new("/nonexistent/usb"));
        assert!(matches!(result, Err(HidError::Open { .. })));
    }
}
