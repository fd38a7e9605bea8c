//! Last-frame cache.
//!
//! Holds the most recently captured [`RawFrame`] so it can be served again
//! while the screen does not change.  The frame is shared, not copied: a
//! Draw command built from the cache points at the same image blob.
//!
//! With a dump path configured, every stored frame is also written to disk
//! as its image blob, and [`FrameCache::load`] picks it up again on the next
//! start.  Disk errors are logged and never fail the caller.

use std::fs;
use std::path::{Path, PathBuf};

use ast_core::domain::RawFrame;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
pub struct FrameCache {
    last: Option<RawFrame>,
    dump_path: Option<PathBuf>,
}

impl FrameCache {
    /// An empty cache that dumps frames to `dump_path`, if given.
    pub fn new(dump_path: Option<PathBuf>) -> Self {
        Self {
            last: None,
            dump_path,
        }
    }

    /// Creates the cache and, with a dump path, loads the previously dumped
    /// frame.  A missing or unreadable dump leaves the cache empty.
    pub fn load(dump_path: Option<PathBuf>) -> Self {
        let last = dump_path.as_deref().and_then(read_dump);
        Self { last, dump_path }
    }

    /// Keeps `frame` as the last frame and dumps it.
    pub fn store(&mut self, frame: &RawFrame) {
        if let Some(path) = &self.dump_path {
            if let Err(e) = fs::write(path, frame.image()) {
                warn!(path = %path.display(), error = %e, "frame dump failed");
            }
        }
        self.last = Some(frame.clone());
    }

    /// The last stored frame.
    pub fn last(&self) -> Option<&RawFrame> {
        self.last.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_none()
    }
}

fn read_dump(path: &Path) -> Option<RawFrame> {
    let image = match fs::read(path) {
        Ok(image) => image,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no frame dump yet");
            return None;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read frame dump");
            return None;
        }
    };

    match RawFrame::from_image(image) {
        Ok(frame) => {
            let (width, height) = frame.header().resolution();
            info!(path = %path.display(), width, height, "cached frame restored");
            Some(frame)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "discarding corrupt frame dump");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ast_core::domain::capture::{FRAME_HEADER_LEN, FRAME_PAYLOAD_OFFSET};

    fn frame(width: u16, height: u16, payload: &[u8]) -> RawFrame {
        let mut mem = vec![0u8; FRAME_PAYLOAD_OFFSET + payload.len()];
        mem[2..4].copy_from_slice(&(FRAME_HEADER_LEN as u16).to_le_bytes());
        mem[4..6].copy_from_slice(&width.to_le_bytes());
        mem[6..8].copy_from_slice(&height.to_le_bytes());
        mem[FRAME_PAYLOAD_OFFSET..].copy_from_slice(payload);
        RawFrame::from_capture_memory(&mem, payload.len()).expect("frame")
    }

    fn scratch_file() -> PathBuf {
        std::env::temp_dir().join(format!("astbridge-frame-{}.bin", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_store_shares_the_image_blob() {
        // Arrange
        let mut cache = FrameCache::new(None);
        let captured = frame(640, 480, &[1, 2, 3]);

        // Act
        cache.store(&captured);

        // Assert
        let cached = cache.last().expect("cached");
        assert_eq!(cached, &captured);
        assert_eq!(captured.share_count(), 2);
    }

    #[test]
    fn test_store_replaces_previous_frame() {
        let mut cache = FrameCache::default();
        cache.store(&frame(640, 480, &[1]));

        cache.store(&frame(800, 600, &[2]));

        assert_eq!(cache.last().expect("cached").payload(), &[2]);
    }

    #[test]
    fn test_dumped_frame_is_restored_on_load() {
        // Arrange
        let path = scratch_file();
        let mut cache = FrameCache::new(Some(path.clone()));
        cache.store(&frame(1280, 1024, &[9, 8, 7, 6]));

        // Act
        let restored = FrameCache::load(Some(path.clone()));

        // Assert
        let last = restored.last().expect("restored");
        assert_eq!(last.header().resolution(), (1280, 1024));
        assert_eq!(last.payload(), &[9, 8, 7, 6]);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_missing_or_corrupt_dump_yields_empty_cache() {
        // Arrange
        let missing = scratch_file();
        let corrupt = scratch_file();
        fs::write(&corrupt, [0u8; 10]).expect("write");

        // Act / Assert
        assert!(FrameCache::load(Some(missing)).is_empty());
        assert!(FrameCache::load(Some(corrupt.clone())).is_empty());
        assert!(FrameCache::load(None).is_empty());
        let _ = fs::remove_file(corrupt);
    }

    #[test]
    fn test_unwritable_dump_path_still_caches() {
        let mut cache = FrameCache::new(Some(PathBuf::from("/nonexistent/dir/frame.bin")));

        cache.store(&frame(640, 480, &[5]));

        assert!(!cache.is_empty());
    }
}
