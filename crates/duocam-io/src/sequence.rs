use std::path::{Path, PathBuf};

use duocam_image::Image;

use crate::error::IoError;
use crate::functional::read_image_rgb8;
use crate::source::FrameSource;

const EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Replays the image files of a directory as a camera, in file name order.
#[derive(Debug)]
pub struct ImageSequenceSource {
    url: String,
    files: Vec<PathBuf>,
    next: usize,
    open: bool,
}

impl ImageSequenceSource {
    /// Open a directory of frames.
    ///
    /// # Errors
    ///
    /// [`IoError::DeviceUnavailable`] when the directory cannot be read or
    /// holds no image.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, IoError> {
        let dir = dir.as_ref();
        let url = dir.display().to_string();
        let unavailable = || IoError::DeviceUnavailable { url: url.clone() };

        let mut files = std::fs::read_dir(dir)
            .map_err(|_| unavailable())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            })
            .collect::<Vec<_>>();
        if files.is_empty() {
            return Err(unavailable());
        }
        files.sort();

        log::debug!("opened {url} with {} frames", files.len());
        Ok(Self {
            url,
            files,
            next: 0,
            open: true,
        })
    }

    /// Number of frames in the sequence.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the sequence has no frames.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Whether the source has not been closed.
    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl FrameSource for ImageSequenceSource {
    fn url(&self) -> &str {
        &self.url
    }

    fn read(&mut self) -> Result<Option<Image<u8, 3>>, IoError> {
        if !self.open {
            return Err(IoError::FrameReadFailure { url: self.url.clone() });
        }
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        read_image_rgb8(path).map(Some).map_err(|e| {
            log::warn!("failed to read {}: {e}", path.display());
            IoError::FrameReadFailure { url: self.url.clone() }
        })
    }

    fn skip(&mut self, count: u64) -> Result<u64, IoError> {
        if !self.open {
            return Err(IoError::FrameReadFailure { url: self.url.clone() });
        }
        let available = (self.files.len() - self.next) as u64;
        let skipped = count.min(available);
        self.next += skipped as usize;
        Ok(skipped)
    }

    fn close(&mut self) {
        if self.open {
            log::debug!("closing {}", self.url);
            self.open = false;
        }
    }
}
