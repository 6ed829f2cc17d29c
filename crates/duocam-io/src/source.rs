use std::path::Path;

use duocam_image::Image;

use crate::error::IoError;
use crate::sequence::ImageSequenceSource;

/// A camera delivering RGB frames in capture order.
///
/// The device is released when the source is dropped; [`FrameSource::close`]
/// releases it earlier.
pub trait FrameSource: Send {
    /// The source this camera was opened from.
    fn url(&self) -> &str;

    /// Read the next frame.
    ///
    /// # Returns
    ///
    /// `None` at the end of the stream.
    fn read(&mut self) -> Result<Option<Image<u8, 3>>, IoError>;

    /// Read and discard up to `count` frames.
    ///
    /// # Returns
    ///
    /// The number of frames actually discarded, lower than `count` only at
    /// the end of the stream.
    fn skip(&mut self, count: u64) -> Result<u64, IoError> {
        for skipped in 0..count {
            if self.read()?.is_none() {
                return Ok(skipped);
            }
        }
        Ok(count)
    }

    /// Release the device.
    fn close(&mut self) {}
}

/// Resolves a camera source to an open [`FrameSource`].
pub trait SourceOpener: Send + Sync {
    /// Open the camera behind `url`.
    ///
    /// # Errors
    ///
    /// [`IoError::DeviceUnavailable`] when the source cannot be opened.
    fn open(&self, url: &str) -> Result<Box<dyn FrameSource>, IoError>;
}

/// Opens directories of numbered image files.
///
/// Network streams and capture devices are not supported and are reported as
/// unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSourceOpener;

impl SourceOpener for FileSourceOpener {
    fn open(&self, url: &str) -> Result<Box<dyn FrameSource>, IoError> {
        let path = url.strip_prefix("file://").unwrap_or(url);
        if Path::new(path).is_dir() {
            return Ok(Box::new(ImageSequenceSource::open(path)?));
        }
        log::error!("cannot open camera source {url}");
        Err(IoError::DeviceUnavailable { url: url.to_string() })
    }
}

/// Open both cameras of the rig, failing if either cannot be opened.
///
/// The first camera is released again when the second one fails.
pub fn open_pair(
    opener: &dyn SourceOpener,
    camera1_url: &str,
    camera2_url: &str,
) -> Result<(Box<dyn FrameSource>, Box<dyn FrameSource>), IoError> {
    let mut camera1 = opener.open(camera1_url)?;
    match opener.open(camera2_url) {
        Ok(camera2) => Ok((camera1, camera2)),
        Err(e) => {
            camera1.close();
            Err(e)
        }
    }
}
