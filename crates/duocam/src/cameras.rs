use duocam_image::Image;
use duocam_io::{open_pair, FrameSource, SourceOpener};
use duocam_sync::CameraId;

use crate::error::WorkerError;

/// The two sources of the rig, owned by one worker.
///
/// Both sources are closed when the pair is dropped, whatever way the
/// session ended.
pub struct CameraPair {
    camera1: Box<dyn FrameSource>,
    camera2: Box<dyn FrameSource>,
}

impl CameraPair {
    /// Open both cameras.
    ///
    /// # Arguments
    ///
    /// * `opener` - Resolves a source url to a frame source.
    /// * `camera1_url` - The first camera.
    /// * `camera2_url` - The second camera.
    pub fn open(opener: &dyn SourceOpener, camera1_url: &str, camera2_url: &str) -> Result<Self, WorkerError> {
        let (camera1, camera2) = open_pair(opener, camera1_url, camera2_url)?;
        log::debug!("opened {camera1_url} and {camera2_url}");
        Ok(Self { camera1, camera2 })
    }

    /// Wrap two already opened sources.
    pub fn from_sources(camera1: Box<dyn FrameSource>, camera2: Box<dyn FrameSource>) -> Self {
        Self { camera1, camera2 }
    }

    /// The source url of a camera.
    pub fn url(&self, camera: CameraId) -> &str {
        self.source(camera).url()
    }

    fn source(&self, camera: CameraId) -> &dyn FrameSource {
        match camera {
            CameraId::First => self.camera1.as_ref(),
            CameraId::Second => self.camera2.as_ref(),
        }
    }

    fn source_mut(&mut self, camera: CameraId) -> &mut dyn FrameSource {
        match camera {
            CameraId::First => self.camera1.as_mut(),
            CameraId::Second => self.camera2.as_mut(),
        }
    }

    /// Read the next frame of both cameras, `None` once either stream ended.
    pub fn try_read(&mut self) -> Result<Option<(Image<u8, 3>, Image<u8, 3>)>, WorkerError> {
        let Some(frame1) = self.camera1.read()? else {
            return Ok(None);
        };
        let Some(frame2) = self.camera2.read()? else {
            return Ok(None);
        };
        Ok(Some((frame1, frame2)))
    }

    /// Read the next frame of both cameras, treating an ended stream as a
    /// read failure of that camera.
    pub fn read(&mut self) -> Result<(Image<u8, 3>, Image<u8, 3>), WorkerError> {
        let frame1 = self.camera1.read()?.ok_or(WorkerError::FrameReadFailure {
            camera: CameraId::First,
        })?;
        let frame2 = self.camera2.read()?.ok_or(WorkerError::FrameReadFailure {
            camera: CameraId::Second,
        })?;
        Ok((frame1, frame2))
    }

    /// Drop `count` frames of one camera, returning how many were dropped.
    pub fn skip(&mut self, camera: CameraId, count: u64) -> Result<u64, WorkerError> {
        Ok(self.source_mut(camera).skip(count)?)
    }
}

impl Drop for CameraPair {
    fn drop(&mut self) {
        log::debug!("releasing {} and {}", self.camera1.url(), self.camera2.url());
        self.camera1.close();
        self.camera2.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duocam_io::IoError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSource {
        url: String,
        frames: usize,
        closed: Arc<AtomicUsize>,
    }

    impl FrameSource for CountingSource {
        fn url(&self) -> &str {
            &self.url
        }

        fn read(&mut self) -> Result<Option<Image<u8, 3>>, IoError> {
            if self.frames == 0 {
                return Ok(None);
            }
            self.frames -= 1;
            Ok(Some(Image::from_size_val([4, 4].into(), 0)?))
        }

        fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn source(url: &str, frames: usize, closed: &Arc<AtomicUsize>) -> Box<dyn FrameSource> {
        Box::new(CountingSource {
            url: url.to_string(),
            frames,
            closed: closed.clone(),
        })
    }

    #[test]
    fn test_read_and_release() -> Result<(), WorkerError> {
        let closed = Arc::new(AtomicUsize::new(0));
        {
            let mut pair = CameraPair::from_sources(source("a", 3, &closed), source("b", 1, &closed));
            assert_eq!(pair.url(CameraId::Second), "b");
            pair.read()?;
            assert!(matches!(
                pair.read(),
                Err(WorkerError::FrameReadFailure {
                    camera: CameraId::Second
                })
            ));
            assert!(pair.try_read()?.is_none());
        }
        assert_eq!(closed.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[test]
    fn test_skip_one_camera() -> Result<(), WorkerError> {
        let closed = Arc::new(AtomicUsize::new(0));
        let mut pair = CameraPair::from_sources(source("a", 5, &closed), source("b", 5, &closed));
        assert_eq!(pair.skip(CameraId::First, 3)?, 3);
        assert_eq!(pair.skip(CameraId::First, 3)?, 2);
        assert!(pair.try_read()?.is_none());
        Ok(())
    }
}
