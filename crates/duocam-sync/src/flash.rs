use duocam_image::{Image, ImageError};
use duocam_imgproc::{color::to_gray_u8, threshold::count_above_threshold};

/// Detects the rising edge of a bright flash in a camera stream.
///
/// A flash fires when more than `min_pixels` pixels are brighter than
/// `threshold` while no flash is active. The detector stays active, and does
/// not fire again, until the bright area shrinks below `min_pixels`.
#[derive(Debug, Clone)]
pub struct FlashDetector {
    threshold: u8,
    min_pixels: usize,
    active: bool,
}

impl FlashDetector {
    /// Create a detector in the armed state.
    ///
    /// # Arguments
    ///
    /// * `threshold` - Gray level a pixel must exceed to count as bright.
    /// * `min_pixels` - Number of bright pixels a flash must exceed.
    pub fn new(threshold: u8, min_pixels: usize) -> Self {
        Self {
            threshold,
            min_pixels,
            active: false,
        }
    }

    /// Whether a flash is currently in progress.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Re-arm the detector.
    pub fn reset(&mut self) {
        self.active = false;
    }

    /// Feed a grayscale frame, returns `true` when a new flash starts.
    pub fn process_gray(&mut self, gray: &Image<u8, 1>) -> bool {
        let bright = count_above_threshold(gray, self.threshold);
        if bright > self.min_pixels && !self.active {
            self.active = true;
            log::trace!("flash started with {bright} bright pixels");
            return true;
        }
        if bright < self.min_pixels {
            self.active = false;
        }
        false
    }

    /// Feed an RGB frame, returns `true` when a new flash starts.
    pub fn process(&mut self, frame: &Image<u8, 3>) -> Result<bool, ImageError> {
        let gray = to_gray_u8(frame)?;
        Ok(self.process_gray(&gray))
    }
}

impl Default for FlashDetector {
    fn default() -> Self {
        Self::new(220, 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(bright: usize) -> Result<Image<u8, 1>, ImageError> {
        let mut data = vec![30u8; 100 * 50];
        data.iter_mut().take(bright).for_each(|v| *v = 250);
        Image::new([100, 50].into(), data)
    }

    #[test]
    fn test_flash_rising_edge_only() -> Result<(), ImageError> {
        let mut detector = FlashDetector::default();
        assert!(!detector.process_gray(&frame(0)?));
        assert!(detector.process_gray(&frame(2000)?));
        assert!(detector.is_active());
        // still bright: debounced
        assert!(!detector.process_gray(&frame(3000)?));
        // back to dark re-arms the detector
        assert!(!detector.process_gray(&frame(10)?));
        assert!(!detector.is_active());
        assert!(detector.process_gray(&frame(1500)?));
        Ok(())
    }

    #[test]
    fn test_flash_needs_strictly_more_pixels() -> Result<(), ImageError> {
        let mut detector = FlashDetector::new(220, 1000);
        assert!(!detector.process_gray(&frame(1000)?));
        assert!(detector.process_gray(&frame(1001)?));
        // exactly at the limit neither fires nor re-arms
        assert!(!detector.process_gray(&frame(1000)?));
        assert!(detector.is_active());
        Ok(())
    }

    #[test]
    fn test_flash_rgb() -> Result<(), ImageError> {
        let mut detector = FlashDetector::new(220, 10);
        let white = Image::<u8, 3>::from_size_val([10, 10].into(), 255)?;
        assert!(detector.process(&white)?);
        Ok(())
    }
}
