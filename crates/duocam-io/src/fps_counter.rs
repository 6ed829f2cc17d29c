use std::time::Instant;

/// The smoothing factor for the FPS calculation.
const SMOOTHING: f32 = 0.95;

/// A simple frame per second (FPS) counter.
///
/// # Examples
///
/// ```
/// use duocam_io::fps_counter::FpsCounter;
///
/// let mut fps_counter = FpsCounter::new();
///
/// for _ in 0..100 {
///    fps_counter.update();
/// }
/// ```
pub struct FpsCounter {
    last_time: Instant,
    frame_count: u64,
    fps: f32,
}

impl FpsCounter {
    /// Creates a new `FpsCounter`.
    pub fn new() -> Self {
        Self {
            last_time: Instant::now(),
            frame_count: 0,
            fps: 0.0,
        }
    }

    /// Returns the current FPS.
    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Returns the number of frames counted.
    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Updates the frame count and calculates the FPS.
    pub fn update(&mut self) {
        let now = Instant::now();
        self.update_with_interval(now.duration_since(self.last_time).as_secs_f32());
        self.last_time = now;
    }

    /// Updates the counter with the seconds elapsed since the previous frame.
    pub fn update_with_interval(&mut self, seconds: f32) {
        self.frame_count += 1;
        if seconds <= 0.0 {
            return;
        }

        let instant_fps = 1.0 / seconds;
        self.fps = if self.fps == 0.0 {
            instant_fps
        } else {
            self.fps * SMOOTHING + instant_fps * (1.0 - SMOOTHING)
        };
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}
