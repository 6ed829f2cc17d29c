use crate::detection::Detection;
use crate::error::StereoError;

/// Focal length assumed when no calibration is loaded, in pixels.
pub const DEFAULT_FALLBACK_FOCAL_PX: f64 = 800.0;

/// Two detections of the same object seen by both cameras.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedPair {
    /// The detection in the first camera.
    pub cam1: Detection,
    /// The detection in the second camera.
    pub cam2: Detection,
    /// Horizontal distance between the box centers, in pixels.
    pub disparity_px: f64,
    /// Estimated distance to the object, in centimeters.
    pub distance_cm: f64,
    /// Product of the two detection confidences.
    pub confidence: f32,
}

impl MatchedPair {
    /// Estimated distance in meters.
    pub fn distance_m(&self) -> f64 {
        self.distance_cm / 100.0
    }
}

/// Result of matching the detections of one frame pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StereoMatches {
    /// The matched pairs, in the order of the first camera detections.
    pub pairs: Vec<MatchedPair>,
    /// First camera detections without a candidate.
    pub unmatched1: Vec<Detection>,
    /// Second camera detections no first camera detection selected.
    pub unmatched2: Vec<Detection>,
}

/// Associates detections across a horizontal stereo pair and estimates their
/// distance from the disparity of the box centers.
///
/// Only detections sharing a class are compared. For every detection of the
/// first camera the candidate with the smallest distance wins; a second camera
/// detection may be selected by several first camera detections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoMatcher {
    baseline_cm: f64,
    focal_length_px: f64,
}

impl StereoMatcher {
    /// Create a matcher.
    ///
    /// # Arguments
    ///
    /// * `baseline_cm` - Distance between the optical centers in centimeters.
    /// * `focal_length_px` - Horizontal focal length in pixels.
    pub fn new(baseline_cm: f64, focal_length_px: f64) -> Result<Self, StereoError> {
        if !(baseline_cm.is_finite() && baseline_cm > 0.0) {
            return Err(StereoError::InvalidBaseline(baseline_cm));
        }
        if !(focal_length_px.is_finite() && focal_length_px > 0.0) {
            return Err(StereoError::InvalidFocalLength(focal_length_px));
        }
        Ok(Self {
            baseline_cm,
            focal_length_px,
        })
    }

    /// Create a matcher using the calibrated focal length when there is one.
    ///
    /// # Arguments
    ///
    /// * `baseline_cm` - Distance between the optical centers in centimeters.
    /// * `calibrated_focal_px` - Focal length of the first camera, if calibrated.
    /// * `fallback_focal_px` - Focal length used otherwise.
    pub fn with_optional_calibration(
        baseline_cm: f64,
        calibrated_focal_px: Option<f64>,
        fallback_focal_px: f64,
    ) -> Result<Self, StereoError> {
        let focal = match calibrated_focal_px {
            Some(f) => f,
            None => {
                log::debug!("no calibration, using fallback focal length {fallback_focal_px} px");
                fallback_focal_px
            }
        };
        Self::new(baseline_cm, focal)
    }

    /// The baseline in centimeters.
    pub fn baseline_cm(&self) -> f64 {
        self.baseline_cm
    }

    /// The focal length in pixels.
    pub fn focal_length_px(&self) -> f64 {
        self.focal_length_px
    }

    /// Distance for a disparity, or `None` when the disparity is not positive.
    pub fn distance_cm(&self, disparity_px: f64) -> Option<f64> {
        if disparity_px > 0.0 {
            Some(self.baseline_cm * self.focal_length_px / disparity_px)
        } else {
            None
        }
    }

    /// Match the detections of a synchronized frame pair.
    ///
    /// # Arguments
    ///
    /// * `detections1` - The detections of the first camera.
    /// * `detections2` - The detections of the second camera.
    pub fn match_detections(&self, detections1: &[Detection], detections2: &[Detection]) -> StereoMatches {
        let mut matches = StereoMatches::default();
        let mut claimed = vec![false; detections2.len()];

        for d1 in detections1 {
            let (cx1, _) = d1.center();
            let mut best: Option<(usize, f64, f64)> = None;
            for (j, d2) in detections2.iter().enumerate() {
                if d2.class_id != d1.class_id {
                    continue;
                }
                let (cx2, _) = d2.center();
                let disparity = (cx1 - cx2).abs() as f64;
                let Some(distance) = self.distance_cm(disparity) else {
                    continue;
                };
                // strict comparison keeps the first candidate on ties
                if best.map_or(true, |(_, _, d)| distance < d) {
                    best = Some((j, disparity, distance));
                }
            }

            match best {
                Some((j, disparity_px, distance_cm)) => {
                    claimed[j] = true;
                    let d2 = &detections2[j];
                    matches.pairs.push(MatchedPair {
                        cam1: d1.clone(),
                        cam2: d2.clone(),
                        disparity_px,
                        distance_cm,
                        confidence: d1.confidence * d2.confidence,
                    });
                }
                None => matches.unmatched1.push(d1.clone()),
            }
        }

        matches.unmatched2 = detections2
            .iter()
            .zip(&claimed)
            .filter(|(_, &c)| !c)
            .map(|(d, _)| d.clone())
            .collect();

        log::trace!(
            "matched {} pairs, {} + {} unmatched",
            matches.pairs.len(),
            matches.unmatched1.len(),
            matches.unmatched2.len()
        );
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BoundingBox;
    use approx::assert_relative_eq;

    fn det(class_id: u32, name: &str, cx: i32, cy: i32) -> Detection {
        Detection::new(class_id, name, 0.9, BoundingBox::new(cx - 10, cy - 20, cx + 10, cy + 20))
    }

    #[test]
    fn test_distance_decreases_with_disparity() -> Result<(), StereoError> {
        let matcher = StereoMatcher::new(10.0, 800.0)?;
        let mut last = f64::INFINITY;
        for disparity in 1..200 {
            let d = matcher.distance_cm(disparity as f64).ok_or(StereoError::InvalidBaseline(0.0))?;
            assert!(d < last);
            last = d;
        }
        let tiny = matcher.distance_cm(1e-9).ok_or(StereoError::InvalidBaseline(0.0))?;
        assert!(tiny > 1e12);
        assert_eq!(matcher.distance_cm(0.0), None);
        assert_eq!(matcher.distance_cm(-3.0), None);
        Ok(())
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(StereoMatcher::new(0.0, 800.0), Err(StereoError::InvalidBaseline(_))));
        assert!(matches!(StereoMatcher::new(10.0, f64::NAN), Err(StereoError::InvalidFocalLength(_))));
    }

    #[test]
    fn test_fallback_focal_length() -> Result<(), StereoError> {
        let uncalibrated = StereoMatcher::with_optional_calibration(10.0, None, DEFAULT_FALLBACK_FOCAL_PX)?;
        assert_eq!(uncalibrated.focal_length_px(), 800.0);
        let calibrated = StereoMatcher::with_optional_calibration(10.0, Some(612.5), DEFAULT_FALLBACK_FOCAL_PX)?;
        assert_eq!(calibrated.focal_length_px(), 612.5);
        Ok(())
    }

    #[test]
    fn test_match_person() -> Result<(), StereoError> {
        let matcher = StereoMatcher::new(10.0, 800.0)?;
        let matches = matcher.match_detections(&[det(0, "person", 320, 240)], &[det(0, "person", 300, 240)]);
        assert_eq!(matches.pairs.len(), 1);
        let pair = &matches.pairs[0];
        assert_relative_eq!(pair.disparity_px, 20.0);
        assert_relative_eq!(pair.distance_cm, 400.0);
        assert_relative_eq!(pair.distance_m(), 4.0);
        assert_relative_eq!(pair.confidence, 0.81, epsilon = 1e-6);
        assert!(matches.unmatched1.is_empty() && matches.unmatched2.is_empty());
        Ok(())
    }

    #[test]
    fn test_zero_disparity_is_excluded() -> Result<(), StereoError> {
        let matcher = StereoMatcher::new(10.0, 800.0)?;
        let matches = matcher.match_detections(&[det(0, "person", 320, 240)], &[det(0, "person", 320, 100)]);
        assert!(matches.pairs.is_empty());
        assert_eq!(matches.unmatched1.len(), 1);
        assert_eq!(matches.unmatched2.len(), 1);
        Ok(())
    }

    #[test]
    fn test_class_mismatch_is_never_matched() -> Result<(), StereoError> {
        let matcher = StereoMatcher::new(10.0, 800.0)?;
        let matches = matcher.match_detections(&[det(2, "car", 320, 240)], &[det(7, "truck", 310, 240)]);
        assert!(matches.pairs.is_empty());
        assert_eq!(matches.unmatched1[0].class_name, "car");
        assert_eq!(matches.unmatched2[0].class_name, "truck");
        Ok(())
    }

    #[test]
    fn test_minimum_distance_wins() -> Result<(), StereoError> {
        let matcher = StereoMatcher::new(10.0, 800.0)?;
        let cam2 = [det(0, "person", 310, 240), det(0, "person", 250, 240), det(0, "person", 390, 240)];
        let matches = matcher.match_detections(&[det(0, "person", 320, 240)], &cam2);
        // disparities 10, 70 and 70: the first of the two largest wins
        assert_eq!(matches.pairs.len(), 1);
        assert_eq!(matches.pairs[0].cam2.center().0, 250);
        assert_eq!(matches.unmatched2.len(), 2);
        Ok(())
    }

    #[test]
    fn test_matching_is_not_exclusive() -> Result<(), StereoError> {
        let matcher = StereoMatcher::new(10.0, 800.0)?;
        let cam1 = [det(0, "person", 320, 240), det(0, "person", 330, 240)];
        let cam2 = [det(0, "person", 200, 240)];
        let matches = matcher.match_detections(&cam1, &cam2);
        assert_eq!(matches.pairs.len(), 2);
        assert_eq!(matches.pairs[0].cam2, matches.pairs[1].cam2);
        assert!(matches.unmatched2.is_empty());
        Ok(())
    }
}
