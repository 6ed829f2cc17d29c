/// Coarse distance class used to colour detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DistanceBucket {
    /// Closer than the near limit.
    Near,
    /// Between the near and far limits.
    Medium,
    /// At or beyond the far limit.
    Far,
}

impl DistanceBucket {
    /// RGB colour of the bucket.
    pub fn color(&self) -> [u8; 3] {
        match self {
            DistanceBucket::Near => [255, 0, 0],
            DistanceBucket::Medium => [255, 255, 0],
            DistanceBucket::Far => [0, 255, 0],
        }
    }
}

impl std::fmt::Display for DistanceBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            DistanceBucket::Near => "near",
            DistanceBucket::Medium => "medium",
            DistanceBucket::Far => "far",
        };
        write!(f, "{name}")
    }
}

/// Limits between the distance buckets, in centimeters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketLimits {
    /// Distances below this are near.
    pub near_cm: f64,
    /// Distances at or above this are far.
    pub far_cm: f64,
}

impl Default for BucketLimits {
    fn default() -> Self {
        Self {
            near_cm: 200.0,
            far_cm: 500.0,
        }
    }
}

impl BucketLimits {
    /// Classify a distance in centimeters.
    pub fn classify(&self, distance_cm: f64) -> DistanceBucket {
        if distance_cm < self.near_cm {
            DistanceBucket::Near
        } else if distance_cm < self.far_cm {
            DistanceBucket::Medium
        } else {
            DistanceBucket::Far
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_limits() {
        let limits = BucketLimits::default();
        assert_eq!(limits.classify(199.9), DistanceBucket::Near);
        assert_eq!(limits.classify(200.0), DistanceBucket::Medium);
        assert_eq!(limits.classify(400.0), DistanceBucket::Medium);
        assert_eq!(limits.classify(500.0), DistanceBucket::Far);
        assert_eq!(DistanceBucket::Medium.to_string(), "medium");
    }
}
