/// Axis aligned box in integer pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    /// Left edge.
    pub x1: i32,
    /// Top edge.
    pub y1: i32,
    /// Right edge.
    pub x2: i32,
    /// Bottom edge.
    pub y2: i32,
}

impl BoundingBox {
    /// Create a box from its corners.
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Center of the box, rounded towards negative infinity.
    pub fn center(&self) -> (i32, i32) {
        ((self.x1 + self.x2).div_euclid(2), (self.y1 + self.y2).div_euclid(2))
    }

    /// Width of the box.
    pub fn width(&self) -> i32 {
        (self.x2 - self.x1).max(0)
    }

    /// Height of the box.
    pub fn height(&self) -> i32 {
        (self.y2 - self.y1).max(0)
    }

    /// Area of the box.
    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0) as i64;
        let iy = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0) as i64;
        let inter = ix * iy;
        let union = self.area() + other.area() - inter;
        if union <= 0 {
            return 0.0;
        }
        inter as f32 / union as f32
    }
}

/// A detected object in one camera frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// The class label of the detected object.
    pub class_id: u32,
    /// The human readable class name.
    pub class_name: String,
    /// The confidence score of the detection, between 0 and 1.
    pub confidence: f32,
    /// The bounding box of the object.
    pub bbox: BoundingBox,
    /// The persistent track identifier, when a tracker assigned one.
    pub track_id: Option<u64>,
}

impl Detection {
    /// Create an untracked detection.
    pub fn new(class_id: u32, class_name: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            class_id,
            class_name: class_name.into(),
            confidence,
            bbox,
            track_id: None,
        }
    }

    /// Center of the bounding box.
    pub fn center(&self) -> (i32, i32) {
        self.bbox.center()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_center_floors() {
        assert_eq!(BoundingBox::new(10, 10, 21, 30).center(), (15, 20));
        assert_eq!(BoundingBox::new(-5, 0, 0, 3).center(), (-3, 1));
    }

    #[test]
    fn test_iou() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let b = BoundingBox::new(5, 0, 15, 10);
        assert_relative_eq!(a.iou(&b), 50.0 / 150.0);
        assert_relative_eq!(a.iou(&a), 1.0);
        assert_eq!(a.iou(&BoundingBox::new(20, 20, 30, 30)), 0.0);
    }
}
