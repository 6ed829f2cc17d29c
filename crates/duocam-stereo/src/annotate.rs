use duocam_image::Image;
use duocam_imgproc::draw::{draw_filled_rect, draw_rect};

use crate::bucket::{BucketLimits, DistanceBucket};
use crate::detection::{BoundingBox, Detection};
use crate::matcher::StereoMatches;

/// Colour of detections without a partner in the other camera.
pub const UNMATCHED_COLOR: [u8; 3] = [128, 128, 128];

/// One box drawn on a frame, with the text that goes with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// The annotated box.
    pub bbox: BoundingBox,
    /// RGB colour of the box.
    pub color: [u8; 3],
    /// Label text, e.g. `person 4.00m`.
    pub label: String,
    /// Distance bucket of matched detections.
    pub bucket: Option<DistanceBucket>,
}

/// Annotations produced for both frames of a pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotations {
    /// Annotations of the first camera frame.
    pub camera1: Vec<Annotation>,
    /// Annotations of the second camera frame.
    pub camera2: Vec<Annotation>,
}

/// Renders matching results onto the frames.
pub trait Annotator: Send {
    /// Annotate both frames with the matching result.
    ///
    /// # Arguments
    ///
    /// * `frame1` - The first camera frame, modified in place.
    /// * `frame2` - The second camera frame, modified in place.
    /// * `matches` - The result of the matcher for this pair.
    fn annotate(
        &self,
        frame1: &mut Image<u8, 3>,
        frame2: &mut Image<u8, 3>,
        matches: &StereoMatches,
    ) -> Annotations;
}

/// Draws box outlines coloured by distance bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxAnnotator {
    /// Limits of the distance buckets.
    pub limits: BucketLimits,
    /// Outline thickness in pixels.
    pub thickness: usize,
    /// Height of the label strip above each box, zero to disable.
    pub label_height: usize,
}

impl Default for BoxAnnotator {
    fn default() -> Self {
        Self {
            limits: BucketLimits::default(),
            thickness: 2,
            label_height: 6,
        }
    }
}

impl BoxAnnotator {
    /// Build the annotations of a matching result without drawing anything.
    pub fn annotations(&self, matches: &StereoMatches) -> Annotations {
        let mut out = Annotations::default();
        for pair in &matches.pairs {
            let bucket = self.limits.classify(pair.distance_cm);
            for (det, side) in [(&pair.cam1, &mut out.camera1), (&pair.cam2, &mut out.camera2)] {
                side.push(Annotation {
                    bbox: det.bbox,
                    color: bucket.color(),
                    label: format!("{} {:.2}m", det.class_name, pair.distance_m()),
                    bucket: Some(bucket),
                });
            }
        }
        out.camera1.extend(matches.unmatched1.iter().map(unmatched));
        out.camera2.extend(matches.unmatched2.iter().map(unmatched));
        out
    }

    fn draw(&self, frame: &mut Image<u8, 3>, annotations: &[Annotation]) {
        for a in annotations {
            let (x1, y1, x2, y2) = (a.bbox.x1 as i64, a.bbox.y1 as i64, a.bbox.x2 as i64, a.bbox.y2 as i64);
            draw_rect(frame, (x1, y1), (x2, y2), a.color, self.thickness);
            if self.label_height > 0 {
                draw_filled_rect(frame, (x1, y1 - self.label_height as i64), (x2 + 1, y1), a.color);
            }
        }
    }
}

fn unmatched(det: &Detection) -> Annotation {
    Annotation {
        bbox: det.bbox,
        color: UNMATCHED_COLOR,
        label: format!("{} (no match)", det.class_name),
        bucket: None,
    }
}

impl Annotator for BoxAnnotator {
    fn annotate(
        &self,
        frame1: &mut Image<u8, 3>,
        frame2: &mut Image<u8, 3>,
        matches: &StereoMatches,
    ) -> Annotations {
        let annotations = self.annotations(matches);
        self.draw(frame1, &annotations.camera1);
        self.draw(frame2, &annotations.camera2);
        annotations
    }
}
