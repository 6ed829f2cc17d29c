use crate::detection::Detection;

/// Assigns persistent identities to the detections of one camera.
pub trait Tracker: Send {
    /// Update the tracker with the detections of the next frame.
    ///
    /// Returns the detections with their `track_id` filled in.
    fn update(&mut self, detections: Vec<Detection>) -> Vec<Detection>;

    /// Forget every track.
    fn reset(&mut self) {}
}

/// A tracker that leaves detections untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughTracker;

impl Tracker for PassthroughTracker {
    fn update(&mut self, detections: Vec<Detection>) -> Vec<Detection> {
        detections
    }
}

/// Greedy frame to frame tracker on box overlap.
///
/// Each detection takes the identity of the most overlapping track of the same
/// class from the previous frame, provided the overlap reaches the threshold
/// and no earlier detection claimed that track. Other detections open a new
/// track.
#[derive(Debug, Clone)]
pub struct IouTracker {
    iou_threshold: f32,
    next_id: u64,
    tracks: Vec<Detection>,
}

impl Default for IouTracker {
    fn default() -> Self {
        Self::new(0.3)
    }
}

impl IouTracker {
    /// Create a tracker with the given minimum overlap.
    pub fn new(iou_threshold: f32) -> Self {
        Self {
            iou_threshold,
            next_id: 0,
            tracks: Vec::new(),
        }
    }

    /// Number of tracks alive after the last update.
    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }
}

impl Tracker for IouTracker {
    fn update(&mut self, mut detections: Vec<Detection>) -> Vec<Detection> {
        let mut claimed = vec![false; self.tracks.len()];
        for det in detections.iter_mut() {
            let best = self
                .tracks
                .iter()
                .enumerate()
                .filter(|(i, t)| !claimed[*i] && t.class_id == det.class_id)
                .map(|(i, t)| (i, t.bbox.iou(&det.bbox)))
                .filter(|(_, iou)| *iou >= self.iou_threshold)
                .fold(None, |acc: Option<(usize, f32)>, cur| match acc {
                    Some(a) if a.1 >= cur.1 => Some(a),
                    _ => Some(cur),
                });

            det.track_id = match best.and_then(|(i, _)| {
                claimed[i] = true;
                self.tracks[i].track_id
            }) {
                Some(id) => Some(id),
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    Some(id)
                }
            };
        }
        self.tracks = detections.clone();
        detections
    }

    fn reset(&mut self) {
        self.tracks.clear();
        self.next_id = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BoundingBox;

    fn det(class_id: u32, x: i32) -> Detection {
        Detection::new(class_id, "obj", 0.9, BoundingBox::new(x, 0, x + 20, 20))
    }

    #[test]
    fn test_passthrough() {
        let out = PassthroughTracker.update(vec![det(0, 0)]);
        assert_eq!(out[0].track_id, None);
    }

    #[test]
    fn test_iou_tracker_keeps_identity() {
        let mut tracker = IouTracker::default();
        let first = tracker.update(vec![det(0, 0), det(0, 100)]);
        assert_eq!(first[0].track_id, Some(0));
        assert_eq!(first[1].track_id, Some(1));

        // both boxes moved slightly, listed in the other order
        let second = tracker.update(vec![det(0, 103), det(0, 2)]);
        assert_eq!(second[0].track_id, Some(1));
        assert_eq!(second[1].track_id, Some(0));

        // a box of another class at the same place opens a new track
        let third = tracker.update(vec![det(5, 103)]);
        assert_eq!(third[0].track_id, Some(2));
        assert_eq!(tracker.num_tracks(), 1);

        tracker.reset();
        assert_eq!(tracker.update(vec![det(0, 0)])[0].track_id, Some(0));
    }

    #[test]
    fn test_iou_tracker_one_track_per_detection() {
        let mut tracker = IouTracker::default();
        tracker.update(vec![det(0, 0)]);
        let out = tracker.update(vec![det(0, 1), det(0, 2)]);
        assert_eq!(out[0].track_id, Some(0));
        assert_eq!(out[1].track_id, Some(1));
    }
}
