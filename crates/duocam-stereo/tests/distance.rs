use duocam_image::Image;
use duocam_stereo::{
    BoundingBox, Detection, Detector, DistanceBucket, MeasurementPipeline, StereoError, StereoMatcher,
};

fn boxed(dets: Vec<Detection>) -> Box<dyn Detector> {
    Box::new(move |_: &Image<u8, 3>| -> Result<Vec<Detection>, StereoError> { Ok(dets.clone()) })
}

#[test]
fn test_person_at_four_meters_is_medium() -> Result<(), StereoError> {
    let matcher = StereoMatcher::new(10.0, 800.0)?;
    let cam1 = vec![Detection::new(0, "person", 0.95, BoundingBox::new(300, 100, 340, 300))];
    let cam2 = vec![Detection::new(0, "person", 0.90, BoundingBox::new(280, 100, 320, 300))];
    let mut pipeline = MeasurementPipeline::new(boxed(cam1), boxed(cam2), matcher);

    let mut frame1 = Image::<u8, 3>::from_size_val([640, 480].into(), 30)?;
    let mut frame2 = frame1.clone();
    let result = pipeline.process(&mut frame1, &mut frame2, 0.04)?;

    let pair = &result.matches.pairs[0];
    assert_eq!(pair.cam1.center().0, 320);
    assert_eq!(pair.cam2.center().0, 300);
    assert_eq!(pair.disparity_px, 20.0);
    assert_eq!(pair.distance_cm, 400.0);
    assert_eq!(result.annotations.camera1[0].bucket, Some(DistanceBucket::Medium));
    assert_eq!(result.annotations.camera1[0].label, "person 4.00m");
    Ok(())
}

#[test]
fn test_different_classes_at_the_same_place_stay_unmatched() -> Result<(), StereoError> {
    let matcher = StereoMatcher::new(10.0, 800.0)?;
    let bbox = BoundingBox::new(300, 100, 340, 300);
    let cam1 = vec![Detection::new(2, "car", 0.9, bbox)];
    let cam2 = vec![
        Detection::new(7, "truck", 0.9, bbox),
        Detection::new(7, "truck", 0.9, BoundingBox::new(200, 100, 240, 300)),
    ];
    let matches = matcher.match_detections(&cam1, &cam2);
    assert!(matches.pairs.is_empty());
    assert_eq!(matches.unmatched1.len(), 1);
    assert_eq!(matches.unmatched2.len(), 2);
    Ok(())
}

#[test]
fn test_second_camera_detection_can_be_claimed_twice() -> Result<(), StereoError> {
    let matcher = StereoMatcher::new(12.0, 700.0)?;
    let cam1 = vec![
        Detection::new(0, "person", 0.9, BoundingBox::new(400, 100, 440, 300)),
        Detection::new(0, "person", 0.7, BoundingBox::new(500, 100, 540, 300)),
    ];
    let cam2 = vec![Detection::new(0, "person", 0.8, BoundingBox::new(300, 100, 340, 300))];
    let matches = matcher.match_detections(&cam1, &cam2);
    assert_eq!(matches.pairs.len(), 2);
    assert!(matches.pairs.iter().all(|p| p.cam2 == cam2[0]));
    assert!(matches.pairs[0].distance_cm > matches.pairs[1].distance_cm);
    Ok(())
}
