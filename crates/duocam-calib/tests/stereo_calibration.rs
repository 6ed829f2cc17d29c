use duocam_calib::{
    camera::project_point,
    linalg::{mat33_mul, mat33_mul_vec3, rodrigues, Mat33, Vec3},
    pattern::render_chessboard_view,
    CalibError, CalibrationSettings, CameraMatrix, Distortion, GeometryCalibrator, PatternSize,
    SampleOutcome,
};
use duocam_image::{Image, ImageSize};

const SIZE: ImageSize = ImageSize {
    width: 320,
    height: 240,
};

fn camera() -> CameraMatrix {
    CameraMatrix {
        fx: 300.0,
        fy: 300.0,
        cx: 160.0,
        cy: 120.0,
    }
}

/// Rig with the second camera 60 units to the right of the first one.
fn rig() -> (Mat33, Vec3) {
    (rodrigues(&[0.0, 0.01, 0.0]), [-60.0, 0.0, 0.0])
}

/// Board poses keeping the board centered between both cameras.
fn board_poses(pattern: &PatternSize, square: f64) -> Vec<(Mat33, Vec3)> {
    let center = [
        0.5 * square * (pattern.cols - 1) as f64,
        0.5 * square * (pattern.rows - 1) as f64,
        0.0,
    ];
    let views: [([f64; 3], f64); 8] = [
        ([0.2, 0.0, 0.0], 380.0),
        ([-0.2, 0.0, 0.0], 360.0),
        ([0.0, 0.25, 0.0], 400.0),
        ([0.0, -0.25, 0.0], 370.0),
        ([0.15, 0.15, 0.1], 390.0),
        ([-0.15, 0.2, -0.1], 410.0),
        ([0.1, -0.2, 0.05], 350.0),
        ([0.25, 0.1, 0.0], 420.0),
    ];
    views
        .iter()
        .map(|(rv, z)| {
            let r = rodrigues(rv);
            let rc = mat33_mul_vec3(&r, &center);
            (r, [30.0 - rc[0], -rc[1], z - rc[2]])
        })
        .collect()
}

fn render_pair(
    pattern: &PatternSize,
    square: f64,
    pose: &(Mat33, Vec3),
) -> Result<(Image<u8, 1>, Image<u8, 1>), CalibError> {
    let k = camera();
    let dist = Distortion::default();
    let (r_rel, t_rel) = rig();
    let (r1, t1) = pose;
    let r2 = mat33_mul(&r_rel, r1);
    let rt = mat33_mul_vec3(&r_rel, t1);
    let t2 = [rt[0] + t_rel[0], rt[1] + t_rel[1], rt[2] + t_rel[2]];
    Ok((
        render_chessboard_view(pattern, square, &k, &dist, r1, t1, SIZE)?,
        render_chessboard_view(pattern, square, &k, &dist, &r2, &t2, SIZE)?,
    ))
}

#[test]
fn test_calibrate_synthetic_rig() -> Result<(), CalibError> {
    let pattern = PatternSize::new(7, 5)?;
    let square = 25.0;
    let poses = board_poses(&pattern, square);
    let mut calibrator = GeometryCalibrator::new(CalibrationSettings::new(pattern, square, poses.len()));

    for pose in &poses {
        let (frame1, frame2) = render_pair(&pattern, square, pose)?;
        let outcome = calibrator.add_sample(&frame1, &frame2)?;
        assert!(matches!(outcome, SampleOutcome::Accepted { .. }), "{outcome:?}");
    }
    assert!(calibrator.is_complete());
    assert_eq!(calibrator.progress(), 1.0);

    let calib = calibrator.calibrate("cam1", "cam2", "2024-05-01 12:00:00")?;
    assert!(calib.rms < 0.5, "rms {}", calib.rms);

    let k1 = calib.camera1.camera_matrix;
    assert!((k1.fx - 300.0).abs() < 6.0, "fx {}", k1.fx);
    assert!((k1.cx - 160.0).abs() < 6.0, "cx {}", k1.cx);

    let t = calib.stereo.translation;
    assert!((t[0] + 60.0).abs() < 2.0, "T {t:?}");
    assert!(t[1].abs() < 2.0 && t[2].abs() < 3.0, "T {t:?}");

    let maps = calib.camera1.maps.as_ref().expect("maps are generated");
    assert_eq!(maps.size(), SIZE);
    assert_eq!(calib.info.chessboard_size, pattern);
    assert_eq!(calib.info.camera2_url, "cam2");

    // a point seen by both rectified cameras lands on the same row
    let pw = [10.0, 20.0, 400.0];
    let (r_rel, t_rel) = rig();
    let rp = mat33_mul_vec3(&r_rel, &pw);
    let p2 = [rp[0] + t_rel[0], rp[1] + t_rel[1], rp[2] + t_rel[2]];
    let p1 = calib.camera1.projection;
    let kr = CameraMatrix {
        fx: p1[0][0],
        fy: p1[1][1],
        cx: p1[0][2],
        cy: p1[1][2],
    };
    let none = Distortion::default();
    let uv1 = project_point(&kr, &none, &calib.camera1.rectification, &[0.0; 3], &pw);
    let uv2 = project_point(&kr, &none, &calib.camera2.rectification, &[0.0; 3], &p2);
    assert!((uv1[1] - uv2[1]).abs() < 1.0, "rows {} vs {}", uv1[1], uv2[1]);
    Ok(())
}

#[test]
fn test_partial_collection_is_insufficient() -> Result<(), CalibError> {
    let pattern = PatternSize::new(7, 5)?;
    let square = 25.0;
    let poses = board_poses(&pattern, square);
    let mut calibrator = GeometryCalibrator::new(CalibrationSettings::new(pattern, square, 15));

    for pose in poses.iter().take(3) {
        let (frame1, frame2) = render_pair(&pattern, square, pose)?;
        calibrator.add_sample(&frame1, &frame2)?;
    }
    assert_eq!(calibrator.collected(), 3);
    assert!(matches!(
        calibrator.calibrate("cam1", "cam2", "2024-05-01 12:00:00"),
        Err(CalibError::InsufficientCalibrationData {
            collected: 3,
            required: 15
        })
    ));
    Ok(())
}

#[test]
fn test_board_in_one_camera_only_is_rejected() -> Result<(), CalibError> {
    let pattern = PatternSize::new(7, 5)?;
    let square = 25.0;
    let poses = board_poses(&pattern, square);
    let mut calibrator = GeometryCalibrator::new(CalibrationSettings::new(pattern, square, 15));

    let (frame1, _) = render_pair(&pattern, square, &poses[0])?;
    let empty = Image::<u8, 1>::from_size_val(SIZE, 128)?;
    let outcome = calibrator.add_sample(&frame1, &empty)?;
    assert_eq!(
        outcome,
        SampleOutcome::Rejected {
            found1: true,
            found2: false
        }
    );
    assert_eq!(calibrator.collected(), 0);
    Ok(())
}
