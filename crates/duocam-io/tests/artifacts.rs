use duocam_calib::{
    linalg::{mat33_mul, rodrigues, skew, IDENTITY},
    rectify::init_undistort_rectify_map,
    CalibrationInfo, CameraIntrinsics, CameraMatrix, Distortion, PatternSize, StereoCalibration, StereoGeometry,
};
use approx::assert_relative_eq;
use duocam_io::{CalibrationStore, IoError, LoadedCalibration};

fn calibration() -> Result<StereoCalibration, IoError> {
    let k = CameraMatrix {
        fx: 40.0,
        fy: 41.0,
        cx: 15.5,
        cy: 11.5,
    };
    let dist = Distortion {
        k1: -0.1,
        ..Default::default()
    };
    let mut camera1 = CameraIntrinsics::unrectified(k, dist);
    camera1.maps = Some(init_undistort_rectify_map(
        &k,
        &dist,
        &camera1.rectification,
        &camera1.projection,
        [32, 24].into(),
    )?);
    let mut camera2 = camera1.clone();
    camera2.projection[0][3] = -400.0;

    let rotation = rodrigues(&[0.0, 0.01, 0.0]);
    let translation = [-10.0, 0.0, 0.2];
    Ok(StereoCalibration {
        camera1,
        camera2,
        stereo: StereoGeometry {
            rotation,
            translation,
            essential: mat33_mul(&skew(&translation), &rotation),
            fundamental: IDENTITY,
            disparity_to_depth: [
                [1.0, 0.0, 0.0, -15.5],
                [0.0, 1.0, 0.0, -11.5],
                [0.0, 0.0, 0.0, 40.0],
                [0.0, 0.0, 0.1, 0.0],
            ],
        },
        info: CalibrationInfo {
            camera1_url: "left".to_string(),
            camera2_url: "right".to_string(),
            chessboard_size: PatternSize::new(9, 6)?,
            square_size: 2.5,
            date: "2024-05-01 12:00:00".to_string(),
        },
        rms: 0.31,
    })
}

#[test]
fn test_calibration_survives_a_round_trip() -> Result<(), IoError> {
    let tmp_dir = tempfile::tempdir()?;
    let store = CalibrationStore::new(tmp_dir.path().join("calibration_data.json"));
    let calib = calibration()?;
    store.save(&calib)?;

    match store.load("left", "right")? {
        Some(LoadedCalibration::Stereo(loaded)) => {
            assert_eq!(loaded.stereo, calib.stereo);
            assert_eq!(loaded.info, calib.info);
            assert_eq!(loaded.rms, calib.rms);
            for (a, b) in [(&loaded.camera1, &calib.camera1), (&loaded.camera2, &calib.camera2)] {
                assert_eq!(a.camera_matrix, b.camera_matrix);
                assert_eq!(a.distortion, b.distortion);
                assert_eq!(a.projection, b.projection);
                let (ma, mb) = (a.maps.as_ref().expect("maps"), b.maps.as_ref().expect("maps"));
                for (x, y) in ma.map_x.as_slice().iter().zip(mb.map_x.as_slice()) {
                    assert_relative_eq!(x, y, epsilon = 1e-5);
                }
            }
        }
        other => panic!("unexpected {other:?}"),
    }
    Ok(())
}

#[test]
fn test_calibration_file_has_the_documented_shape() -> Result<(), IoError> {
    let tmp_dir = tempfile::tempdir()?;
    let store = CalibrationStore::new(tmp_dir.path().join("calibration_data.json"));
    store.save(&calibration()?)?;

    let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(store.path())?)?;
    let camera1 = &value["camera1"];
    assert_eq!(camera1["matrix"][0][0], 40.0);
    assert_eq!(camera1["distortion"].as_array().map(|a| a.len()), Some(5));
    assert_eq!(camera1["P"][0].as_array().map(|a| a.len()), Some(4));
    assert_eq!(camera1["mapx"].as_array().map(|a| a.len()), Some(24));
    assert_eq!(camera1["mapx"][0].as_array().map(|a| a.len()), Some(32));
    assert_eq!(value["stereo"]["T"][0][0], -10.0);
    assert_eq!(value["stereo"]["Q"][3][2], 0.1);
    assert_eq!(value["info"]["chessboard_size"][0], 9);
    assert_eq!(value["info"]["camera2_url"], "right");
    assert!(!tmp_dir.path().join("calibration_data.json.tmp").exists());
    Ok(())
}

#[test]
fn test_numpy_style_nesting_is_accepted() -> Result<(), IoError> {
    let tmp_dir = tempfile::tempdir()?;
    let path = tmp_dir.path().join("calibration_data.json");
    let camera = r#"{
        "matrix": [[500, 0, 320], [0, 500, 240], [0, 0, 1]],
        "distortion": [[0.01, 0.0, 0.0, 0.0, 0.0]],
        "R": [[1, 0, 0], [0, 1, 0], [0, 0, 1]],
        "P": [[500, 0, 320, 0], [0, 500, 240, 0], [0, 0, 1, 0]]
    }"#;
    let text = format!(
        r#"{{
            "camera1": {camera},
            "camera2": {camera},
            "stereo": {{
                "R": [[1, 0, 0], [0, 1, 0], [0, 0, 1]],
                "T": [[-10.0], [0.0], [0.0]],
                "E": [[0, 0, 0], [0, 0, 10], [0, -10, 0]],
                "F": [[0, 0, 0], [0, 0, 1], [0, -1, 0]],
                "Q": [[1, 0, 0, -320], [0, 1, 0, -240], [0, 0, 0, 500], [0, 0, 0.1, 0]]
            }},
            "info": {{"camera1_url": "a", "camera2_url": "b", "chessboard_size": [9, 6], "square_size": 2.5, "date": ""}}
        }}"#
    );
    std::fs::write(&path, text)?;

    let loaded = CalibrationStore::new(&path).load("a", "b")?.expect("calibration");
    let stereo = loaded.stereo().expect("stereo geometry");
    assert_eq!(stereo.stereo.translation, [-10.0, 0.0, 0.0]);
    assert_eq!(loaded.camera1().distortion.k1, 0.01);
    // maps are absent and regenerated on demand
    assert!(loaded.camera1().maps.is_none());
    let maps = loaded.camera1().maps_for([64, 48].into())?;
    assert_eq!(maps.size().width, 64);
    Ok(())
}
