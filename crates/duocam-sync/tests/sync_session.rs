use duocam_image::{Image, ImageError};
use duocam_sync::{
    CameraId, DriftSynchronizer, FrameAligner, SyncError, SyncRecord, SyncSettings, SyncState,
};

fn frame(value: u8) -> Result<Image<u8, 3>, ImageError> {
    Image::from_size_val([80, 60].into(), value)
}

#[test]
fn test_flash_pair_produces_record() -> Result<(), SyncError> {
    let mut sync = DriftSynchronizer::new(SyncSettings::default(), 9.9);
    let schedule = [
        (10.0, 255, 15),
        (10.05, 255, 15),
        (10.10, 15, 15),
        (10.15, 15, 255),
    ];
    for (now, v1, v2) in schedule {
        sync.process_pair(&frame(v1)?, &frame(v2)?, now)?;
    }
    assert_eq!(sync.state(), SyncState::BothSeen);
    assert_eq!(sync.flash_time(CameraId::First), Some(10.0));

    let outcome = sync.outcome()?;
    let record = SyncRecord::new(
        "cam1",
        "cam2",
        outcome.flash1_time,
        outcome.flash2_time,
        "2024-05-01 12:00:00",
    );
    assert!((record.time_diff - 0.15).abs() < 1e-9);

    // a record without drift keeps the streams untouched
    let mut aligner = FrameAligner::from_record(Some(&record));
    assert_eq!(aligner.frames_to_skip(120.0), None);

    let mut aligner = FrameAligner::from_record(Some(&record.with_drift_rate(0.25)));
    let skip = aligner.frames_to_skip(8.0).expect("frames to skip");
    assert_eq!(skip.camera, CameraId::Second);
    assert_eq!(skip.count, 2);
    Ok(())
}

#[test]
fn test_no_flash_times_out() -> Result<(), SyncError> {
    let settings = SyncSettings {
        max_wait: 5.0,
        ..Default::default()
    };
    let mut sync = DriftSynchronizer::new(settings, 0.0);
    let dark = frame(10)?;
    let mut now = 0.0;
    while sync.process_pair(&dark, &dark, now)? != SyncState::TimedOut {
        now += 0.25;
        assert!(now < 10.0, "session never timed out");
    }
    assert!(matches!(sync.outcome(), Err(SyncError::SyncTimeout { .. })));
    Ok(())
}
