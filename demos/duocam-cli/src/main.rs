use argh::FromArgs;
use std::path::PathBuf;
use std::sync::Arc;

use duocam::calib::{
    linalg::{mat33_mul, mat33_mul_vec3, rodrigues},
    pattern::render_chessboard_view,
    CameraMatrix, Distortion, PatternSize,
};
use duocam::image::{Image, ImageSize};
use duocam::io::{functional as F, load_camera_list, FileSourceOpener, ReplayDetector};
use duocam::preflight::preflight;
use duocam::session::{CalibrationJob, MeasureJob, MonitorJob, SyncJob};
use duocam::stereo::Detector;
use duocam::{AppConfig, Worker, WorkerError, WorkerEvent};

#[derive(FromArgs)]
/// Calibrate, synchronize and measure distances with two cameras
struct Args {
    /// path to the settings file
    #[argh(option, short = 'c', default = "PathBuf::from(\"duocam.json\")")]
    config: PathBuf,

    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Calibrate(CalibrateArgs),
    Sync(SyncArgs),
    Monitor(MonitorArgs),
    Measure(MeasureArgs),
    Cameras(CamerasArgs),
    Synth(SynthArgs),
}

#[derive(FromArgs)]
/// Calibrate the rig from chessboard views
#[argh(subcommand, name = "calibrate")]
struct CalibrateArgs {
    /// the first camera
    #[argh(positional)]
    camera1: String,

    /// the second camera
    #[argh(positional)]
    camera2: String,
}

#[derive(FromArgs)]
/// Measure the time difference between the cameras with a flash
#[argh(subcommand, name = "sync")]
struct SyncArgs {
    /// the first camera
    #[argh(positional)]
    camera1: String,

    /// the second camera
    #[argh(positional)]
    camera2: String,
}

#[derive(FromArgs)]
/// Measure the frame drift between the cameras after a flash
#[argh(subcommand, name = "monitor")]
struct MonitorArgs {
    /// the first camera
    #[argh(positional)]
    camera1: String,

    /// the second camera
    #[argh(positional)]
    camera2: String,

    /// stop after this many seconds
    #[argh(option, short = 'd')]
    duration: Option<f64>,
}

#[derive(FromArgs)]
/// Detect objects in both cameras and estimate their distance
#[argh(subcommand, name = "measure")]
struct MeasureArgs {
    /// the first camera
    #[argh(positional)]
    camera1: String,

    /// the second camera
    #[argh(positional)]
    camera2: String,

    /// recorded detections of the first camera
    #[argh(option)]
    detections1: Option<PathBuf>,

    /// recorded detections of the second camera
    #[argh(option)]
    detections2: Option<PathBuf>,

    /// directory receiving the annotated frames
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,

    /// stop after this many frame pairs
    #[argh(option, short = 'n')]
    max_frames: Option<u64>,

    /// start even without calibration or synchronization
    #[argh(switch, short = 'f')]
    force: bool,
}

#[derive(FromArgs)]
/// List the cameras of the camera list
#[argh(subcommand, name = "cameras")]
struct CamerasArgs {}

#[derive(FromArgs)]
/// Write synthetic camera sequences to try the other commands
#[argh(subcommand, name = "synth")]
struct SynthArgs {
    /// output directory, receiving cam1/ and cam2/
    #[argh(option, short = 'o')]
    output: PathBuf,

    /// write a flash sequence instead of chessboard views
    #[argh(switch)]
    flash: bool,

    /// number of frames per camera
    #[argh(option, default = "20")]
    frames: usize,
}

/// Forward the worker events to the terminal until it ends.
fn run_worker<U: Send + 'static, R: Send + 'static>(
    worker: Worker<U, R>,
    mut on_update: impl FnMut(U),
) -> Result<R, Box<dyn std::error::Error>> {
    let stop = worker.stop_handle();
    ctrlc::set_handler(move || {
        println!("Received Ctrl-C signal. Stopping the session.");
        stop.stop();
    })?;

    let result = worker.wait(|event| match event {
        WorkerEvent::Status(status) => println!("{status}"),
        WorkerEvent::Progress(p) => log::debug!("progress {:.0}%", p * 100.0),
        WorkerEvent::Update(update) => on_update(update),
        WorkerEvent::Finished(_) | WorkerEvent::Failed(_) => {}
    });
    Ok(result?)
}

fn replay_detector(path: Option<PathBuf>) -> Result<Box<dyn Detector>, WorkerError> {
    match path {
        Some(path) => Ok(Box::new(ReplayDetector::from_file(path)?)),
        None => {
            log::warn!("no recorded detections, nothing will be measured");
            Ok(Box::new(ReplayDetector::new(Vec::new())))
        }
    }
}

fn measure(config: &AppConfig, args: MeasureArgs) -> Result<(), Box<dyn std::error::Error>> {
    let warnings = preflight(config, &args.camera1, &args.camera2)?;
    if !warnings.is_empty() && !args.force {
        for warning in &warnings {
            println!("warning: {warning}");
        }
        return Err("pass --force to measure anyway".into());
    }

    let detectors = (
        replay_detector(args.detections1.or_else(|| config.detection.detections1.clone()))?,
        replay_detector(args.detections2.or_else(|| config.detection.detections2.clone()))?,
    );
    let mut job = MeasureJob::from_config(
        config,
        args.camera1,
        args.camera2,
        detectors,
        Arc::new(FileSourceOpener),
    )?;
    if let Some(n) = args.max_frames {
        job = job.with_max_frames(n);
    }
    if let Some(dir) = &args.output {
        std::fs::create_dir_all(dir)?;
    }

    let summary = run_worker(job.spawn()?, |frame| {
        let info = &frame.result.info;
        for pair in &frame.result.matches.pairs {
            println!(
                "frame {:>5} {:>8.2}s  {} {:.2}m (confidence {:.2})",
                info.frame_count,
                info.timestamp,
                pair.cam1.class_name,
                pair.distance_m(),
                pair.confidence
            );
        }
        if let Some(dir) = &args.output {
            let name = format!("{:06}", info.frame_count);
            let written = F::write_image(dir.join(format!("{name}_cam1.png")), &frame.frame1)
                .and_then(|_| F::write_image(dir.join(format!("{name}_cam2.png")), &frame.frame2));
            if let Err(e) = written {
                log::error!("failed to write frame {name}: {e}");
            }
        }
    })?;
    println!(
        "{} frame pairs, {} matches, {} frames skipped, {:.1} fps",
        summary.frames, summary.matched_pairs, summary.skipped, summary.fps
    );
    Ok(())
}

fn synth(config: &AppConfig, args: SynthArgs) -> Result<(), Box<dyn std::error::Error>> {
    let size = ImageSize {
        width: 640,
        height: 480,
    };
    let (dir1, dir2) = (args.output.join("cam1"), args.output.join("cam2"));
    std::fs::create_dir_all(&dir1)?;
    std::fs::create_dir_all(&dir2)?;

    if args.flash {
        let (flash1, flash2) = (args.frames / 3, args.frames / 3 + 2);
        for i in 0..args.frames {
            let value = |at: usize| if (at..at + 2).contains(&i) { 250 } else { 30 };
            F::write_image(dir1.join(format!("{i:04}.png")), &Image::<u8, 1>::from_size_val(size, value(flash1))?)?;
            F::write_image(dir2.join(format!("{i:04}.png")), &Image::<u8, 1>::from_size_val(size, value(flash2))?)?;
        }
    } else {
        let c = &config.calibration;
        let pattern = PatternSize::new(c.chessboard_cols, c.chessboard_rows)?;
        let square = c.square_size;
        let k = CameraMatrix {
            fx: 600.0,
            fy: 600.0,
            cx: 320.0,
            cy: 240.0,
        };
        let dist = Distortion::default();
        let r_rel = rodrigues(&[0.0, 0.01, 0.0]);
        let center = [
            0.5 * square * (pattern.cols - 1) as f64,
            0.5 * square * (pattern.rows - 1) as f64,
            0.0,
        ];
        // a board about four times its width away, tilted differently in every view
        let depth = 4.0 * square * (pattern.cols + 1) as f64;
        for i in 0..args.frames {
            let a = i as f64 * 0.9;
            let r1 = rodrigues(&[0.25 * a.sin(), 0.25 * a.cos(), 0.05 * (2.0 * a).sin()]);
            let rc = mat33_mul_vec3(&r1, &center);
            let t1 = [2.0 * square - rc[0], -rc[1], depth * (1.0 + 0.1 * a.cos()) - rc[2]];
            let r2 = mat33_mul(&r_rel, &r1);
            let rt = mat33_mul_vec3(&r_rel, &t1);
            let t2 = [rt[0] - 4.0 * square, rt[1], rt[2]];
            F::write_image(
                dir1.join(format!("{i:04}.png")),
                &render_chessboard_view(&pattern, square, &k, &dist, &r1, &t1, size)?,
            )?;
            F::write_image(
                dir2.join(format!("{i:04}.png")),
                &render_chessboard_view(&pattern, square, &k, &dist, &r2, &t2, size)?,
            )?;
        }
    }
    println!("wrote {} frames to {} and {}", args.frames, dir1.display(), dir2.display());
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();
    let config = AppConfig::load(&args.config);
    let opener = Arc::new(FileSourceOpener);

    match args.command {
        Command::Calibrate(a) => {
            let job = CalibrationJob::from_config(&config, a.camera1, a.camera2, opener)?;
            let summary = run_worker(job.spawn()?, |_| {})?;
            println!(
                "rms {:.3} px, focal length {:.1} px, baseline {:.2}",
                summary.rms, summary.focal_length_px, summary.baseline
            );
        }
        Command::Sync(a) => {
            let job = SyncJob::from_config(&config, a.camera1, a.camera2, opener);
            let record = run_worker(job.spawn()?, |state| log::debug!("sync state {state:?}"))?;
            println!("time difference {:.6}s", record.time_diff);
        }
        Command::Monitor(a) => {
            let mut job = MonitorJob::from_config(&config, a.camera1, a.camera2, opener);
            if let Some(d) = a.duration {
                job = job.with_duration(d);
            }
            let summary = run_worker(job.spawn()?, |_| {})?;
            println!("drift rate {:.3} frames/s", summary.drift_rate);
        }
        Command::Measure(a) => measure(&config, a)?,
        Command::Cameras(_) => match load_camera_list(&config.paths.camera_list)? {
            Some(cameras) => {
                for camera in cameras {
                    println!("{:<20} {}", camera.name, camera.url);
                }
            }
            None => println!("no camera list at {}", config.paths.camera_list.display()),
        },
        Command::Synth(a) => synth(&config, a)?,
    }

    Ok(())
}
