//! Batch scheduling over a stub runner, and the live preview session's
//! debounce behavior.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, mpsc};
use std::time::{Duration, Instant};

use platemark::{
    AspectRatio, AssetProvider, BatchJob, BatchOpts, Dimensions, ExportConfig, IconLayer,
    JobRunner, Layer, MemoryAssetProvider, PlatemarkError, PlatemarkResult, PositionSpec,
    PreviewSession, PreviewUpdate, Scene, SessionOpts, VideoEncoder, run_batch,
};

fn square_scene(side: u32, layers: Vec<Layer>) -> Scene {
    Scene {
        canvas: Dimensions::new(side, side),
        aspect: AspectRatio::SQUARE,
        layers,
    }
}

fn job(name: &str) -> BatchJob {
    BatchJob {
        scene: square_scene(64, vec![]),
        input: PathBuf::from(format!("{name}.mp4")),
        output: PathBuf::from(format!("{name}-out.mp4")),
    }
}

/// Records every config it is handed and fails jobs whose input path
/// contains the marker.
struct RecordingRunner {
    seen: Mutex<Vec<ExportConfig>>,
    fail_marker: &'static str,
}

impl RecordingRunner {
    fn new(fail_marker: &'static str) -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            fail_marker,
        }
    }
}

impl JobRunner for RecordingRunner {
    fn run(&self, batch_job: &BatchJob, cfg: &ExportConfig) -> PlatemarkResult<()> {
        self.seen.lock().unwrap().push(cfg.clone());
        if batch_job.input.to_string_lossy().contains(self.fail_marker) {
            return Err(PlatemarkError::render("simulated encoder failure"));
        }
        Ok(())
    }
}

#[test]
fn failed_jobs_do_not_abort_the_batch() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let jobs = vec![job("a"), job("bad-b"), job("c")];
    let runner = RecordingRunner::new("bad");
    let report = run_batch(&jobs, &runner, &BatchOpts::default()).unwrap();

    assert_eq!(report.outcomes.len(), 3);
    for (i, outcome) in report.outcomes.iter().enumerate() {
        assert_eq!(outcome.index, i);
        assert_eq!(outcome.output, jobs[i].output);
    }
    assert!(report.outcomes[0].succeeded());
    assert!(!report.outcomes[1].succeeded());
    assert!(report.outcomes[2].succeeded());
    assert!(
        report.outcomes[1]
            .error
            .as_deref()
            .unwrap()
            .contains("simulated encoder failure")
    );

    assert_eq!(report.stats.jobs_total, 3);
    assert_eq!(report.stats.succeeded, 2);
    assert_eq!(report.stats.failed, 1);
    assert!(!report.all_succeeded());
    assert_eq!(runner.seen.lock().unwrap().len(), 3);
}

#[test]
fn batch_options_flow_into_every_job_config() {
    let opts = BatchOpts {
        threads: Some(2),
        encoder: VideoEncoder::Libx264,
        assets_root: Some(PathBuf::from("assets")),
        overwrite: false,
    };
    let runner = RecordingRunner::new("fail");
    run_batch(&[job("solo")], &runner, &opts).unwrap();

    let seen = runner.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let cfg = &seen[0];
    assert_eq!(cfg.input, PathBuf::from("solo.mp4"));
    assert_eq!(cfg.output, PathBuf::from("solo-out.mp4"));
    assert_eq!(cfg.encoder, VideoEncoder::Libx264);
    assert_eq!(cfg.assets_root.as_deref(), Some(std::path::Path::new("assets")));
    assert!(!cfg.overwrite);
}

#[test]
fn empty_batch_reports_zero_stats() {
    let runner = RecordingRunner::new("fail");
    let report = run_batch(&[], &runner, &BatchOpts::default()).unwrap();

    assert!(report.outcomes.is_empty());
    assert_eq!(report.stats.jobs_total, 0);
    assert!(report.all_succeeded());
}

fn empty_provider() -> Arc<dyn AssetProvider> {
    Arc::new(MemoryAssetProvider::new())
}

#[test]
fn debounce_collapses_rapid_submissions_to_the_last() {
    let (update_tx, update_rx) = mpsc::channel();
    let session = PreviewSession::spawn(
        empty_provider(),
        empty_provider(),
        SessionOpts {
            debounce: Duration::from_millis(200),
        },
        move |update| {
            let _ = update_tx.send(update);
        },
    );

    session.submit(square_scene(64, vec![]), None);
    session.submit(square_scene(96, vec![]), None);
    session.submit(square_scene(128, vec![]), None);

    let update = update_rx
        .recv_timeout(Duration::from_secs(10))
        .expect("one update after the quiet period");
    match update {
        PreviewUpdate::Frame(frame) => {
            assert_eq!(frame.dimensions(), Dimensions::new(128, 128));
        }
        PreviewUpdate::Failed(e) => panic!("render failed: {e}"),
    }
    assert!(
        update_rx.recv_timeout(Duration::from_millis(100)).is_err(),
        "collapsed submissions must produce a single update"
    );
}

#[test]
fn render_failures_surface_through_the_callback() {
    let (update_tx, update_rx) = mpsc::channel();
    let session = PreviewSession::spawn(
        empty_provider(),
        empty_provider(),
        SessionOpts {
            debounce: Duration::from_millis(10),
        },
        move |update| {
            let _ = update_tx.send(update);
        },
    );

    let broken = square_scene(
        64,
        vec![Layer::Icon(IconLayer {
            asset: "nowhere.png".to_string(),
            width_pct: 40.0,
            height_pct: None,
            x: PositionSpec::CENTERED,
            y: PositionSpec::CENTERED,
        })],
    );
    session.submit(broken, None);

    let update = update_rx
        .recv_timeout(Duration::from_secs(10))
        .expect("failure update");
    match update {
        PreviewUpdate::Failed(e) => assert!(e.contains("asset missing"), "got: {e}"),
        PreviewUpdate::Frame(_) => panic!("render should have failed"),
    }
    drop(session);
}

#[test]
fn shutdown_during_the_debounce_window_drops_the_pending_render() {
    let (update_tx, update_rx) = mpsc::channel();
    let session = PreviewSession::spawn(
        empty_provider(),
        empty_provider(),
        SessionOpts {
            debounce: Duration::from_secs(30),
        },
        move |update| {
            let _ = update_tx.send(update);
        },
    );
    session.submit(square_scene(64, vec![]), None);

    let started = Instant::now();
    drop(session);
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "drop must interrupt the debounce wait"
    );
    assert!(update_rx.try_recv().is_err());
}
