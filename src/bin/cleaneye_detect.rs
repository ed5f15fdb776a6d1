//! cleaneye_detect - run the garbage detector and record events
//!
//! Frames come from a still image, a directory of exported video frames, or the
//! synthetic `stub://` source. Every detection is appended to
//! `<output>/logs/live_detections.jsonl` and folded into the live snapshot at
//! `<output>/logs/live_summary.json` that `cleaneye_dashboard` polls.

use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cleaneye::annotate::{annotate, save_image, timestamped_name};
use cleaneye::report::write_report;
use cleaneye::{
    BackendRegistry, DetectionRecorder, DetectionRun, DetectorConfig, DirectorySource,
    FileEventStore, FrameAdapter, FrameSource, ImageSource, RunOptions, SnapshotPolicy,
    ReportInput, SyntheticSource,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about = "Detect garbage in frames and record live events")]
struct Args {
    #[command(subcommand)]
    mode: Mode,
    /// ONNX model path (tract backend).
    #[arg(long, global = true)]
    model: Option<PathBuf>,
    /// Confidence threshold in (0, 1].
    #[arg(long, global = true)]
    conf: Option<f32>,
    /// Detector backend (stub, tract).
    #[arg(long, global = true)]
    backend: Option<String>,
    /// Root directory for logs and saved frames.
    #[arg(long, global = true, value_name = "DIR")]
    output_dir: Option<PathBuf>,
    /// Save raw frames that contain detections.
    #[arg(long, global = true)]
    auto_save: bool,
    /// Snapshot rewrite policy (every_event|per_frame).
    #[arg(long, global = true, value_name = "POLICY")]
    snapshot_policy: Option<String>,
    /// Seed for the stub backend and the simulated location.
    #[arg(long, global = true)]
    seed: Option<u64>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, global = true, default_value = "auto", value_name = "MODE")]
    ui: String,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Detect in a single image and write an annotated copy.
    Image {
        path: PathBuf,
        /// Also write a before/after report under <output>/reports/<id>/.
        #[arg(long)]
        report: bool,
    },
    /// Detect in every JPEG/PNG of a directory, in file-name order.
    Frames { dir: PathBuf },
    /// Detect in synthetic frames.
    Stub {
        /// Stop after this many frames (runs until Ctrl-C when omitted).
        #[arg(long)]
        frames: Option<u64>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let cfg = {
        let _stage = ui.stage("Load configuration");
        let mut cfg = DetectorConfig::load()?;
        apply_args(&mut cfg, &args)?;
        cfg.validate()?;
        cfg
    };

    let backend = {
        let _stage = ui.stage("Load detector");
        let registry = BackendRegistry::with_builtin();
        let mut backend = registry.build(&cfg.model.backend, &cfg.backend_options(args.seed))?;
        backend.warm_up()?;
        backend
    };

    let mut recorder = {
        let _stage = ui.stage("Open output directory");
        let store = FileEventStore::open(&cfg.output)?;
        log::info!("event log: {}", store.log().path().display());
        log::info!("live snapshot: {}", store.snapshot_path().display());
        DetectionRecorder::new(store, cfg.snapshot_policy)
    };

    let mut source: Box<dyn FrameSource> = match &args.mode {
        Mode::Image { path, .. } => Box::new(ImageSource::new(path)?),
        Mode::Frames { dir } => Box::new(DirectorySource::new(dir)?),
        Mode::Stub { frames } => Box::new(SyntheticSource::new("stub://booth", *frames)?),
    };
    {
        let _stage = ui.stage("Open frame source");
        source.connect()?;
    }

    let adapter = FrameAdapter::new(
        source.source_id(),
        cfg.labels.clone(),
        cfg.location.locator(args.seed),
    );
    let options = RunOptions {
        confidence: cfg.model.confidence,
        auto_save_dir: cfg.auto_save.then(|| cfg.output.auto_save_dir()),
    };
    let mut run = DetectionRun::new(backend, adapter, options);

    if let Mode::Image { path, report } = &args.mode {
        let _stage = ui.stage("Detect");
        let frame = source
            .next_frame()?
            .ok_or_else(|| anyhow!("image source produced no frame"))?;
        let outcome = run.process_frame(&frame, &mut recorder)?;
        let annotated = annotate(&frame, &outcome.detections, run.class_names());
        let out_path = cfg
            .output
            .root()
            .join(timestamped_name("image_detection", Utc::now(), false));
        save_image(&annotated, &out_path)?;

        println!("Detections: {}", outcome.detections.len());
        for det in &outcome.detections {
            let raw = run.class_names().label_for(det.class_id);
            println!(
                "  {:<14} {:>5.1}%  [{:.0}, {:.0}, {:.0}, {:.0}]",
                cfg.labels.friendly_label(&raw),
                det.confidence * 100.0,
                det.bbox.x1,
                det.bbox.y1,
                det.bbox.x2,
                det.bbox.y2
            );
        }
        println!("Inference: {:.1} ms", outcome.inference_ms);
        println!("Annotated image: {}", out_path.display());

        if *report {
            let input = ReportInput {
                image_path: path,
                frame: &frame,
                detections: &outcome.detections,
                names: run.class_names(),
                labels: &cfg.labels,
                confidence_threshold: cfg.model.confidence,
                model_path: &cfg.model.path,
                backend: &cfg.model.backend,
            };
            let written = write_report(
                &cfg.output.reports_dir(),
                &input,
                Utc::now(),
                &mut rand::thread_rng(),
            )?;
            print!("\n{}", written.report.render_text());
            println!("Report JSON: {}", written.json_path.display());
            println!("Report text: {}", written.text_path.display());
        }
        return Ok(());
    }

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let stats = {
        let progress = ui.frames(source.frame_count_hint());
        run.run(source.as_mut(), &mut recorder, &stop, |outcome| {
            progress.advance(outcome.events_recorded)
        })?
        .clone()
    };

    let captured = source.stats();
    log::info!(
        "source {}: {} frames captured",
        captured.source,
        captured.frames_captured
    );
    println!("Frames processed: {}", stats.frames);
    println!("Detections: {}", stats.detections);
    println!("Average inference: {:.1} ms", stats.average_inference_ms());
    println!("Average FPS: {:.1}", stats.average_fps());
    if let Some(summary) = recorder.summary() {
        for (label, count, pct) in summary.class_breakdown() {
            println!("  {:<14} {:>6}  {:>5.1}%", label, count, pct);
        }
    }
    Ok(())
}

fn apply_args(cfg: &mut DetectorConfig, args: &Args) -> Result<()> {
    if let Some(model) = &args.model {
        cfg.model.path = model.clone();
    }
    if let Some(conf) = args.conf {
        cfg.model.confidence = conf;
    }
    if let Some(backend) = &args.backend {
        cfg.model.backend = backend.clone();
    }
    if let Some(dir) = &args.output_dir {
        cfg.output = cleaneye::OutputLayout::new(dir);
    }
    if args.auto_save {
        cfg.auto_save = true;
    }
    if let Some(policy) = &args.snapshot_policy {
        cfg.snapshot_policy = policy.parse::<SnapshotPolicy>()?;
    }
    Ok(())
}
