//! Single-threaded frame loop: inference → events → recorder.
//!
//! Each frame is fully processed before the next one is read. The recorder is
//! passed in by the caller on every call; the run holds no counters of its own
//! beyond frame/timing statistics.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{anyhow, Result};
use chrono::Utc;

use crate::adapter::FrameAdapter;
use crate::annotate::{save_image, timestamped_name};
use crate::detect::{ClassNames, DetectorBackend, RawDetection};
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::recorder::DetectionRecorder;
use crate::storage::EventStore;

/// FPS samples kept for the rolling average.
pub const FPS_WINDOW: usize = 120;
const PROGRESS_LOG_EVERY: u64 = 30;

#[derive(Clone, Debug)]
pub struct RunOptions {
    pub confidence: f32,
    /// Save raw frames that contain detections into this directory.
    pub auto_save_dir: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct RunStats {
    pub frames: u64,
    pub detections: u64,
    pub last_inference_ms: f64,
    pub total_inference_ms: f64,
    fps_history: VecDeque<f64>,
    started: Instant,
}

impl RunStats {
    fn new() -> Self {
        Self {
            frames: 0,
            detections: 0,
            last_inference_ms: 0.0,
            total_inference_ms: 0.0,
            fps_history: VecDeque::with_capacity(FPS_WINDOW),
            started: Instant::now(),
        }
    }

    /// Frames per second since the run started, as of the latest frame.
    pub fn current_fps(&self) -> f64 {
        self.fps_history.back().copied().unwrap_or(0.0)
    }

    /// Mean of the last `FPS_WINDOW` fps samples.
    pub fn average_fps(&self) -> f64 {
        if self.fps_history.is_empty() {
            return 0.0;
        }
        self.fps_history.iter().sum::<f64>() / self.fps_history.len() as f64
    }

    pub fn average_inference_ms(&self) -> f64 {
        if self.frames == 0 {
            0.0
        } else {
            self.total_inference_ms / self.frames as f64
        }
    }

    fn push_fps_sample(&mut self) {
        let elapsed = self.started.elapsed().as_secs_f64();
        let fps = if elapsed > 0.0 {
            self.frames as f64 / elapsed
        } else {
            0.0
        };
        if self.fps_history.len() == FPS_WINDOW {
            self.fps_history.pop_front();
        }
        self.fps_history.push_back(fps);
    }

    pub fn overlay_line(&self) -> String {
        format!(
            "Frames: {} | Detections: {} | Inference: {:.1} ms | FPS: {:.1}",
            self.frames,
            self.detections,
            self.last_inference_ms,
            self.current_fps()
        )
    }
}

/// Result of processing one frame.
#[derive(Clone, Debug)]
pub struct FrameOutcome {
    pub frame_index: u64,
    pub detections: Vec<RawDetection>,
    pub events_recorded: usize,
    pub inference_ms: f64,
    pub auto_saved: Option<PathBuf>,
}

pub struct DetectionRun {
    backend: Box<dyn DetectorBackend>,
    adapter: FrameAdapter,
    options: RunOptions,
    stats: RunStats,
}

impl DetectionRun {
    pub fn new(backend: Box<dyn DetectorBackend>, adapter: FrameAdapter, options: RunOptions) -> Self {
        Self {
            backend,
            adapter,
            options,
            stats: RunStats::new(),
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn class_names(&self) -> &ClassNames {
        self.backend.class_names()
    }

    /// Inference, event conversion and recording for one frame.
    ///
    /// An inference error aborts this frame before anything is recorded.
    pub fn process_frame<S: EventStore>(
        &mut self,
        frame: &Frame,
        recorder: &mut DetectionRecorder<S>,
    ) -> Result<FrameOutcome> {
        self.stats.frames += 1;
        let frame_index = self.stats.frames;

        let inference_start = Instant::now();
        let result = self
            .backend
            .detect(frame, self.options.confidence)
            .map_err(|e| anyhow!("inference failed on frame {}: {}", frame_index, e))?;
        let inference_ms = inference_start.elapsed().as_secs_f64() * 1000.0;

        let events = self.adapter.events_for_frame(
            frame_index,
            &result,
            self.backend.class_names(),
            Utc::now(),
        )?;
        let events_recorded = recorder.record_frame(events)?;

        self.stats.detections += events_recorded as u64;
        self.stats.last_inference_ms = inference_ms;
        self.stats.total_inference_ms += inference_ms;
        self.stats.push_fps_sample();

        let auto_saved = match &self.options.auto_save_dir {
            Some(dir) if !result.is_empty() => {
                let path = dir.join(timestamped_name("detection", Utc::now(), true));
                save_image(frame.image(), &path)?;
                log::debug!("auto-saved frame {} to {}", frame_index, path.display());
                Some(path)
            }
            _ => None,
        };

        Ok(FrameOutcome {
            frame_index,
            detections: result.detections,
            events_recorded,
            inference_ms,
            auto_saved,
        })
    }

    /// Drain a connected source until it is exhausted or `stop` is set.
    ///
    /// `on_frame` sees every outcome; it runs after the frame is recorded.
    pub fn run<F, S>(
        &mut self,
        source: &mut F,
        recorder: &mut DetectionRecorder<S>,
        stop: &AtomicBool,
        mut on_frame: impl FnMut(&FrameOutcome),
    ) -> Result<&RunStats>
    where
        F: FrameSource + ?Sized,
        S: EventStore,
    {
        log::info!("detection run started on {}", source.source_id());

        while !stop.load(Ordering::SeqCst) {
            let Some(frame) = source.next_frame()? else {
                log::info!("source {} exhausted", source.source_id());
                break;
            };
            let outcome = self.process_frame(&frame, recorder)?;
            on_frame(&outcome);
            if self.stats.frames % PROGRESS_LOG_EVERY == 0 {
                log::info!("{}", self.stats.overlay_line());
            }
        }

        if stop.load(Ordering::SeqCst) {
            log::info!("stopping detection (interrupted)");
        }
        Ok(&self.stats)
    }
}
