use anyhow::{anyhow, Result};

use super::{FrameSource, SourceStats};
use crate::frame::Frame;

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
/// Frames between scene changes.
const SCENE_PERIOD: u64 = 50;

/// Synthetic `stub://` source: a moving gradient with a scene change every
/// 50 frames. Deterministic, so the hashed stub backend gives repeatable runs.
pub struct SyntheticSource {
    url: String,
    width: u32,
    height: u32,
    limit: Option<u64>,
    frame_count: u64,
    scene_state: u8,
}

impl SyntheticSource {
    pub fn new(url: impl Into<String>, limit: Option<u64>) -> Result<Self> {
        let url = url.into();
        if !url.starts_with("stub://") {
            return Err(anyhow!("synthetic source requires a stub:// url, got {}", url));
        }
        Ok(Self {
            url,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            limit,
            frame_count: 0,
            scene_state: 0,
        })
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("synthetic frame size must be non-zero"));
        }
        self.width = width;
        self.height = height;
        Ok(self)
    }

    fn generate_pixels(&mut self) -> Vec<u8> {
        let pixel_count = self.width as usize * self.height as usize * 3;
        if self.frame_count % SCENE_PERIOD == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn source_id(&self) -> &str {
        &self.url
    }

    fn connect(&mut self) -> Result<()> {
        log::info!(
            "SyntheticSource: connected to {} ({}x{})",
            self.url,
            self.width,
            self.height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.limit.is_some_and(|limit| self.frame_count >= limit) {
            return Ok(None);
        }
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        Frame::from_raw(self.width, self.height, pixels).map(Some)
    }

    fn frame_count_hint(&self) -> Option<u64> {
        self.limit
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.url.clone(),
        }
    }
}
