//! Frame ingestion sources.
//!
//! This module provides different sources for decoded frames:
//! - Single still images (`ImageSource`)
//! - Directories of still frames, read in file-name order (`DirectorySource`)
//! - Synthetic frames (`stub://`, demos and tests)
//!
//! All sources produce `Frame` instances in capture order and return
//! `Ok(None)` once exhausted. Decoding is delegated to the `image` crate.

pub mod file;
pub mod synthetic;

pub use file::{DirectorySource, ImageSource};
pub use synthetic::SyntheticSource;

use anyhow::Result;

use crate::frame::Frame;

/// A stream of frames processed one at a time.
pub trait FrameSource {
    /// Identifier recorded as the `source` of every event from this stream.
    fn source_id(&self) -> &str;

    /// Prepare the source (list files, check paths).
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    /// Next frame, or `None` when the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Number of frames, when known up front.
    fn frame_count_hint(&self) -> Option<u64> {
        None
    }

    fn stats(&self) -> SourceStats;
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source: String,
}
