//! Local file frame sources.
//!
//! `ImageSource` yields one frame decoded from a still image.
//! `DirectorySource` yields every JPEG/PNG in a directory, sorted by file name,
//! which is how exported video frames are fed to the detector.
//!
//! Both sources only accept local paths (no URL schemes).

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use super::{FrameSource, SourceStats};
use crate::frame::Frame;

const FRAME_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Single still image.
pub struct ImageSource {
    path: PathBuf,
    source_id: String,
    done: bool,
    frames_captured: u64,
}

impl ImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        check_local_path(&path)?;
        let source_id = path.display().to_string();
        Ok(Self {
            path,
            source_id,
            done: false,
            frames_captured: 0,
        })
    }
}

impl FrameSource for ImageSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn connect(&mut self) -> Result<()> {
        if !self.path.is_file() {
            return Err(anyhow!("image not found: {}", self.path.display()));
        }
        log::info!("ImageSource: opened {}", self.path.display());
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;
        let frame = decode_frame(&self.path)?;
        self.frames_captured += 1;
        Ok(Some(frame))
    }

    fn frame_count_hint(&self) -> Option<u64> {
        Some(1)
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frames_captured,
            source: self.source_id.clone(),
        }
    }
}

/// Directory of still frames, read in file-name order.
pub struct DirectorySource {
    dir: PathBuf,
    source_id: String,
    pending: VecDeque<PathBuf>,
    total: Option<u64>,
    frames_captured: u64,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        check_local_path(&dir)?;
        let source_id = dir.display().to_string();
        Ok(Self {
            dir,
            source_id,
            pending: VecDeque::new(),
            total: None,
            frames_captured: 0,
        })
    }
}

impl FrameSource for DirectorySource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn connect(&mut self) -> Result<()> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| anyhow!("failed to read frame directory {}: {}", self.dir.display(), e))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && has_frame_extension(&path) {
                files.push(path);
            }
        }
        files.sort();
        if files.is_empty() {
            return Err(anyhow!("no image frames found in {}", self.dir.display()));
        }
        log::info!(
            "DirectorySource: {} frames in {}",
            files.len(),
            self.dir.display()
        );
        self.total = Some(files.len() as u64);
        self.pending = files.into();
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };
        let frame = decode_frame(&path)?;
        self.frames_captured += 1;
        Ok(Some(frame))
    }

    fn frame_count_hint(&self) -> Option<u64> {
        self.total
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frames_captured,
            source: self.source_id.clone(),
        }
    }
}

fn decode_frame(path: &Path) -> Result<Frame> {
    let image = image::open(path)
        .map_err(|e| anyhow!("failed to decode {}: {}", path.display(), e))?
        .to_rgb8();
    Ok(Frame::from_rgb(image))
}

fn has_frame_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            FRAME_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

fn check_local_path(path: &Path) -> Result<()> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(anyhow!("frame source path must not be empty"));
    }
    if text.contains("://") {
        return Err(anyhow!(
            "file ingestion only supports local paths (no URL schemes): {}",
            text
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_png(path: &Path, shade: u8) {
        RgbImage::from_pixel(8, 6, Rgb([shade, shade, shade]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn image_source_yields_one_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bin.png");
        write_png(&path, 40);

        let mut source = ImageSource::new(&path).unwrap();
        source.connect().unwrap();
        let frame = source.next_frame().unwrap().expect("frame");
        assert_eq!((frame.width(), frame.height()), (8, 6));
        assert!(source.next_frame().unwrap().is_none());
        assert_eq!(source.stats().frames_captured, 1);
    }

    #[test]
    fn image_source_missing_file_fails_on_connect() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ImageSource::new(dir.path().join("missing.jpg")).unwrap();
        assert!(source.connect().is_err());
    }

    #[test]
    fn url_paths_are_rejected() {
        assert!(ImageSource::new("http://camera/frame.jpg").is_err());
        assert!(DirectorySource::new("rtsp://camera").is_err());
        assert!(ImageSource::new("").is_err());
    }

    #[test]
    fn directory_source_reads_sorted_frames_and_skips_others() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("frame_002.png"), 2);
        write_png(&dir.path().join("frame_001.png"), 1);
        fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

        let mut source = DirectorySource::new(dir.path()).unwrap();
        source.connect().unwrap();
        assert_eq!(source.frame_count_hint(), Some(2));

        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.pixels()[0], 1);
        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(second.pixels()[0], 2);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = DirectorySource::new(dir.path()).unwrap();
        assert!(source.connect().is_err());
    }
}
