//! Decoded frames handed from ingestion to the detector.
//!
//! A `Frame` is an owned RGB8 image. Decoding is done by the `image` crate in
//! the ingestion layer; detector backends only read the pixels.

use anyhow::{anyhow, Result};
use image::RgbImage;

pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn from_rgb(image: RgbImage) -> Self {
        Self { image }
    }

    /// Build a frame from packed RGB8 bytes (`width * height * 3`).
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected_len,
                width,
                height,
                pixels.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("invalid RGB buffer for {}x{}", width, height))?;
        Ok(Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_checks_length() {
        assert!(Frame::from_raw(4, 2, vec![0u8; 4 * 2 * 3]).is_ok());
        assert!(Frame::from_raw(4, 2, vec![0u8; 10]).is_err());
    }

    #[test]
    fn exposes_dimensions() {
        let frame = Frame::from_raw(3, 5, vec![7u8; 45]).unwrap();
        assert_eq!(frame.width(), 3);
        assert_eq!(frame.height(), 5);
        assert_eq!(frame.pixels().len(), 45);
    }
}
