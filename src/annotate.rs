//! Bounding-box overlays and image output.

use std::path::Path;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use image::{Rgb, RgbImage};

use crate::detect::{BoundingBox, ClassNames, RawDetection};
use crate::frame::Frame;

/// Colour for labels without an entry in the table.
pub const DEFAULT_BOX_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const BOX_THICKNESS: u32 = 2;

const LABEL_COLORS: [(&str, [u8; 3]); 6] = [
    ("0", [255, 165, 0]),           // orange
    ("c", [255, 215, 0]),           // gold
    ("garbage", [255, 0, 0]),       // red
    ("garbage_bag", [255, 0, 255]), // magenta
    ("waste", [0, 255, 0]),         // green
    ("trash", [255, 140, 0]),       // dark orange
];

pub fn color_for(raw_label: &str) -> Rgb<u8> {
    LABEL_COLORS
        .iter()
        .find(|(label, _)| *label == raw_label)
        .map(|(_, rgb)| Rgb(*rgb))
        .unwrap_or(DEFAULT_BOX_COLOR)
}

/// Copy of the frame with one outlined box per detection.
pub fn annotate(frame: &Frame, detections: &[RawDetection], names: &ClassNames) -> RgbImage {
    let mut image = frame.image().clone();
    for det in detections {
        let color = color_for(&names.label_for(det.class_id));
        draw_box(&mut image, &det.bbox, color, BOX_THICKNESS);
    }
    image
}

fn draw_box(image: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>, thickness: u32) {
    if image.width() == 0 || image.height() == 0 {
        return;
    }
    let b = bbox.clamped(image.width(), image.height());
    let (x1, y1, x2, y2) = (b.x1 as u32, b.y1 as u32, b.x2 as u32, b.y2 as u32);
    if x2 < x1 || y2 < y1 {
        return;
    }
    for t in 0..thickness {
        let top = (y1 + t).min(y2);
        let bottom = y2.saturating_sub(t).max(y1);
        let left = (x1 + t).min(x2);
        let right = x2.saturating_sub(t).max(x1);
        for x in x1..=x2 {
            image.put_pixel(x, top, color);
            image.put_pixel(x, bottom, color);
        }
        for y in y1..=y2 {
            image.put_pixel(left, y, color);
            image.put_pixel(right, y, color);
        }
    }
}

/// `<prefix>_<yyyymmdd_HHMMSS>.jpg`, or with microseconds when `precise`.
pub fn timestamped_name(prefix: &str, at: DateTime<Utc>, precise: bool) -> String {
    let stamp = if precise {
        at.format("%Y%m%d_%H%M%S_%6f")
    } else {
        at.format("%Y%m%d_%H%M%S")
    };
    format!("{}_{}.jpg", prefix, stamp)
}

pub fn save_image(image: &RgbImage, path: &Path) -> Result<()> {
    image
        .save(path)
        .map_err(|e| anyhow!("failed to save image {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn known_and_unknown_colors() {
        assert_eq!(color_for("garbage"), Rgb([255, 0, 0]));
        assert_eq!(color_for("plastic"), DEFAULT_BOX_COLOR);
    }

    #[test]
    fn annotate_draws_outline_only() {
        let frame = Frame::from_raw(20, 20, vec![0u8; 20 * 20 * 3]).unwrap();
        let names = ClassNames::from_labels(["garbage"]);
        let det = RawDetection {
            class_id: 0,
            confidence: 0.9,
            bbox: BoundingBox::new(2.0, 2.0, 12.0, 12.0),
        };
        let out = annotate(&frame, &[det], &names);
        assert_eq!(*out.get_pixel(2, 2), Rgb([255, 0, 0]));
        assert_eq!(*out.get_pixel(12, 7), Rgb([255, 0, 0]));
        assert_eq!(*out.get_pixel(3, 7), Rgb([255, 0, 0]));
        assert_eq!(*out.get_pixel(7, 7), Rgb([0, 0, 0]));
        // source frame untouched
        assert_eq!(frame.image().get_pixel(2, 2), &Rgb([0, 0, 0]));
    }

    #[test]
    fn boxes_outside_frame_are_clamped() {
        let frame = Frame::from_raw(10, 10, vec![0u8; 300]).unwrap();
        let names = ClassNames::from_labels(["trash"]);
        let det = RawDetection {
            class_id: 0,
            confidence: 0.5,
            bbox: BoundingBox::new(-5.0, -5.0, 50.0, 50.0),
        };
        let out = annotate(&frame, &[det], &names);
        assert_eq!(*out.get_pixel(9, 9), color_for("trash"));
    }

    #[test]
    fn timestamped_names() {
        let at = Utc.with_ymd_and_hms(2025, 11, 3, 9, 5, 7).single().unwrap();
        assert_eq!(
            timestamped_name("image_detection", at, false),
            "image_detection_20251103_090507.jpg"
        );
        assert_eq!(
            timestamped_name("detection", at, true),
            "detection_20251103_090507_000000.jpg"
        );
    }
}
