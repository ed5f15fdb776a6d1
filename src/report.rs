//! Before/after report for a single image.
//!
//! A report lives in `<output>/reports/<id>/` and holds the untouched input
//! (`before_<name>`), the annotated copy (`after_<name>`), and the same content
//! twice: `report_<id>.json` for tools and `report_<id>.txt` for people.
//! Report ids look like `CLN-20251103-093000-1A2B3C4D`.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::annotate::{annotate, save_image};
use crate::detect::{ClassNames, RawDetection};
use crate::frame::Frame;
use crate::labels::CategoryTable;

const RULE: &str = "================================================================================";
const THIN_RULE: &str = "--------------------------------------------------------------------------------";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CleanlinessStatus {
    Clean,
    Low,
    Moderate,
    High,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    None,
    Minor,
    Medium,
    Critical,
}

impl CleanlinessStatus {
    /// 0 items is clean, up to 3 low, up to 7 moderate, anything more high.
    pub fn from_total(total: usize) -> Self {
        match total {
            0 => Self::Clean,
            1..=3 => Self::Low,
            4..=7 => Self::Moderate,
            _ => Self::High,
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            Self::Clean => Severity::None,
            Self::Low => Severity::Minor,
            Self::Moderate => Severity::Medium,
            Self::High => Severity::Critical,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clean => "CLEAN",
            Self::Low => "LOW",
            Self::Moderate => "MODERATE",
            Self::High => "HIGH",
        }
    }
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Minor => "MINOR",
            Self::Medium => "MEDIUM",
            Self::Critical => "CRITICAL",
        }
    }
}

/// 100 minus 10 per detected item, floored at 0.
pub fn cleanliness_score(total: usize) -> u32 {
    let penalty = u32::try_from(total).unwrap_or(u32::MAX).saturating_mul(10);
    100u32.saturating_sub(penalty)
}

/// `CLN-<yyyymmdd-HHMMSS>-<8 uppercase hex>`.
pub fn report_id<R: Rng>(at: DateTime<Utc>, rng: &mut R) -> String {
    format!("CLN-{}-{:08X}", at.format("%Y%m%d-%H%M%S"), rng.gen::<u32>())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub report_id: String,
    pub timestamp: DateTime<Utc>,
    pub image: ReportImages,
    pub detection: ReportVerdict,
    pub statistics: ReportStatistics,
    pub model: ReportModel,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportImages {
    pub original: PathBuf,
    pub before: PathBuf,
    pub after: PathBuf,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportVerdict {
    pub total_items: usize,
    pub status: CleanlinessStatus,
    pub severity: Severity,
    pub cleanliness_score: u32,
    pub confidence_threshold: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportStatistics {
    /// Keyed by friendly label.
    pub class_counts: BTreeMap<String, u64>,
    pub category_counts: BTreeMap<String, u64>,
    /// In detector order.
    pub detections: Vec<ReportedDetection>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportedDetection {
    pub label: String,
    pub category: String,
    pub confidence: f32,
    /// `[x1, y1, x2, y2]` in frame pixels.
    pub bbox: [i32; 4],
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportModel {
    pub path: PathBuf,
    pub backend: String,
}

/// Everything a report is built from.
pub struct ReportInput<'a> {
    pub image_path: &'a Path,
    pub frame: &'a Frame,
    pub detections: &'a [RawDetection],
    pub names: &'a ClassNames,
    pub labels: &'a CategoryTable,
    pub confidence_threshold: f32,
    pub model_path: &'a Path,
    pub backend: &'a str,
}

/// Paths of a report written to disk.
#[derive(Clone, Debug)]
pub struct WrittenReport {
    pub report: DetectionReport,
    pub dir: PathBuf,
    pub json_path: PathBuf,
    pub text_path: PathBuf,
}

impl DetectionReport {
    fn build(
        report_id: String,
        at: DateTime<Utc>,
        input: &ReportInput<'_>,
        before: PathBuf,
        after: PathBuf,
    ) -> Self {
        let mut class_counts = BTreeMap::new();
        let mut category_counts = BTreeMap::new();
        let detections: Vec<ReportedDetection> = input
            .detections
            .iter()
            .map(|det| {
                let raw = input.names.label_for(det.class_id);
                let label = input.labels.friendly_label(&raw).to_string();
                let category = input.labels.category_for(&raw).to_string();
                *class_counts.entry(label.clone()).or_insert(0) += 1;
                *category_counts.entry(category.clone()).or_insert(0) += 1;
                ReportedDetection {
                    label,
                    category,
                    confidence: det.confidence,
                    bbox: [
                        det.bbox.x1.round() as i32,
                        det.bbox.y1.round() as i32,
                        det.bbox.x2.round() as i32,
                        det.bbox.y2.round() as i32,
                    ],
                }
            })
            .collect();

        let total = detections.len();
        let status = CleanlinessStatus::from_total(total);
        Self {
            report_id,
            timestamp: at,
            image: ReportImages {
                original: input.image_path.to_path_buf(),
                before,
                after,
                width: input.frame.width(),
                height: input.frame.height(),
            },
            detection: ReportVerdict {
                total_items: total,
                status,
                severity: status.severity(),
                cleanliness_score: cleanliness_score(total),
                confidence_threshold: input.confidence_threshold,
            },
            statistics: ReportStatistics {
                class_counts,
                category_counts,
                detections,
            },
            model: ReportModel {
                path: input.model_path.to_path_buf(),
                backend: input.backend.to_string(),
            },
        }
    }

    /// Plain-text rendering, as written to `report_<id>.txt`.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let verdict = &self.detection;
        let image_name = self
            .image
            .original
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        // Writing into a String cannot fail.
        let _ = writeln!(out, "{RULE}\nCLEANEYE - GARBAGE DETECTION REPORT\n{RULE}\n");
        let _ = writeln!(out, "Report ID: {}", self.report_id);
        let _ = writeln!(out, "Generated: {}", self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
        let _ = writeln!(out, "Image: {} ({}x{})\n", image_name, self.image.width, self.image.height);

        let _ = writeln!(out, "{THIN_RULE}\nSUMMARY\n{THIN_RULE}");
        let _ = writeln!(out, "Total Waste Detected: {} items", verdict.total_items);
        let _ = writeln!(out, "Status: {}", verdict.status.as_str());
        let _ = writeln!(out, "Severity: {}", verdict.severity.as_str());
        let _ = writeln!(out, "Cleanliness Score: {}/100\n", verdict.cleanliness_score);

        if !self.statistics.class_counts.is_empty() {
            let _ = writeln!(out, "{THIN_RULE}\nBREAKDOWN BY TYPE\n{THIN_RULE}");
            let mut rows: Vec<(&String, &u64)> = self.statistics.class_counts.iter().collect();
            rows.sort_by(|a, b| b.1.cmp(a.1));
            for (label, count) in rows {
                let pct = *count as f64 / verdict.total_items as f64 * 100.0;
                let _ = writeln!(out, "  {}: {} ({:.1}%)", label, count, pct);
            }
            let _ = writeln!(out);
        }

        if !self.statistics.detections.is_empty() {
            let _ = writeln!(out, "{THIN_RULE}\nDETAILED DETECTIONS\n{THIN_RULE}");
            for (i, det) in self.statistics.detections.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "{}. {} [{}] ({:.1}%)",
                    i + 1,
                    det.label,
                    det.category,
                    det.confidence * 100.0
                );
            }
        }

        let _ = write!(out, "\n{RULE}\n");
        out
    }
}

/// Write the before/after images and both report files under
/// `reports_dir/<id>/`.
pub fn write_report<R: Rng>(
    reports_dir: &Path,
    input: &ReportInput<'_>,
    at: DateTime<Utc>,
    rng: &mut R,
) -> Result<WrittenReport> {
    let id = report_id(at, rng);
    let dir = reports_dir.join(&id);
    fs::create_dir_all(&dir)
        .map_err(|e| anyhow!("failed to create report directory {}: {}", dir.display(), e))?;

    let image_name = input
        .image_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame.png".to_string());
    let before = dir.join(format!("before_{image_name}"));
    let after = dir.join(format!("after_{image_name}"));
    save_image(input.frame.image(), &before)?;
    save_image(&annotate(input.frame, input.detections, input.names), &after)?;

    let report = DetectionReport::build(id.clone(), at, input, before, after);

    let json_path = dir.join(format!("report_{id}.json"));
    fs::write(&json_path, serde_json::to_vec_pretty(&report)?)
        .map_err(|e| anyhow!("failed to write {}: {}", json_path.display(), e))?;
    let text_path = dir.join(format!("report_{id}.txt"));
    fs::write(&text_path, report.render_text())
        .map_err(|e| anyhow!("failed to write {}: {}", text_path.display(), e))?;

    log::info!("report {} written to {}", id, dir.display());
    Ok(WrittenReport {
        report,
        dir,
        json_path,
        text_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, DetectorBackend, StubBackend};
    use crate::labels::DEFAULT_CLASS_LABELS;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 3, 9, 30, 0).single().unwrap()
    }

    fn det(class_id: u32, confidence: f32) -> RawDetection {
        RawDetection {
            class_id,
            confidence,
            bbox: BoundingBox::new(2.4, 3.0, 10.6, 9.0),
        }
    }

    #[test]
    fn status_bands_and_score() {
        assert_eq!(CleanlinessStatus::from_total(0), CleanlinessStatus::Clean);
        assert_eq!(CleanlinessStatus::from_total(3), CleanlinessStatus::Low);
        assert_eq!(CleanlinessStatus::from_total(4), CleanlinessStatus::Moderate);
        assert_eq!(CleanlinessStatus::from_total(7), CleanlinessStatus::Moderate);
        assert_eq!(CleanlinessStatus::from_total(8), CleanlinessStatus::High);
        assert_eq!(CleanlinessStatus::High.severity(), Severity::Critical);
        assert_eq!(cleanliness_score(0), 100);
        assert_eq!(cleanliness_score(3), 70);
        assert_eq!(cleanliness_score(12), 0);
        assert_eq!(cleanliness_score(usize::MAX), 0);
    }

    #[test]
    fn report_id_format() {
        let id = report_id(at(), &mut StdRng::seed_from_u64(1));
        assert!(id.starts_with("CLN-20251103-093000-"), "{id}");
        let suffix = &id["CLN-20251103-093000-".len()..];
        assert_eq!(suffix.len(), 8);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn writes_before_after_and_both_report_files() {
        let dir = tempfile::tempdir().unwrap();
        let frame = Frame::from_raw(16, 12, vec![30u8; 16 * 12 * 3]).unwrap();
        let mut backend = StubBackend::scripted(
            DEFAULT_CLASS_LABELS,
            vec![vec![det(2, 0.91), det(3, 0.62), det(2, 0.4)]],
        );
        let result = backend.detect(&frame, 0.25).unwrap();
        let mut labels = CategoryTable::default();
        labels.insert_friendly("garbage_bag", "Garbage bag");

        let input = ReportInput {
            image_path: Path::new("media/beach.png"),
            frame: &frame,
            detections: &result.detections,
            names: backend.class_names(),
            labels: &labels,
            confidence_threshold: 0.25,
            model_path: Path::new("Weights/best.onnx"),
            backend: backend.name(),
        };
        let written =
            write_report(dir.path(), &input, at(), &mut StdRng::seed_from_u64(7)).unwrap();

        let id = &written.report.report_id;
        assert_eq!(written.dir, dir.path().join(id));
        assert!(written.dir.join("before_beach.png").exists());
        assert!(written.dir.join("after_beach.png").exists());
        assert_eq!(written.json_path, written.dir.join(format!("report_{id}.json")));

        let parsed: DetectionReport =
            serde_json::from_slice(&fs::read(&written.json_path).unwrap()).unwrap();
        assert_eq!(parsed, written.report);
        assert_eq!(parsed.detection.total_items, 3);
        assert_eq!(parsed.detection.status, CleanlinessStatus::Low);
        assert_eq!(parsed.detection.cleanliness_score, 70);
        assert_eq!(parsed.statistics.class_counts["garbage"], 2);
        assert_eq!(parsed.statistics.class_counts["Garbage bag"], 1);
        assert_eq!(parsed.statistics.category_counts["Recyclable"], 1);
        assert_eq!(parsed.statistics.detections[0].bbox, [2, 3, 11, 9]);
        assert_eq!((parsed.image.width, parsed.image.height), (16, 12));

        let raw_json: serde_json::Value =
            serde_json::from_slice(&fs::read(&written.json_path).unwrap()).unwrap();
        assert_eq!(raw_json["detection"]["status"], "LOW");
        assert_eq!(raw_json["detection"]["severity"], "MINOR");

        let text = fs::read_to_string(&written.text_path).unwrap();
        assert!(text.contains(&format!("Report ID: {id}")));
        assert!(text.contains("Status: LOW"));
        assert!(text.contains("  garbage: 2 (66.7%)"));
        assert!(text.contains("2. Garbage bag [Recyclable] (62.0%)"));
    }

    #[test]
    fn clean_image_report() {
        let dir = tempfile::tempdir().unwrap();
        let frame = Frame::from_raw(4, 4, vec![0u8; 48]).unwrap();
        let names = ClassNames::from_labels(DEFAULT_CLASS_LABELS);
        let labels = CategoryTable::default();
        let input = ReportInput {
            image_path: Path::new("street.jpg"),
            frame: &frame,
            detections: &[],
            names: &names,
            labels: &labels,
            confidence_threshold: 0.5,
            model_path: Path::new("Weights/best.onnx"),
            backend: "stub",
        };
        let written =
            write_report(dir.path(), &input, at(), &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(written.report.detection.status, CleanlinessStatus::Clean);
        assert_eq!(written.report.detection.severity, Severity::None);
        assert_eq!(written.report.detection.cleanliness_score, 100);
        let text = written.report.render_text();
        assert!(text.contains("Status: CLEAN"));
        assert!(!text.contains("BREAKDOWN BY TYPE"));
    }
}
