use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::detect::BackendOptions;
use crate::labels::{CategoryTable, DEFAULT_CLASS_LABELS};
use crate::recorder::SnapshotPolicy;
use crate::{GeoPoint, SimulatedLocator, BOOTH_COORDINATES, DEFAULT_JITTER_DEG};

const DEFAULT_OUTPUT_DIR: &str = "outputs";
const DEFAULT_MODEL_PATH: &str = "Weights/best.onnx";
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_CONFIDENCE: f32 = 0.25;
const DEFAULT_INPUT_SIZE: u32 = 640;

const LOG_DIR: &str = "logs";
const AUTO_SAVE_DIR: &str = "auto_saves";
const REPORTS_DIR: &str = "reports";
const LOG_FILE: &str = "live_detections.jsonl";
const SUMMARY_FILE: &str = "live_summary.json";

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    output_dir: Option<PathBuf>,
    snapshot_policy: Option<String>,
    auto_save: Option<bool>,
    model: Option<ModelConfigFile>,
    location: Option<LocationConfigFile>,
    labels: Option<LabelsConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    path: Option<PathBuf>,
    backend: Option<String>,
    confidence: Option<f32>,
    input_size: Option<u32>,
    class_labels: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct LocationConfigFile {
    latitude: Option<f64>,
    longitude: Option<f64>,
    jitter_deg: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct LabelsConfigFile {
    categories: Option<HashMap<String, String>>,
    friendly: Option<HashMap<String, String>>,
    fallback_category: Option<String>,
}

/// Where a run writes its files.
///
/// ```text
/// <root>/logs/live_detections.jsonl   append-only event log
/// <root>/logs/live_summary.json       live snapshot
/// <root>/auto_saves/                  frames saved with --auto-save
/// <root>/reports/<id>/                 image reports (image --report)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOG_DIR)
    }

    pub fn auto_save_dir(&self) -> PathBuf {
        self.root.join(AUTO_SAVE_DIR)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join(REPORTS_DIR)
    }

    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join(LOG_FILE)
    }

    pub fn summary_file(&self) -> PathBuf {
        self.logs_dir().join(SUMMARY_FILE)
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [self.root.clone(), self.logs_dir(), self.auto_save_dir()] {
            fs::create_dir_all(&dir)
                .map_err(|e| anyhow!("failed to create {}: {}", dir.display(), e))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub output: OutputLayout,
    pub snapshot_policy: SnapshotPolicy,
    pub auto_save: bool,
    pub model: ModelSettings,
    pub location: LocationSettings,
    pub labels: CategoryTable,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub path: PathBuf,
    pub backend: String,
    pub confidence: f32,
    pub input_size: u32,
    pub class_labels: Vec<String>,
}

/// Settings for the simulated location attached to events.
#[derive(Debug, Clone)]
pub struct LocationSettings {
    pub origin: GeoPoint,
    pub jitter_deg: f64,
}

impl LocationSettings {
    pub fn locator(&self, seed: Option<u64>) -> SimulatedLocator {
        match seed {
            Some(seed) => SimulatedLocator::seeded(self.origin, self.jitter_deg, seed),
            None => SimulatedLocator::new(self.origin, self.jitter_deg),
        }
    }
}

impl DetectorConfig {
    /// Defaults, then `$CLEANEYE_CONFIG` (JSON, or TOML by extension), then env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CLEANEYE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: DetectorConfigFile) -> Result<Self> {
        let output = OutputLayout::new(
            file.output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
        );
        let snapshot_policy = match file.snapshot_policy {
            Some(policy) => policy.parse()?,
            None => SnapshotPolicy::default(),
        };
        let model_file = file.model.unwrap_or_default();
        let model = ModelSettings {
            path: model_file
                .path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            backend: model_file
                .backend
                .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            confidence: model_file.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            input_size: model_file.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
            class_labels: model_file.class_labels.unwrap_or_else(|| {
                DEFAULT_CLASS_LABELS.iter().map(|s| s.to_string()).collect()
            }),
        };
        let location_file = file.location.unwrap_or_default();
        let location = LocationSettings {
            origin: GeoPoint {
                latitude: location_file
                    .latitude
                    .unwrap_or(BOOTH_COORDINATES.latitude),
                longitude: location_file
                    .longitude
                    .unwrap_or(BOOTH_COORDINATES.longitude),
            },
            jitter_deg: location_file.jitter_deg.unwrap_or(DEFAULT_JITTER_DEG),
        };

        // File entries extend the built-in table; they do not replace it.
        let mut labels = CategoryTable::cleaneye_default();
        if let Some(labels_file) = file.labels {
            for (raw, category) in labels_file.categories.unwrap_or_default() {
                labels.insert_category(raw, category);
            }
            for (raw, friendly) in labels_file.friendly.unwrap_or_default() {
                labels.insert_friendly(raw, friendly);
            }
            if let Some(fallback) = labels_file.fallback_category {
                labels.set_fallback(fallback);
            }
        }

        Ok(Self {
            output,
            snapshot_policy,
            auto_save: file.auto_save.unwrap_or(false),
            model,
            location,
            labels,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("CLEANEYE_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.output = OutputLayout::new(dir);
            }
        }
        if let Ok(model) = std::env::var("CLEANEYE_MODEL") {
            if !model.trim().is_empty() {
                self.model.path = PathBuf::from(model);
            }
        }
        if let Ok(backend) = std::env::var("CLEANEYE_BACKEND") {
            if !backend.trim().is_empty() {
                self.model.backend = backend.trim().to_string();
            }
        }
        if let Ok(conf) = std::env::var("CLEANEYE_CONF") {
            self.model.confidence = conf
                .trim()
                .parse()
                .map_err(|_| anyhow!("CLEANEYE_CONF must be a number in (0, 1]"))?;
        }
        if let Ok(policy) = std::env::var("CLEANEYE_SNAPSHOT_POLICY") {
            if !policy.trim().is_empty() {
                self.snapshot_policy = policy.parse()?;
            }
        }
        Ok(())
    }

    /// Check ranges. Call again after applying command-line overrides.
    pub fn validate(&self) -> Result<()> {
        crate::validate_confidence(self.model.confidence)
            .map_err(|e| anyhow!("invalid confidence threshold: {}", e))?;
        if self.model.backend.is_empty() {
            return Err(anyhow!("backend name must not be empty"));
        }
        if self.model.input_size == 0 {
            return Err(anyhow!("model input size must be greater than zero"));
        }
        if self.model.class_labels.is_empty() {
            return Err(anyhow!("class label list must not be empty"));
        }
        GeoPoint::new(self.location.origin.latitude, self.location.origin.longitude)
            .map_err(|e| anyhow!("invalid booth location: {}", e))?;
        if !self.location.jitter_deg.is_finite() || self.location.jitter_deg < 0.0 {
            return Err(anyhow!("location jitter must be a non-negative number of degrees"));
        }
        Ok(())
    }

    pub fn backend_options(&self, seed: Option<u64>) -> BackendOptions {
        BackendOptions {
            model_path: self.model.path.clone(),
            input_size: self.model.input_size,
            class_labels: self.model.class_labels.clone(),
            seed,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            output: OutputLayout::new(DEFAULT_OUTPUT_DIR),
            snapshot_policy: SnapshotPolicy::default(),
            auto_save: false,
            model: ModelSettings {
                path: PathBuf::from(DEFAULT_MODEL_PATH),
                backend: DEFAULT_BACKEND.to_string(),
                confidence: DEFAULT_CONFIDENCE,
                input_size: DEFAULT_INPUT_SIZE,
                class_labels: DEFAULT_CLASS_LABELS.iter().map(|s| s.to_string()).collect(),
            },
            location: LocationSettings {
                origin: BOOTH_COORDINATES,
                jitter_deg: DEFAULT_JITTER_DEG,
            },
            labels: CategoryTable::cleaneye_default(),
        }
    }
}

fn read_config_file(path: &Path) -> Result<DetectorConfigFile> {
    let raw = fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_output_layout() {
        let cfg = DetectorConfig::from_file(DetectorConfigFile::default()).unwrap();
        assert_eq!(cfg.output.log_file(), PathBuf::from("outputs/logs/live_detections.jsonl"));
        assert_eq!(cfg.output.summary_file(), PathBuf::from("outputs/logs/live_summary.json"));
        assert_eq!(cfg.model.confidence, 0.25);
        assert_eq!(cfg.model.backend, "stub");
        assert_eq!(cfg.snapshot_policy, SnapshotPolicy::EveryEvent);
        assert_eq!(cfg.location.origin, BOOTH_COORDINATES);
        cfg.validate().unwrap();
    }

    #[test]
    fn label_overrides_extend_builtin_table() {
        let file: DetectorConfigFile = serde_json::from_str(
            r#"{ "labels": { "categories": { "bottle": "Recyclable" }, "friendly": { "c": "Can" } } }"#,
        )
        .unwrap();
        let cfg = DetectorConfig::from_file(file).unwrap();
        assert_eq!(cfg.labels.category_for("bottle"), "Recyclable");
        assert_eq!(cfg.labels.category_for("garbage"), "General");
        assert_eq!(cfg.labels.friendly_label("c"), "Can");
    }

    #[test]
    fn validate_rejects_bad_ranges() {
        let mut cfg = DetectorConfig::default();
        cfg.model.confidence = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = DetectorConfig::default();
        cfg.location.jitter_deg = -1.0;
        assert!(cfg.validate().is_err());

        let mut cfg = DetectorConfig::default();
        cfg.location.origin.latitude = 120.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn ensure_directories_creates_tree() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path().join("out"));
        layout.ensure_directories().unwrap();
        assert!(layout.logs_dir().is_dir());
        assert!(layout.auto_save_dir().is_dir());
    }
}
