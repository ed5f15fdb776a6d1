use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use cleaneye::config::DetectorConfig;
use cleaneye::SnapshotPolicy;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "CLEANEYE_CONFIG",
        "CLEANEYE_OUTPUT_DIR",
        "CLEANEYE_MODEL",
        "CLEANEYE_CONF",
        "CLEANEYE_BACKEND",
        "CLEANEYE_SNAPSHOT_POLICY",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_json_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "output_dir": "booth_outputs",
        "snapshot_policy": "per_frame",
        "auto_save": true,
        "model": {
            "path": "models/cleaneye.onnx",
            "confidence": 0.4,
            "input_size": 320
        },
        "location": {
            "latitude": 25.2048,
            "longitude": 55.2708,
            "jitter_deg": 0.0
        },
        "labels": {
            "categories": { "bottle": "Recyclable" },
            "friendly": { "garbage_bag": "Garbage bag" }
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("CLEANEYE_CONFIG", file.path());
    std::env::set_var("CLEANEYE_CONF", "0.6");
    std::env::set_var("CLEANEYE_OUTPUT_DIR", "override_outputs");

    let cfg = DetectorConfig::load().expect("load config");

    assert_eq!(cfg.output.root(), PathBuf::from("override_outputs"));
    assert_eq!(cfg.snapshot_policy, SnapshotPolicy::PerFrame);
    assert!(cfg.auto_save);
    assert_eq!(cfg.model.path, PathBuf::from("models/cleaneye.onnx"));
    assert_eq!(cfg.model.confidence, 0.6);
    assert_eq!(cfg.model.input_size, 320);
    assert_eq!(cfg.model.backend, "stub");
    assert_eq!(cfg.location.origin.latitude, 25.2048);
    assert_eq!(cfg.location.jitter_deg, 0.0);
    assert_eq!(cfg.labels.category_for("bottle"), "Recyclable");
    assert_eq!(cfg.labels.category_for("garbage"), "General");
    assert_eq!(cfg.labels.friendly_label("garbage_bag"), "Garbage bag");

    clear_env();
}

#[test]
fn loads_toml_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
output_dir = "toml_outputs"

[model]
backend = "stub"
confidence = 0.5

[labels]
fallback_category = "Other"
"#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");
    std::env::set_var("CLEANEYE_CONFIG", file.path());

    let cfg = DetectorConfig::load().expect("load config");
    assert_eq!(cfg.output.root(), PathBuf::from("toml_outputs"));
    assert_eq!(cfg.model.confidence, 0.5);
    assert_eq!(cfg.labels.category_for("plastic_cup"), "Other");

    clear_env();
}

#[test]
fn defaults_without_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = DetectorConfig::load().expect("defaults");
    assert_eq!(cfg.output.root(), PathBuf::from("outputs"));
    assert_eq!(cfg.model.path, PathBuf::from("Weights/best.onnx"));
    assert_eq!(cfg.model.confidence, 0.25);
    assert_eq!(cfg.snapshot_policy, SnapshotPolicy::EveryEvent);
    assert!(!cfg.auto_save);
}

#[test]
fn rejects_out_of_range_confidence_from_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("CLEANEYE_CONF", "1.5");
    assert!(DetectorConfig::load().is_err());
    std::env::set_var("CLEANEYE_CONF", "not-a-number");
    assert!(DetectorConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_unknown_snapshot_policy() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("CLEANEYE_SNAPSHOT_POLICY", "hourly");
    assert!(DetectorConfig::load().is_err());

    clear_env();
}
