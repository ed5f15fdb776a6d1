use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{anyhow, Result};

use super::backend::DetectorBackend;
use super::backends::StubBackend;
use crate::labels::DEFAULT_CLASS_LABELS;

/// Inputs a backend may need at construction time.
#[derive(Clone, Debug)]
pub struct BackendOptions {
    pub model_path: PathBuf,
    /// Square model input size in pixels.
    pub input_size: u32,
    pub class_labels: Vec<String>,
    /// Seed for backends with pseudo-random behaviour.
    pub seed: Option<u64>,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("Weights/best.onnx"),
            input_size: 640,
            class_labels: DEFAULT_CLASS_LABELS.iter().map(|s| s.to_string()).collect(),
            seed: None,
        }
    }
}

type BackendBuilder = fn(&BackendOptions) -> Result<Box<dyn DetectorBackend>>;

/// Registry of detector backends, keyed by name.
///
/// Backends are registered as constructors so that selecting the stub never
/// loads a model from disk.
pub struct BackendRegistry {
    builders: BTreeMap<&'static str, BackendBuilder>,
    default_name: Option<&'static str>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            builders: BTreeMap::new(),
            default_name: None,
        }
    }

    /// Registry with every backend compiled into this build.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("stub", |opts| {
            Ok(Box::new(StubBackend::hashed(opts.class_labels.clone())))
        });
        #[cfg(feature = "backend-tract")]
        registry.register("tract", |opts| {
            Ok(Box::new(super::backends::TractBackend::new(
                &opts.model_path,
                opts.input_size,
                opts.class_labels.clone(),
            )?))
        });
        registry
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register(&mut self, name: &'static str, builder: BackendBuilder) {
        if self.default_name.is_none() {
            self.default_name = Some(name);
        }
        self.builders.insert(name, builder);
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        let (key, _) = self
            .builders
            .get_key_value(name)
            .ok_or_else(|| anyhow!("backend '{}' not registered", name))?;
        self.default_name = Some(*key);
        Ok(())
    }

    /// Construct the named backend.
    pub fn build(&self, name: &str, opts: &BackendOptions) -> Result<Box<dyn DetectorBackend>> {
        let builder = self.builders.get(name).ok_or_else(|| {
            anyhow!(
                "backend '{}' not available in this build (available: {})",
                name,
                self.list().join(", ")
            )
        })?;
        let backend = builder(opts)?;
        log::info!("detector backend '{}' ready", backend.name());
        Ok(backend)
    }

    /// Construct the default backend.
    pub fn build_default(&self, opts: &BackendOptions) -> Result<Box<dyn DetectorBackend>> {
        let name = self
            .default_name
            .ok_or_else(|| anyhow!("no backends registered"))?;
        self.build(name, opts)
    }

    /// List registered backends.
    pub fn list(&self) -> Vec<String> {
        self.builders.keys().map(|name| name.to_string()).collect()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_stub_as_default() {
        let registry = BackendRegistry::with_builtin();
        assert!(registry.list().contains(&"stub".to_string()));
        let backend = registry
            .build_default(&BackendOptions::default())
            .expect("stub backend");
        assert_eq!(backend.name(), "stub");
        assert_eq!(backend.class_names().len(), DEFAULT_CLASS_LABELS.len());
    }

    #[test]
    fn unknown_backend_is_an_error() {
        let registry = BackendRegistry::with_builtin();
        assert!(registry.build("yolo-gpu", &BackendOptions::default()).is_err());
    }

    #[test]
    fn set_default_requires_registration() {
        let mut registry = BackendRegistry::new();
        assert!(registry.build_default(&BackendOptions::default()).is_err());
        assert!(registry.set_default("stub").is_err());
        registry.register("stub", |opts| {
            Ok(Box::new(StubBackend::hashed(opts.class_labels.clone())))
        });
        registry.set_default("stub").expect("set default");
    }
}
