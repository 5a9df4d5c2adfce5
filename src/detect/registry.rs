use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::detect::result::Detection;
use crate::photo::Photo;

use super::backend::DetectorBackend;

/// Thread-safe registry of detector backends, keyed by model name.
///
/// Backends are wrapped in `Mutex` because `DetectorBackend::detect` takes `&mut self`.
pub struct BackendRegistry {
    backends: BTreeMap<String, Arc<Mutex<dyn DetectorBackend>>>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: BTreeMap::new(),
            default_name: None,
        }
    }

    /// Register a backend under its own name. The first registered backend becomes the default.
    pub fn register<B: DetectorBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        self.register_as(&name, backend);
    }

    /// Register a backend under a model name.
    pub fn register_as<B: DetectorBackend + 'static>(&mut self, name: &str, backend: B) {
        if self.default_name.is_none() {
            self.default_name = Some(name.to_string());
        }
        self.backends
            .insert(name.to_string(), Arc::new(Mutex::new(backend)));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    /// Get backend by name.
    pub fn get(&self, name: &str) -> Option<Arc<Mutex<dyn DetectorBackend>>> {
        self.backends.get(name).cloned()
    }

    /// List registered backends.
    pub fn list(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Resolve a model name, falling back to the default backend.
    pub fn resolve(&self, name: Option<&str>) -> Result<(String, Arc<Mutex<dyn DetectorBackend>>)> {
        let name = match name {
            Some(name) => name,
            None => self
                .default_name
                .as_deref()
                .ok_or_else(|| anyhow!("no detector backend registered"))?,
        };
        let backend = self.get(name).ok_or_else(|| {
            anyhow!(
                "model '{}' not available (registered: {})",
                name,
                self.list().join(", ")
            )
        })?;
        Ok((name.to_string(), backend))
    }

    /// Run detection with the named (or default) backend.
    pub fn detect(
        &self,
        name: Option<&str>,
        photo: &Photo,
        confidence_threshold: f32,
    ) -> Result<(String, Vec<Detection>)> {
        let (name, backend) = self.resolve(name)?;
        let mut guard = backend
            .lock()
            .map_err(|_| anyhow!("backend '{}' lock poisoned", name))?;
        let detections = guard.detect(photo, confidence_threshold)?;
        Ok((name, detections))
    }

    /// Warm up every registered backend.
    pub fn warm_up(&self) -> Result<()> {
        for (name, backend) in &self.backends {
            let mut guard = backend
                .lock()
                .map_err(|_| anyhow!("backend '{}' lock poisoned", name))?;
            guard.warm_up()?;
        }
        Ok(())
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
