use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use infergate_core::{LoadMode, ModelsConfig};
use tracing::info;

use crate::backend::ModelBackend;
use crate::error::ModelError;

struct Entry {
    load_mode: LoadMode,
    backend: Arc<dyn ModelBackend>,
    loaded: AtomicBool,
}

impl Entry {
    async fn load(&self, model_id: &str) -> Result<(), ModelError> {
        if self.loaded.load(Ordering::Acquire) {
            return Ok(());
        }
        self.backend.ensure_loaded().await?;
        self.loaded.store(true, Ordering::Release);
        info!(model_id, "model backend loaded");
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }
}

/// Maps model IDs to backends and enforces the load mode. For multi-model deployments, [`ModelRegistry::startup`] loads only
/// models marked `eager` plus the default model; every other model loads on
/// first [`ModelRegistry::bind`].
pub struct ModelRegistry {
    entries: HashMap<String, Entry>,
    default_model: String,
}

impl ModelRegistry {
    /// Build a registry from a [`ModelsConfig`] and a backend for each model
    /// id. `backends` must contain one entry per `models_config.models`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Configuration`] if a model in `models_config`
    /// has no corresponding backend, or if `default_model` is unknown.
    pub fn new(
        models_config: &ModelsConfig,
        mut backends: HashMap<String, Arc<dyn ModelBackend>>,
    ) -> Result<Self, ModelError> {
        let mut entries = HashMap::new();
        for spec in &models_config.models {
            let backend = backends.remove(&spec.id).ok_or_else(|| {
                    ModelError::Configuration(format!("no backend registered for model '{}'", spec.id))
            })?;
            entries.insert(
                spec.id.clone(),
                Entry {
                    load_mode: spec.load_mode,
                    backend,
                    loaded: AtomicBool::new(false),
                },
            );
        }
        if !entries.contains_key(&models_config.default_model) {
            return Err(ModelError::Configuration(format!(
                        "default_model '{}' has no matching ModelSpec",
                        models_config.default_model
            )));
        }
        Ok(Self {
                entries,
                default_model: models_config.default_model.clone(),
        })
    }

    /// Load every `eager` model, then the default model if it isn't loaded
    /// yet. Called once at process startup.
    ///
    /// # Errors
    ///
    /// Returns the first load error encountered.
    pub async fn startup(&self) -> Result<(), ModelError> {
        for (id, entry) in &self.entries {
            if entry.load_mode == LoadMode::Eager {
                entry.load(id).await?;
            }
        }
        if let Some(entry) = self.entries.get(&self.default_model) {
            if entry.load_mode != LoadMode::Off {
                entry.load(&self.default_model).await?;
            }
        }
        Ok(())
    }

    /// Resolve `model_id` (or the default, if `None`) to a loaded backend.
    ///
    /// # Errors
    ///
    /// [`ModelError::Unknown`] if the model id has no spec;
    /// [`ModelError::NotLoaded`] if its mode is `off` and it was never
    /// admin-loaded.
    pub async fn bind(&self, model_id: Option<&str>) -> Result<Arc<dyn ModelBackend>, ModelError> {
        let model_id = model_id.unwrap_or(&self.default_model);
        let entry = self
            .entries
            .get(model_id)
            .ok_or_else(|| ModelError::Unknown(model_id.to_owned()))?;

        match entry.load_mode {
            LoadMode::Off => {
                if !entry.is_loaded() {
                    return Err(ModelError::NotLoaded(model_id.to_owned()));
                }
            }
            LoadMode::Lazy | LoadMode::Eager => {
                entry.load(model_id).await?;
            }
        }
        Ok(Arc::clone(&entry.backend))
    }

    /// Administrative transition of a model to the loaded state, overriding
    /// `off`.
    ///
    /// # Errors
    ///
    /// [`ModelError::Unknown`] if the model id has no spec.
    pub async fn admin_load(&self, model_id: &str) -> Result<(), ModelError> {
        let entry = self
            .entries
            .get(model_id)
            .ok_or_else(|| ModelError::Unknown(model_id.to_owned()))?;
        entry.load(model_id).await
    }

    #[must_use]
    pub fn default_model_id(&self) -> &str {
        &self.default_model
    }

    #[must_use]
    pub fn is_loaded(&self, model_id: &str) -> bool {
        self.entries.get(model_id).is_some_and(Entry::is_loaded)
    }

    #[must_use]
    pub fn model_ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Readiness for `/readyz` / `/modelz`: whether at least one model is loaded.
    #[must_use]
    pub fn any_loaded(&self) -> bool {
        self.entries.values().any(Entry::is_loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockModelBackend;
    use infergate_core::ModelSpec;

    fn config(mode_a: LoadMode, mode_b: LoadMode) -> ModelsConfig {
        ModelsConfig {
            models: vec![
                ModelSpec {
                    id: "a".into(),
                    backend: "mock://a".into(),
                    load_mode: mode_a,
                    capabilities: HashMap::new(),
                    dtype: None,
                    device: None,
                    quantization: None,
                },
                ModelSpec {
                    id: "b".into(),
                    backend: "mock://b".into(),
                    load_mode: mode_b,
                    capabilities: HashMap::new(),
                    dtype: None,
                    device: None,
                    quantization: None,
                },
            ],
            default_model: "a".into(),
            default_capabilities: HashMap::new(),
        }
    }

    fn backends() -> HashMap<String, Arc<dyn ModelBackend>> {
        let mut map: HashMap<String, Arc<dyn ModelBackend>> = HashMap::new();
        map.insert("a".into(), Arc::new(MockModelBackend::always("a-out")));
        map.insert("b".into(), Arc::new(MockModelBackend::always("b-out")));
        map
    }

    #[tokio::test]
    async fn off_model_fails_until_admin_loaded() {
        let registry =
        ModelRegistry::new(&config(LoadMode::Off, LoadMode::Lazy), backends()).unwrap();
        registry.startup().await.unwrap();
        assert!(registry.bind(Some("a")).await.is_err());
        registry.admin_load("a").await.unwrap();
        assert!(registry.bind(Some("a")).await.is_ok());
    }

    #[tokio::test]
    async fn lazy_non_default_loads_on_first_bind_only() {
        let registry =
        ModelRegistry::new(&config(LoadMode::Eager, LoadMode::Lazy), backends()).unwrap();
        registry.startup().await.unwrap();
        assert!(registry.is_loaded("a"));
        assert!(!registry.is_loaded("b"));
        registry.bind(Some("b")).await.unwrap();
        assert!(registry.is_loaded("b"));
    }

    #[tokio::test]
    async fn unknown_model_id_is_an_error() {
        let registry =
        ModelRegistry::new(&config(LoadMode::Eager, LoadMode::Eager), backends()).unwrap();
        assert!(registry.bind(Some("nope")).await.is_err());
    }

    #[tokio::test]
    async fn default_model_used_when_none_requested() {
        let registry =
        ModelRegistry::new(&config(LoadMode::Eager, LoadMode::Eager), backends()).unwrap();
        registry.startup().await.unwrap();
        let backend = registry.bind(None).await.unwrap();
        let out = backend
            .generate("hi", &crate::backend::GenerationParams::default())
            .await
            .unwrap();
        assert_eq!(out, "a-out");
    }
}
