use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Loading discipline for a model backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Backend never loaded; requests fail with `model_not_loaded`.
    Off,
    /// Backend created at startup, weights load on first use.
    Lazy,
    /// Backend fully loaded at startup.
    Eager,
}

impl LoadMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Lazy => "lazy",
            Self::Eager => "eager",
        }
    }
}

impl std::str::FromStr for LoadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "lazy" => Ok(Self::Lazy),
            "eager" => Ok(Self::Eager),
            other => Err(format!("unknown model load mode: {other}")),
        }
    }
}

/// One model's static configuration: id, backend descriptor, load mode, and
/// the per-model capability overrides it contributes to the Capability
/// Resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ModelSpec {
    pub id: String,
    /// Opaque backend descriptor (e.g. an HTTP endpoint or a local path).
    pub backend: String,
    pub load_mode: LoadMode,
    #[serde(default)]
    pub capabilities: HashMap<String, bool>,
    #[serde(default)]
    pub dtype: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub quantization: Option<String>,
}

/// The full set of model specs plus deployment-wide defaults, read-only
/// after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ModelsConfig {
    pub models: Vec<ModelSpec>,
    pub default_model: String,
    #[serde(default)]
    pub default_capabilities: HashMap<String, bool>,
}

impl ModelsConfig {
    #[must_use]
    pub fn get(&self, model_id: &str) -> Option<&ModelSpec> {
        self.models.iter().find(|m| m.id == model_id)
    }

    #[must_use]
    pub fn default_spec(&self) -> Option<&ModelSpec> {
        self.get(&self.default_model)
    }

    /// Effective per-model capabilities: deployment defaults merged with
    /// explicit per-model overrides (explicit values win).
    #[must_use]
    pub fn merged_capabilities(&self, model_id: &str) -> HashMap<String, bool> {
        let mut merged = self.default_capabilities.clone();
        if let Some(spec) = self.get(model_id) {
            for (k, v) in &spec.capabilities {
                merged.insert(k.clone(), *v);
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ModelsConfig {
        ModelsConfig {
            models: vec![
                ModelSpec {
                    id: "a".into(),
                    backend: "http://a".into(),
                    load_mode: LoadMode::Eager,
                    capabilities: HashMap::from([("extract".to_string(), false)]),
                    dtype: None,
                    device: None,
                    quantization: None,
                },
                ModelSpec {
                    id: "b".into(),
                    backend: "http://b".into(),
                    load_mode: LoadMode::Lazy,
                    capabilities: HashMap::new(),
                    dtype: None,
                    device: None,
                    quantization: None,
                },
            ],
            default_model: "a".into(),
            default_capabilities: HashMap::from([
                    ("generate".to_string(), true),
                    ("extract".to_string(), true),
            ]),
        }
    }

    #[test]
    fn explicit_model_override_wins_over_default() {
        let cfg = config();
        let merged = cfg.merged_capabilities("a");
        assert_eq!(merged.get("extract"), Some(&false));
        assert_eq!(merged.get("generate"), Some(&true));
    }

    #[test]
    fn model_without_override_inherits_defaults() {
        let cfg = config();
        let merged = cfg.merged_capabilities("b");
        assert_eq!(merged.get("extract"), Some(&true));
    }

    #[test]
    fn load_mode_roundtrips_through_str() {
        use std::str::FromStr;
        assert_eq!(LoadMode::from_str("eager").unwrap(), LoadMode::Eager);
        assert_eq!(LoadMode::from_str("OFF").unwrap(), LoadMode::Off);
        assert!(LoadMode::from_str("bogus").is_err());
    }
}
