use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::accuracy::{AccuracyProfile, TierAccuracy};
use crate::config::Settings;
use crate::error::EngineError;
use crate::model::{CoefficientModel, CoefficientModelArtifact};

const BUILTIN_MODELS: [&str; 2] = [
    include_str!("../assets/model_v1.json"),
    include_str!("../assets/model_v2.json"),
];

/// One model version on disk: coefficients plus their accuracy table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    #[serde(flatten)]
    pub coefficients: CoefficientModelArtifact,
    pub accuracy: Vec<TierAccuracy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryArtifact {
    #[serde(default)]
    pub default_version: Option<String>,
    pub models: Vec<ModelArtifact>,
}

/// A coefficient model and the accuracy profile fitted alongside it.
#[derive(Debug, Clone)]
pub struct ModelVersion {
    pub model: CoefficientModel,
    pub accuracy: AccuracyProfile,
}

impl ModelVersion {
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, EngineError> {
        let model = CoefficientModel::from_artifact(artifact.coefficients)?;
        let accuracy = AccuracyProfile::new(model.version(), artifact.accuracy)?;

        // Every tier the model scores must have accuracy data, and nothing else.
        for dev_trait in model.dev_traits().names() {
            accuracy.tier(dev_trait)?;
        }
        for tier in accuracy.tiers() {
            if !model.dev_traits().contains(&tier.tier) {
                return Err(EngineError::invalid_model(
                    model.version(),
                    format!("accuracy tier '{}' is not a dev trait of this model", tier.tier),
                ));
            }
        }

        Ok(Self { model, accuracy })
    }

    pub fn version(&self) -> &str {
        self.model.version()
    }
}

/// Read-only set of model versions, validated once at load.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    versions: Vec<ModelVersion>,
    by_id: HashMap<String, usize>,
    default_idx: usize,
}

impl ModelRegistry {
    pub fn from_artifact(artifact: RegistryArtifact) -> Result<Self, EngineError> {
        let mut versions = Vec::with_capacity(artifact.models.len());
        let mut by_id = HashMap::with_capacity(artifact.models.len());
        for item in artifact.models {
            let version = ModelVersion::from_artifact(item)?;
            let id = version_key(version.version());
            if by_id.insert(id, versions.len()).is_some() {
                return Err(EngineError::invalid_model(
                    version.version(),
                    "version id is registered twice",
                ));
            }
            debug!(
                "validated model {} ({} positions, {} abilities)",
                version.version(),
                version.model.positions().levels().len(),
                version.model.abilities().len()
            );
            versions.push(version);
        }

        if versions.is_empty() {
            return Err(EngineError::invalid_model("<registry>", "no model versions"));
        }
        let default_idx = match artifact.default_version {
            Some(id) => *by_id
                .get(&version_key(&id))
                .ok_or_else(|| EngineError::UnknownVersion(id.clone()))?,
            None => 0,
        };

        Ok(Self {
            versions,
            by_id,
            default_idx,
        })
    }

    /// The versions embedded in the binary.
    pub fn builtin() -> Result<Self> {
        let mut models = Vec::with_capacity(BUILTIN_MODELS.len());
        for raw in BUILTIN_MODELS {
            let artifact = serde_json::from_str::<ModelArtifact>(raw)
                .context("parse built-in model artifact")?;
            models.push(artifact);
        }
        let registry = Self::from_artifact(RegistryArtifact {
            default_version: None,
            models,
        })?;
        Ok(registry)
    }

    /// Looks up a version id, case-insensitively.
    pub fn active(&self, version: &str) -> Result<&ModelVersion, EngineError> {
        self.by_id
            .get(&version_key(version))
            .map(|&idx| &self.versions[idx])
            .ok_or_else(|| EngineError::UnknownVersion(version.trim().to_string()))
    }

    pub fn default_version(&self) -> &ModelVersion {
        &self.versions[self.default_idx]
    }

    pub fn versions(&self) -> &[ModelVersion] {
        &self.versions
    }

    pub fn with_default(mut self, version: &str) -> Result<Self, EngineError> {
        let idx = self
            .by_id
            .get(&version_key(version))
            .copied()
            .ok_or_else(|| EngineError::UnknownVersion(version.trim().to_string()))?;
        self.default_idx = idx;
        Ok(self)
    }
}

pub fn load_registry_file(path: &Path) -> Result<ModelRegistry> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read model registry {}", path.display()))?;
    let artifact = serde_json::from_str::<RegistryArtifact>(&raw)
        .with_context(|| format!("parse model registry {}", path.display()))?;
    let registry = ModelRegistry::from_artifact(artifact)
        .with_context(|| format!("validate model registry {}", path.display()))?;
    Ok(registry)
}

/// Registry from `settings`: the override file if configured, else the built-ins.
pub fn load_registry(settings: &Settings) -> Result<ModelRegistry> {
    let registry = match settings.registry_path.as_deref() {
        Some(path) => load_registry_file(path)?,
        None => ModelRegistry::builtin()?,
    };
    let registry = match settings.model_version.as_deref() {
        Some(version) => registry.with_default(version)?,
        None => registry,
    };
    for version in registry.versions() {
        info!(
            "loaded model {} \"{}\" (n={}, floor={})",
            version.version(),
            version.model.label(),
            version.model.stats().n,
            version.model.floor_at_zero()
        );
    }
    Ok(registry)
}

/// Process-wide registry, loaded from the environment on first use.
pub fn global_registry() -> Result<&'static ModelRegistry> {
    static REGISTRY: OnceCell<ModelRegistry> = OnceCell::new();
    REGISTRY.get_or_try_init(|| load_registry(&Settings::from_env()))
}

fn version_key(id: &str) -> String {
    id.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_both_versions() {
        let reg = ModelRegistry::builtin().unwrap();
        assert_eq!(reg.versions().len(), 2);
        assert_eq!(reg.default_version().version(), "v1");
        assert!(reg.active(" V2 ").is_ok());
        assert!(matches!(
            reg.active("v9"),
            Err(EngineError::UnknownVersion(_))
        ));
    }

    #[test]
    fn with_default_switches_version() {
        let reg = ModelRegistry::builtin().unwrap().with_default("v2").unwrap();
        assert_eq!(reg.default_version().version(), "v2");
        assert!(matches!(
            reg.with_default("v9"),
            Err(EngineError::UnknownVersion(_))
        ));
    }

    fn builtin_artifacts() -> Vec<ModelArtifact> {
        BUILTIN_MODELS
            .iter()
            .map(|raw| serde_json::from_str(raw).unwrap())
            .collect()
    }

    #[test]
    fn declared_default_resolves_at_construction() {
        let reg = ModelRegistry::from_artifact(RegistryArtifact {
            default_version: Some("V2".to_string()),
            models: builtin_artifacts(),
        })
        .unwrap();
        assert_eq!(reg.default_version().version(), "v2");

        let err = ModelRegistry::from_artifact(RegistryArtifact {
            default_version: Some("v7".to_string()),
            models: builtin_artifacts(),
        })
        .unwrap_err();
        assert!(matches!(err, EngineError::UnknownVersion(id) if id == "v7"));
    }
}
