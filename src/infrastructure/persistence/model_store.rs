//! On-disk model artifacts.
//!
//! A model is stored as two linked JSON files: `<stem>.json` holds the fitted
//! payload and `<stem>_features.json` holds its feature contract. Both carry
//! the same artifact id, so a model file is never paired with a contract
//! written by a different training run.

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::ml::contract::FeatureContract;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

#[derive(Serialize, Deserialize)]
struct ModelFile<M> {
    artifact_id: Uuid,
    model: M,
}

#[derive(Serialize, Deserialize)]
struct ContractFile {
    artifact_id: Uuid,
    features: FeatureContract,
}

#[derive(Debug, Clone)]
pub struct ModelStore {
    model_path: PathBuf,
    contract_path: PathBuf,
}

impl ModelStore {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        let model_path = model_path.into();
        let stem = model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());
        let extension = model_path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "json".to_string());
        let contract_path = model_path.with_file_name(format!("{}_features.{}", stem, extension));
        Self {
            model_path,
            contract_path,
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn contract_path(&self) -> &Path {
        &self.contract_path
    }

    pub fn exists(&self) -> bool {
        self.model_path.exists() && self.contract_path.exists()
    }

    /// Writes both files of one artifact.
    ///
    /// Each file is written to a temp path and renamed into place; the
    /// contract goes first so a crash in between leaves ids that disagree.
    pub fn save<M: Serialize>(
        &self,
        artifact_id: Uuid,
        model: &M,
        contract: &FeatureContract,
    ) -> PipelineResult<()> {
        if let Some(parent) = self.model_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| PipelineError::persistence(parent, e))?;
        }

        let contract_json = serde_json::to_string_pretty(&ContractFile {
            artifact_id,
            features: contract.clone(),
        })
        .map_err(|e| PipelineError::persistence(&self.contract_path, e))?;
        let model_json = serde_json::to_string(&ModelFile { artifact_id, model })
            .map_err(|e| PipelineError::persistence(&self.model_path, e))?;

        write_atomic(&self.contract_path, &contract_json)?;
        write_atomic(&self.model_path, &model_json)?;

        info!(
            "Saved model {} to {:?} ({} features)",
            artifact_id,
            self.model_path,
            contract.len()
        );
        Ok(())
    }

    /// Loads a model together with its contract.
    ///
    /// A missing file, an unreadable file or a pair with different artifact
    /// ids all count as no usable model.
    pub fn load<M: DeserializeOwned>(&self) -> PipelineResult<(Uuid, M, FeatureContract)> {
        for path in [&self.model_path, &self.contract_path] {
            if !path.exists() {
                return Err(PipelineError::model_not_found(format!(
                    "{} does not exist",
                    path.display()
                )));
            }
        }

        let contract: ContractFile = read_json(&self.contract_path)?;
        let model: ModelFile<M> = read_json(&self.model_path)?;
        if contract.artifact_id != model.artifact_id {
            return Err(PipelineError::model_not_found(format!(
                "model {} and contract {} come from different training runs",
                model.artifact_id, contract.artifact_id
            )));
        }

        info!("Loaded model {} from {:?}", model.artifact_id, self.model_path);
        Ok((model.artifact_id, model.model, contract.features))
    }
}

fn write_atomic(path: &Path, content: &str) -> PipelineResult<()> {
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content).map_err(|e| PipelineError::persistence(&temp_path, e))?;
    fs::rename(&temp_path, path).map_err(|e| PipelineError::persistence(path, e))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> PipelineResult<T> {
    let content = fs::read_to_string(path).map_err(|e| {
        PipelineError::model_not_found(format!("cannot read {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        PipelineError::model_not_found(format!("cannot parse {}: {}", path.display(), e))
    })
}
