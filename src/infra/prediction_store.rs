// ============================================================
// Layer 6 — Prediction Store
// ============================================================
// Evaluation persists every batch as soon as it is decoded so
// that a long pass can be resumed and aggregated later.
//
// Layout (root defaults to ./json_saved_data):
//
//   <root>/<mode>/<batch_idx>/
//     sequence_logits.npy   ← raw framewise logits, host copy
//     return_dict.json      ← annotations / predictions / labels / mode
//
// The presence of a batch directory is the resume marker: the
// evaluation loop skips any batch whose directory already exists.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::domain::batch::SignBatch;
use crate::domain::hypothesis::Hypothesis;
use crate::domain::traits::RecognitionOutput;

pub const LOGITS_FILE: &str = "sequence_logits.npy";
pub const RETURN_FILE: &str = "return_dict.json";

/// Contents of return_dict.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedPredictions {
    /// Raw per-sample identifiers
    pub annotations: Vec<String>,
    /// Decoded hypotheses, one per sample
    pub predictions: Vec<Hypothesis>,
    /// The batch's flattened label ids
    pub labels:      Vec<i64>,
    pub mode:        String,
}

#[derive(Debug, Clone)]
pub struct PredictionStore {
    root: PathBuf,
}

impl Default for PredictionStore {
    fn default() -> Self {
        Self::new("./json_saved_data")
    }
}

impl PredictionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn batch_dir(&self, mode: &str, batch_idx: usize) -> PathBuf {
        self.root.join(mode).join(batch_idx.to_string())
    }

    /// Persist one evaluated batch. Fails if the directory or either
    /// file cannot be written.
    pub fn save_ret_as_json<O: RecognitionOutput>(
        &self,
        data:      &SignBatch,
        ret:       &O,
        batch_idx: usize,
        mode:      &str,
    ) -> Result<()> {
        let save_dir = self.batch_dir(mode, batch_idx);
        fs::create_dir_all(&save_dir)
            .with_context(|| format!("Cannot create '{}'", save_dir.display()))?;

        let npy_file = save_dir.join(LOGITS_FILE);
        let logits = ret.sequence_logits()?;
        ndarray_npy::write_npy(&npy_file, &logits)
            .with_context(|| format!("Cannot write '{}'", npy_file.display()))?;

        let saved = SavedPredictions {
            annotations: data.info.clone(),
            predictions: ret.recognized_sents().to_vec(),
            labels:      data.label.clone(),
            mode:        mode.to_string(),
        };
        let json_file = save_dir.join(RETURN_FILE);
        fs::write(&json_file, serde_json::to_string(&saved)?)
            .with_context(|| format!("Cannot write '{}'", json_file.display()))?;

        tracing::debug!("Saved batch {} predictions to '{}'", batch_idx, save_dir.display());
        Ok(())
    }

    /// Read back every persisted batch of `mode`, ordered by batch index.
    /// Directories whose name is not a batch index are ignored.
    pub fn load_all(&self, mode: &str) -> Result<Vec<(usize, SavedPredictions)>> {
        let mode_dir = self.root.join(mode);
        let mut batches = Vec::new();

        for entry in fs::read_dir(&mode_dir)
            .with_context(|| format!("Cannot read '{}'", mode_dir.display()))?
        {
            let entry = entry?;
            let Some(batch_idx) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<usize>().ok())
            else {
                continue;
            };
            let json_file = entry.path().join(RETURN_FILE);
            let text = fs::read_to_string(&json_file)
                .with_context(|| format!("Cannot read '{}'", json_file.display()))?;
            let saved: SavedPredictions = serde_json::from_str(&text)
                .with_context(|| format!("Malformed '{}'", json_file.display()))?;
            batches.push((batch_idx, saved));
        }

        batches.sort_by_key(|(idx, _)| *idx);
        Ok(batches)
    }
}
