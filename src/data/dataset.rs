// ============================================================
// Layer 4 — Sign Dataset
// ============================================================
// Implements Burn's Dataset trait over a JSON manifest of
// pre-extracted frame features.
//
// Layout:
//   <dataset_root>/<mode>_info.json
//   <dataset_root>/<frames>            ← one .npy per sample, [frames, dim] f32
//
// Manifest entry:
//   { "fileid": "...", "folder": "...", "signer": "...",
//     "label": "GLOSS GLOSS ...", "frames": "dev/xyz.npy",
//     "original_info": "..." }           ← optional
//
// Frame arrays are read lazily in get(), so the manifest can
// describe far more data than fits in memory. A sample that cannot
// be read comes back as Some(Err(..)) and fails its batch.

use anyhow::{Context, Result};
use burn::data::dataset::Dataset;
use ndarray::Array2;
use ndarray_npy::read_npy;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::data::gloss_dict::GlossDict;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub fileid: String,
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub signer: String,
    /// Space-separated gloss annotation
    pub label:  String,
    /// Path of the frame array, relative to the dataset root
    pub frames: PathBuf,
    #[serde(default)]
    pub original_info: Option<String>,
}

impl ManifestEntry {
    /// "<fileid>|<folder>|<signer>|<label>" unless the manifest gives one
    pub fn info(&self) -> String {
        match &self.original_info {
            Some(info) => info.clone(),
            None => format!("{}|{}|{}|{}", self.fileid, self.folder, self.signer, self.label),
        }
    }
}

/// Why a sample or batch could not be produced.
///
/// burn's loader ends a pass at the first `Dataset::get` that returns
/// `None`, so read failures travel through it as values instead.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct LoadError(pub String);

impl From<anyhow::Error> for LoadError {
    fn from(e: anyhow::Error) -> Self {
        Self(format!("{e:#}"))
    }
}

pub type LoadedSample = std::result::Result<SignSample, LoadError>;

/// One sample, frames loaded
#[derive(Debug, Clone)]
pub struct SignSample {
    /// [frames, dim]
    pub frames: Array2<f32>,
    pub label:  Vec<i64>,
    pub info:   String,
}

impl SignSample {
    pub fn num_frames(&self) -> usize {
        self.frames.nrows()
    }
}

pub struct SignDataset {
    root:    PathBuf,
    entries: Vec<ManifestEntry>,
    labels:  Vec<Vec<i64>>,
}

impl SignDataset {
    /// Read `<root>/<mode>_info.json` and map every annotation to gloss ids
    pub fn load(root: impl Into<PathBuf>, mode: &str, dict: &GlossDict) -> Result<Self> {
        let root = root.into();
        let manifest = root.join(format!("{mode}_info.json"));
        let json = fs::read_to_string(&manifest)
            .with_context(|| format!("Cannot read manifest '{}'", manifest.display()))?;
        let entries: Vec<ManifestEntry> = serde_json::from_str(&json)
            .with_context(|| format!("Malformed manifest '{}'", manifest.display()))?;

        tracing::info!("{} {} samples in '{}'", entries.len(), mode, root.display());
        Ok(Self::from_entries(root, entries, dict))
    }

    pub fn from_entries(root: impl Into<PathBuf>, entries: Vec<ManifestEntry>, dict: &GlossDict) -> Self {
        let labels = entries.iter().map(|e| encode_label(&e.label, dict)).collect();
        Self { root: root.into(), entries, labels }
    }

    /// Load sample `index`, reporting why it failed
    pub fn load_sample(&self, index: usize) -> Result<SignSample> {
        let entry = self
            .entries
            .get(index)
            .with_context(|| format!("Sample {index} out of range ({} samples)", self.entries.len()))?;
        let path = self.frame_path(entry);
        let frames: Array2<f32> = read_npy(&path)
            .with_context(|| format!("Cannot read frames '{}'", path.display()))?;

        Ok(SignSample {
            frames,
            label: self.labels[index].clone(),
            info:  entry.info(),
        })
    }

    fn frame_path(&self, entry: &ManifestEntry) -> PathBuf {
        if entry.frames.is_absolute() {
            entry.frames.clone()
        } else {
            self.root.join(&entry.frames)
        }
    }
}

impl Dataset<LoadedSample> for SignDataset {
    fn get(&self, index: usize) -> Option<LoadedSample> {
        if index >= self.entries.len() {
            return None;
        }
        Some(self.load_sample(index).map_err(LoadError::from))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Glosses missing from the dictionary are dropped
fn encode_label(annotation: &str, dict: &GlossDict) -> Vec<i64> {
    annotation
        .split_whitespace()
        .filter_map(|gloss| match dict.id(gloss) {
            Some(id) => Some(id as i64),
            None => {
                tracing::debug!("Gloss '{}' not in dictionary", gloss);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray_npy::write_npy;
    use std::path::Path;

    fn write_manifest(root: &Path) {
        let entries = serde_json::json!([
            { "fileid": "utt0", "folder": "f", "signer": "s1",
              "label": "MORGEN REGEN", "frames": "dev/utt0.npy" },
            { "fileid": "utt1", "label": "REGEN UNBEKANNT", "frames": "dev/utt1.npy",
              "original_info": "utt1|custom" }
        ]);
        fs::write(root.join("dev_info.json"), entries.to_string()).unwrap();
        fs::create_dir_all(root.join("dev")).unwrap();
        write_npy(root.join("dev/utt0.npy"), &Array2::<f32>::ones((5, 4))).unwrap();
    }

    #[test]
    fn test_manifest_labels_and_info() {
        let tmp  = tempfile::tempdir().unwrap();
        write_manifest(tmp.path());
        let dict = GlossDict::from_glosses(["MORGEN", "REGEN"]);
        let ds   = SignDataset::load(tmp.path(), "dev", &dict).unwrap();

        assert_eq!(ds.len(), 2);
        let sample = ds.get(0).unwrap().unwrap();
        assert_eq!(sample.label, vec![1, 2]);
        assert_eq!(sample.info, "utt0|f|s1|MORGEN REGEN");
        assert_eq!(sample.num_frames(), 5);
    }

    #[test]
    fn test_original_info_wins() {
        let entry: ManifestEntry = serde_json::from_str(
            r#"{ "fileid": "utt1", "label": "A", "frames": "x.npy", "original_info": "utt1|custom" }"#,
        )
        .unwrap();
        assert_eq!(entry.info(), "utt1|custom");
    }

    #[test]
    fn test_missing_frames_file() {
        let tmp  = tempfile::tempdir().unwrap();
        write_manifest(tmp.path());
        let dict = GlossDict::from_glosses(["MORGEN", "REGEN"]);
        let ds   = SignDataset::load(tmp.path(), "dev", &dict).unwrap();

        // an unreadable sample is still an item, so the pass goes on
        let err = ds.get(1).unwrap().unwrap_err();
        assert!(err.0.contains("utt1.npy"), "{err}");
        assert!(ds.get(2).is_none());
    }
}
