// ============================================================
// Layer 6 — Feature Store
// ============================================================
// Framewise features are written once per sample under the run's
// work directory and then exposed at a canonical location through
// a symbolic link:
//
//   <work_dir>/<mode>/<name>_features.npy     ← one per sample
//   <features_root>/<mode>  ──symlink──►  abs(<work_dir>/<mode>)
//
// The link doubles as a materialisation marker:
//
//   link present, target inside work_dir  → already generated
//   link present, target elsewhere        → stale, remove it
//   no link, source dir holds one file
//   per dataset sample                    → just re-link
//
// Each feature file is an npz archive with two members, `label`
// (int64 gloss ids) and `features` (float32, frames × dim).
// numpy.load() detects the archive from its magic bytes, so the
// .npy file name is kept for downstream tooling.

use anyhow::{Context, Result};
use ndarray::{Array1, Array2};
use ndarray_npy::NpzWriter;
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use crate::domain::hypothesis::sample_name;

/// Outcome of the cache check that precedes feature generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// The canonical link already points into this work dir
    AlreadyLinked,
    /// Features were on disk but unlinked; the link was recreated
    Relinked,
    /// A link into another run was removed; features must be generated
    Evicted,
    /// Nothing usable on disk; features must be generated
    Missing,
}

impl CacheStatus {
    pub fn is_cached(self) -> bool {
        matches!(self, CacheStatus::AlreadyLinked | CacheStatus::Relinked)
    }
}

#[derive(Debug, Clone)]
pub struct FeatureStore {
    root: PathBuf,
}

impl Default for FeatureStore {
    fn default() -> Self {
        Self::new("./features")
    }
}

impl FeatureStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Canonical link location for `mode`
    pub fn link_path(&self, mode: &str) -> Result<PathBuf> {
        Ok(std::path::absolute(self.root.join(mode))?)
    }

    /// Directory the per-sample files are written into
    pub fn source_dir(work_dir: &Path, mode: &str) -> Result<PathBuf> {
        Ok(std::path::absolute(work_dir.join(mode))?)
    }

    pub fn check_cache(&self, work_dir: &Path, mode: &str, dataset_len: usize) -> Result<CacheStatus> {
        let src_path = Self::source_dir(work_dir, mode)?;
        let tgt_path = self.link_path(mode)?;

        let is_link = fs::symlink_metadata(&tgt_path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);

        if is_link {
            let curr_path = fs::read_link(&tgt_path)
                .with_context(|| format!("Cannot read link '{}'", tgt_path.display()))?;
            if points_into(&curr_path, work_dir) {
                return Ok(CacheStatus::AlreadyLinked);
            }
            fs::remove_file(&tgt_path)
                .with_context(|| format!("Cannot remove stale link '{}'", tgt_path.display()))?;
            tracing::info!("Removed stale feature link '{}' -> '{}'", tgt_path.display(), curr_path.display());
            return Ok(CacheStatus::Evicted);
        }

        if src_path.is_dir() && count_entries(&src_path)? == dataset_len {
            self.link(&src_path, mode)?;
            return Ok(CacheStatus::Relinked);
        }

        Ok(CacheStatus::Missing)
    }

    /// Write one sample's label slice and feature matrix into `src_dir`
    pub fn save_sample(
        &self,
        src_dir:  &Path,
        info:     &str,
        label:    &[i64],
        features: &Array2<f32>,
    ) -> Result<PathBuf> {
        let filename = src_dir.join(format!("{}_features.npy", sample_name(info)));
        let file = File::create(&filename)
            .with_context(|| format!("Cannot create '{}'", filename.display()))?;

        let mut npz = NpzWriter::new(file);
        npz.add_array("label", &Array1::from(label.to_vec()))?;
        npz.add_array("features", features)?;
        npz.finish()
            .with_context(|| format!("Cannot finish '{}'", filename.display()))?;
        Ok(filename)
    }

    /// Point the canonical link for `mode` at `src_path`
    pub fn link(&self, src_path: &Path, mode: &str) -> Result<()> {
        let tgt_path = self.link_path(mode)?;
        if let Some(parent) = tgt_path.parent() {
            fs::create_dir_all(parent)?;
        }
        symlink_dir(src_path, &tgt_path).with_context(|| {
            format!("Cannot link '{}' -> '{}'", tgt_path.display(), src_path.display())
        })?;
        tracing::info!("Linked '{}' -> '{}'", tgt_path.display(), src_path.display());
        Ok(())
    }
}

/// A link target belongs to `work_dir` if it is absolute and contains
/// the work dir path with its leading '.' removed ("./runs/a/" → "/runs/a/").
fn points_into(target: &Path, work_dir: &Path) -> bool {
    let work_dir = work_dir.to_string_lossy();
    let marker = work_dir.strip_prefix('.').unwrap_or(&work_dir);
    target.is_absolute() && target.to_string_lossy().contains(marker)
}

fn count_entries(dir: &Path) -> Result<usize> {
    Ok(fs::read_dir(dir)
        .with_context(|| format!("Cannot list '{}'", dir.display()))?
        .count())
}

#[cfg(unix)]
fn symlink_dir(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(windows)]
fn symlink_dir(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(src, dst)
}
