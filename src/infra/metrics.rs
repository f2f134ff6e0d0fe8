// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records one CSV row per training epoch so learning curves can
// be plotted after the run.
//
// Columns:
//   epoch           — epoch number (starts at 0, like the log lines)
//   train_loss      — mean loss over the batches that were stepped
//   dev_wer         — word error rate on dev, or empty when not scored
//   trained_batches — batches with a finite loss (non-finite ones are skipped)
//
// Output file: <work_dir>/metrics.csv
//
//   epoch,train_loss,dev_wer,trained_batches
//   0,84.213400,,112
//   1,41.008100,38.20,112

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:           usize,
    pub train_loss:      f64,
    pub dev_wer:         Option<f64>,
    pub trained_batches: usize,
}

impl EpochMetrics {
    /// Summarise the per-batch losses returned by the training loop
    pub fn from_losses(epoch: usize, losses: &[f64], dev_wer: Option<f64>) -> Self {
        Self {
            epoch,
            train_loss: mean(losses),
            dev_wer,
            trained_batches: losses.len(),
        }
    }

    /// True if this epoch's dev WER beats `best`
    pub fn is_improvement(&self, best: f64) -> bool {
        self.dev_wer.is_some_and(|wer| wer < best)
    }
}

/// Arithmetic mean; NaN for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file does not exist yet,
    /// so repeated runs append to the same log.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "epoch,train_loss,dev_wer,trained_batches")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        let wer = m.dev_wer.map(|w| format!("{w:.2}")).unwrap_or_default();
        writeln!(f, "{},{:.6},{},{}", m.epoch, m.train_loss, wer, m.trained_batches)?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_improvement() {
        let m = EpochMetrics::from_losses(2, &[1.0, 3.0], Some(30.0));
        assert_eq!(m.train_loss, 2.0);
        assert!(m.is_improvement(35.0));
        assert!(!m.is_improvement(25.0));
        assert!(!EpochMetrics::from_losses(0, &[1.0], None).is_improvement(100.0));
    }

    #[test]
    fn test_mean_of_nothing_is_nan() {
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn test_rows_are_appended() {
        let tmp    = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(tmp.path()).unwrap();
        logger.log(&EpochMetrics::from_losses(0, &[2.0], None)).unwrap();
        logger.log(&EpochMetrics::from_losses(1, &[1.0], Some(40.0))).unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        assert_eq!(
            text,
            "epoch,train_loss,dev_wer,trained_batches\n0,2.000000,,1\n1,1.000000,40.00,1\n"
        );
    }
}
