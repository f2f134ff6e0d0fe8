// ============================================================
// Layer 6 — Run Recorder
// ============================================================
// The log sink shared by every loop in Layer 2.
//
//   print_log()    — emit a tracing event and append the line
//                    to <work_dir>/log.txt
//   print_log_to() — same, but into an explicit file
//                    (e.g. <work_dir>/dev.txt for WER lines)
//   record_timer() — start/restart a named stopwatch
//   elapsed()      — seconds since a stopwatch was started
//
// `log_interval` tells the training loop how often to print
// a progress line.

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    time::Instant,
};

pub struct Recorder {
    pub log_interval: usize,
    log_path:         PathBuf,
    timers:           HashMap<String, Instant>,
}

impl Recorder {
    /// Recorder that appends to `<work_dir>/log.txt`
    pub fn new(work_dir: impl AsRef<Path>, log_interval: usize) -> Result<Self> {
        let work_dir = work_dir.as_ref();
        fs::create_dir_all(work_dir)
            .with_context(|| format!("Cannot create work dir '{}'", work_dir.display()))?;
        Ok(Self {
            log_interval: log_interval.max(1),
            log_path:     work_dir.join("log.txt"),
            timers:       HashMap::new(),
        })
    }

    pub fn print_log(&self, msg: &str) {
        tracing::info!("{msg}");
        if let Err(e) = append_line(&self.log_path, msg) {
            tracing::warn!("Cannot write log file '{}': {e}", self.log_path.display());
        }
    }

    /// Log `msg` and append it to `path` instead of the run log
    pub fn print_log_to(&self, msg: &str, path: impl AsRef<Path>) {
        let path = path.as_ref();
        tracing::info!("{msg}");
        if let Err(e) = append_line(path, msg) {
            tracing::warn!("Cannot write log file '{}': {e}", path.display());
        }
    }

    pub fn record_timer(&mut self, key: &str) {
        self.timers.insert(key.to_string(), Instant::now());
    }

    pub fn elapsed(&self, key: &str) -> Option<f64> {
        self.timers.get(key).map(|t| t.elapsed().as_secs_f64())
    }
}

fn append_line(path: &Path, msg: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(f, "{msg}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_log_appends_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(tmp.path(), 10).unwrap();
        recorder.print_log("first");
        recorder.print_log("second");

        let text = fs::read_to_string(tmp.path().join("log.txt")).unwrap();
        assert_eq!(text, "first\nsecond\n");
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(Recorder::new(tmp.path(), 0).unwrap().log_interval, 1);
    }

    #[test]
    fn test_timer() {
        let tmp = tempfile::tempdir().unwrap();
        let mut recorder = Recorder::new(tmp.path(), 1).unwrap();
        assert!(recorder.elapsed("device").is_none());
        recorder.record_timer("device");
        assert!(recorder.elapsed("device").unwrap() >= 0.0);
    }
}
