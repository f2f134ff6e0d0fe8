// ============================================================
// Layer 6 — CTM Hypothesis Writer
// ============================================================
// The WER scorer reads hypotheses in a CTM-like text format,
// one line per decoded gloss:
//
//   <sample_id> 1 <start> <end> <gloss>
//
// Glosses have no real timing, so the n-th gloss of a sentence
// is given the slot [n/100, (n+1)/100], printed with two decimals.

use anyhow::{Context, Result};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use crate::domain::hypothesis::Hypothesis;

/// Write `output[i]` under id `info[i]`, truncating any existing file.
pub fn write2file(path: impl AsRef<Path>, info: &[String], output: &[Hypothesis]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Cannot open hypothesis file '{}'", path.display()))?;
    let mut w = BufWriter::new(file);

    for (sample_idx, sample) in output.iter().enumerate() {
        let id = info
            .get(sample_idx)
            .with_context(|| format!("No sample id for hypothesis {sample_idx}"))?;
        for (word_idx, word) in sample.iter().enumerate() {
            writeln!(
                w,
                "{} 1 {:.2} {:.2} {}",
                id,
                word_idx as f64 / 100.0,
                (word_idx + 1) as f64 / 100.0,
                word.gloss(),
            )?;
        }
    }

    w.flush()?;
    Ok(())
}
