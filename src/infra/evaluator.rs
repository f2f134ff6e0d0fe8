// ============================================================
// Layer 6 — WER Evaluator
// ============================================================
// Scores a CTM hypothesis file against an STM reference.
//
// Reference file: <evaluate_dir>/<evaluate_prefix>-<mode>.stm
//   <id> <channel> <speaker> <start> <end> GLOSS GLOSS ...
// Hypothesis file: <prefix>/<output_file>
//   <id> 1 <start> <end> GLOSS          (one gloss per line)
//
// Each sentence is aligned with a Levenshtein distance and the
// errors are split into substitutions, deletions and insertions.
// The summary mirrors the line sclite prints:
//
//   Percent Total Error       =  23.10%   (  231)
//
// and parse_percentage() pulls the number back out of it.

use anyhow::{bail, Context, Result};
use std::{collections::HashMap, fs, path::Path};

use crate::domain::traits::{EvaluationRequest, WerEvaluator};

/// Error counts for one or more aligned sentences
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorCounts {
    pub substitutions: usize,
    pub deletions:     usize,
    pub insertions:    usize,
    pub reference:     usize,
}

impl ErrorCounts {
    pub fn errors(&self) -> usize {
        self.substitutions + self.deletions + self.insertions
    }

    pub fn wer(&self) -> f64 {
        if self.reference == 0 {
            return if self.errors() == 0 { 0.0 } else { 100.0 };
        }
        100.0 * self.errors() as f64 / self.reference as f64
    }

    fn add(&mut self, other: ErrorCounts) {
        self.substitutions += other.substitutions;
        self.deletions     += other.deletions;
        self.insertions    += other.insertions;
        self.reference     += other.reference;
    }
}

/// Built-in evaluator: edit distance over glosses
#[derive(Debug, Clone, Default)]
pub struct EditDistanceEvaluator;

impl WerEvaluator for EditDistanceEvaluator {
    fn evaluate(&self, req: &EvaluationRequest) -> Result<String> {
        let stm_path = req
            .evaluate_dir
            .join(format!("{}-{}.stm", req.evaluate_prefix, req.mode));
        let ctm_path = req.prefix.join(&req.output_file);

        let references = read_stm(&stm_path)?;
        let hypotheses = read_ctm(&ctm_path)?;

        let mut total = ErrorCounts::default();
        let mut report = Vec::with_capacity(references.len() + 1);
        for (id, reference) in &references {
            let hyp = hypotheses.get(id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            let counts = align(reference, hyp);
            report.push(format!(
                "{id} S={} D={} I={} N={} WER={:.2}",
                counts.substitutions, counts.deletions, counts.insertions,
                counts.reference, counts.wer(),
            ));
            total.add(counts);
        }

        let summary = format!(
            "Percent Total Error       =  {:>6.2}%   ({:>5})",
            total.wer(),
            total.errors()
        );
        report.push(summary.clone());

        let out_dir = req.prefix.join(&req.output_dir);
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("Cannot create '{}'", out_dir.display()))?;
        fs::write(out_dir.join(format!("{}-wer.txt", req.mode)), report.join("\n") + "\n")?;

        tracing::debug!("{} WER over {} sentences: {:.2}%", req.mode, references.len(), total.wer());
        Ok(summary)
    }
}

/// Extract NN.NN from "... = NN.NN% ..."
pub fn parse_percentage(ret: &str) -> Result<f64> {
    let Some((_, rest)) = ret.split_once('=') else {
        bail!("No '=' in evaluator output: {ret:?}");
    };
    let Some((number, _)) = rest.split_once('%') else {
        bail!("No '%' in evaluator output: {ret:?}");
    };
    number
        .trim()
        .parse::<f64>()
        .with_context(|| format!("Cannot parse percentage from {ret:?}"))
}

/// Align a hypothesis against a reference and classify the errors
pub fn align(reference: &[String], hypothesis: &[String]) -> ErrorCounts {
    let n = reference.len();
    let m = hypothesis.len();

    // cost[i][j] = (total, subs, dels, ins) for reference[..i] vs hypothesis[..j]
    let mut cost = vec![vec![(0usize, 0usize, 0usize, 0usize); m + 1]; n + 1];
    for i in 1..=n {
        cost[i][0] = (i, 0, i, 0);
    }
    for j in 1..=m {
        cost[0][j] = (j, 0, 0, j);
    }
    for i in 1..=n {
        for j in 1..=m {
            let diag = cost[i - 1][j - 1];
            let sub = if reference[i - 1] == hypothesis[j - 1] {
                diag
            } else {
                (diag.0 + 1, diag.1 + 1, diag.2, diag.3)
            };
            let up   = cost[i - 1][j];
            let del  = (up.0 + 1, up.1, up.2 + 1, up.3);
            let left = cost[i][j - 1];
            let ins  = (left.0 + 1, left.1, left.2, left.3 + 1);
            cost[i][j] = [sub, del, ins]
                .into_iter()
                .min_by_key(|c| c.0)
                .unwrap_or(sub);
        }
    }

    let (_, substitutions, deletions, insertions) = cost[n][m];
    ErrorCounts { substitutions, deletions, insertions, reference: n }
}

fn read_stm(path: &Path) -> Result<Vec<(String, Vec<String>)>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read reference '{}'", path.display()))?;
    let mut refs = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(";;") {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 5 {
            bail!("Malformed STM line in '{}': {line:?}", path.display());
        }
        let words = fields[5..].iter().map(|w| w.to_string()).collect();
        refs.push((fields[0].to_string(), words));
    }
    Ok(refs)
}

fn read_ctm(path: &Path) -> Result<HashMap<String, Vec<String>>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read hypothesis '{}'", path.display()))?;
    let mut hyps: HashMap<String, Vec<String>> = HashMap::new();
    for line in text.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [] => continue,
            [id, _, _, _, word, ..] => {
                hyps.entry(id.to_string()).or_default().push(word.to_string())
            }
            _ => bail!("Malformed CTM line in '{}': {line:?}", path.display()),
        }
    }
    Ok(hyps)
}
