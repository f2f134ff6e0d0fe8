// ============================================================
// Layer 3 — Hypothesis Domain Types
// ============================================================
// The decoder turns framewise scores into an ordered list of
// recognised glosses per sample. Each entry is a (gloss, position)
// pair; serde writes it as a two-element JSON array so the
// persisted predictions look like [["HELLO", 0], ["WORLD", 1]].

use serde::{Deserialize, Serialize};

/// One decoded token: the gloss text and its position in the sentence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizedGloss(pub String, pub usize);

impl RecognizedGloss {
    pub fn new(gloss: impl Into<String>, position: usize) -> Self {
        Self(gloss.into(), position)
    }

    /// The token text (first element of the pair)
    pub fn gloss(&self) -> &str {
        &self.0
    }
}

/// The decoded sentence for one sample
pub type Hypothesis = Vec<RecognizedGloss>;

/// Sample identifiers look like "<name>|<folder>|<signer>|<annotation>".
/// File names and CTM ids only use the part before the first '|'.
pub fn sample_name(info: &str) -> &str {
    info.split('|').next().unwrap_or(info)
}
