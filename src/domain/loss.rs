// ============================================================
// Layer 3 — Loss Bookkeeping
// ============================================================
// The model reports its loss split into named components
// (e.g. "ConvCTC", "SeqCTC", "Dist"). Which components exist is
// fixed by the configured loss weights, and the training loop
// keeps one running sum per component between log lines.
//
// LossAccumulator is a fixed-key grouped sum with a flush:
//   add()   — fold one batch's components in
//   means() — per-component sum divided by the log interval
//   reset() — zero every component for the next window
//
// A component the accumulator was not built with is an error:
// the model and the accumulator must agree on the key set.

use anyhow::{bail, Result};
use std::collections::BTreeMap;

/// Weight per loss component, keyed by component name
pub type LossWeights = BTreeMap<String, f64>;

/// Value per loss component for one batch
pub type LossRecord = BTreeMap<String, f64>;

#[derive(Debug, Clone)]
pub struct LossAccumulator {
    totals: BTreeMap<String, f64>,
}

impl LossAccumulator {
    /// One zeroed slot per configured component
    pub fn new(weights: &LossWeights) -> Self {
        let totals = weights.keys().map(|k| (k.clone(), 0.0)).collect();
        Self { totals }
    }

    pub fn add(&mut self, record: &LossRecord) -> Result<()> {
        for (name, value) in record {
            match self.totals.get_mut(name) {
                Some(total) => *total += value,
                None => bail!(
                    "Loss component '{name}' is not in the configured loss weights"
                ),
            }
        }
        Ok(())
    }

    /// (component, total / interval) in key order
    pub fn means(&self, interval: usize) -> Vec<(String, f64)> {
        let denom = interval.max(1) as f64;
        self.totals
            .iter()
            .map(|(k, v)| (k.clone(), v / denom))
            .collect()
    }

    pub fn reset(&mut self) {
        for total in self.totals.values_mut() {
            *total = 0.0;
        }
    }
}
