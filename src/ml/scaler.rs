// ============================================================
// Layer 5 — Gradient Scaler
// ============================================================
// Dynamic loss scaling for reduced-precision training.
//
// Small gradients underflow in half precision. Multiplying the
// loss by a large factor before back-propagation lifts them into
// range; the optimizer divides the factor back out before the
// update. If the scaled gradients overflow instead, the step is
// skipped and the factor shrinks.
//
//   backward() — loss * scale → gradients (unscaled, checked)
//   step()     — update parameters unless an overflow was seen
//   update()   — back off on overflow, grow after a clean streak
//
// The scaler itself holds no tensors; the optimizer does the
// framework work, so the state machine is unit-testable.

use anyhow::Result;

use crate::domain::traits::{SequenceRecognizer, TrainingOptimizer};

const INIT_SCALE:      f64   = 65536.0;
const GROWTH_FACTOR:   f64   = 2.0;
const BACKOFF_FACTOR:  f64   = 0.5;
const GROWTH_INTERVAL: usize = 2000;

#[derive(Debug, Clone)]
pub struct GradScaler {
    scale:           f64,
    growth_factor:   f64,
    backoff_factor:  f64,
    growth_interval: usize,
    growth_tracker:  usize,
    /// Result of the last backward: Some(true) if gradients overflowed
    found_inf:       Option<bool>,
}

impl Default for GradScaler {
    fn default() -> Self {
        Self::new(INIT_SCALE, GROWTH_FACTOR, BACKOFF_FACTOR, GROWTH_INTERVAL)
    }
}

impl GradScaler {
    pub fn new(scale: f64, growth_factor: f64, backoff_factor: f64, growth_interval: usize) -> Self {
        Self {
            scale,
            growth_factor,
            backoff_factor,
            growth_interval: growth_interval.max(1),
            growth_tracker: 0,
            found_inf: None,
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Back-propagate the scaled loss through `optimizer`
    pub fn backward<M, O>(&mut self, optimizer: &mut O, model: &M, loss: M::Loss) -> Result<()>
    where
        M: SequenceRecognizer,
        O: TrainingOptimizer<M>,
    {
        let finite = optimizer.backward(model, loss, self.scale)?;
        self.found_inf = Some(!finite);
        Ok(())
    }

    /// Step the optimizer unless the last backward overflowed.
    /// Returns whether the parameters were updated.
    pub fn step<M, O>(&mut self, optimizer: &mut O, model: &mut M) -> Result<bool>
    where
        M: SequenceRecognizer,
        O: TrainingOptimizer<M>,
    {
        match self.found_inf {
            Some(false) => {
                optimizer.step(model)?;
                Ok(true)
            }
            Some(true) => {
                tracing::debug!("Non-finite gradients at scale {}, skipping step", self.scale);
                Ok(false)
            }
            None => anyhow::bail!("GradScaler::step called before backward"),
        }
    }

    /// Adjust the scale for the next iteration
    pub fn update(&mut self) {
        match self.found_inf.take() {
            Some(true) => {
                self.scale *= self.backoff_factor;
                self.growth_tracker = 0;
            }
            Some(false) => {
                self.growth_tracker += 1;
                if self.growth_tracker == self.growth_interval {
                    self.scale *= self.growth_factor;
                    self.growth_tracker = 0;
                }
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeModel, FakeOptimizer};

    #[test]
    fn test_clean_steps_grow_scale() {
        let mut scaler = GradScaler::new(8.0, 2.0, 0.5, 2);
        let mut model  = FakeModel::with_losses(vec![1.0, 1.0]);
        let mut optim  = FakeOptimizer::default();

        for _ in 0..2 {
            scaler.backward(&mut optim, &model, 1.0).unwrap();
            assert!(scaler.step(&mut optim, &mut model).unwrap());
            scaler.update();
        }
        assert_eq!(scaler.scale(), 16.0);
        assert_eq!(optim.steps, 2);
        assert_eq!(optim.last_scale, Some(8.0));
    }

    #[test]
    fn test_overflow_skips_step_and_backs_off() {
        let mut scaler = GradScaler::new(8.0, 2.0, 0.5, 2);
        let mut model  = FakeModel::with_losses(vec![1.0]);
        let mut optim  = FakeOptimizer { overflow: true, ..Default::default() };

        scaler.backward(&mut optim, &model, 1.0).unwrap();
        assert!(!scaler.step(&mut optim, &mut model).unwrap());
        scaler.update();

        assert_eq!(optim.steps, 0);
        assert_eq!(scaler.scale(), 4.0);
    }

    #[test]
    fn test_step_without_backward_fails() {
        let mut scaler = GradScaler::default();
        let mut model  = FakeModel::with_losses(vec![]);
        let mut optim  = FakeOptimizer::default();
        assert!(scaler.step(&mut optim, &mut model).is_err());
    }
}
