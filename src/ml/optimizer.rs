// ============================================================
// Layer 5 — Optimizer Wrapper
// ============================================================
// Adapts a Burn optimizer to the TrainingOptimizer trait.
//
//   backward()       — (loss * scale).backward(), then divide every
//                      gradient by `scale` and check it is finite
//   step()           — apply the pending gradients at the current LR
//   scheduler_step() — MultiStepLr, once per epoch
//
// Burn's optimizer keeps no gradients of its own between calls,
// so the unscaled gradients are held here until step().

use anyhow::{Context, Result};
use burn::{
    module::{ModuleVisitor, Param},
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::marker::PhantomData;

use crate::domain::traits::TrainingOptimizer;
use crate::ml::model::{GlossRecognizerNet, Recognizer};

// ─── Scheduler ────────────────────────────────────────────────────────────────
/// Multiply the LR by `gamma` each time the epoch passes a milestone.
#[derive(Debug, Clone)]
pub struct MultiStepLr {
    base_lr:    f64,
    milestones: Vec<usize>,
    gamma:      f64,
    epoch:      usize,
}

impl MultiStepLr {
    pub fn new(base_lr: f64, milestones: Vec<usize>, gamma: f64) -> Self {
        Self { base_lr, milestones, gamma, epoch: 0 }
    }

    pub fn current_lr(&self) -> f64 {
        let passed = self.milestones.iter().filter(|&&m| m <= self.epoch).count();
        self.base_lr * self.gamma.powi(passed as i32)
    }

    pub fn step(&mut self) {
        self.epoch += 1;
    }
}

// ─── Gradient unscaling ───────────────────────────────────────────────────────
struct GradUnscaler<'a, B: AutodiffBackend> {
    grads:     &'a mut GradientsParams,
    inv_scale: f64,
    finite:    bool,
    _backend:  PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for GradUnscaler<'_, B> {
    fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
        let Some(grad) = self.grads.remove::<B::InnerBackend, D>(param.id) else {
            return;
        };
        let grad = grad.mul_scalar(self.inv_scale);
        let sum = grad.clone().sum().into_scalar().elem::<f64>();
        if !sum.is_finite() {
            self.finite = false;
        }
        self.grads.register::<B::InnerBackend, D>(param.id, grad);
    }
}

// ─── BurnOptimizer ────────────────────────────────────────────────────────────
pub struct BurnOptimizer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<GlossRecognizerNet<B>, B>,
{
    pub optimizer: O,
    pub scheduler: MultiStepLr,
    pending:       Option<GradientsParams>,
    _backend:      PhantomData<B>,
}

impl<B, O> BurnOptimizer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<GlossRecognizerNet<B>, B>,
{
    pub fn new(optimizer: O, scheduler: MultiStepLr) -> Self {
        Self { optimizer, scheduler, pending: None, _backend: PhantomData }
    }
}

impl<B, O> TrainingOptimizer<Recognizer<B>> for BurnOptimizer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<GlossRecognizerNet<B>, B>,
{
    fn zero_grad(&mut self) {
        self.pending = None;
    }

    fn param_group_lrs(&self) -> Vec<f64> {
        vec![self.scheduler.current_lr()]
    }

    fn backward(&mut self, model: &Recognizer<B>, loss: Tensor<B, 1>, scale: f64) -> Result<bool> {
        let grads = loss.mul_scalar(scale).backward();
        let mut grads = GradientsParams::from_grads(grads, &model.net);

        let mut unscaler = GradUnscaler::<B> {
            grads:     &mut grads,
            inv_scale: 1.0 / scale,
            finite:    true,
            _backend:  PhantomData,
        };
        model.net.visit(&mut unscaler);
        let finite = unscaler.finite;

        self.pending = Some(grads);
        Ok(finite)
    }

    fn step(&mut self, model: &mut Recognizer<B>) -> Result<()> {
        let grads = self.pending.take().context("Optimizer step called without gradients")?;
        let lr = self.scheduler.current_lr();
        model.net = self.optimizer.step(lr, model.net.clone(), grads);
        Ok(())
    }

    fn scheduler_step(&mut self) {
        self.scheduler.step();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lr_decays_at_milestones() {
        let mut sched = MultiStepLr::new(1e-4, vec![2, 4], 0.2);
        let mut lrs = Vec::new();
        for _ in 0..5 {
            lrs.push(sched.current_lr());
            sched.step();
        }
        let expected = [1e-4, 1e-4, 2e-5, 2e-5, 4e-6];
        for (got, want) in lrs.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "{got} vs {want}");
        }
    }
}
