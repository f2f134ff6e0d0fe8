// ============================================================
// Layer 5 — CTC Loss and Greedy Decoding
// ============================================================
// Connectionist Temporal Classification lets the network emit
// one score vector per frame while the label is a much shorter
// gloss sequence with no frame alignment.
//
// Loss (per sample, log space):
//   l' = blank, g1, blank, g2, ..., gL, blank        (S = 2L + 1)
//   α_0(s) = y_0(l'_s)                  for s < 2
//   α_t(s) = logsumexp(α_{t-1}(s), α_{t-1}(s-1),
//                      α_{t-1}(s-2) if l'_s ≠ blank and l'_s ≠ l'_{s-2})
//            + y_t(l'_s)
//   NLL    = -logsumexp(α_{T-1}(S-1), α_{T-1}(S-2))
//
// Log-zero is a large finite negative number rather than -inf so
// the logsumexp stays NaN-free under autodiff. That would turn an
// alignment with no path at all into a huge finite loss, so those
// samples are caught up front: L labels with R adjacent repeats
// need at least L + R frames, and anything shorter scores +inf.
//
// Decoding: per-frame argmax, collapse repeats, drop blanks.

use anyhow::{ensure, Result};
use burn::prelude::*;
use ndarray::Array3;

use crate::data::gloss_dict::GlossDict;
use crate::domain::hypothesis::{Hypothesis, RecognizedGloss};

pub const BLANK: usize = 0;
const LOG_ZERO: f32 = -1.0e30;

/// Mean CTC negative log-likelihood over the batch.
///
/// `log_probs` is [frames, batch, classes] after log-softmax; `targets`
/// holds every sample's labels concatenated, split by `target_lengths`.
pub fn ctc_loss<B: Backend>(
    log_probs:      Tensor<B, 3>,
    targets:        &[i64],
    input_lengths:  &[usize],
    target_lengths: &[usize],
) -> Result<Tensor<B, 1>> {
    let [frames, batch, classes] = log_probs.dims();
    let device = log_probs.device();
    ensure!(
        input_lengths.len() == batch && target_lengths.len() == batch,
        "CTC got {} input lengths and {} target lengths for a batch of {}",
        input_lengths.len(), target_lengths.len(), batch
    );

    let mut offset = 0;
    let mut losses = Vec::with_capacity(batch);
    for b in 0..batch {
        let len = target_lengths[b];
        let Some(target) = targets.get(offset..offset + len) else {
            anyhow::bail!("Labels end at {} but sample {b} needs {}", targets.len(), offset + len);
        };
        offset += len;

        let valid = input_lengths[b];
        ensure!(valid <= frames, "Sample {b} has {valid} valid frames of {frames}");
        if valid == 0 || valid < min_frames(target) {
            losses.push(Tensor::full([1], f32::INFINITY, &device));
            continue;
        }
        let sample = log_probs
            .clone()
            .slice([0..valid, b..b + 1, 0..classes])
            .reshape([valid, classes]);
        losses.push(sequence_nll(sample, target));
    }

    Ok(Tensor::cat(losses, 0).mean())
}

/// Negative log-likelihood of one label sequence, shape [1]
fn sequence_nll<B: Backend>(log_probs: Tensor<B, 2>, target: &[i64]) -> Tensor<B, 1> {
    let device = log_probs.device();
    let [frames, _] = log_probs.dims();

    let extended = extend_with_blanks(target);
    let s = extended.len();
    let ids: Vec<i32> = extended.iter().map(|&id| id as i32).collect();
    let emissions = log_probs.select(1, Tensor::<B, 1, Int>::from_ints(ids.as_slice(), &device));

    let skip = Tensor::<B, 1>::from_floats(skip_mask(&extended).as_slice(), &device);
    let init: Vec<f32> = (0..s).map(|i| if i < 2 { 0.0 } else { LOG_ZERO }).collect();
    let init = Tensor::<B, 1>::from_floats(init.as_slice(), &device);

    let mut alpha = emissions.clone().slice([0..1, 0..s]).reshape([s]) + init;
    for t in 1..frames {
        let stay = alpha.clone();
        let next = shift_right(alpha.clone(), 1);
        let jump = shift_right(alpha, 2) + skip.clone();
        let emit = emissions.clone().slice([t..t + 1, 0..s]).reshape([s]);
        alpha = log_sum_exp(vec![stay, next, jump]) + emit;
    }

    let tail = if s > 1 {
        vec![alpha.clone().slice([s - 1..s]), alpha.slice([s - 2..s - 1])]
    } else {
        vec![alpha]
    };
    log_sum_exp(tail).neg()
}

/// Shortest input that can emit `target`: a blank must separate repeats
fn min_frames(target: &[i64]) -> usize {
    let repeats = target.windows(2).filter(|w| w[0] == w[1]).count();
    target.len() + repeats
}

/// blank, g1, blank, g2, ..., blank
fn extend_with_blanks(target: &[i64]) -> Vec<i64> {
    let mut extended = Vec::with_capacity(2 * target.len() + 1);
    extended.push(BLANK as i64);
    for &g in target {
        extended.push(g);
        extended.push(BLANK as i64);
    }
    extended
}

/// 0 where the s-2 → s transition is allowed, log-zero elsewhere
fn skip_mask(extended: &[i64]) -> Vec<f32> {
    (0..extended.len())
        .map(|s| {
            let allowed = s >= 2
                && extended[s] != BLANK as i64
                && extended[s] != extended[s - 2];
            if allowed { 0.0 } else { LOG_ZERO }
        })
        .collect()
}

/// Shift right by `k`, filling with log-zero
fn shift_right<B: Backend>(x: Tensor<B, 1>, k: usize) -> Tensor<B, 1> {
    let [n] = x.dims();
    let device = x.device();
    if k >= n {
        return Tensor::full([n], LOG_ZERO, &device);
    }
    let pad = Tensor::full([k], LOG_ZERO, &device);
    Tensor::cat(vec![pad, x.slice([0..n - k])], 0)
}

/// Element-wise logsumexp across equally shaped vectors
fn log_sum_exp<B: Backend>(terms: Vec<Tensor<B, 1>>) -> Tensor<B, 1> {
    let [n] = terms[0].dims();
    let stacked = Tensor::cat(
        terms.into_iter().map(|t| t.reshape([1, n])).collect(),
        0,
    );
    let max = stacked.clone().max_dim(0);
    let sum = (stacked - max.clone()).exp().sum_dim(0).log();
    (max + sum).reshape([n])
}

/// Greedy CTC decoding of host logits [frames, batch, classes]
pub fn greedy_decode(logits: &Array3<f32>, lengths: &[usize], dict: &GlossDict) -> Vec<Hypothesis> {
    let (frames, batch, _) = logits.dim();
    (0..batch)
        .map(|b| {
            let valid = lengths.get(b).copied().unwrap_or(frames).min(frames);
            let mut sentence = Hypothesis::new();
            let mut prev = None;
            for t in 0..valid {
                let row = logits.slice(ndarray::s![t, b, ..]);
                let best = row
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .map(|(i, _)| i)
                    .unwrap_or(BLANK);
                if Some(best) != prev && best != BLANK {
                    let gloss = dict.gloss(best).unwrap_or("<unk>");
                    sentence.push(RecognizedGloss::new(gloss, sentence.len()));
                }
                prev = Some(best);
            }
            sentence
        })
        .collect()
}
