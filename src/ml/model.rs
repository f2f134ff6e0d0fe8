// ============================================================
// Layer 5 — Reference Gloss Recognizer (Burn)
// ============================================================
// A small continuous sign language recognizer over pre-extracted
// frame features. It exists so the loops have a real network to
// drive; any SequenceRecognizer can take its place.
//
//   video [B, T, D]
//     → Linear + ReLU + Dropout          (frame projection)
//     → Conv1d(k, pad k/2) + ReLU        framewise_features [B, H, T]
//     ├→ Linear                          conv_logits      [T, B, C]
//     └→ Linear + ReLU + Dropout → Linear sequence_logits [T, B, C]
//
// Loss components, selected by name with a weight each:
//   ConvCTC — CTC on the convolutional head
//   SeqCTC  — CTC on the sequence head
//   Dist    — KL distillation of the conv head toward the
//             (detached) sequence head at temperature 8
//
// Class 0 is the CTC blank; glosses start at 1.

use anyhow::{bail, Result};
use burn::{
    module::AutodiffModule,
    nn::{
        conv::{Conv1d, Conv1dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig1d,
    },
    prelude::*,
    tensor::{activation, backend::AutodiffBackend},
};
use ndarray::{Array2, Array3};
use std::sync::Arc;

use crate::data::gloss_dict::GlossDict;
use crate::domain::hypothesis::Hypothesis;
use crate::domain::loss::{LossRecord, LossWeights};
use crate::domain::traits::{RecognitionOutput, ScalarLoss, SequenceRecognizer};
use crate::ml::ctc::{ctc_loss, greedy_decode};
use crate::ml::device::{guard_out_of_memory, DeviceBatch};

pub const CONV_CTC: &str = "ConvCTC";
pub const SEQ_CTC:  &str = "SeqCTC";
pub const DIST:     &str = "Dist";
const KNOWN_COMPONENTS: [&str; 3] = [CONV_CTC, SEQ_CTC, DIST];
const DIST_TEMPERATURE: f64 = 8.0;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct GlossRecognizerConfig {
    /// Size of one pre-extracted frame vector
    pub input_dim:   usize,
    pub hidden_size: usize,
    /// Gloss vocabulary size including the blank
    pub num_classes: usize,
    #[config(default = 5)]
    pub kernel_size: usize,
    #[config(default = 0.1)]
    pub dropout:     f64,
}

impl GlossRecognizerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> GlossRecognizerNet<B> {
        let padding = self.kernel_size / 2;
        GlossRecognizerNet {
            frame_proj: LinearConfig::new(self.input_dim, self.hidden_size).init(device),
            temporal: Conv1dConfig::new(self.hidden_size, self.hidden_size, self.kernel_size)
                .with_padding(PaddingConfig1d::Explicit(padding))
                .init(device),
            conv_classifier: LinearConfig::new(self.hidden_size, self.num_classes).init(device),
            context: LinearConfig::new(self.hidden_size, self.hidden_size).init(device),
            classifier: LinearConfig::new(self.hidden_size, self.num_classes).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

/// Frame projection → temporal convolution → two classifier heads.
#[derive(Module, Debug)]
pub struct GlossRecognizerNet<B: Backend> {
    pub frame_proj:      Linear<B>,
    pub temporal:        Conv1d<B>,
    pub conv_classifier: Linear<B>,
    pub context:         Linear<B>,
    pub classifier:      Linear<B>,
    pub dropout:         Dropout,
}

/// Raw network outputs
pub struct NetOutput<B: Backend> {
    /// [batch, hidden, frames]
    pub framewise_features: Tensor<B, 3>,
    /// [frames, batch, classes]
    pub conv_logits:        Tensor<B, 3>,
    /// [frames, batch, classes]
    pub sequence_logits:    Tensor<B, 3>,
}

impl<B: Backend> GlossRecognizerNet<B> {
    /// video: [batch, frames, input_dim]
    pub fn forward(&self, video: Tensor<B, 3>) -> NetOutput<B> {
        let x = activation::relu(self.frame_proj.forward(video));
        let x = self.dropout.forward(x);

        // Conv1d wants channels first: [batch, hidden, frames]
        let framewise_features = activation::relu(self.temporal.forward(x.swap_dims(1, 2)));
        let per_frame = framewise_features.clone().swap_dims(1, 2);

        let conv_logits = self.conv_classifier.forward(per_frame.clone()).swap_dims(0, 1);
        let ctx = self.dropout.forward(activation::relu(self.context.forward(per_frame)));
        let sequence_logits = self.classifier.forward(ctx).swap_dims(0, 1);

        NetOutput { framewise_features, conv_logits, sequence_logits }
    }
}

// ─── Recognizer ───────────────────────────────────────────────────────────────
/// The network plus what the loops need around it: the gloss
/// dictionary for decoding and the weighted loss components.
#[derive(Debug, Clone)]
pub struct Recognizer<B: Backend> {
    pub net:      GlossRecognizerNet<B>,
    dict:         Arc<GlossDict>,
    loss_weights: LossWeights,
    training:     bool,
}

impl<B: Backend> Recognizer<B> {
    pub fn new(net: GlossRecognizerNet<B>, dict: Arc<GlossDict>, loss_weights: LossWeights) -> Result<Self> {
        for name in loss_weights.keys() {
            if !KNOWN_COMPONENTS.contains(&name.as_str()) {
                bail!("Unknown loss component '{name}', expected one of {KNOWN_COMPONENTS:?}");
            }
        }
        if loss_weights.is_empty() {
            bail!("At least one loss weight is required");
        }
        Ok(Self { net, dict, loss_weights, training: false })
    }
}

impl<B: AutodiffBackend> Recognizer<B> {
    /// Copy onto the inner backend: no autodiff graph, dropout disabled
    pub fn valid(&self) -> Recognizer<B::InnerBackend> {
        Recognizer {
            net:          self.net.valid(),
            dict:         Arc::clone(&self.dict),
            loss_weights: self.loss_weights.clone(),
            training:     false,
        }
    }
}

/// One forward pass, still on the device
pub struct RecognitionResult<B: Backend> {
    pub framewise_features: Tensor<B, 3>,
    pub conv_logits:        Tensor<B, 3>,
    pub sequence_logits:    Tensor<B, 3>,
    pub feat_len:           Vec<usize>,
    pub recognized_sents:   Vec<Hypothesis>,
}

impl<B: Backend> RecognitionOutput for RecognitionResult<B> {
    fn sequence_logits(&self) -> Result<Array3<f32>> {
        to_host3(self.sequence_logits.clone())
    }

    fn recognized_sents(&self) -> &[Hypothesis] {
        &self.recognized_sents
    }

    fn framewise_features(&self, sample: usize, frames: usize) -> Result<Array2<f32>> {
        let [batch, hidden, total] = self.framewise_features.dims();
        if sample >= batch || frames > total {
            bail!("Feature slice ({sample}, {frames}) outside [{batch}, {hidden}, {total}]");
        }
        if frames == 0 {
            return Ok(Array2::zeros((0, hidden)));
        }
        let matrix = self
            .framewise_features
            .clone()
            .detach()
            .slice([sample..sample + 1, 0..hidden, 0..frames])
            .reshape([hidden, frames])
            .transpose();
        let values = matrix.into_data().convert::<f32>().to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("Cannot read features: {e:?}"))?;
        Ok(Array2::from_shape_vec((frames, hidden), values)?)
    }
}

impl<B: Backend> ScalarLoss for Tensor<B, 1> {
    fn item(&self) -> f64 {
        self.clone().into_scalar().elem::<f64>()
    }
}

impl<B: Backend> SequenceRecognizer for Recognizer<B> {
    type Input  = DeviceBatch<B>;
    type Output = RecognitionResult<B>;
    type Loss   = Tensor<B, 1>;

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn forward(&self, input: &DeviceBatch<B>) -> Result<RecognitionResult<B>> {
        let out = guard_out_of_memory(|| self.net.forward(input.video.clone()))?;

        let recognized_sents = if self.training {
            Vec::new()
        } else {
            let logits = to_host3(out.sequence_logits.clone())?;
            greedy_decode(&logits, &input.video_length, &self.dict)
        };

        Ok(RecognitionResult {
            framewise_features: out.framewise_features,
            conv_logits:        out.conv_logits,
            sequence_logits:    out.sequence_logits,
            feat_len:           input.video_length.clone(),
            recognized_sents,
        })
    }

    fn criterion_calculation(
        &self,
        output: &RecognitionResult<B>,
        input:  &DeviceBatch<B>,
    ) -> Result<(Tensor<B, 1>, LossRecord)> {
        let mut total: Option<Tensor<B, 1>> = None;
        let mut record = LossRecord::new();

        for (name, &weight) in &self.loss_weights {
            let component = match name.as_str() {
                CONV_CTC => ctc_loss(
                    activation::log_softmax(output.conv_logits.clone(), 2),
                    &input.label,
                    &output.feat_len,
                    &input.label_length,
                )?,
                SEQ_CTC => ctc_loss(
                    activation::log_softmax(output.sequence_logits.clone(), 2),
                    &input.label,
                    &output.feat_len,
                    &input.label_length,
                )?,
                DIST => distillation(
                    output.conv_logits.clone(),
                    output.sequence_logits.clone(),
                    DIST_TEMPERATURE,
                ),
                other => bail!("Unknown loss component '{other}'"),
            };
            let weighted = component.mul_scalar(weight);
            record.insert(name.clone(), ScalarLoss::item(&weighted));
            total = Some(match total {
                Some(t) => t + weighted,
                None => weighted,
            });
        }

        match total {
            Some(loss) => Ok((loss, record)),
            None => bail!("No loss components configured"),
        }
    }
}

/// KL(target || student) at temperature `t`, the target detached
fn distillation<B: Backend>(student: Tensor<B, 3>, target: Tensor<B, 3>, t: f64) -> Tensor<B, 1> {
    let [frames, _, _] = student.dims();
    let target = activation::log_softmax(target.detach().div_scalar(t), 2);
    let student = activation::log_softmax(student.div_scalar(t), 2);
    (target.clone().exp() * (target - student))
        .sum()
        .mul_scalar(t * t / frames.max(1) as f64)
}

fn to_host3<B: Backend>(t: Tensor<B, 3>) -> Result<Array3<f32>> {
    let [a, b, c] = t.dims();
    let values = t.into_data().convert::<f32>().to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Cannot read tensor: {e:?}"))?;
    Ok(Array3::from_shape_vec((a, b, c), values)?)
}
