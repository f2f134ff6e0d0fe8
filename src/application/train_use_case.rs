// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a full training run in order:
//
//   Step 1: Load gloss dictionary       (Layer 4 - data)
//   Step 2: Build train/dev loaders     (Layer 4 - data)
//   Step 3: Build network + recognizer  (Layer 5 - ml)
//   Step 4: Save config                 (Layer 6 - infra)
//   Step 5: Per epoch: seq_train, then  (Layer 2 - seq_scripts)
//           seq_eval on dev every
//           eval_interval epochs
//   Step 6: Checkpoint + metrics row    (Layer 6 - infra)
//
// Reference: Burn Book §5 (Training)

use anyhow::{Context, Result};
use burn::optim::AdamWConfig;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::application::seq_scripts::{seq_eval, seq_train, EvalSettings};
use crate::data::{dataset::SignDataset, gloss_dict::GlossDict, loader::SignLoader};
use crate::domain::loss::LossWeights;
use crate::infra::{
    checkpoint::CheckpointManager,
    evaluator::EditDistanceEvaluator,
    metrics::{EpochMetrics, MetricsLogger},
    prediction_store::PredictionStore,
    recorder::Recorder,
};
use crate::ml::{
    device::BurnDevice,
    model::{GlossRecognizerConfig, GlossRecognizerNet, Recognizer},
    optimizer::{BurnOptimizer, MultiStepLr},
    InferBackend, TrainBackend,
};

// ─── Configuration ────────────────────────────────────────────────────────────
/// Location of the ground-truth STM files used for scoring
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetInfo {
    pub evaluation_dir:    PathBuf,
    pub evaluation_prefix: String,
}

// Every field has a default so a config file only needs the
// values it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub work_dir:          PathBuf,
    pub dataset_root:      PathBuf,
    pub gloss_dict:        PathBuf,
    pub dataset_info:      DatasetInfo,
    pub batch_size:        usize,
    pub test_batch_size:   usize,
    pub epochs:            usize,
    pub base_lr:           f64,
    pub weight_decay:      f64,
    pub milestones:        Vec<usize>,
    pub gamma:             f64,
    pub loss_weights:      LossWeights,
    pub log_interval:      usize,
    pub eval_interval:     usize,
    pub input_dim:         usize,
    pub hidden_size:       usize,
    pub dropout:           f64,
    pub score_predictions: bool,
    pub json_saved_dir:    PathBuf,
    pub features_dir:      PathBuf,
    pub seed:              u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            work_dir:          "./work_dir/baseline/".into(),
            dataset_root:      "./preprocess/phoenix2014".into(),
            gloss_dict:        "./preprocess/phoenix2014/gloss_dict.json".into(),
            dataset_info: DatasetInfo {
                evaluation_dir:    "./evaluation/slr_eval".into(),
                evaluation_prefix: "phoenix2014-groundtruth".into(),
            },
            batch_size:        2,
            test_batch_size:   8,
            epochs:            40,
            base_lr:           1e-4,
            weight_decay:      1e-4,
            milestones:        vec![20, 35],
            gamma:             0.2,
            loss_weights:      BTreeMap::from([
                ("SeqCTC".to_string(), 1.0),
                ("ConvCTC".to_string(), 1.0),
                ("Dist".to_string(), 25.0),
            ]),
            log_interval:      50,
            eval_interval:     1,
            input_dim:         512,
            hidden_size:       1024,
            dropout:           0.1,
            score_predictions: false,
            json_saved_dir:    "./json_saved_data".into(),
            features_dir:      "./features".into(),
            seed:              0,
        }
    }
}

impl TrainConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config '{}'", path.display()))
    }

    pub fn eval_settings(&self) -> EvalSettings {
        EvalSettings {
            dataset_info:      self.dataset_info.clone(),
            score_predictions: self.score_predictions,
        }
    }

    pub fn net_config(&self, num_classes: usize) -> GlossRecognizerConfig {
        GlossRecognizerConfig::new(self.input_dim, self.hidden_size, num_classes)
            .with_dropout(self.dropout)
    }

    /// Loader over `<dataset_root>/<mode>_info.json`
    pub fn loader(&self, mode: &str, dict: &GlossDict, train: bool) -> Result<SignLoader> {
        let dataset = SignDataset::load(&self.dataset_root, mode, dict)?;
        let batch_size = if train { self.batch_size } else { self.test_batch_size };
        Ok(SignLoader::new(dataset, batch_size, train, self.seed))
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Run every epoch; returns the best dev WER seen, if any was scored
    pub fn execute(&self) -> Result<Option<f64>> {
        let cfg = &self.config;

        // ── Step 1: Gloss dictionary ─────────────────────────────────────────
        let dict = Arc::new(GlossDict::load(&cfg.gloss_dict)?);

        // ── Step 2: Loaders ──────────────────────────────────────────────────
        let train_loader = cfg.loader("train", &dict, true)?;
        let dev_loader   = cfg.loader("dev", &dict, false)?;

        // ── Step 3: Model, optimizer, devices ────────────────────────────────
        let device       = <TrainBackend as burn::tensor::backend::Backend>::Device::default();
        let train_device = BurnDevice::<TrainBackend>::new(device.clone());
        let eval_device  = BurnDevice::<InferBackend>::new(device.clone());

        let net = cfg.net_config(dict.num_classes()).init::<TrainBackend>(&device);
        let mut model = Recognizer::new(net, Arc::clone(&dict), cfg.loss_weights.clone())?;
        let mut optimizer = BurnOptimizer::<TrainBackend, _>::new(
            AdamWConfig::new()
                .with_weight_decay(cfg.weight_decay as f32)
                .init::<TrainBackend, GlossRecognizerNet<TrainBackend>>(),
            MultiStepLr::new(cfg.base_lr, cfg.milestones.clone(), cfg.gamma),
        );
        tracing::info!("Using device: {:?}", device);

        // ── Step 4: Persist the effective config ─────────────────────────────
        let ckpt    = CheckpointManager::new(&cfg.work_dir)?;
        let metrics = MetricsLogger::new(&cfg.work_dir)?;
        ckpt.save_config(cfg)?;
        let mut recorder = Recorder::new(&cfg.work_dir, cfg.log_interval)?;

        // ── Step 5/6: Epochs ─────────────────────────────────────────────────
        let evaluator = EditDistanceEvaluator;
        let settings  = cfg.eval_settings();
        let mut best_wer: Option<f64> = None;

        for epoch in 0..cfg.epochs {
            let losses = seq_train(
                &train_loader, &mut model, &mut optimizer, &train_device,
                epoch, &recorder, &cfg.loss_weights,
            )?;

            let eval_now = cfg.eval_interval > 0 && (epoch + 1) % cfg.eval_interval == 0;
            let dev_wer = if eval_now {
                // seq_eval skips existing batch dirs, so one tree per epoch
                let store = PredictionStore::new(cfg.json_saved_dir.join(format!("epoch_{epoch}")));
                let mut eval_model = model.valid();
                let wer = seq_eval(
                    &settings, &dev_loader, &mut eval_model, &eval_device, "dev", epoch,
                    &cfg.work_dir, &mut recorder, &store, &evaluator,
                )?;
                settings.score_predictions.then_some(wer)
            } else {
                None
            };

            ckpt.save_model(&model.net, epoch + 1)?;
            let row = EpochMetrics::from_losses(epoch, &losses, dev_wer);
            if row.is_improvement(best_wer.unwrap_or(f64::INFINITY)) {
                recorder.print_log(&format!("\tNew best dev WER: {:.2}%", row.dev_wer.unwrap_or_default()));
                best_wer = row.dev_wer;
            }
            metrics.log(&row)?;
        }

        tracing::info!("Metrics written to '{}'", metrics.csv_path().display());
        Ok(best_wer)
    }
}
