// ============================================================
// Layer 2 — EvalUseCase
// ============================================================
// Everything that runs a trained network without training it:
//
//   eval()     — seq_eval on one split, optionally scored
//   features() — seq_feature_generation on one or more splits
//   score()    — score predictions a previous eval persisted
//
// The run's train_config.json (saved next to the checkpoints)
// tells us how to rebuild the network before loading weights.

use anyhow::Result;
use std::{path::PathBuf, sync::Arc};

use crate::application::seq_scripts::{
    score_persisted, seq_eval, seq_feature_generation, FeatureGeneration,
};
use crate::application::train_use_case::TrainConfig;
use crate::data::gloss_dict::GlossDict;
use crate::infra::{
    checkpoint::CheckpointManager,
    evaluator::EditDistanceEvaluator,
    feature_store::FeatureStore,
    prediction_store::PredictionStore,
    recorder::Recorder,
};
use crate::ml::{device::BurnDevice, model::Recognizer, InferBackend};

pub struct EvalUseCase {
    config: TrainConfig,
}

impl EvalUseCase {
    /// Use the config saved in `work_dir` by a previous `train`
    pub fn from_work_dir(work_dir: impl Into<PathBuf>) -> Result<Self> {
        let work_dir = work_dir.into();
        let mut config = CheckpointManager::new(&work_dir)?.load_config()?;
        config.work_dir = work_dir;
        Ok(Self { config })
    }

    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Turn scoring on regardless of what the saved config says
    pub fn force_scoring(mut self, on: bool) -> Self {
        self.config.score_predictions |= on;
        self
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Rebuild the network and load the latest checkpoint
    fn load_model(&self, dict: Arc<GlossDict>) -> Result<(Recognizer<InferBackend>, BurnDevice<InferBackend>, usize)> {
        let cfg    = &self.config;
        let device = <InferBackend as burn::tensor::backend::Backend>::Device::default();
        let net    = cfg.net_config(dict.num_classes()).init::<InferBackend>(&device);
        let (net, epoch) = CheckpointManager::new(&cfg.work_dir)?.load_model(net, &device)?;
        let model  = Recognizer::new(net, dict, cfg.loss_weights.clone())?;
        Ok((model, BurnDevice::new(device), epoch))
    }

    /// Evaluate the latest checkpoint on `mode`; returns the WER when scoring is on
    pub fn eval(&self, mode: &str) -> Result<f64> {
        let cfg  = &self.config;
        let dict = Arc::new(GlossDict::load(&cfg.gloss_dict)?);
        let loader = cfg.loader(mode, &dict, false)?;
        let (mut model, device, epoch) = self.load_model(dict)?;
        let mut recorder = Recorder::new(&cfg.work_dir, cfg.log_interval)?;

        let wer = seq_eval(
            &cfg.eval_settings(), &loader, &mut model, &device, mode, epoch,
            &cfg.work_dir, &mut recorder,
            &PredictionStore::new(&cfg.json_saved_dir), &EditDistanceEvaluator,
        )?;
        recorder.print_log(&format!("Evaluated '{mode}' at epoch {epoch}"));
        Ok(wer)
    }

    /// Extract framewise features for every split in `modes`
    pub fn features(&self, modes: &[String]) -> Result<Vec<(String, FeatureGeneration)>> {
        let cfg  = &self.config;
        let dict = Arc::new(GlossDict::load(&cfg.gloss_dict)?);
        let (mut model, device, _) = self.load_model(Arc::clone(&dict))?;
        let mut recorder = Recorder::new(&cfg.work_dir, cfg.log_interval)?;
        let store = FeatureStore::new(&cfg.features_dir);

        let mut outcomes = Vec::with_capacity(modes.len());
        for mode in modes {
            let loader = cfg.loader(mode, &dict, false)?;
            let outcome = seq_feature_generation(
                &loader, &mut model, &device, mode, &cfg.work_dir, &mut recorder, &store,
            )?;
            recorder.print_log(&format!("{mode} features: {outcome:?}"));
            outcomes.push((mode.clone(), outcome));
        }
        Ok(outcomes)
    }

    /// Score what an earlier eval of `mode` persisted
    pub fn score(&self, mode: &str, epoch: usize) -> Result<f64> {
        let cfg = &self.config;
        let recorder = Recorder::new(&cfg.work_dir, cfg.log_interval)?;
        Ok(score_persisted(
            &cfg.dataset_info,
            &PredictionStore::new(&cfg.json_saved_dir),
            &EditDistanceEvaluator,
            mode,
            epoch,
            &cfg.work_dir,
            &recorder,
        ))
    }
}
