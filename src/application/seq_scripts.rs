// ============================================================
// Layer 2 — Sequence Training / Evaluation Loops
// ============================================================
// The four epoch-level procedures every command is built from:
//
//   seq_train()              — one epoch of loss-scaled training
//   seq_eval()               — one inference pass, predictions
//                              persisted per batch (resumable)
//   score_persisted()        — persisted predictions → CTM → WER
//   seq_feature_generation() — one inference pass writing a
//                              feature file per sample, cached
//                              behind a symbolic link
//
// None of them know about Burn. The model, optimizer, device
// and loader arrive as Layer 3 trait objects, so the loops are
// tested with counting fakes.
//
// Reference: Rust Book §10 (Generic Types and Traits)

use anyhow::{ensure, Context, Result};
use std::{fs, path::Path};

use crate::application::train_use_case::DatasetInfo;
use crate::domain::hypothesis::{sample_name, Hypothesis};
use crate::domain::loss::{LossAccumulator, LossWeights};
use crate::domain::traits::{
    BatchSource, ComputeDevice, DeviceError, EvaluationRequest, RecognitionOutput, ScalarLoss,
    SequenceRecognizer, TrainingOptimizer, WerEvaluator,
};
use crate::infra::{
    ctm::write2file,
    evaluator::parse_percentage,
    feature_store::{CacheStatus, FeatureStore},
    metrics::mean,
    prediction_store::PredictionStore,
    recorder::Recorder,
};
use crate::ml::scaler::GradScaler;

/// Reported by the scoring path when anything goes wrong
const ERROR_WER: &str = "Percent Total Error       =  100.00%   (ERROR)";

// ─── seq_train ────────────────────────────────────────────────────────────────
/// Train for one pass over `loader`.
///
/// Batches whose loss is NaN or infinite are logged and skipped:
/// no backward, no step, and they are left out of the returned
/// per-batch losses. The LR schedule advances once at the end.
pub fn seq_train<L, M, O, D>(
    loader:       &L,
    model:        &mut M,
    optimizer:    &mut O,
    device:       &D,
    epoch_idx:    usize,
    recoder:      &Recorder,
    loss_weights: &LossWeights,
) -> Result<Vec<f64>>
where
    L: BatchSource + ?Sized,
    M: SequenceRecognizer,
    O: TrainingOptimizer<M>,
    D: ComputeDevice<Resident = M::Input>,
{
    model.set_training(true);

    let mut loss_value = Vec::new();
    let mut total_loss = LossAccumulator::new(loss_weights);
    let clr = optimizer.param_group_lrs();
    let lr  = clr.first().copied().unwrap_or_default();
    let mut scaler = GradScaler::default();
    let num_batches = loader.num_batches();

    for (batch_idx, data) in loader.iter().enumerate() {
        let data  = data?;
        let input = device.data_to_device(&data)?;
        optimizer.zero_grad();

        let ret = model.forward(&input)?;
        let (loss, loss_dict) = model.criterion_calculation(&ret, &input)?;
        drop(ret);

        let value = loss.item();
        if !value.is_finite() {
            recoder.print_log("loss is nan");
            recoder.print_log(&format!("{:?}  frames", data.video_length));
            recoder.print_log(&format!("{:?}  glosses", data.label_length));
            continue;
        }

        scaler.backward(optimizer, model, loss)?;
        scaler.step(optimizer, model)?;
        scaler.update();
        loss_value.push(value);
        total_loss.add(&loss_dict)?;

        if batch_idx % recoder.log_interval == 0 {
            recoder.print_log(&format!(
                "\tEpoch: {}, Batch({}/{}) done. Loss: {:.8}  lr:{:.6}",
                epoch_idx, batch_idx, num_batches, value, lr
            ));
            for (item, value) in total_loss.means(recoder.log_interval) {
                recoder.print_log(&format!("\t Mean {item} loss: {value:.5}"));
            }
            total_loss.reset();
        }
    }

    optimizer.scheduler_step();
    tracing::debug!("Loss scale after epoch {}: {}", epoch_idx, scaler.scale());
    recoder.print_log(&format!("\tMean training loss: {:.10}.", mean(&loss_value)));
    Ok(loss_value)
}

// ─── seq_eval ─────────────────────────────────────────────────────────────────
/// Where an evaluation pass reads its reference data from, and
/// whether it should score what it persisted.
#[derive(Debug, Clone, Default)]
pub struct EvalSettings {
    pub dataset_info:      DatasetInfo,
    pub score_predictions: bool,
}

/// Run inference over `loader` and persist each batch's predictions.
///
/// A batch is skipped when it has no video or its output directory
/// already exists, so an interrupted pass resumes where it stopped.
/// An out-of-memory forward pass is logged and skipped.
///
/// Returns 0 unless `cfg.score_predictions` is set, in which case the
/// persisted predictions are scored and the WER percentage returned.
#[allow(clippy::too_many_arguments)]
pub fn seq_eval<L, M, D>(
    cfg:       &EvalSettings,
    loader:    &L,
    model:     &mut M,
    device:    &D,
    mode:      &str,
    epoch:     usize,
    work_dir:  &Path,
    recoder:   &mut Recorder,
    store:     &PredictionStore,
    evaluator: &dyn WerEvaluator,
) -> Result<f64>
where
    L: BatchSource + ?Sized,
    M: SequenceRecognizer,
    D: ComputeDevice<Resident = M::Input>,
{
    model.set_training(false);
    tracing::info!("Starting epoch, {} batches", loader.num_batches());

    for (batch_idx, data) in loader.iter().enumerate() {
        let data = data?;
        if data.video.is_none() || store.batch_dir(mode, batch_idx).exists() {
            continue;
        }

        recoder.record_timer("device");
        let input = device.data_to_device(&data)?;
        match model.forward(&input) {
            Ok(ret) => store.save_ret_as_json(&data, &ret, batch_idx, mode)?,
            Err(e) if DeviceError::is_out_of_memory(&e) => {
                tracing::warn!("{:#}", e);
                tracing::warn!(" ------- {}", batch_idx);
            }
            Err(e) => return Err(e),
        }
        drop(input);
        device.empty_cache();

        if let Some(secs) = recoder.elapsed("device") {
            tracing::debug!("Batch {} done in {:.3}s", batch_idx, secs);
        }
    }

    if !cfg.score_predictions {
        return Ok(0.0);
    }
    Ok(score_persisted(&cfg.dataset_info, store, evaluator, mode, epoch, work_dir, recoder))
}

// ─── score_persisted ──────────────────────────────────────────────────────────
/// Gather every persisted prediction of `mode`, write the CTM file
/// and score it. Any failure is logged and reported as 100% error.
pub fn score_persisted(
    info:      &DatasetInfo,
    store:     &PredictionStore,
    evaluator: &dyn WerEvaluator,
    mode:      &str,
    epoch:     usize,
    work_dir:  &Path,
    recoder:   &Recorder,
) -> f64 {
    let scored = write_and_evaluate(info, store, evaluator, mode, epoch, work_dir)
        .and_then(|ret| Ok((parse_percentage(&ret)?, ret)));

    let (wer, ret) = match scored {
        Ok(scored) => scored,
        Err(e) => {
            tracing::error!("Unexpected error: {:#}", e);
            (100.0, ERROR_WER.to_string())
        }
    };

    recoder.print_log_to(
        &format!("Epoch {}, {} {}", epoch, mode, ret),
        work_dir.join(format!("{mode}.txt")),
    );
    wer
}

fn write_and_evaluate(
    info:      &DatasetInfo,
    store:     &PredictionStore,
    evaluator: &dyn WerEvaluator,
    mode:      &str,
    epoch:     usize,
    work_dir:  &Path,
) -> Result<String> {
    let mut total_info: Vec<String>     = Vec::new();
    let mut total_sent: Vec<Hypothesis> = Vec::new();
    for (_, saved) in store.load_all(mode)? {
        ensure!(
            saved.annotations.len() == saved.predictions.len(),
            "{} annotations but {} predictions in a '{}' batch",
            saved.annotations.len(), saved.predictions.len(), mode
        );
        total_info.extend(saved.annotations.iter().map(|a| sample_name(a).to_string()));
        total_sent.extend(saved.predictions);
    }

    let output_file = format!("output-hypothesis-{mode}.ctm");
    write2file(work_dir.join(&output_file), &total_info, &total_sent)?;

    evaluator.evaluate(&EvaluationRequest {
        prefix:          work_dir.to_path_buf(),
        mode:            mode.to_string(),
        output_file,
        evaluate_dir:    info.evaluation_dir.clone(),
        evaluate_prefix: info.evaluation_prefix.clone(),
        output_dir:      format!("epoch_{epoch}_result/"),
    })
}

// ─── seq_feature_generation ───────────────────────────────────────────────────
/// What a feature-generation call ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureGeneration {
    /// Features already on disk; nothing was computed
    Cached(CacheStatus),
    /// This many feature files were written
    Generated(usize),
}

/// Write one feature file per sample into `<work_dir>/<mode>/` and
/// link it at the store's canonical location.
///
/// Fails if a batch's label lengths do not account for exactly its
/// flattened labels.
pub fn seq_feature_generation<L, M, D>(
    loader:   &L,
    model:    &mut M,
    device:   &D,
    mode:     &str,
    work_dir: &Path,
    recoder:  &mut Recorder,
    store:    &FeatureStore,
) -> Result<FeatureGeneration>
where
    L: BatchSource + ?Sized,
    M: SequenceRecognizer,
    D: ComputeDevice<Resident = M::Input>,
{
    model.set_training(false);

    let status = store.check_cache(work_dir, mode, loader.dataset_len())?;
    if status.is_cached() {
        tracing::info!("{} features already available ({:?})", mode, status);
        return Ok(FeatureGeneration::Cached(status));
    }

    let src_path = FeatureStore::source_dir(work_dir, mode)?;
    let mut written = 0;

    for (batch_idx, data) in loader.iter().enumerate() {
        let data = data?;
        recoder.record_timer("device");
        let input = device.data_to_device(&data)?;
        let ret = model.forward(&input)?;
        fs::create_dir_all(&src_path)
            .with_context(|| format!("Cannot create '{}'", src_path.display()))?;

        let total = data.label.len();
        let mut start = 0;
        for sample_idx in 0..data.len() {
            let end = start + data.label_length[sample_idx];
            let label = &data.label[start.min(total)..end.min(total)];
            let features = ret.framewise_features(sample_idx, data.video_length[sample_idx])?;
            store.save_sample(&src_path, &data.info[sample_idx], label, &features)?;
            written += 1;
            start = end;
        }
        ensure!(
            data.total_label_length() == total,
            "Batch {batch_idx}: label lengths cover {} labels but the batch has {total}",
            data.total_label_length()
        );
    }

    store.link(&src_path, mode)?;
    tracing::info!("Wrote {} {} feature files to '{}'", written, mode, src_path.display());
    Ok(FeatureGeneration::Generated(written))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::evaluator::EditDistanceEvaluator;
    use crate::testing::{make_batch, seq_weights, FakeDevice, FakeLoader, FakeModel, FakeOptimizer};
    use std::path::PathBuf;

    fn recorder(dir: &Path, interval: usize) -> Recorder {
        Recorder::new(dir, interval).unwrap()
    }

    fn two_batch_loader() -> FakeLoader {
        FakeLoader::new(vec![
            make_batch("a", &[4, 3], 2),
            make_batch("b", &[5, 2], 1),
        ])
    }

    // ─── seq_train ───────────────────────────────────────────────────────────

    #[test]
    fn test_non_finite_losses_are_skipped() {
        let tmp    = tempfile::tempdir().unwrap();
        let loader = FakeLoader::new((0..4).map(|i| make_batch(&format!("b{i}_"), &[3], 1)).collect());
        let mut model = FakeModel::with_losses(vec![1.0, f64::NAN, 2.0, f64::INFINITY]);
        let mut optim = FakeOptimizer::default();
        let device    = FakeDevice::default();

        let losses = seq_train(
            &loader, &mut model, &mut optim, &device, 0,
            &recorder(tmp.path(), 1), &seq_weights(),
        )
        .unwrap();

        assert_eq!(losses, vec![1.0, 2.0]);
        assert_eq!(optim.steps, 2);
        assert_eq!(optim.backwards, 2);
        assert_eq!(optim.zero_grads, 4);
        assert_eq!(optim.scheduler_steps, 1);
        assert!(model.training);

        let log = fs::read_to_string(tmp.path().join("log.txt")).unwrap();
        assert_eq!(log.matches("loss is nan").count(), 2);
        assert!(log.contains("[3]  frames"));
        assert!(log.contains("[1]  glosses"));
    }

    #[test]
    fn test_progress_lines_use_interval_means() {
        let tmp    = tempfile::tempdir().unwrap();
        let loader = FakeLoader::new((0..3).map(|i| make_batch(&format!("b{i}_"), &[3], 1)).collect());
        let mut model = FakeModel::with_losses(vec![4.0, 2.0, 6.0]);
        let mut optim = FakeOptimizer::default();

        seq_train(
            &loader, &mut model, &mut optim, &FakeDevice::default(), 3,
            &recorder(tmp.path(), 2), &seq_weights(),
        )
        .unwrap();

        let log = fs::read_to_string(tmp.path().join("log.txt")).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines[0], "\tEpoch: 3, Batch(0/3) done. Loss: 4.00000000  lr:0.000100");
        assert_eq!(lines[1], "\t Mean SeqCTC loss: 2.00000");
        // batches 1 and 2 accumulate into the next window
        assert_eq!(lines[2], "\tEpoch: 3, Batch(2/3) done. Loss: 6.00000000  lr:0.000100");
        assert_eq!(lines[3], "\t Mean SeqCTC loss: 4.00000");
        assert_eq!(lines[4], "\tMean training loss: 4.0000000000.");
    }

    #[test]
    fn test_empty_epoch_still_steps_scheduler() {
        let tmp = tempfile::tempdir().unwrap();
        let mut model = FakeModel::with_losses(vec![]);
        let mut optim = FakeOptimizer::default();

        let losses = seq_train(
            &FakeLoader::new(vec![]), &mut model, &mut optim, &FakeDevice::default(), 0,
            &recorder(tmp.path(), 1), &seq_weights(),
        )
        .unwrap();

        assert!(losses.is_empty());
        assert_eq!(optim.scheduler_steps, 1);
        let log = fs::read_to_string(tmp.path().join("log.txt")).unwrap();
        assert!(log.contains("Mean training loss: NaN."));
    }

    #[test]
    fn test_unknown_loss_component_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let mut model = FakeModel::with_losses(vec![1.0]);
        model.component = "ConvCTC".into();

        let result = seq_train(
            &two_batch_loader(), &mut model, &mut FakeOptimizer::default(), &FakeDevice::default(),
            0, &recorder(tmp.path(), 1), &seq_weights(),
        );
        assert!(result.is_err());
    }

    // ─── seq_eval ────────────────────────────────────────────────────────────

    struct EvalFixture {
        _tmp:     tempfile::TempDir,
        work_dir: PathBuf,
        store:    PredictionStore,
        recorder: Recorder,
    }

    fn eval_fixture() -> EvalFixture {
        let tmp      = tempfile::tempdir().unwrap();
        let work_dir = tmp.path().join("work");
        let store    = PredictionStore::new(tmp.path().join("json_saved_data"));
        let recorder = recorder(&work_dir, 1);
        EvalFixture { _tmp: tmp, work_dir, store, recorder }
    }

    #[test]
    fn test_eval_persists_every_batch_and_returns_zero() {
        let mut fx    = eval_fixture();
        let mut model = FakeModel::with_losses(vec![]);
        let device    = FakeDevice::default();

        let ret = seq_eval(
            &EvalSettings::default(), &two_batch_loader(), &mut model, &device, "dev", 0,
            &fx.work_dir, &mut fx.recorder, &fx.store, &EditDistanceEvaluator,
        )
        .unwrap();

        assert_eq!(ret, 0.0);
        assert!(!model.training);
        assert_eq!(device.cache_clears.get(), 2);
        assert_eq!(fx.store.load_all("dev").unwrap().len(), 2);
    }

    #[test]
    fn test_eval_skips_existing_batch_dirs() {
        let mut fx = eval_fixture();
        fs::create_dir_all(fx.store.batch_dir("dev", 1)).unwrap();
        let loader = FakeLoader::new((0..3).map(|i| make_batch(&format!("b{i}_"), &[3], 1)).collect());
        let mut model = FakeModel::with_losses(vec![]);

        seq_eval(
            &EvalSettings::default(), &loader, &mut model, &FakeDevice::default(), "dev", 0,
            &fx.work_dir, &mut fx.recorder, &fx.store, &EditDistanceEvaluator,
        )
        .unwrap();

        assert_eq!(model.forward_calls.get(), 2);
        assert_eq!(fs::read_dir(fx.store.batch_dir("dev", 1)).unwrap().count(), 0);
        assert!(fx.store.batch_dir("dev", 2).join("return_dict.json").is_file());
    }

    #[test]
    fn test_eval_skips_batches_without_video() {
        let mut fx = eval_fixture();
        let mut empty = make_batch("e", &[0], 1);
        empty.video = None;
        let loader = FakeLoader::new(vec![empty, make_batch("b", &[3], 1)]);
        let mut model = FakeModel::with_losses(vec![]);
        let device    = FakeDevice::default();

        seq_eval(
            &EvalSettings::default(), &loader, &mut model, &device, "dev", 0,
            &fx.work_dir, &mut fx.recorder, &fx.store, &EditDistanceEvaluator,
        )
        .unwrap();

        assert_eq!(device.transfers.get(), 1);
        assert!(!fx.store.batch_dir("dev", 0).exists());
        assert!(fx.store.batch_dir("dev", 1).exists());
    }

    #[test]
    fn test_eval_recovers_from_out_of_memory() {
        let mut fx = eval_fixture();
        let mut model = FakeModel::with_losses(vec![]);
        model.oom_calls.insert(0);
        let device = FakeDevice::default();

        let ret = seq_eval(
            &EvalSettings::default(), &two_batch_loader(), &mut model, &device, "dev", 0,
            &fx.work_dir, &mut fx.recorder, &fx.store, &EditDistanceEvaluator,
        )
        .unwrap();

        assert_eq!(ret, 0.0);
        assert!(!fx.store.batch_dir("dev", 0).exists());
        assert!(fx.store.batch_dir("dev", 1).exists());
        assert_eq!(device.cache_clears.get(), 2);
    }

    #[test]
    fn test_eval_scores_when_enabled() {
        let mut fx   = eval_fixture();
        let eval_dir = fx.work_dir.join("evaluation");
        fs::create_dir_all(&eval_dir).unwrap();
        // FakeModel predicts the upper-cased sample name
        fs::write(
            eval_dir.join("phoenix-dev.stm"),
            "a0 1 s 0.0 1.0 A0\na1 1 s 0.0 1.0 A1\nb0 1 s 0.0 1.0 WRONG\nb1 1 s 0.0 1.0 B1\n",
        )
        .unwrap();
        let cfg = EvalSettings {
            dataset_info: DatasetInfo {
                evaluation_dir:    eval_dir,
                evaluation_prefix: "phoenix".into(),
            },
            score_predictions: true,
        };

        let wer = seq_eval(
            &cfg, &two_batch_loader(), &mut FakeModel::with_losses(vec![]), &FakeDevice::default(),
            "dev", 4, &fx.work_dir, &mut fx.recorder, &fx.store, &EditDistanceEvaluator,
        )
        .unwrap();

        assert!((wer - 25.0).abs() < 1e-9);
        let ctm = fs::read_to_string(fx.work_dir.join("output-hypothesis-dev.ctm")).unwrap();
        assert!(ctm.starts_with("a0 1 0.00 0.01 A0\n"));
        let dev_log = fs::read_to_string(fx.work_dir.join("dev.txt")).unwrap();
        assert!(dev_log.starts_with("Epoch 4, dev Percent Total Error"));
    }

    #[test]
    fn test_scoring_failure_reports_full_error() {
        let fx = eval_fixture();
        // nothing persisted, no reference file
        let wer = score_persisted(
            &DatasetInfo::default(), &fx.store, &EditDistanceEvaluator, "dev", 0,
            &fx.work_dir, &fx.recorder,
        );
        assert_eq!(wer, 100.0);
        let dev_log = fs::read_to_string(fx.work_dir.join("dev.txt")).unwrap();
        assert!(dev_log.contains("100.00%   (ERROR)"));
    }

    // ─── seq_feature_generation ──────────────────────────────────────────────

    struct FeatureFixture {
        _tmp:     tempfile::TempDir,
        work_dir: PathBuf,
        store:    FeatureStore,
        recorder: Recorder,
    }

    fn feature_fixture() -> FeatureFixture {
        let tmp      = tempfile::tempdir().unwrap();
        let work_dir = tmp.path().join("runs").join("exp1");
        let store    = FeatureStore::new(tmp.path().join("features"));
        let recorder = recorder(&work_dir, 1);
        FeatureFixture { _tmp: tmp, work_dir, store, recorder }
    }

    fn snapshot(dir: &Path) -> Vec<(String, Vec<u8>)> {
        let mut files: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| {
                let e = e.unwrap();
                (e.file_name().to_string_lossy().into_owned(), fs::read(e.path()).unwrap())
            })
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_features_written_then_cached() {
        let mut fx    = feature_fixture();
        let loader    = two_batch_loader();
        let mut model = FakeModel::with_losses(vec![]);
        let device    = FakeDevice::default();

        let first = seq_feature_generation(
            &loader, &mut model, &device, "dev", &fx.work_dir, &mut fx.recorder, &fx.store,
        )
        .unwrap();
        assert_eq!(first, FeatureGeneration::Generated(4));
        assert_eq!(model.forward_calls.get(), 2);

        let src = fx.work_dir.join("dev");
        assert!(src.join("a0_features.npy").is_file());
        assert!(src.join("b1_features.npy").is_file());
        let link = fx.store.link_path("dev").unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), std::path::absolute(&src).unwrap());

        let before = snapshot(&src);
        let second = seq_feature_generation(
            &loader, &mut model, &device, "dev", &fx.work_dir, &mut fx.recorder, &fx.store,
        )
        .unwrap();
        assert_eq!(second, FeatureGeneration::Cached(CacheStatus::AlreadyLinked));
        assert_eq!(model.forward_calls.get(), 2);
        assert_eq!(snapshot(&src), before);
    }

    #[test]
    fn test_populated_source_is_relinked_without_inference() {
        let mut fx = feature_fixture();
        let loader = two_batch_loader();
        let device = FakeDevice::default();

        seq_feature_generation(
            &loader, &mut FakeModel::with_losses(vec![]), &device, "dev",
            &fx.work_dir, &mut fx.recorder, &fx.store,
        )
        .unwrap();
        let src = fx.work_dir.join("dev");
        let before = snapshot(&src);
        fs::remove_file(fx.store.link_path("dev").unwrap()).unwrap();

        let mut model = FakeModel::with_losses(vec![]);
        let outcome = seq_feature_generation(
            &loader, &mut model, &device, "dev", &fx.work_dir, &mut fx.recorder, &fx.store,
        )
        .unwrap();

        assert_eq!(outcome, FeatureGeneration::Cached(CacheStatus::Relinked));
        assert_eq!(model.forward_calls.get(), 0);
        assert_eq!(snapshot(&src), before);
    }

    #[test]
    fn test_stale_link_is_replaced_by_fresh_features() {
        let mut fx = feature_fixture();
        let other  = fx._tmp.path().join("runs").join("exp0").join("dev");
        fs::create_dir_all(&other).unwrap();
        fs::write(other.join("old_features.npy"), b"stale").unwrap();
        fx.store.link(&std::path::absolute(&other).unwrap(), "dev").unwrap();

        let mut model = FakeModel::with_losses(vec![]);
        let outcome = seq_feature_generation(
            &two_batch_loader(), &mut model, &FakeDevice::default(), "dev",
            &fx.work_dir, &mut fx.recorder, &fx.store,
        )
        .unwrap();

        assert_eq!(outcome, FeatureGeneration::Generated(4));
        assert_eq!(model.forward_calls.get(), 2);
        let src  = fx.work_dir.join("dev");
        let link = fx.store.link_path("dev").unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), std::path::absolute(&src).unwrap());
        assert_eq!(fs::read_dir(&src).unwrap().count(), 4);
        // the other run's files are left alone
        assert!(other.join("old_features.npy").is_file());
    }

    #[test]
    fn test_label_accounting_mismatch_is_fatal() {
        let mut fx = feature_fixture();
        let mut batch = make_batch("x", &[3, 3], 2);
        batch.label.pop(); // label_length says 4, only 3 labels
        let loader = FakeLoader::new(vec![batch]);

        let result = seq_feature_generation(
            &loader, &mut FakeModel::with_losses(vec![]), &FakeDevice::default(), "dev",
            &fx.work_dir, &mut fx.recorder, &fx.store,
        );
        assert!(result.is_err());
        assert!(fs::symlink_metadata(fx.store.link_path("dev").unwrap()).is_err());
    }
}
