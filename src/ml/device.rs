// ============================================================
// Layer 5 — Device Adapter
// ============================================================
// Moves a collated host batch onto a Burn device.
//
// Only the video goes to the device. Lengths and labels stay on
// the host: the CTC loss builds its gather indices from them and
// the decoder needs them to truncate each sample.
//
// Burn backends signal allocation failure by panicking, so the
// forward pass runs under `guard_out_of_memory`, which turns an
// "out of memory" panic into `DeviceError::OutOfMemory` and lets
// every other panic continue unwinding.

use anyhow::{bail, Result};
use burn::prelude::*;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};

use crate::domain::batch::SignBatch;
use crate::domain::traits::{ComputeDevice, DeviceError};

/// A batch whose video lives on the device
#[derive(Debug, Clone)]
pub struct DeviceBatch<B: Backend> {
    /// [batch, frames, feature_dim]
    pub video:        Tensor<B, 3>,
    pub video_length: Vec<usize>,
    pub label:        Vec<i64>,
    pub label_length: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct BurnDevice<B: Backend> {
    device:   B::Device,
    _backend: PhantomData<B>,
}

impl<B: Backend> BurnDevice<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device, _backend: PhantomData }
    }
}

impl<B: Backend> ComputeDevice for BurnDevice<B> {
    type Resident = DeviceBatch<B>;

    fn data_to_device(&self, batch: &SignBatch) -> Result<DeviceBatch<B>> {
        let Some(video) = &batch.video else {
            bail!("Batch {:?} has no video frames", batch.info.first());
        };
        let (n, frames, dim) = video.dim();
        let values: Vec<f32> = video.iter().copied().collect();
        let video = Tensor::<B, 3>::from_data(TensorData::new(values, [n, frames, dim]), &self.device);

        Ok(DeviceBatch {
            video,
            video_length: batch.video_length.clone(),
            label:        batch.label.clone(),
            label_length: batch.label_length.clone(),
        })
    }

    fn empty_cache(&self) {
        // Flushes queued work so the allocator can reuse the batch's buffers
        let _ = B::sync(&self.device);
    }
}

/// Run `f`, mapping an allocation-failure panic to `DeviceError::OutOfMemory`
pub fn guard_out_of_memory<T>(f: impl FnOnce() -> T) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Ok(value),
        Err(payload) => {
            let message = payload
                .downcast_ref::<String>()
                .map(String::as_str)
                .or_else(|| payload.downcast_ref::<&str>().copied())
                .unwrap_or_default();
            if message.to_lowercase().contains("out of memory") {
                tracing::warn!("Device allocation failed: {}", message);
                Err(DeviceError::OutOfMemory(message.to_string()).into())
            } else {
                panic::resume_unwind(payload)
            }
        }
    }
}
