// ============================================================
// Layer 3 — SignBatch Domain Type
// ============================================================
// A batch is the 5-tuple every loop in Layer 2 consumes:
//
//   video        — padded frame vectors, shape [batch, frames, dim]
//   video_length — number of valid frames per sample
//   label        — every sample's gloss ids, concatenated
//   label_length — how many of those ids belong to each sample
//   info         — "<name>|<rest>" identifier per sample
//
// Labels are flattened, so a sample's labels are found with a
// running offset over `label_length`, never by indexing `label`
// with the sample index.

use ndarray::Array3;

#[derive(Debug, Clone)]
pub struct SignBatch {
    /// `None` when the collated batch carries no frames at all
    pub video:        Option<Array3<f32>>,
    pub video_length: Vec<usize>,
    pub label:        Vec<i64>,
    pub label_length: Vec<usize>,
    pub info:         Vec<String>,
}

impl SignBatch {
    /// Number of samples in this batch
    pub fn len(&self) -> usize {
        self.info.len()
    }

    /// Sum of the per-sample label lengths.
    /// Must equal `label.len()` for a well-formed batch.
    pub fn total_label_length(&self) -> usize {
        self.label_length.iter().sum()
    }
}
