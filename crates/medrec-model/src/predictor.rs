//! The seam between the training/evaluation loops and a model.

use candle_core::{Device, Tensor};
use medrec_common::Visit;

use crate::Result;

/// Forward-pass mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Dropout active, auxiliary DDI loss computed
    Train,
    /// Deterministic, no auxiliary loss
    Eval,
}

/// Output of one forward pass over a visit prefix.
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Per-drug logits for the last visit of the prefix, shape `(1, num_med)`
    pub logits: Tensor,
    /// Auxiliary DDI loss (scalar); present in [`Mode::Train`] only
    pub ddi_loss: Option<Tensor>,
}

/// A model that scores medications for the last visit of a history prefix.
///
/// Implementations must only read the visits they are given: callers pass
/// `&visits[..=k]` to predict visit `k`, and repeated calls with growing
/// prefixes must not share hidden state beyond trainable parameters.
pub trait SequentialPredictor {
    fn num_medications(&self) -> usize;

    fn device(&self) -> &Device;

    fn predict(&self, prefix: &[Visit], mode: Mode) -> Result<Prediction>;

    /// Sigmoid probabilities for the last visit, in inference mode.
    fn probabilities(&self, prefix: &[Visit]) -> Result<Vec<f32>> {
        let prediction = self.predict(prefix, Mode::Eval)?;
        let probs = candle_nn::ops::sigmoid(&prediction.logits)?;
        Ok(probs.flatten_all()?.to_vec1::<f32>()?)
    }
}
