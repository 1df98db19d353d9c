//! Accuracy losses for one visit.
//!
//! Both take logits or probabilities of shape `(1, num_med)` and return a
//! scalar tensor that stays attached to the autograd graph.

use candle_core::{Result, Tensor};

/// Weight of the BCE term in the blended accuracy loss; the margin term
/// gets the rest.
pub const BCE_WEIGHT: f64 = 0.9;

/// Mean binary cross-entropy on logits, in the overflow-free form
/// `max(x, 0) - x·t + log(1 + exp(-|x|))`.
pub fn bce_with_logits(logits: &Tensor, target: &Tensor) -> Result<Tensor> {
    let softplus = logits.abs()?.neg()?.exp()?.affine(1.0, 1.0)?.log()?;
    logits
        .relu()?
        .sub(&logits.mul(target)?)?
        .add(&softplus)?
        .mean_all()
}

/// Multi-label hinge loss.
///
/// `target` lists class indices and is read up to the first negative entry.
/// For every listed class `y` and every unlisted class `i` the loss adds
/// `max(0, 1 - (x[y] - x[i]))`; the total is divided by the number of
/// classes.
pub fn multilabel_margin_loss(input: &Tensor, target: &[i64]) -> Result<Tensor> {
    let classes = input.dim(1)?;
    let positives: Vec<u32> = target
        .iter()
        .take_while(|&&t| t >= 0)
        .map(|&t| t as u32)
        .collect();
    if positives.is_empty() {
        return Tensor::zeros((), input.dtype(), input.device());
    }

    let mut negative_mask = vec![1f32; classes];
    for &y in &positives {
        negative_mask[y as usize] = 0.0;
    }
    let negative_mask = Tensor::from_vec(negative_mask, (1, classes), input.device())?;

    let ids = Tensor::new(positives.as_slice(), input.device())?;
    // (T, 1): 1 - x[y] for each listed class
    let offsets = input.index_select(&ids, 1)?.t()?.affine(-1.0, 1.0)?;
    let hinge = offsets.broadcast_add(input)?.relu()?;
    hinge
        .broadcast_mul(&negative_mask)?
        .sum_all()?
        .affine(1.0 / classes as f64, 0.0)
}

/// `0.9·bce + 0.1·margin`.
pub fn blended_loss(bce: &Tensor, margin: &Tensor) -> Result<Tensor> {
    bce.affine(BCE_WEIGHT, 0.0)?.add(&margin.affine(1.0 - BCE_WEIGHT, 0.0)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn scalar(t: Tensor) -> f32 {
        t.to_scalar::<f32>().unwrap()
    }

    #[test]
    fn test_bce_matches_closed_form() {
        let logits = Tensor::new(&[[0f32, 2.0, -1.0]], &Device::Cpu).unwrap();
        let target = Tensor::new(&[[1f32, 0.0, 0.0]], &Device::Cpu).unwrap();
        let expected = (2f32.ln() + (2.0 + (-2f32).exp().ln_1p()) + (-1f32).exp().ln_1p()) / 3.0;
        let loss = scalar(bce_with_logits(&logits, &target).unwrap());
        assert!((loss - expected).abs() < 1e-5, "{loss} vs {expected}");
    }

    #[test]
    fn test_bce_stable_for_large_logits() {
        let logits = Tensor::new(&[[200f32, -200.0]], &Device::Cpu).unwrap();
        let target = Tensor::new(&[[1f32, 0.0]], &Device::Cpu).unwrap();
        let loss = scalar(bce_with_logits(&logits, &target).unwrap());
        assert!(loss.is_finite());
        assert!(loss.abs() < 1e-6);
    }

    #[test]
    fn test_margin_loss_reference_value() {
        // x = [0.1, 0.2, 0.4, 0.8], targets {3, 0}:
        // (0.4 + 0.6 + 1.1 + 1.3) / 4 = 0.85
        let input = Tensor::new(&[[0.1f32, 0.2, 0.4, 0.8]], &Device::Cpu).unwrap();
        let loss = scalar(multilabel_margin_loss(&input, &[3, 0, -1, 1]).unwrap());
        assert!((loss - 0.85).abs() < 1e-6, "{loss}");
    }

    #[test]
    fn test_margin_loss_all_positive_is_zero() {
        let input = Tensor::new(&[[0.3f32, 0.7]], &Device::Cpu).unwrap();
        assert_eq!(scalar(multilabel_margin_loss(&input, &[0, 1]).unwrap()), 0.0);
        assert_eq!(scalar(multilabel_margin_loss(&input, &[-1, -1]).unwrap()), 0.0);
    }

    #[test]
    fn test_blend_weights() {
        let bce = Tensor::new(1f32, &Device::Cpu).unwrap();
        let margin = Tensor::new(2f32, &Device::Cpu).unwrap();
        let loss = scalar(blended_loss(&bce, &margin).unwrap());
        assert!((loss - 1.1).abs() < 1e-6);
    }
}
