//! Dropout driven by a caller-owned RNG.
//!
//! Candle's CPU device RNG cannot be seeded, so masks are drawn from a
//! `StdRng` owned by the model instead.

use candle_core::Tensor;
use rand::rngs::StdRng;
use rand::Rng;

/// Zero each element with probability `p`, scaling survivors by `1/(1-p)`.
pub fn dropout(xs: &Tensor, p: f32, rng: &mut StdRng) -> candle_core::Result<Tensor> {
    if p <= 0.0 {
        return Ok(xs.clone());
    }
    let scale = 1.0 / (1.0 - p);
    let mask: Vec<f32> = (0..xs.elem_count())
        .map(|_| if rng.gen::<f32>() < p { 0.0 } else { scale })
        .collect();
    let mask = Tensor::from_vec(mask, xs.dims(), xs.device())?;
    xs.mul(&mask)
}

/// Apply [`dropout`] in training mode (an RNG is present), identity otherwise.
pub fn maybe_dropout(xs: Tensor, p: f32, rng: Option<&mut StdRng>) -> candle_core::Result<Tensor> {
    match rng {
        Some(rng) => dropout(&xs, p, rng),
        None => Ok(xs),
    }
}
