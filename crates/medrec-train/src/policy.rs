//! Annealed choice between the accuracy loss and the DDI loss.
//!
//! While a visit's predicted DDI rate stays at or below the target, the
//! blended accuracy loss is always used. Above the target the DDI loss is
//! chosen with probability `exp((target - rate) / T)`, and `T` shrinks
//! geometrically once per epoch.

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossBranch {
    /// `0.9·BCE + 0.1·margin`
    Blended,
    /// The model's auxiliary DDI loss
    Ddi,
}

#[derive(Debug, Clone)]
pub struct AnnealedLossSelector {
    target_ddi: f64,
    temperature: f64,
    decay_weight: f64,
}

impl AnnealedLossSelector {
    pub fn new(target_ddi: f64, temperature: f64, decay_weight: f64) -> Self {
        Self {
            target_ddi,
            temperature: temperature.max(f64::MIN_POSITIVE),
            decay_weight,
        }
    }

    pub fn target_ddi(&self) -> f64 {
        self.target_ddi
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Probability of taking the DDI branch at `rate`; 0 at or below target.
    pub fn gate_probability(&self, rate: f64) -> f64 {
        if rate <= self.target_ddi {
            0.0
        } else {
            ((self.target_ddi - rate) / self.temperature).exp()
        }
    }

    /// Pick the loss for one visit. Draws from `rng` only when the rate is
    /// above target.
    pub fn select<R: Rng + ?Sized>(&self, rate: f64, rng: &mut R) -> LossBranch {
        if rate <= self.target_ddi {
            return LossBranch::Blended;
        }
        if rng.gen::<f64>() < self.gate_probability(rate) {
            LossBranch::Ddi
        } else {
            LossBranch::Blended
        }
    }

    /// `T ← T·decay_weight`, never reaching zero.
    pub fn decay(&mut self) {
        self.temperature = (self.temperature * self.decay_weight).max(f64::MIN_POSITIVE);
    }
}
