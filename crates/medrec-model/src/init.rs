//! Seeded parameter initialisation.

use candle_core::Tensor;
use candle_nn::VarMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::{ModelError, Result};

const EMBEDDING_BOUND: f32 = 0.1;

/// Overwrite every variable in `varmap` with seeded uniform values.
///
/// Bounds are `±1/sqrt(last dim)` (the fan-in of a linear weight, the
/// output width of a GCN weight), except code embeddings at `±0.1`.
/// Variables are visited in name order so the result does not depend on
/// map iteration order.
pub fn seeded_uniform(varmap: &VarMap, seed: u64) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = varmap
        .data()
        .lock()
        .map_err(|_| ModelError::State("parameter map lock poisoned".to_string()))?;

    let mut names: Vec<&String> = data.keys().collect();
    names.sort();

    for name in names {
        let var = &data[name];
        let bound = if name.contains("embedding") {
            EMBEDDING_BOUND
        } else {
            let fan = var.dims().last().copied().unwrap_or(1).max(1);
            1.0 / (fan as f32).sqrt()
        };
        let values: Vec<f32> = (0..var.elem_count())
            .map(|_| rng.gen_range(-bound..bound))
            .collect();
        var.set(&Tensor::from_vec(values, var.dims(), var.device())?)?;
    }
    debug!("Initialised {} parameter tensors with seed {}", data.len(), seed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::{Init, VarBuilder};

    fn build(seed: u64) -> Vec<f32> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let w = vb.get_with_hints((3, 4), "w", Init::Const(0.0)).unwrap();
        seeded_uniform(&varmap, seed).unwrap();
        // `w` shares storage with the var, so it sees the new values
        w.flatten_all().unwrap().to_vec1::<f32>().unwrap()
    }

    #[test]
    fn test_same_seed_same_parameters() {
        assert_eq!(build(5), build(5));
        assert_ne!(build(5), build(6));
    }

    #[test]
    fn test_poisoned_map_is_a_state_error() {
        let varmap = VarMap::new();
        let shared = varmap.clone();
        let _ = std::thread::spawn(move || {
            let _guard = shared.data().lock().unwrap();
            panic!("poison the parameter map");
        })
        .join();
        assert!(matches!(seeded_uniform(&varmap, 1), Err(ModelError::State(_))));
    }

    #[test]
    fn test_values_within_fan_in_bound() {
        let values = build(1);
        assert!(values.iter().all(|v| v.abs() <= 0.5));
    }
}
