//! Two-layer graph convolution over a medication graph.
//!
//! Node features are the identity matrix, so the first layer's support
//! `X·W₁` is `W₁` itself and the output is one embedding row per drug.

use candle_core::{Device, Tensor};
use candle_nn::{Init, VarBuilder};
use medrec_common::AdjacencyMatrix;
use rand::rngs::StdRng;

use crate::dropout::maybe_dropout;
use crate::Result;

/// Row-normalise `adj + I`. Rows summing to zero stay zero.
pub fn normalize_with_self_loops(adj: &AdjacencyMatrix) -> Vec<f32> {
    let n = adj.size();
    let mut values = adj.as_slice().to_vec();
    for i in 0..n {
        values[i * n + i] += 1.0;
    }
    for row in values.chunks_mut(n.max(1)) {
        let sum: f32 = row.iter().sum();
        let inv = if sum == 0.0 { 0.0 } else { 1.0 / sum };
        row.iter_mut().for_each(|v| *v *= inv);
    }
    values
}

pub struct Gcn {
    adj: Tensor,
    w1: Tensor,
    b1: Tensor,
    w2: Tensor,
    b2: Tensor,
    dropout: f32,
}

impl Gcn {
    pub fn new(
        adj: &AdjacencyMatrix,
        emb_dim: usize,
        dropout: f32,
        vb: VarBuilder,
        device: &Device,
    ) -> Result<Self> {
        let n = adj.size();
        let adj = Tensor::from_vec(normalize_with_self_loops(adj), (n, n), device)?;
        let bound = 1.0 / (emb_dim as f64).sqrt();
        let init = Init::Uniform { lo: -bound, up: bound };

        let gcn1 = vb.pp("gcn1");
        let gcn2 = vb.pp("gcn2");
        Ok(Self {
            adj,
            w1: gcn1.get_with_hints((n, emb_dim), "weight", init)?,
            b1: gcn1.get_with_hints(emb_dim, "bias", init)?,
            w2: gcn2.get_with_hints((emb_dim, emb_dim), "weight", init)?,
            b2: gcn2.get_with_hints(emb_dim, "bias", init)?,
            dropout,
        })
    }

    /// Node embeddings, shape `(num_med, emb_dim)`. Dropout applies only
    /// when an RNG is supplied.
    pub fn forward(&self, rng: Option<&mut StdRng>) -> Result<Tensor> {
        let h = self.adj.matmul(&self.w1)?.broadcast_add(&self.b1)?.relu()?;
        let h = maybe_dropout(h, self.dropout, rng)?;
        let out = self.adj.matmul(&h.matmul(&self.w2)?)?.broadcast_add(&self.b2)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;
    use candle_nn::VarMap;

    #[test]
    fn test_normalize_adds_self_loops() {
        let adj = AdjacencyMatrix::from_pairs(3, &[(0, 1)]).unwrap();
        let norm = normalize_with_self_loops(&adj);
        // Row 0: [1, 1, 0] / 2; row 2: only the self loop
        assert_eq!(&norm[0..3], &[0.5, 0.5, 0.0]);
        assert_eq!(&norm[6..9], &[0.0, 0.0, 1.0]);
        for row in norm.chunks(3) {
            assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_forward_shape() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let adj = AdjacencyMatrix::from_pairs(5, &[(0, 1), (2, 3)]).unwrap();
        let gcn = Gcn::new(&adj, 8, 0.3, vb, &Device::Cpu).unwrap();
        let out = gcn.forward(None).unwrap();
        assert_eq!(out.dims(), &[5, 8]);
    }
}
