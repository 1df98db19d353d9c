//! GAMENet: graph-augmented memory network for medication recommendation.

use std::sync::Mutex;

use candle_core::{DType, Device, Tensor, D};
use candle_nn::{Embedding, Init, Linear, Module, VarBuilder, VarMap, GRU, RNN};
use medrec_common::{AdjacencyMatrix, Visit, VocabSizes};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::dropout::maybe_dropout;
use crate::gcn::Gcn;
use crate::predictor::{Mode, Prediction, SequentialPredictor};
use crate::{init, ModelConfig, ModelError, Result};

pub struct GameNet {
    config: ModelConfig,
    vocab: VocabSizes,
    device: Device,
    diag_embedding: Embedding,
    proc_embedding: Embedding,
    diag_encoder: GRU,
    proc_encoder: GRU,
    query: Linear,
    ehr_gcn: Gcn,
    ddi_gcn: Option<Gcn>,
    inter: Tensor,
    hidden: Linear,
    output: Linear,
    ddi_adj: Tensor,
    rng: Mutex<StdRng>,
}

impl GameNet {
    /// Build the model on a variable builder. Parameters keep whatever
    /// initialisation the builder's backend gives them.
    pub fn new(
        config: ModelConfig,
        vocab: VocabSizes,
        ehr_adj: &AdjacencyMatrix,
        ddi_adj: &AdjacencyMatrix,
        vb: VarBuilder,
        device: &Device,
    ) -> Result<Self> {
        let dim = config.emb_dim;
        let num_med = vocab.num_med;
        if ehr_adj.size() != num_med || ddi_adj.size() != num_med {
            return Err(ModelError::InvalidInput(format!(
                "adjacency sizes ({}, {}) do not match {} medications",
                ehr_adj.size(),
                ddi_adj.size(),
                num_med
            )));
        }

        let embed_init = Init::Uniform { lo: -0.1, up: 0.1 };
        let diag_embedding = Embedding::new(
            vb.pp("diag_embedding").get_with_hints((vocab.num_diag, dim), "weight", embed_init)?,
            dim,
        );
        let proc_embedding = Embedding::new(
            vb.pp("proc_embedding").get_with_hints((vocab.num_proc, dim), "weight", embed_init)?,
            dim,
        );

        let diag_encoder = candle_nn::gru(dim, dim * 2, Default::default(), vb.pp("diag_encoder"))?;
        let proc_encoder = candle_nn::gru(dim, dim * 2, Default::default(), vb.pp("proc_encoder"))?;
        let query = candle_nn::linear(dim * 4, dim, vb.pp("query"))?;

        let ehr_gcn = Gcn::new(ehr_adj, dim, config.gcn_dropout, vb.pp("ehr_gcn"), device)?;
        let ddi_gcn = if config.ddi_in_memory {
            Some(Gcn::new(ddi_adj, dim, config.gcn_dropout, vb.pp("ddi_gcn"), device)?)
        } else {
            None
        };
        let inter = vb.get_with_hints(1, "inter", Init::Uniform { lo: -1.0, up: 1.0 })?;

        let hidden = candle_nn::linear(dim * 3, dim * 2, vb.pp("output.hidden"))?;
        let output = candle_nn::linear(dim * 2, num_med, vb.pp("output.logits"))?;

        let ddi_adj = Tensor::from_vec(ddi_adj.as_slice().to_vec(), (num_med, num_med), device)?;

        Ok(Self {
            rng: Mutex::new(StdRng::seed_from_u64(config.seed)),
            config,
            vocab,
            device: device.clone(),
            diag_embedding,
            proc_embedding,
            diag_encoder,
            proc_encoder,
            query,
            ehr_gcn,
            ddi_gcn,
            inter,
            hidden,
            output,
            ddi_adj,
        })
    }

    /// Build the model with fresh variables in `varmap`, initialised from
    /// `config.seed`.
    pub fn from_varmap(
        varmap: &VarMap,
        config: ModelConfig,
        vocab: VocabSizes,
        ehr_adj: &AdjacencyMatrix,
        ddi_adj: &AdjacencyMatrix,
        device: &Device,
    ) -> Result<Self> {
        info!(
            "Building GAMENet: emb_dim={}, ddi_in_memory={}, {} medications",
            config.emb_dim, config.ddi_in_memory, vocab.num_med
        );
        let vb = VarBuilder::from_varmap(varmap, DType::F32, device);
        let seed = config.seed;
        let model = Self::new(config, vocab, ehr_adj, ddi_adj, vb, device)?;
        init::seeded_uniform(varmap, seed)?;
        debug!("GAMENet has {} trainable parameters", parameter_count(varmap));
        Ok(model)
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Mean code embedding for one visit, `(1, emb_dim)`; zeros for no codes.
    fn visit_embedding(
        &self,
        embedding: &Embedding,
        codes: &[usize],
        rng: Option<&mut StdRng>,
    ) -> Result<Tensor> {
        if codes.is_empty() {
            return Ok(Tensor::zeros((1, self.config.emb_dim), DType::F32, &self.device)?);
        }
        let ids: Vec<u32> = codes.iter().map(|&c| c as u32).collect();
        let ids = Tensor::new(ids.as_slice(), &self.device)?;
        let embedded = embedding.forward(&ids)?;
        let embedded = maybe_dropout(embedded, self.config.embedding_dropout, rng)?;
        Ok(embedded.mean_keepdim(0)?)
    }

    /// Run one GRU over the visit sequence, `(seq, 2·emb_dim)`.
    fn encode(
        &self,
        embedding: &Embedding,
        encoder: &GRU,
        prefix: &[Visit],
        codes: fn(&Visit) -> &[usize],
        mut rng: Option<&mut StdRng>,
    ) -> Result<Tensor> {
        let rows = prefix
            .iter()
            .map(|visit| self.visit_embedding(embedding, codes(visit), rng.as_deref_mut()))
            .collect::<Result<Vec<_>>>()?;
        let sequence = Tensor::cat(&rows, 0)?.unsqueeze(0)?;
        let states = encoder.seq(&sequence)?;
        // States are concatenated along the feature axis: (1, seq·hidden)
        let hidden = self.config.emb_dim * 2;
        Ok(encoder.states_to_tensor(&states)?.reshape((prefix.len(), hidden))?)
    }

    fn drug_memory(&self, mut rng: Option<&mut StdRng>) -> Result<Tensor> {
        let ehr = self.ehr_gcn.forward(rng.as_deref_mut())?;
        match &self.ddi_gcn {
            Some(ddi_gcn) => {
                let ddi = ddi_gcn.forward(rng)?;
                Ok(ehr.sub(&ddi.broadcast_mul(&self.inter)?)?)
            }
            None => Ok(ehr),
        }
    }

    /// Medication indicators of every visit but the last, `(seq-1, num_med)`.
    fn history_values(&self, prefix: &[Visit]) -> Result<Tensor> {
        let num_med = self.vocab.num_med;
        let history = &prefix[..prefix.len() - 1];
        let mut values = vec![0f32; history.len() * num_med];
        for (row, visit) in history.iter().enumerate() {
            for &med in &visit.medications {
                values[row * num_med + med] = 1.0;
            }
        }
        Ok(Tensor::from_vec(values, (history.len(), num_med), &self.device)?)
    }

    fn forward(&self, prefix: &[Visit], mut rng: Option<&mut StdRng>) -> Result<Tensor> {
        let seq = prefix.len();

        let diag = self.encode(
            &self.diag_embedding,
            &self.diag_encoder,
            prefix,
            |v| v.diagnoses.as_slice(),
            rng.as_deref_mut(),
        )?;
        let proc = self.encode(
            &self.proc_embedding,
            &self.proc_encoder,
            prefix,
            |v| v.procedures.as_slice(),
            rng.as_deref_mut(),
        )?;
        let patient = Tensor::cat(&[&diag, &proc], 1)?;
        let queries = self.query.forward(&patient.relu()?)?;
        let query = queries.narrow(0, seq - 1, 1)?;

        let memory = self.drug_memory(rng)?;
        let key_weights = candle_nn::ops::softmax(&query.matmul(&memory.t()?)?, D::Minus1)?;
        let fact1 = key_weights.matmul(&memory)?;

        let fact2 = if seq > 1 {
            let keys = queries.narrow(0, 0, seq - 1)?;
            let visit_weights = candle_nn::ops::softmax(&query.matmul(&keys.t()?)?, D::Minus1)?;
            visit_weights.matmul(&self.history_values(prefix)?)?.matmul(&memory)?
        } else {
            fact1.clone()
        };

        let combined = Tensor::cat(&[&query, &fact1, &fact2], 1)?;
        let hidden = self.hidden.forward(&combined.relu()?)?;
        Ok(self.output.forward(&hidden.relu()?)?)
    }

    /// Mean co-prescription probability mass on interacting pairs.
    fn ddi_loss(&self, logits: &Tensor) -> Result<Tensor> {
        let probs = candle_nn::ops::sigmoid(logits)?;
        let pairwise = probs.t()?.matmul(&probs)?;
        Ok(pairwise.mul(&self.ddi_adj)?.mean_all()?)
    }
}

impl SequentialPredictor for GameNet {
    fn num_medications(&self) -> usize {
        self.vocab.num_med
    }

    fn device(&self) -> &Device {
        &self.device
    }

    fn predict(&self, prefix: &[Visit], mode: Mode) -> Result<Prediction> {
        if prefix.is_empty() {
            return Err(ModelError::InvalidInput("visit prefix is empty".to_string()));
        }
        match mode {
            Mode::Train => {
                let mut rng = self
                    .rng
                    .lock()
                    .map_err(|_| ModelError::State("dropout rng lock poisoned".to_string()))?;
                let logits = self.forward(prefix, Some(&mut *rng))?;
                let ddi_loss = self.ddi_loss(&logits)?;
                Ok(Prediction { logits, ddi_loss: Some(ddi_loss) })
            }
            Mode::Eval => {
                let logits = self.forward(prefix, None)?;
                Ok(Prediction { logits, ddi_loss: None })
            }
        }
    }
}

/// Total number of scalar parameters held by `varmap`.
pub fn parameter_count(varmap: &VarMap) -> usize {
    varmap.all_vars().iter().map(|v| v.elem_count()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use medrec_test_utils::{tiny_dataset, tiny_patients};

    fn tiny_model(varmap: &VarMap, ddi_in_memory: bool) -> GameNet {
        let dataset = tiny_dataset();
        let config = ModelConfig::default()
            .with_emb_dim(8)
            .with_ddi_in_memory(ddi_in_memory)
            .with_seed(11);
        GameNet::from_varmap(varmap, config, dataset.vocab, &dataset.ehr_adj, &dataset.ddi_adj, &Device::Cpu)
            .unwrap()
    }

    #[test]
    fn test_logits_cover_medication_vocabulary() {
        let varmap = VarMap::new();
        let model = tiny_model(&varmap, true);
        let patients = tiny_patients();
        for k in 0..patients[0].len() {
            let prediction = model.predict(patients[0].prefix(k), Mode::Eval).unwrap();
            assert_eq!(prediction.logits.dims(), &[1, 4]);
            assert!(prediction.ddi_loss.is_none());
        }
    }

    #[test]
    fn test_train_mode_returns_scalar_ddi_loss() {
        let varmap = VarMap::new();
        let model = tiny_model(&varmap, true);
        let patients = tiny_patients();
        let prediction = model.predict(patients[2].prefix(1), Mode::Train).unwrap();
        let loss = prediction.ddi_loss.unwrap();
        assert_eq!(loss.dims(), &[] as &[usize]);
        let value = loss.to_scalar::<f32>().unwrap();
        // Only one interacting pair, symmetric, out of 16 cells
        assert!((0.0..=2.0 / 16.0).contains(&value));
    }

    #[test]
    fn test_eval_is_deterministic_and_prefix_only() {
        let varmap = VarMap::new();
        let model = tiny_model(&varmap, false);
        let patients = tiny_patients();
        let first = model.probabilities(patients[1].prefix(0)).unwrap();
        let again = model.probabilities(patients[1].prefix(0)).unwrap();
        assert_eq!(first, again);

        // Changing a later visit must not change the prediction for visit 0
        let mut altered = patients[1].clone();
        altered.visits[1].medications = vec![0, 1, 2, 3];
        altered.visits[1].diagnoses = vec![1];
        assert_eq!(model.probabilities(altered.prefix(0)).unwrap(), first);
        assert!(first.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_same_seed_same_parameters() {
        let a = VarMap::new();
        let b = VarMap::new();
        let model_a = tiny_model(&a, true);
        let model_b = tiny_model(&b, true);
        let prefix = tiny_patients()[0].visits.clone();
        assert_eq!(
            model_a.probabilities(&prefix).unwrap(),
            model_b.probabilities(&prefix).unwrap()
        );
        assert_eq!(parameter_count(&a), parameter_count(&b));
    }

    #[test]
    fn test_encoder_yields_one_row_per_visit() {
        let varmap = VarMap::new();
        let model = tiny_model(&varmap, true);
        let prefix = tiny_patients()[2].visits.clone();
        for len in 1..=prefix.len() {
            let rows = model
                .encode(
                    &model.diag_embedding,
                    &model.diag_encoder,
                    &prefix[..len],
                    |v| v.diagnoses.as_slice(),
                    None,
                )
                .unwrap();
            assert_eq!(rows.dims(), &[len, 16]);
        }
        // A two-visit prefix goes through both attention facts
        let logits = model.predict(&prefix, Mode::Train).unwrap().logits;
        assert_eq!(logits.dims(), &[1, 4]);
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let varmap = VarMap::new();
        let model = tiny_model(&varmap, true);
        assert!(matches!(model.predict(&[], Mode::Eval), Err(ModelError::InvalidInput(_))));
    }
}
