//! Patient records, vocabularies and adjacency matrices.
//!
//! All artifacts are JSON files produced by the preprocessing step:
//! `records.json` holds one array of visits per patient, each visit a
//! `[diagnoses, procedures, medications]` triple of code indices.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::DataPaths;
use crate::{MedrecError, Result};

/// One clinical encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(Vec<usize>, Vec<usize>, Vec<usize>)", into = "(Vec<usize>, Vec<usize>, Vec<usize>)")]
pub struct Visit {
    pub diagnoses: Vec<usize>,
    pub procedures: Vec<usize>,
    /// Prescribed medications; the prediction target for this visit.
    pub medications: Vec<usize>,
}

impl Visit {
    pub fn new(diagnoses: Vec<usize>, procedures: Vec<usize>, medications: Vec<usize>) -> Self {
        Self { diagnoses, procedures, medications }
    }
}

impl From<(Vec<usize>, Vec<usize>, Vec<usize>)> for Visit {
    fn from((diagnoses, procedures, medications): (Vec<usize>, Vec<usize>, Vec<usize>)) -> Self {
        Self { diagnoses, procedures, medications }
    }
}

impl From<Visit> for (Vec<usize>, Vec<usize>, Vec<usize>) {
    fn from(v: Visit) -> Self {
        (v.diagnoses, v.procedures, v.medications)
    }
}

/// A patient's visits in chronological order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patient {
    pub visits: Vec<Visit>,
}

impl Patient {
    pub fn new(visits: Vec<Visit>) -> Self {
        Self { visits }
    }

    /// The visits `[0..=k]`; everything a prediction for visit `k` may see.
    pub fn prefix(&self, k: usize) -> &[Visit] {
        &self.visits[..=k]
    }

    pub fn len(&self) -> usize {
        self.visits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }
}

/// Index ↔ code mapping. Only its cardinality matters to the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vocabulary {
    pub idx2word: BTreeMap<usize, String>,
    #[serde(default)]
    pub word2idx: BTreeMap<String, usize>,
}

impl Vocabulary {
    pub fn len(&self) -> usize {
        self.idx2word.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idx2word.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct VocabularyFile {
    diag_voc: Vocabulary,
    pro_voc: Vocabulary,
    med_voc: Vocabulary,
}

/// Vocabulary cardinalities, fixed before any training step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabSizes {
    pub num_diag: usize,
    pub num_proc: usize,
    pub num_med: usize,
}

/// Dense square matrix over the medication vocabulary, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjacencyMatrix {
    size: usize,
    values: Vec<f32>,
}

impl AdjacencyMatrix {
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let size = rows.len();
        let mut values = Vec::with_capacity(size * size);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != size {
                return Err(MedrecError::InvalidData(format!(
                    "adjacency row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    size
                )));
            }
            values.extend(row);
        }
        Ok(Self { size, values })
    }

    pub fn zeros(size: usize) -> Self {
        Self { size, values: vec![0.0; size * size] }
    }

    /// Build a 0/1 matrix from an unordered list of pairs, set symmetrically.
    pub fn from_pairs(size: usize, pairs: &[(usize, usize)]) -> Result<Self> {
        let mut adj = Self::zeros(size);
        for &(i, j) in pairs {
            if i >= size || j >= size {
                return Err(MedrecError::InvalidData(format!(
                    "pair ({}, {}) out of range for size {}",
                    i, j, size
                )));
            }
            adj.values[i * size + j] = 1.0;
            adj.values[j * size + i] = 1.0;
        }
        Ok(adj)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let rows: Vec<Vec<f32>> = serde_json::from_str(&content)?;
        Self::from_rows(rows)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.values[i * self.size + j]
    }

    pub fn is_set(&self, i: usize, j: usize) -> bool {
        self.get(i, j) != 0.0
    }

    /// A pair interacts if either direction is flagged.
    pub fn interacts(&self, i: usize, j: usize) -> bool {
        self.is_set(i, j) || self.is_set(j, i)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }
}

/// Everything loaded from disk for one run.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub patients: Vec<Patient>,
    pub vocab: VocabSizes,
    pub ehr_adj: AdjacencyMatrix,
    pub ddi_adj: AdjacencyMatrix,
}

impl Dataset {
    /// Load and validate all four artifacts.
    pub fn load(paths: &DataPaths) -> Result<Self> {
        info!("Loading records from {:?}", paths.records);
        let content = std::fs::read_to_string(&paths.records)?;
        let patients: Vec<Patient> = serde_json::from_str(&content)?;

        let content = std::fs::read_to_string(&paths.vocabulary)?;
        let voc: VocabularyFile = serde_json::from_str(&content)?;
        let vocab = VocabSizes {
            num_diag: voc.diag_voc.len(),
            num_proc: voc.pro_voc.len(),
            num_med: voc.med_voc.len(),
        };

        let ehr_adj = AdjacencyMatrix::load(&paths.ehr_adj)?;
        let ddi_adj = AdjacencyMatrix::load(&paths.ddi_adj)?;

        let dataset = Self::new(patients, vocab, ehr_adj, ddi_adj)?;
        info!(
            "Loaded {} patients ({} visits); vocab sizes diag={} proc={} med={}",
            dataset.patients.len(),
            dataset.visit_count(),
            vocab.num_diag,
            vocab.num_proc,
            vocab.num_med
        );
        Ok(dataset)
    }

    pub fn new(
        patients: Vec<Patient>,
        vocab: VocabSizes,
        ehr_adj: AdjacencyMatrix,
        ddi_adj: AdjacencyMatrix,
    ) -> Result<Self> {
        let dataset = Self { patients, vocab, ehr_adj, ddi_adj };
        dataset.validate()?;
        Ok(dataset)
    }

    pub fn visit_count(&self) -> usize {
        self.patients.iter().map(Patient::len).sum()
    }

    fn validate(&self) -> Result<()> {
        let num_med = self.vocab.num_med;
        for (name, adj) in [("ehr", &self.ehr_adj), ("ddi", &self.ddi_adj)] {
            if adj.size() != num_med {
                return Err(MedrecError::InvalidData(format!(
                    "{} adjacency is {}x{}, medication vocabulary has {} entries",
                    name,
                    adj.size(),
                    adj.size(),
                    num_med
                )));
            }
        }

        for (p, patient) in self.patients.iter().enumerate() {
            if patient.is_empty() {
                return Err(MedrecError::InvalidData(format!("patient {} has no visits", p)));
            }
            for (v, visit) in patient.visits.iter().enumerate() {
                let checks = [
                    ("diagnosis", &visit.diagnoses, self.vocab.num_diag),
                    ("procedure", &visit.procedures, self.vocab.num_proc),
                    ("medication", &visit.medications, num_med),
                ];
                for (kind, codes, limit) in checks {
                    if let Some(&bad) = codes.iter().find(|&&c| c >= limit) {
                        return Err(MedrecError::InvalidData(format!(
                            "patient {} visit {}: {} index {} out of range (vocabulary size {})",
                            p, v, kind, bad, limit
                        )));
                    }
                }
            }
        }
        debug!("Dataset validation passed");
        Ok(())
    }
}

/// Deterministic train/test/validation split in file order.
#[derive(Debug, Clone)]
pub struct DatasetSplit {
    pub train: Vec<Patient>,
    pub test: Vec<Patient>,
    pub eval: Vec<Patient>,
}

impl DatasetSplit {
    /// First two thirds train; the remainder's first half test, second half validation.
    pub fn from_patients(mut patients: Vec<Patient>) -> Self {
        let split_point = patients.len() * 2 / 3;
        let rest = patients.split_off(split_point);
        let eval_len = rest.len() / 2;
        let mut test = rest;
        let eval = test.split_off(eval_len);
        Self { train: patients, test, eval }
    }
}
