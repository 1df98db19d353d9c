//! Synthetic cohorts and fixtures for MedRec tests.

use std::path::Path;

use medrec_common::{AdjacencyMatrix, DataPaths, Dataset, Patient, Visit, VocabSizes};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};

/// Binary label vector of length `n` with `set` switched on.
pub fn labels(n: usize, set: &[usize]) -> Vec<bool> {
    let mut v = vec![false; n];
    for &i in set {
        v[i] = true;
    }
    v
}

/// The three-patient, two-visit cohort over four medications used by the
/// end-to-end training tests. Drugs 0 and 1 are co-prescribed in places.
pub fn tiny_patients() -> Vec<Patient> {
    vec![
        Patient::new(vec![
            Visit::new(vec![0, 1], vec![0], vec![0, 1]),
            Visit::new(vec![1], vec![1], vec![1, 2]),
        ]),
        Patient::new(vec![
            Visit::new(vec![2], vec![0], vec![2]),
            Visit::new(vec![0, 2], vec![1], vec![0, 3]),
        ]),
        Patient::new(vec![
            Visit::new(vec![1, 2], vec![], vec![3]),
            Visit::new(vec![0], vec![0, 1], vec![0, 1, 3]),
        ]),
    ]
}

pub fn tiny_vocab() -> VocabSizes {
    VocabSizes { num_diag: 3, num_proc: 2, num_med: 4 }
}

/// DDI adjacency over `num_med` drugs where only `(0, 1)` interacts.
pub fn single_pair_ddi(num_med: usize) -> AdjacencyMatrix {
    AdjacencyMatrix::from_pairs(num_med, &[(0, 1)]).expect("pair within range")
}

/// Co-occurrence adjacency derived from the medications of `patients`.
pub fn co_occurrence(patients: &[Patient], num_med: usize) -> AdjacencyMatrix {
    let mut pairs = Vec::new();
    for visit in patients.iter().flat_map(|p| &p.visits) {
        for (i, &a) in visit.medications.iter().enumerate() {
            for &b in &visit.medications[i + 1..] {
                pairs.push((a, b));
            }
        }
    }
    AdjacencyMatrix::from_pairs(num_med, &pairs).expect("medications within range")
}

pub fn tiny_dataset() -> Dataset {
    let patients = tiny_patients();
    let vocab = tiny_vocab();
    let ehr = co_occurrence(&patients, vocab.num_med);
    Dataset::new(patients, vocab, ehr, single_pair_ddi(vocab.num_med)).expect("valid fixture")
}

/// Random cohort with 1..=max_visits visits per patient and nonempty
/// medication sets.
pub fn random_patients(seed: u64, count: usize, max_visits: usize, vocab: VocabSizes) -> Vec<Patient> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let visits = rng.gen_range(1..=max_visits);
            Patient::new(
                (0..visits)
                    .map(|_| {
                        Visit::new(
                            codes(&mut rng, vocab.num_diag, 1),
                            codes(&mut rng, vocab.num_proc, 0),
                            codes(&mut rng, vocab.num_med, 1),
                        )
                    })
                    .collect(),
            )
        })
        .collect()
}

fn codes(rng: &mut StdRng, n: usize, min: usize) -> Vec<usize> {
    let amount = rng.gen_range(min..=n.min(3).max(min));
    let mut picked = sample(rng, n, amount).into_vec();
    picked.sort_unstable();
    picked
}

/// Write a dataset as the four JSON artifacts under `dir`.
pub fn write_dataset(dir: &Path, dataset: &Dataset) -> std::io::Result<DataPaths> {
    let paths = DataPaths::in_dir(dir);
    let vocab_entry = |n: usize| {
        let idx2word: serde_json::Map<String, serde_json::Value> =
            (0..n).map(|i| (i.to_string(), serde_json::Value::from(format!("c{}", i)))).collect();
        serde_json::json!({ "idx2word": idx2word })
    };
    let voc = serde_json::json!({
        "diag_voc": vocab_entry(dataset.vocab.num_diag),
        "pro_voc": vocab_entry(dataset.vocab.num_proc),
        "med_voc": vocab_entry(dataset.vocab.num_med),
    });
    let rows = |adj: &AdjacencyMatrix| -> Vec<Vec<f32>> {
        adj.as_slice().chunks(adj.size().max(1)).map(<[f32]>::to_vec).collect()
    };

    std::fs::write(&paths.records, serde_json::to_string(&dataset.patients)?)?;
    std::fs::write(&paths.vocabulary, voc.to_string())?;
    std::fs::write(&paths.ehr_adj, serde_json::to_string(&rows(&dataset.ehr_adj))?)?;
    std::fs::write(&paths.ddi_adj, serde_json::to_string(&rows(&dataset.ddi_adj))?)?;
    Ok(paths)
}
