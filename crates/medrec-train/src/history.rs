//! Per-epoch metric history.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use medrec_metrics::mean;
use serde::{Deserialize, Serialize};

use crate::evaluate::{EvalReport, MAX_RANK_CUTOFF};
use crate::Result;

/// Number of most recent epochs averaged in the trailing summary.
pub const TRAILING_WINDOW: usize = 5;

/// Append-only map from metric name to one value per epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricHistory {
    series: BTreeMap<String, Vec<f64>>,
}

impl MetricHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one epoch's evaluation.
    pub fn record(&mut self, report: &EvalReport) {
        for (name, value) in report.named_values() {
            self.series.entry(name).or_default().push(value);
        }
    }

    /// Number of recorded epochs.
    pub fn epochs(&self) -> usize {
        self.series.values().map(Vec::len).max().unwrap_or(0)
    }

    pub fn series(&self, name: &str) -> &[f64] {
        self.series.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Mean of the last `window` values of `name` (fewer if not available).
    pub fn trailing_mean(&self, name: &str, window: usize) -> f64 {
        let values = self.series(name);
        mean(&values[values.len().saturating_sub(window)..])
    }

    /// The trailing 5-epoch mean line, once more than five epochs exist.
    pub fn trailing_summary(&self) -> Option<String> {
        if self.epochs() <= TRAILING_WINDOW {
            return None;
        }
        let m = |name: &str| self.trailing_mean(name, TRAILING_WINDOW);
        let mut line = format!(
            "ddi: {:.4}, Med: {:.4}, Ja: {:.4}, F1: {:.4}, PRAUC: {:.4}",
            m("ddi_rate"),
            m("med"),
            m("ja"),
            m("avg_f1"),
            m("prauc")
        );
        for k in 1..=MAX_RANK_CUTOFF {
            line.push_str(&format!(", HR@{k}: {:.4}", m(&format!("hit_ratio_{k}"))));
        }
        for k in 1..=MAX_RANK_CUTOFF {
            line.push_str(&format!(", NDCG@{k}: {:.4}", m(&format!("ndcg_{k}"))));
        }
        Some(line)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}
