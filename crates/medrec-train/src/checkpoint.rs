//! Per-epoch checkpoints: an opaque safetensors blob per epoch plus a JSON
//! manifest describing each one.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use candle_nn::VarMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::evaluate::EvalReport;
use crate::history::MetricHistory;
use crate::{Result, TrainError};

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub epoch: usize,
    pub jaccard: f64,
    pub ddi_rate: f64,
    /// Blob file name, relative to the store directory
    pub file: String,
    pub saved_at: DateTime<Utc>,
}

impl CheckpointRecord {
    /// e.g. `Epoch_3_JA_0.4512_DDI_0.0781`
    pub fn display_name(&self) -> String {
        format!("Epoch_{}_JA_{:.4}_DDI_{:.4}", self.epoch, self.jaccard, self.ddi_rate)
    }
}

/// Checkpoint directory for one model run.
pub struct CheckpointStore {
    dir: PathBuf,
    records: Vec<CheckpointRecord>,
}

impl CheckpointStore {
    /// Open (creating if needed) the store at `dir`, reading any existing
    /// manifest.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let manifest = dir.join(MANIFEST_FILE);
        let records = if manifest.exists() {
            let records: Vec<CheckpointRecord> =
                serde_json::from_reader(BufReader::new(File::open(&manifest)?))?;
            debug!("Loaded {} checkpoint records from {}", records.len(), manifest.display());
            records
        } else {
            Vec::new()
        };
        Ok(Self { dir, records })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Records ordered by epoch.
    pub fn records(&self) -> &[CheckpointRecord] {
        &self.records
    }

    pub fn get(&self, epoch: usize) -> Option<&CheckpointRecord> {
        self.records.iter().find(|r| r.epoch == epoch)
    }

    pub fn blob_path(&self, record: &CheckpointRecord) -> PathBuf {
        self.dir.join(&record.file)
    }

    /// Write the parameters for `epoch` and upsert its manifest record.
    pub fn save(&mut self, varmap: &VarMap, epoch: usize, report: &EvalReport) -> Result<CheckpointRecord> {
        let file = format!("epoch_{epoch}.safetensors");
        let path = self.dir.join(&file);
        if path.exists() {
            warn!("Overwriting checkpoint for epoch {} at {}", epoch, path.display());
        }
        varmap
            .save(&path)
            .map_err(|e| TrainError::Checkpoint(format!("{}: {e}", path.display())))?;

        let record = CheckpointRecord {
            epoch,
            jaccard: report.jaccard,
            ddi_rate: report.ddi_rate,
            file,
            saved_at: Utc::now(),
        };
        match self.records.iter_mut().find(|r| r.epoch == epoch) {
            Some(existing) => *existing = record.clone(),
            None => {
                self.records.push(record.clone());
                self.records.sort_by_key(|r| r.epoch);
            }
        }
        self.write_manifest()?;
        info!("Saved checkpoint {}", record.display_name());
        Ok(record)
    }

    /// Write `history_<model_name>.json` next to the checkpoints.
    pub fn save_history(&self, model_name: &str, history: &MetricHistory) -> Result<PathBuf> {
        let path = self.dir.join(format!("history_{model_name}.json"));
        history.save(&path)?;
        Ok(path)
    }

    fn write_manifest(&self) -> Result<()> {
        let writer = BufWriter::new(File::create(self.dir.join(MANIFEST_FILE))?);
        serde_json::to_writer_pretty(writer, &self.records)?;
        Ok(())
    }
}

/// Overwrite the variables of `varmap` with the tensors stored at `path`.
/// Every variable must be present in the file.
pub fn load_weights(varmap: &mut VarMap, path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(TrainError::Checkpoint(format!("{} does not exist", path.display())));
    }
    varmap
        .load(path)
        .map_err(|e| TrainError::Checkpoint(format!("{}: {e}", path.display())))?;
    info!("Loaded checkpoint {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::{Init, VarBuilder};

    fn report(ja: f64, ddi: f64) -> EvalReport {
        EvalReport { jaccard: ja, ddi_rate: ddi, ..Default::default() }
    }

    #[test]
    fn test_display_name() {
        let record = CheckpointRecord {
            epoch: 3,
            jaccard: 0.45123,
            ddi_rate: 0.078,
            file: "epoch_3.safetensors".into(),
            saved_at: Utc::now(),
        };
        assert_eq!(record.display_name(), "Epoch_3_JA_0.4512_DDI_0.0780");
    }

    #[test]
    fn test_save_reopen_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        vb.get_with_hints((2, 2), "w", Init::Const(1.0)).unwrap();

        let mut store = CheckpointStore::open(dir.path().join("run")).unwrap();
        store.save(&varmap, 1, &report(0.2, 0.1)).unwrap();
        store.save(&varmap, 0, &report(0.1, 0.1)).unwrap();
        store.save(&varmap, 1, &report(0.3, 0.05)).unwrap();

        let reopened = CheckpointStore::open(dir.path().join("run")).unwrap();
        let epochs: Vec<usize> = reopened.records().iter().map(|r| r.epoch).collect();
        assert_eq!(epochs, vec![0, 1]);
        assert_eq!(reopened.get(1).unwrap().jaccard, 0.3);
        assert!(reopened.blob_path(reopened.get(0).unwrap()).exists());
    }

    #[test]
    fn test_load_restores_values() {
        let dir = tempfile::tempdir().unwrap();
        let source = VarMap::new();
        VarBuilder::from_varmap(&source, DType::F32, &Device::Cpu)
            .get_with_hints(3, "bias", Init::Const(2.5))
            .unwrap();
        let mut store = CheckpointStore::open(dir.path()).unwrap();
        let record = store.save(&source, 0, &report(0.0, 0.0)).unwrap();

        let mut target = VarMap::new();
        let bias = VarBuilder::from_varmap(&target, DType::F32, &Device::Cpu)
            .get_with_hints(3, "bias", Init::Const(0.0))
            .unwrap();
        load_weights(&mut target, &store.blob_path(&record)).unwrap();
        assert_eq!(bias.to_vec1::<f32>().unwrap(), vec![2.5, 2.5, 2.5]);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let mut varmap = VarMap::new();
        let err = load_weights(&mut varmap, Path::new("/nonexistent/epoch_0.safetensors")).unwrap_err();
        assert!(matches!(err, TrainError::Checkpoint(_)));
    }
}
