//! Dataset hand-off between steps and the embedding.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::RunError;
use crate::runtime::Dataset;

/// Supplies datasets named by `set`.
pub trait DatasetSource {
    fn read_dataset(&self, id: &str) -> Result<Dataset, RunError>;
}

/// Receives each step's finished output dataset.
pub trait DatasetSink {
    fn register_dataset(&mut self, id: &str, dataset: Dataset);
}

/// In-memory datasets keyed by case-insensitive id. Serves as both source
/// and sink, so later steps can `set` what earlier steps produced.
#[derive(Debug, Default)]
pub struct Library {
    datasets: FxHashMap<String, Dataset>,
    order: Vec<String>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: &str, dataset: Dataset) {
        let key = id.to_ascii_lowercase();
        if !self.datasets.contains_key(&key) {
            self.order.push(id.to_string());
        }
        self.datasets.insert(key, dataset);
    }

    pub fn get(&self, id: &str) -> Option<&Dataset> {
        self.datasets.get(&id.to_ascii_lowercase())
    }

    /// Ids in first-registered order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

impl DatasetSource for Library {
    fn read_dataset(&self, id: &str) -> Result<Dataset, RunError> {
        self.get(id).cloned().ok_or_else(|| RunError::UnknownDataset(id.to_string()))
    }
}

impl DatasetSink for Library {
    fn register_dataset(&mut self, id: &str, dataset: Dataset) {
        debug!(dataset = id, rows = dataset.len(), "registered dataset");
        self.insert(id, dataset);
    }
}
