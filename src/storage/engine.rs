use crate::data::{Dataset, DatasetConfig, DatasetError, DatasetStats, SPARSE_MUTABLE};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Registry of all datasets, keyed by id
pub struct StorageEngine {
    datasets: DashMap<String, Arc<Dataset>>,
}

impl StorageEngine {
    pub fn new() -> Self {
        Self {
            datasets: DashMap::new(),
        }
    }

    /// Create a new dataset from its configuration
    pub fn create_dataset(&self, config: DatasetConfig) -> Result<Arc<Dataset>, StorageError> {
        validate_config(&config)?;

        match self.datasets.entry(config.id.clone()) {
            Entry::Occupied(_) => Err(StorageError::DatasetExists(config.id)),
            Entry::Vacant(slot) => {
                tracing::info!("Created dataset '{}' ({})", config.id, config.kind);
                let dataset = Arc::new(Dataset::new(config));
                slot.insert(Arc::clone(&dataset));
                Ok(dataset)
            }
        }
    }

    /// Get an existing dataset
    pub fn get_dataset(&self, id: &str) -> Option<Arc<Dataset>> {
        self.datasets.get(id).map(|d| Arc::clone(&d))
    }

    /// Get an existing dataset or fail with `UnknownDataset`
    pub fn dataset(&self, id: &str) -> Result<Arc<Dataset>, StorageError> {
        self.get_dataset(id)
            .ok_or_else(|| StorageError::UnknownDataset(id.to_string()))
    }

    /// Drop a dataset. Handles already held by callers stay readable.
    pub fn drop_dataset(&self, id: &str) -> Result<(), StorageError> {
        if self.datasets.remove(id).is_none() {
            return Err(StorageError::UnknownDataset(id.to_string()));
        }
        tracing::info!("Dropped dataset '{}'", id);
        Ok(())
    }

    /// List all dataset ids
    pub fn list_datasets(&self) -> Vec<String> {
        self.datasets.iter().map(|e| e.key().clone()).collect()
    }

    pub fn dataset_stats(&self, id: &str) -> Option<DatasetStats> {
        self.datasets.get(id).map(|d| d.stats())
    }

    pub fn all_dataset_stats(&self) -> Vec<DatasetStats> {
        let mut stats: Vec<DatasetStats> = self.datasets.iter().map(|e| e.value().stats()).collect();
        stats.sort_by(|a, b| a.id.cmp(&b.id));
        stats
    }

    /// Commit pending writes on a dataset
    pub fn commit(&self, id: &str) -> Result<(), StorageError> {
        self.dataset(id)?.commit()?;
        Ok(())
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_config(config: &DatasetConfig) -> Result<(), StorageError> {
    if config.kind != SPARSE_MUTABLE {
        return Err(StorageError::InvalidConfig(format!(
            "unsupported dataset type '{}', expected '{}'",
            config.kind, SPARSE_MUTABLE
        )));
    }
    if config.id.trim().is_empty() {
        return Err(StorageError::InvalidConfig("dataset id must not be empty".into()));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid dataset config: {0}")]
    InvalidConfig(String),

    #[error("Dataset '{0}' already exists")]
    DatasetExists(String),

    #[error("Dataset '{0}' not found")]
    UnknownDataset(String),

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CellInput;

    #[test]
    fn test_create_dataset() {
        let engine = StorageEngine::new();

        engine.create_dataset(DatasetConfig::sparse_mutable("test")).unwrap();

        assert!(engine.get_dataset("test").is_some());
        assert!(engine.get_dataset("nonexistent").is_none());
    }

    #[test]
    fn test_create_duplicate_dataset() {
        let engine = StorageEngine::new();

        engine.create_dataset(DatasetConfig::sparse_mutable("test")).unwrap();
        assert!(matches!(
            engine.create_dataset(DatasetConfig::sparse_mutable("test")),
            Err(StorageError::DatasetExists(_))
        ));
    }

    #[test]
    fn test_invalid_config() {
        let engine = StorageEngine::new();

        assert!(matches!(
            engine.create_dataset(DatasetConfig::new("beh.mutable", "x")),
            Err(StorageError::InvalidConfig(_))
        ));
        assert!(matches!(
            engine.create_dataset(DatasetConfig::sparse_mutable("  ")),
            Err(StorageError::InvalidConfig(_))
        ));
        assert!(engine.list_datasets().is_empty());
    }

    #[test]
    fn test_config_deserialize() {
        let config: DatasetConfig =
            serde_json::from_value(serde_json::json!({"type": "sparse.mutable", "id": "test"}))
                .unwrap();
        assert_eq!(config.kind, SPARSE_MUTABLE);
        assert_eq!(config.id, "test");
    }

    #[test]
    fn test_drop_dataset() {
        let engine = StorageEngine::new();

        let held = engine.create_dataset(DatasetConfig::sparse_mutable("to_drop")).unwrap();
        held.record_row("r", vec![CellInput::new("a", 1, 0)]);
        held.commit().unwrap();

        engine.drop_dataset("to_drop").unwrap();
        assert!(engine.get_dataset("to_drop").is_none());
        assert_eq!(held.list_row_names().len(), 1);

        assert!(matches!(
            engine.drop_dataset("to_drop"),
            Err(StorageError::UnknownDataset(_))
        ));
        assert!(matches!(
            engine.commit("to_drop"),
            Err(StorageError::UnknownDataset(_))
        ));
    }

    #[test]
    fn test_stats() {
        let engine = StorageEngine::new();
        engine.create_dataset(DatasetConfig::sparse_mutable("b")).unwrap();
        let a = engine.create_dataset(DatasetConfig::sparse_mutable("a")).unwrap();

        a.record_row("r1", vec![CellInput::new("x", 1, 0), CellInput::new("y", 2, 0)]);
        a.record_row("r2", vec![CellInput::new("x", 3, 0)]);
        engine.commit("a").unwrap();
        a.record_row("r3", vec![CellInput::new("z", 4, 0)]);

        let stats = engine.all_dataset_stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].id, "a");
        assert_eq!(stats[0].row_count, 2);
        assert_eq!(stats[0].column_count, 2);
        assert_eq!(stats[0].version_count, 3);
        assert_eq!(stats[0].pending_cells, 1);
        assert_eq!(stats[0].commits, 1);
        assert_eq!(engine.dataset_stats("b").unwrap().row_count, 0);
    }
}
