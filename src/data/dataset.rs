use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::key::{ColumnKey, KeyInput, RowName};
use super::row_store::RowStore;
use super::value::{parse_timestamp, CellValue};

/// The only dataset kind this store implements
pub const SPARSE_MUTABLE: &str = "sparse.mutable";

/// Configuration for a dataset
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    /// Storage engine kind
    #[serde(rename = "type")]
    pub kind: String,
    /// Dataset identifier, also the table name used in queries
    pub id: String,
}

impl DatasetConfig {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    pub fn sparse_mutable(id: impl Into<String>) -> Self {
        Self::new(SPARSE_MUTABLE, id)
    }
}

/// A single cell to record: column, value and timestamp (epoch millis)
#[derive(Debug, Clone, PartialEq)]
pub struct CellInput {
    pub column: ColumnKey,
    pub value: CellValue,
    pub timestamp: i64,
}

impl CellInput {
    pub fn new(column: impl Into<KeyInput>, value: impl Into<CellValue>, timestamp: i64) -> Self {
        Self {
            column: ColumnKey::from(column.into()),
            value: value.into(),
            timestamp,
        }
    }

    /// Parse a `[column, value, timestamp]` triple
    pub fn from_json(json: &serde_json::Value) -> Result<Self, DatasetError> {
        let parts = json
            .as_array()
            .filter(|parts| parts.len() == 3)
            .ok_or_else(|| DatasetError::MalformedCell(json.to_string()))?;

        Ok(Self {
            column: ColumnKey::from_json(&parts[0])?,
            value: CellValue::from_json(&parts[1])?,
            timestamp: parse_timestamp(&parts[2])?,
        })
    }
}

#[derive(Debug)]
struct PendingCell {
    row: RowName,
    cell: CellInput,
}

/// Mutable sparse dataset.
///
/// Writes land in a pending buffer and become visible to readers only when
/// `commit` publishes a new immutable [`RowStore`] snapshot.
#[derive(Debug)]
pub struct Dataset {
    pub config: DatasetConfig,
    pending: Mutex<Vec<PendingCell>>,
    committed: ArcSwap<RowStore>,
    /// Held for the duration of a commit
    commit_gate: Mutex<()>,
    commit_count: AtomicU64,
}

impl Dataset {
    pub fn new(config: DatasetConfig) -> Self {
        Self {
            config,
            pending: Mutex::new(Vec::new()),
            committed: ArcSwap::from_pointee(RowStore::new()),
            commit_gate: Mutex::new(()),
            commit_count: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// Record cells for one row into the pending buffer
    pub fn record_row(&self, row: impl Into<KeyInput>, cells: Vec<CellInput>) {
        if cells.is_empty() {
            return;
        }
        let row = RowName::from(row.into());
        let mut pending = self.pending.lock();
        pending.extend(cells.into_iter().map(|cell| PendingCell {
            row: row.clone(),
            cell,
        }));
    }

    /// Record several rows as one unit
    pub fn record_rows(&self, rows: Vec<(RowName, Vec<CellInput>)>) {
        let mut pending = self.pending.lock();
        for (row, cells) in rows {
            pending.extend(cells.into_iter().map(|cell| PendingCell {
                row: row.clone(),
                cell,
            }));
        }
    }

    /// Record a row from JSON: a row name and a list of `[column, value, ts]`.
    ///
    /// Every cell is validated before anything is buffered, so a failure
    /// leaves the pending buffer untouched.
    pub fn record_row_json(
        &self,
        row: &serde_json::Value,
        cells: &[serde_json::Value],
    ) -> Result<(), DatasetError> {
        let row = RowName::from_json(row)?;
        let cells = cells
            .iter()
            .map(CellInput::from_json)
            .collect::<Result<Vec<_>, _>>()?;
        self.record_row(row, cells);
        Ok(())
    }

    /// Record many `[rowName, [[column, value, ts], ...]]` entries, all or nothing
    pub fn record_rows_json(&self, rows: &[serde_json::Value]) -> Result<usize, DatasetError> {
        let mut parsed = Vec::with_capacity(rows.len());
        for entry in rows {
            let (row, cells) = entry
                .as_array()
                .filter(|parts| parts.len() == 2)
                .and_then(|parts| Some((&parts[0], parts[1].as_array()?)))
                .ok_or_else(|| DatasetError::MalformedRow(entry.to_string()))?;
            let row = RowName::from_json(row)?;
            let cells = cells
                .iter()
                .map(CellInput::from_json)
                .collect::<Result<Vec<_>, _>>()?;
            parsed.push((row, cells));
        }

        let count = parsed.len();
        self.record_rows(parsed);
        Ok(count)
    }

    /// Publish all pending cells as the new visible snapshot.
    ///
    /// Only one commit may run at a time; a commit that overlaps another
    /// fails with [`DatasetError::CommitConflict`] and leaves both the pending
    /// buffer and the visible snapshot untouched. Committing with nothing
    /// pending does nothing.
    pub fn commit(&self) -> Result<(), DatasetError> {
        let _gate = self
            .commit_gate
            .try_lock()
            .ok_or_else(|| DatasetError::CommitConflict(self.config.id.clone()))?;

        let batch = std::mem::take(&mut *self.pending.lock());
        if batch.is_empty() {
            tracing::debug!("Commit on '{}' with no pending cells", self.config.id);
            return Ok(());
        }

        let current = self.committed.load_full();
        let mut next = RowStore::clone(&current);
        let cells = batch.len();
        for PendingCell { row, cell } in batch {
            next.put(row, cell.column, cell.timestamp, cell.value);
        }

        let rows = next.row_count();
        let columns = next.column_count();
        self.committed.store(Arc::new(next));
        let epoch = self.commit_count.fetch_add(1, Ordering::SeqCst) + 1;

        tracing::info!(
            "Committed {} cells to '{}' (epoch {}, {} rows, {} columns)",
            cells,
            self.config.id,
            epoch,
            rows,
            columns
        );
        Ok(())
    }

    /// Immutable handle to the current committed snapshot
    pub fn snapshot(&self) -> Arc<RowStore> {
        self.committed.load_full()
    }

    /// Distinct committed row names, in commit order
    pub fn list_row_names(&self) -> Vec<RowName> {
        self.committed.load().row_names().to_vec()
    }

    /// Distinct committed column keys, in first commit-discovery order
    pub fn list_column_keys(&self) -> Vec<ColumnKey> {
        self.committed.load().column_keys().to_vec()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn commit_count(&self) -> u64 {
        self.commit_count.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> DatasetStats {
        let snapshot = self.committed.load();
        DatasetStats {
            id: self.config.id.clone(),
            kind: self.config.kind.clone(),
            row_count: snapshot.row_count(),
            column_count: snapshot.column_count(),
            version_count: snapshot.version_count(),
            pending_cells: self.pending_count(),
            commits: self.commit_count(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Invalid column key: expected string or integer, got {0}")]
    InvalidColumnKey(String),

    #[error("Invalid row name: expected string or integer, got {0}")]
    InvalidRowName(String),

    #[error("Unsupported cell value type: {0}")]
    InvalidValueType(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Malformed cell, expected [column, value, timestamp]: {0}")]
    MalformedCell(String),

    #[error("Malformed row, expected [rowName, cells]: {0}")]
    MalformedRow(String),

    #[error("Commit already in progress on dataset '{0}'")]
    CommitConflict(String),
}

/// Statistics about a dataset
#[derive(Debug, Clone, serde::Serialize)]
pub struct DatasetStats {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub row_count: usize,
    pub column_count: usize,
    pub version_count: usize,
    pub pending_cells: usize,
    pub commits: u64,
}
