use fxhash::{FxHashMap, FxHashSet};
use std::sync::Arc;

use super::key::{ColumnKey, RowName};
use super::value::CellValue;

/// One recorded version of a cell
#[derive(Debug, Clone, PartialEq)]
pub struct CellVersion {
    /// Epoch milliseconds
    pub timestamp: i64,
    pub value: CellValue,
}

/// Sparse column map for a single row.
///
/// Versions for a column are kept sorted by timestamp. Versions with equal
/// timestamps keep their insertion order, so the last one recorded wins.
#[derive(Debug, Clone, Default)]
pub struct StoredRow {
    columns: FxHashMap<ColumnKey, Vec<CellVersion>>,
}

impl StoredRow {
    fn put(&mut self, column: ColumnKey, timestamp: i64, value: CellValue) {
        let versions = self.columns.entry(column).or_default();
        let pos = versions.partition_point(|v| v.timestamp <= timestamp);
        versions.insert(pos, CellVersion { timestamp, value });
    }

    pub fn versions(&self, column: &str) -> &[CellVersion] {
        self.columns.get(column).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Latest version with timestamp <= `as_of`
    pub fn latest_value(&self, column: &str, as_of: i64) -> Option<&CellValue> {
        let versions = self.columns.get(column)?;
        let pos = versions.partition_point(|v| v.timestamp <= as_of);
        versions[..pos].last().map(|v| &v.value)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// Sparse row store: row name -> column key -> timestamped versions.
///
/// Rows are held behind `Arc`. Cloning a store copies the row map and the
/// order lists, but row contents are shared until a put touches them.
#[derive(Debug, Clone, Default)]
pub struct RowStore {
    rows: FxHashMap<RowName, Arc<StoredRow>>,
    /// Distinct row names in first-put order
    row_order: Vec<RowName>,
    /// Distinct column keys in first-put order
    column_order: Vec<ColumnKey>,
    column_set: FxHashSet<ColumnKey>,
    version_count: usize,
}

impl RowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new version for (row, column). Never fails.
    pub fn put(&mut self, row: RowName, column: ColumnKey, timestamp: i64, value: CellValue) {
        if self.column_set.insert(column.clone()) {
            self.column_order.push(column.clone());
        }

        if !self.rows.contains_key(row.as_str()) {
            self.row_order.push(row.clone());
        }
        let stored = self.rows.entry(row).or_default();
        Arc::make_mut(stored).put(column, timestamp, value);
        self.version_count += 1;
    }

    /// Latest version of (row, column) with timestamp <= `as_of`.
    ///
    /// `None` means the cell was never recorded at or before `as_of`; a
    /// recorded null comes back as `Some(CellValue::Null)`.
    pub fn latest_value(&self, row: &str, column: &str, as_of: i64) -> Option<&CellValue> {
        self.rows.get(row)?.latest_value(column, as_of)
    }

    /// Most recent version of (row, column)
    pub fn latest(&self, row: &str, column: &str) -> Option<&CellValue> {
        self.latest_value(row, column, i64::MAX)
    }

    pub fn versions(&self, row: &str, column: &str) -> &[CellVersion] {
        self.rows.get(row).map(|r| r.versions(column)).unwrap_or(&[])
    }

    pub fn row(&self, row: &str) -> Option<&StoredRow> {
        self.rows.get(row).map(Arc::as_ref)
    }

    pub fn row_names(&self) -> &[RowName] {
        &self.row_order
    }

    pub fn column_keys(&self) -> &[ColumnKey] {
        &self.column_order
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.column_set.contains(column)
    }

    pub fn row_count(&self) -> usize {
        self.row_order.len()
    }

    pub fn column_count(&self) -> usize {
        self.column_order.len()
    }

    pub fn version_count(&self) -> usize {
        self.version_count
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
