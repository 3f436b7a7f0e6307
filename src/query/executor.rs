use super::parser::ParsedQuery;
use crate::data::{CellValue, ColumnKey, RowName, RowStore};
use crate::storage::StorageEngine;
use fxhash::FxHashSet;

/// Name of the synthetic row-identity field that leads every output row
pub const ROW_NAME_FIELD: &str = "_rowName";

/// Which columns a query projects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectSpec {
    /// `SELECT *`
    AllColumns,
    /// `SELECT a, "b", ...` in the order given
    ExplicitColumns(Vec<ColumnKey>),
}

/// One output row: the row name followed by the present cells in
/// projection order. Absent cells are not represented.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub row_name: RowName,
    pub cells: Vec<(ColumnKey, CellValue)>,
}

impl ResultRow {
    /// Field/value pairs with `_rowName` first
    pub fn fields(&self) -> Vec<(String, CellValue)> {
        std::iter::once((
            ROW_NAME_FIELD.to_string(),
            CellValue::String(self.row_name.to_string()),
        ))
        .chain(self.cells.iter().map(|(k, v)| (k.to_string(), v.clone())))
        .collect()
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(k, _)| k.as_str() == column)
            .map(|(_, v)| v)
    }
}

/// Query execution result
#[derive(Debug, Clone)]
pub struct QueryResult {
    /// Projected columns that appear in at least one output row
    pub columns: Vec<ColumnKey>,
    pub rows: Vec<ResultRow>,
    /// Number of committed rows visited
    pub rows_scanned: usize,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            rows_scanned: 0,
            execution_time_ms: 0,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Resolve the projected column list against a snapshot
fn resolve_columns(store: &RowStore, select: &SelectSpec) -> Vec<ColumnKey> {
    match select {
        SelectSpec::AllColumns => store.column_keys().to_vec(),
        SelectSpec::ExplicitColumns(columns) => columns.clone(),
    }
}

/// Project rows out of a committed snapshot.
///
/// Rows come out in commit order; within a row, `_rowName` is implied first
/// and cells follow in projection order. Cells that were never recorded are
/// left out rather than emitted as null.
pub fn execute(store: &RowStore, select: &SelectSpec) -> Vec<ResultRow> {
    execute_range(store, select, 0, None)
}

fn execute_range(
    store: &RowStore,
    select: &SelectSpec,
    offset: usize,
    limit: Option<usize>,
) -> Vec<ResultRow> {
    let columns = resolve_columns(store, select);

    store
        .row_names()
        .iter()
        .skip(offset)
        .take(limit.unwrap_or(usize::MAX))
        .map(|row_name| {
            let cells = match store.row(row_name.as_str()) {
                Some(row) => columns
                    .iter()
                    .filter_map(|column| {
                        row.latest_value(column.as_str(), i64::MAX)
                            .map(|value| (column.clone(), value.clone()))
                    })
                    .collect(),
                None => Vec::new(),
            };
            ResultRow {
                row_name: row_name.clone(),
                cells,
            }
        })
        .collect()
}

/// Execute a parsed query against the dataset it names
pub fn execute_query(engine: &StorageEngine, query: &ParsedQuery) -> Result<QueryResult, ExecuteError> {
    let start = std::time::Instant::now();

    let dataset = engine
        .get_dataset(&query.dataset)
        .ok_or_else(|| ExecuteError::UnknownDataset(query.dataset.clone()))?;

    // Everything below reads this one snapshot, whatever commits meanwhile
    let snapshot = dataset.snapshot();

    let rows = execute_range(&snapshot, &query.select, query.offset, query.limit);
    let rows_scanned = snapshot.row_count().min(query.offset + rows.len());

    let present: FxHashSet<&str> = rows
        .iter()
        .flat_map(|r| r.cells.iter().map(|(k, _)| k.as_str()))
        .collect();
    let columns = resolve_columns(&snapshot, &query.select)
        .into_iter()
        .filter(|c| present.contains(c.as_str()))
        .collect();

    let execution_time_ms = start.elapsed().as_millis() as u64;
    tracing::debug!(
        "Query on '{}' returned {} rows in {} ms",
        query.dataset,
        rows.len(),
        execution_time_ms
    );

    Ok(QueryResult {
        columns,
        rows,
        rows_scanned,
        execution_time_ms,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    #[error("Dataset '{0}' not found")]
    UnknownDataset(String),
}
