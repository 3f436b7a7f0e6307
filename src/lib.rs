//! sparsedb: In-Memory Sparse Mutable Datasets
//!
//! Rows are recorded cell by cell with explicit timestamps into a pending
//! buffer, published by `commit`, and read back through a small SQL-like
//! select layer.
//!
//! # Features
//!
//! - **Sparse Storage**: only recorded (row, column) cells take space
//! - **Unified Keys**: `0` and `"0"` name the same row or column
//! - **Versioned Cells**: every write is a new timestamped version
//! - **Atomic Commits**: readers see whole commits through a snapshot swap
//! - **Queries**: `SELECT *` or explicit columns, `LIMIT` / `OFFSET`
//! - **Output Formats**: `table`, `sparse`, `aos`
//!
//! # Example
//!
//! ```no_run
//! use sparsedb::data::{CellInput, DatasetConfig};
//! use sparsedb::query::{render, run_query, OutputFormat};
//! use sparsedb::storage::StorageEngine;
//!
//! let engine = StorageEngine::new();
//! let dataset = engine.create_dataset(DatasetConfig::sparse_mutable("test")).unwrap();
//!
//! dataset.record_row("0", vec![CellInput::new("0", 0, 1_420_070_400_000)]);
//! dataset.record_row(1, vec![CellInput::new(0, 0, 1_420_070_400_000)]);
//! dataset.commit().unwrap();
//!
//! let result = run_query(&engine, "select * from test").unwrap();
//! println!("{}", render(&result, OutputFormat::Table));
//! ```

pub mod api;
pub mod data;
pub mod query;
pub mod storage;

// Re-export commonly used types
pub use data::{canonicalize, CellInput, CellValue, ColumnKey, Dataset, DatasetConfig, RowName};
pub use query::{run_query, QueryError, QueryResult, SelectSpec};
pub use storage::{StorageEngine, StorageError};
