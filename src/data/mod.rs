pub mod dataset;
pub mod key;
pub mod row_store;
pub mod value;

pub use dataset::{CellInput, Dataset, DatasetConfig, DatasetError, DatasetStats, SPARSE_MUTABLE};
pub use key::{canonicalize, ColumnKey, KeyInput, RowName};
pub use row_store::{CellVersion, RowStore, StoredRow};
pub use value::{parse_timestamp, CellValue, TIMESTAMP_TAG};
