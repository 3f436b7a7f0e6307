use serde_json::{json, Map, Value as Json};
use std::str::FromStr;

use super::executor::{QueryResult, ROW_NAME_FIELD};
use super::QueryError;

/// Output layout for query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Header row `["_rowName", col...]` followed by one value array per row.
    /// Absent cells render as null so every row lines up with the header.
    #[default]
    Table,
    /// One `[[key, value], ...]` list per row, `_rowName` first, absent
    /// cells omitted.
    Sparse,
    /// One object per row
    Aos,
}

impl FromStr for OutputFormat {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "table" => Ok(OutputFormat::Table),
            "sparse" => Ok(OutputFormat::Sparse),
            "aos" => Ok(OutputFormat::Aos),
            other => Err(QueryError::UnknownFormat(other.to_string())),
        }
    }
}

/// Render a query result in the requested layout
pub fn render(result: &QueryResult, format: OutputFormat) -> Json {
    match format {
        OutputFormat::Table => render_table(result),
        OutputFormat::Sparse => render_sparse(result),
        OutputFormat::Aos => render_aos(result),
    }
}

fn render_table(result: &QueryResult) -> Json {
    let mut out = Vec::with_capacity(result.rows.len() + 1);

    let mut header = vec![json!(ROW_NAME_FIELD)];
    header.extend(result.columns.iter().map(|c| json!(c.as_str())));
    out.push(Json::Array(header));

    for row in &result.rows {
        let mut values = vec![json!(row.row_name.as_str())];
        values.extend(
            result
                .columns
                .iter()
                .map(|c| row.get(c.as_str()).map(|v| v.to_json()).unwrap_or(Json::Null)),
        );
        out.push(Json::Array(values));
    }

    Json::Array(out)
}

fn render_sparse(result: &QueryResult) -> Json {
    result
        .rows
        .iter()
        .map(|row| {
            let mut fields = vec![json!([ROW_NAME_FIELD, row.row_name.as_str()])];
            fields.extend(
                row.cells
                    .iter()
                    .map(|(k, v)| json!([k.as_str(), v.to_json()])),
            );
            Json::Array(fields)
        })
        .collect()
}

fn render_aos(result: &QueryResult) -> Json {
    result
        .rows
        .iter()
        .map(|row| {
            let mut obj = Map::new();
            obj.insert(ROW_NAME_FIELD.to_string(), json!(row.row_name.as_str()));
            for (k, v) in &row.cells {
                obj.insert(k.to_string(), v.to_json());
            }
            Json::Object(obj)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CellInput, DatasetConfig};
    use crate::query::run_query;
    use crate::storage::StorageEngine;

    const TS: i64 = 1_420_070_400_000;

    fn column_zero_engine() -> StorageEngine {
        let engine = StorageEngine::new();
        let ds = engine.create_dataset(DatasetConfig::sparse_mutable("test")).unwrap();
        ds.record_row("0", vec![CellInput::new("0", 0, TS)]);
        ds.record_row(1, vec![CellInput::new(0, 0, TS)]);
        ds.commit().unwrap();
        engine
    }

    #[test]
    fn test_table_format() {
        let engine = column_zero_engine();

        let result = run_query(&engine, "select * from test").unwrap();
        let expected = json!([["_rowName", "0"], ["0", 0], ["1", 0]]);
        assert_eq!(render(&result, OutputFormat::Table), expected);

        let result = run_query(&engine, r#"select "0" from test"#).unwrap();
        assert_eq!(render(&result, OutputFormat::Table), expected);
    }

    #[test]
    fn test_sparse_format() {
        let engine = column_zero_engine();
        let result = run_query(&engine, "select * from test").unwrap();

        assert_eq!(
            render(&result, OutputFormat::Sparse),
            json!([
                [["_rowName", "0"], ["0", 0]],
                [["_rowName", "1"], ["0", 0]]
            ])
        );
    }

    #[test]
    fn test_aos_format() {
        let engine = column_zero_engine();
        let result = run_query(&engine, "select * from test").unwrap();

        assert_eq!(
            render(&result, OutputFormat::Aos),
            json!([{"_rowName": "0", "0": 0}, {"_rowName": "1", "0": 0}])
        );
    }

    #[test]
    fn test_table_fills_absent_cells_with_null() {
        let engine = StorageEngine::new();
        let ds = engine.create_dataset(DatasetConfig::sparse_mutable("t")).unwrap();
        ds.record_row("a", vec![CellInput::new("x", 1, TS)]);
        ds.record_row("b", vec![CellInput::new("y", "v", TS)]);
        ds.commit().unwrap();

        let result = run_query(&engine, "select * from t").unwrap();
        assert_eq!(
            render(&result, OutputFormat::Table),
            json!([["_rowName", "x", "y"], ["a", 1, null], ["b", null, "v"]])
        );
        assert_eq!(
            render(&result, OutputFormat::Sparse),
            json!([[["_rowName", "a"], ["x", 1]], [["_rowName", "b"], ["y", "v"]]])
        );
    }

    #[test]
    fn test_empty_result() {
        let engine = StorageEngine::new();
        engine.create_dataset(DatasetConfig::sparse_mutable("t")).unwrap();

        let result = run_query(&engine, "select * from t").unwrap();
        assert_eq!(render(&result, OutputFormat::Table), json!([["_rowName"]]));
        assert_eq!(render(&result, OutputFormat::Sparse), json!([]));
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("table".parse::<OutputFormat>().unwrap(), OutputFormat::Table);
        assert_eq!("sparse".parse::<OutputFormat>().unwrap(), OutputFormat::Sparse);
        assert!(matches!(
            "csv".parse::<OutputFormat>(),
            Err(QueryError::UnknownFormat(_))
        ));
    }
}
