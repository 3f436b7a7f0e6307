pub mod executor;
pub mod format;
pub mod parser;

pub use executor::{execute, execute_query, ExecuteError, QueryResult, ResultRow, SelectSpec, ROW_NAME_FIELD};
pub use format::{render, OutputFormat};
pub use parser::{parse_query, ParseError, ParsedQuery};

/// Convenience function to parse and execute a query
pub fn run_query(
    engine: &crate::storage::StorageEngine,
    sql: &str,
) -> Result<QueryResult, QueryError> {
    let parsed = parse_query(sql)?;
    let result = execute_query(engine, &parsed)?;
    Ok(result)
}

/// Parse, execute and render a query in the named format
pub fn run_query_formatted(
    engine: &crate::storage::StorageEngine,
    sql: &str,
    format: &str,
) -> Result<serde_json::Value, QueryError> {
    let format: OutputFormat = format.parse()?;
    let result = run_query(engine, sql)?;
    Ok(render(&result, format))
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Invalid query: {0}")]
    InvalidQuery(#[from] ParseError),

    #[error("Unknown output format '{0}'")]
    UnknownFormat(String),

    #[error(transparent)]
    Execute(#[from] ExecuteError),
}
