use sqlparser::ast::{
    Expr, GroupByExpr, ObjectName, Offset, SelectItem, SetExpr, Statement, TableFactor,
    TableWithJoins, Value as SqlValue,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use super::executor::SelectSpec;
use crate::data::{canonicalize, ColumnKey};

/// Parsed query representation
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    /// Dataset id named in FROM
    pub dataset: String,
    /// Projected columns
    pub select: SelectSpec,
    /// LIMIT
    pub limit: Option<usize>,
    /// OFFSET (0 when absent)
    pub offset: usize,
}

/// Parse a select string.
///
/// Accepted forms are `SELECT * FROM t` and `SELECT c1, "c2" FROM t`, with an
/// optional `LIMIT` and `OFFSET`. Column references are bare or double-quoted
/// identifiers; `"0"` names the column recorded under key `0`.
pub fn parse_query(sql: &str) -> Result<ParsedQuery, ParseError> {
    let dialect = GenericDialect {};
    let statements = Parser::parse_sql(&dialect, sql)?;

    if statements.is_empty() {
        return Err(ParseError::EmptyQuery);
    }

    if statements.len() > 1 {
        return Err(ParseError::MultipleStatements);
    }

    match &statements[0] {
        Statement::Query(query) => parse_select(query),
        _ => Err(ParseError::UnsupportedStatement),
    }
}

fn parse_select(query: &sqlparser::ast::Query) -> Result<ParsedQuery, ParseError> {
    let select = match &*query.body {
        SetExpr::Select(select) => select,
        _ => return Err(ParseError::UnsupportedQuery("only SELECT queries are supported".into())),
    };

    if query.with.is_some() {
        return Err(ParseError::UnsupportedClause("WITH"));
    }
    if select.distinct.is_some() {
        return Err(ParseError::UnsupportedClause("DISTINCT"));
    }
    if select.selection.is_some() {
        return Err(ParseError::UnsupportedClause("WHERE"));
    }
    match &select.group_by {
        GroupByExpr::Expressions(exprs) if exprs.is_empty() => {}
        _ => return Err(ParseError::UnsupportedClause("GROUP BY")),
    }
    if select.having.is_some() {
        return Err(ParseError::UnsupportedClause("HAVING"));
    }
    if !query.order_by.is_empty() {
        return Err(ParseError::UnsupportedClause("ORDER BY"));
    }

    let dataset = parse_table_name(&select.from)?;
    let select_spec = parse_projections(&select.projection)?;
    let limit = parse_limit(&query.limit)?;
    let offset = parse_offset(&query.offset)?;

    Ok(ParsedQuery {
        dataset,
        select: select_spec,
        limit,
        offset,
    })
}

fn parse_table_name(from: &[TableWithJoins]) -> Result<String, ParseError> {
    if from.is_empty() {
        return Err(ParseError::MissingTable);
    }

    if from.len() > 1 {
        return Err(ParseError::JoinsNotSupported);
    }

    let table = &from[0];
    if !table.joins.is_empty() {
        return Err(ParseError::JoinsNotSupported);
    }

    match &table.relation {
        TableFactor::Table { name, .. } => Ok(object_name_to_string(name)),
        _ => Err(ParseError::UnsupportedTableExpression),
    }
}

fn object_name_to_string(name: &ObjectName) -> String {
    name.0.iter().map(|i| i.value.clone()).collect::<Vec<_>>().join(".")
}

fn parse_projections(items: &[SelectItem]) -> Result<SelectSpec, ParseError> {
    let mut columns: Vec<ColumnKey> = Vec::new();
    let mut wildcard = false;

    for item in items {
        match item {
            SelectItem::Wildcard(_) => wildcard = true,
            SelectItem::UnnamedExpr(expr) => {
                // Repeats collapse onto the first occurrence
                let column = parse_column_ref(expr)?;
                if !columns.contains(&column) {
                    columns.push(column);
                }
            }
            _ => return Err(ParseError::UnsupportedProjection),
        }
    }

    match (wildcard, columns.is_empty()) {
        (true, true) => Ok(SelectSpec::AllColumns),
        (true, false) => Err(ParseError::MixedWildcard),
        (false, _) => Ok(SelectSpec::ExplicitColumns(columns)),
    }
}

fn parse_column_ref(expr: &Expr) -> Result<ColumnKey, ParseError> {
    match expr {
        Expr::Identifier(ident) => Ok(canonicalize(ident.value.as_str())),
        Expr::CompoundIdentifier(idents) => Ok(canonicalize(
            idents.iter().map(|i| i.value.clone()).collect::<Vec<_>>().join("."),
        )),
        Expr::Nested(inner) => parse_column_ref(inner),
        Expr::Value(SqlValue::Number(n, _)) => Err(ParseError::LiteralNotColumn(n.clone())),
        Expr::Value(SqlValue::SingleQuotedString(s)) => Err(ParseError::LiteralNotColumn(format!("'{}'", s))),
        _ => Err(ParseError::UnsupportedExpression(expr.to_string())),
    }
}

fn parse_count(expr: &Expr) -> Result<usize, ParseError> {
    match expr {
        Expr::Value(SqlValue::Number(n, _)) => n.parse().map_err(|_| ParseError::InvalidLimit),
        _ => Err(ParseError::InvalidLimit),
    }
}

fn parse_limit(limit: &Option<Expr>) -> Result<Option<usize>, ParseError> {
    limit.as_ref().map(parse_count).transpose()
}

fn parse_offset(offset: &Option<Offset>) -> Result<usize, ParseError> {
    Ok(offset.as_ref().map(|o| parse_count(&o.value)).transpose()?.unwrap_or(0))
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("SQL parse error: {0}")]
    SqlParser(#[from] sqlparser::parser::ParserError),

    #[error("Empty query")]
    EmptyQuery,

    #[error("Multiple statements not supported")]
    MultipleStatements,

    #[error("Unsupported statement type")]
    UnsupportedStatement,

    #[error("Unsupported query: {0}")]
    UnsupportedQuery(String),

    #[error("{0} is not supported")]
    UnsupportedClause(&'static str),

    #[error("Missing FROM dataset")]
    MissingTable,

    #[error("JOINs are not supported")]
    JoinsNotSupported,

    #[error("Unsupported table expression")]
    UnsupportedTableExpression,

    #[error("Unsupported projection")]
    UnsupportedProjection,

    #[error("Cannot mix * with explicit columns")]
    MixedWildcard,

    #[error("Literal {0} is not a column reference; quote it as an identifier")]
    LiteralNotColumn(String),

    #[error("Unsupported expression: {0}")]
    UnsupportedExpression(String),

    #[error("Invalid LIMIT or OFFSET value")]
    InvalidLimit,
}
