//! Per-backend SQL rules.
//!
//! Each supported backend implements [`DialectAdapter`]; the closed
//! [`Dialect`] enum picks the adapter once when an engine is built. All
//! dialect knowledge (placeholders, quoting, JSON operators, pagination,
//! catalog SQL) lives behind this boundary.

mod mysql;
mod postgres;
mod sqlserver;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ast::compiler::Params;
use crate::ast::types::{DateFunction, Extremum, Value};
use crate::error::{CompileError, Error};

pub use mysql::MySql;
pub use postgres::Postgres;
pub use sqlserver::SqlServer;

/// The three supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[serde(rename = "mysql")]
    MySql,
    Postgres,
    #[serde(rename = "sqlserver")]
    SqlServer,
}

impl Dialect {
    pub const ALL: [Dialect; 3] = [Dialect::MySql, Dialect::Postgres, Dialect::SqlServer];

    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::SqlServer => "sqlserver",
        }
    }

    pub fn adapter(self) -> &'static dyn DialectAdapter {
        match self {
            Dialect::MySql => &MySql,
            Dialect::Postgres => &Postgres,
            Dialect::SqlServer => &SqlServer,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(Dialect::MySql),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "sqlserver" | "mssql" => Ok(Dialect::SqlServer),
            other => Err(Error::Config(format!("unsupported database ({})", other))),
        }
    }
}

/// Which catalog description a query produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Columns,
    ForeignKeys,
    Indexes,
}

/// A bind slot of a catalog query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogBind {
    Schema,
    Table,
}

/// Catalog SQL text plus the order its placeholders expect.
#[derive(Debug)]
pub struct CatalogQuery {
    pub sql: &'static str,
    pub binds: &'static [CatalogBind],
}

impl CatalogQuery {
    pub fn args(&self, schema: &str, table: &str) -> Vec<Value> {
        self.binds
            .iter()
            .map(|bind| match bind {
                CatalogBind::Schema => Value::from(schema),
                CatalogBind::Table => Value::from(table),
            })
            .collect()
    }
}

/// Row-limiting fragments for a SELECT.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pagination {
    /// `SELECT TOP n`
    pub top: Option<u64>,
    /// Appended after ORDER BY.
    pub suffix: Option<String>,
}

/// Rules for rendering statements and reading catalogs on one backend.
pub trait DialectAdapter: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Placeholder text for the 1-based argument `position`.
    fn placeholder(&self, position: usize) -> String;

    /// Identifier quote characters this backend understands.
    fn quote_chars(&self) -> &'static [char];

    /// Strip quoting from a trusted identifier.
    fn clean_identifier(&self, ident: &str) -> String {
        let quotes = self.quote_chars();
        ident.chars().filter(|c| !quotes.contains(c)).collect()
    }

    /// Whether table references carry the logical database/schema prefix.
    fn namespaced_tables(&self) -> bool {
        true
    }

    /// Bind value for a JSON document operand.
    fn json_argument(&self, document: &serde_json::Value) -> Value {
        Value::String(document.to_string())
    }

    /// JSON containment predicate for `column` against the bound document.
    fn contains(&self, column: &str, placeholder: &str) -> Result<String, CompileError>;

    /// Regular-expression match predicate.
    fn regex(&self, column: &str, placeholder: &str) -> Result<String, CompileError>;

    /// Assignment that keeps the larger/smaller of `column` and `operand`.
    fn conditional_write(
        &self,
        column: &str,
        extremum: Extremum,
        operand: Value,
        params: &mut Params<'_>,
    ) -> String {
        let function = match extremum {
            Extremum::Max => "GREATEST",
            Extremum::Min => "LEAST",
        };
        let ph = params.bind(operand);
        format!("{column}={function}({column},{ph})")
    }

    /// WHERE test matching rows that a conditional write would change.
    ///
    /// A NULL column is left untouched by `GREATEST`/`LEAST` here, so it
    /// never qualifies.
    fn change_guard(&self, column: &str, extremum: Extremum, placeholder: &str) -> String {
        let cmp = match extremum {
            Extremum::Max => '<',
            Extremum::Min => '>',
        };
        format!("({} {} {})", column, cmp, placeholder)
    }

    fn date_function(&self, function: DateFunction) -> &'static str {
        match function {
            DateFunction::CurrentDate => "CURRENT_DATE",
            DateFunction::CurrentTimestamp => "CURRENT_TIMESTAMP",
        }
    }

    fn pagination(
        &self,
        limit: Option<u64>,
        offset: Option<u64>,
        _ordered: bool,
    ) -> Result<Pagination, CompileError> {
        let mut parts = Vec::new();
        if let Some(limit) = limit {
            parts.push(format!("LIMIT {}", limit));
        }
        if let Some(offset) = offset {
            parts.push(format!("OFFSET {}", offset));
        }
        Ok(Pagination {
            top: None,
            suffix: (!parts.is_empty()).then(|| parts.join(" ")),
        })
    }

    fn catalog(&self, kind: CatalogKind) -> &'static CatalogQuery;

    /// Idempotent creation of the logical database or schema `name`.
    fn create_database(&self, name: &str) -> String;

    /// Clean a raw catalog default into its plain literal text.
    fn normalize_default(&self, raw: &str, data_type: &str) -> String;

}

pub(crate) fn strip_quotes(raw: &str) -> String {
    raw.chars().filter(|c| *c != '\'' && *c != '"').collect()
}

/// Map numeric/bit boolean defaults onto `true`/`false`.
pub(crate) fn boolean_default(value: &str) -> Option<&'static str> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "b'1'" | "true" => Some("true"),
        "0" | "b'0'" | "false" => Some("false"),
        _ => None,
    }
}

/// Type name with a size suffix for variable-length character/binary types.
pub fn sized_type(data_type: &str, size: i64) -> String {
    let lower = data_type.to_ascii_lowercase();
    let sized = lower.contains("char") || lower.contains("binary");
    match size {
        -1 if sized => format!("{}(max)", data_type),
        n if n > 0 && sized => format!("{}({})", data_type, n),
        _ => data_type.to_string(),
    }
}

pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
