use serde::Serialize;

use super::backend::QueryResult;
use super::executor::SqlEngine;
use crate::dialect::{sized_type, CatalogKind};
use crate::error::{Error, Result};

/// Key role of a column, as MySQL's `COLUMN_KEY` spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum KeyRole {
    #[serde(rename = "PRI")]
    Primary,
    #[serde(rename = "UNI")]
    Unique,
    #[serde(rename = "MUL")]
    Multiple,
    #[default]
    #[serde(rename = "")]
    None,
}

impl KeyRole {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PRI" => KeyRole::Primary,
            "UNI" => KeyRole::Unique,
            "MUL" => KeyRole::Multiple,
            _ => KeyRole::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KeyRole::Primary => "PRI",
            KeyRole::Unique => "UNI",
            KeyRole::Multiple => "MUL",
            KeyRole::None => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDescription {
    pub name: String,
    /// Type name with a size suffix for variable-length types.
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub key: KeyRole,
    pub varchar_size: i64,
    pub auto_increment: bool,
    pub ordinal_position: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForeignKeyDescription {
    pub table_name: String,
    pub column_name: String,
    pub constraint_name: String,
    pub delete_rule: String,
    pub referenced_table_name: String,
    pub referenced_column_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexDescription {
    pub table_name: String,
    pub column_name: String,
    pub index_name: String,
    /// 1-based position of the column inside the index.
    pub order: i64,
    pub sort: String,
    pub is_unique: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableDescription {
    pub columns: Vec<ColumnDescription>,
    pub foreign_keys: Vec<ForeignKeyDescription>,
    pub indexes: Vec<IndexDescription>,
}

impl SqlEngine {
    /// Describe `table` in the configured schema.
    ///
    /// Runs the dialect's column, foreign-key and index catalog queries in
    /// that order. A table without columns does not exist.
    pub async fn describe(&self, table: &str) -> Result<TableDescription> {
        let columns = self.catalog(CatalogKind::Columns, table).await?;
        if columns.rows.is_empty() {
            return Err(Error::TableNotFound {
                dialect: self.dialect(),
                table: table.to_string(),
            });
        }
        let foreign_keys = self.catalog(CatalogKind::ForeignKeys, table).await?;
        let indexes = self.catalog(CatalogKind::Indexes, table).await?;

        Ok(TableDescription {
            columns: self.parse_columns(&columns),
            foreign_keys: parse_foreign_keys(&foreign_keys),
            indexes: parse_indexes(&indexes),
        })
    }

    async fn catalog(&self, kind: CatalogKind, table: &str) -> Result<QueryResult> {
        let query = self.builder.adapter().catalog(kind);
        let args = query.args(self.builder.namespace(), table);
        self.timed(self.backend.query(query.sql, &args), Error::from)
            .await
    }

    fn parse_columns(&self, result: &QueryResult) -> Vec<ColumnDescription> {
        let adapter = self.builder.adapter();
        (0..result.row_count())
            .map(|row| {
                let cell = |name: &str| text(result, row, name);
                let raw_type = cell("DATA_TYPE");
                let size = int(result, row, "CHARACTER_MAXIMUM_LENGTH");
                let default = adapter.normalize_default(&cell("COLUMN_DEFAULT"), &raw_type);
                ColumnDescription {
                    name: cell("COLUMN_NAME"),
                    data_type: sized_type(&raw_type, size),
                    nullable: cell("IS_NULLABLE").eq_ignore_ascii_case("yes"),
                    default: (!default.is_empty()).then_some(default),
                    key: KeyRole::parse(&cell("COLUMN_KEY")),
                    varchar_size: size,
                    auto_increment: flag(result, row, "AUTO_INCREMENT"),
                    ordinal_position: int(result, row, "ORDINAL_POSITION"),
                }
            })
            .collect()
    }
}

fn parse_foreign_keys(result: &QueryResult) -> Vec<ForeignKeyDescription> {
    (0..result.row_count())
        .map(|row| ForeignKeyDescription {
            table_name: text(result, row, "TABLE_NAME"),
            column_name: text(result, row, "COLUMN_NAME"),
            constraint_name: text(result, row, "CONSTRAINT_NAME"),
            delete_rule: text(result, row, "DELETE_RULE"),
            referenced_table_name: text(result, row, "REFERENCED_TABLE_NAME"),
            referenced_column_name: text(result, row, "REFERENCED_COLUMN_NAME"),
        })
        .collect()
}

fn parse_indexes(result: &QueryResult) -> Vec<IndexDescription> {
    (0..result.row_count())
        .map(|row| IndexDescription {
            table_name: text(result, row, "TABLE_NAME"),
            column_name: text(result, row, "COLUMN_NAME"),
            index_name: text(result, row, "INDEX_NAME"),
            order: int(result, row, "SEQ_IN_INDEX"),
            sort: text(result, row, "SORT").to_ascii_lowercase(),
            is_unique: flag(result, row, "IS_UNIQUE"),
        })
        .collect()
}

fn text(result: &QueryResult, row: usize, column: &str) -> String {
    result
        .get(row, column)
        .map(|v| v.to_text())
        .unwrap_or_default()
}

fn int(result: &QueryResult, row: usize, column: &str) -> i64 {
    result
        .get(row, column)
        .and_then(|v| v.as_i64())
        .unwrap_or(0)
}

fn flag(result: &QueryResult, row: usize, column: &str) -> bool {
    result
        .get(row, column)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::backend::testing::{text_rows, RecordingBackend};
    use crate::dialect::Dialect;

    const COLUMN_HEADERS: &[&str] = &[
        "COLUMN_NAME",
        "DATA_TYPE",
        "IS_NULLABLE",
        "COLUMN_DEFAULT",
        "CHARACTER_MAXIMUM_LENGTH",
        "COLUMN_KEY",
        "AUTO_INCREMENT",
        "ORDINAL_POSITION",
    ];

    fn engine(backend: &RecordingBackend, dialect: Dialect) -> SqlEngine {
        SqlEngine::new(Arc::new(backend.clone()), dialect, "app")
    }

    #[tokio::test]
    async fn test_missing_table_is_an_error() {
        let backend = RecordingBackend::new();
        let engine = engine(&backend, Dialect::Postgres);
        let err = engine.describe("ghost").await.unwrap_err();
        assert_eq!(err.to_string(), "postgres:ghost not found during inspection");
        // No foreign-key or index query after an empty column listing.
        assert_eq!(backend.log().len(), 1);
    }

    #[tokio::test]
    async fn test_describe_mysql_table() {
        let backend = RecordingBackend::with(|s| {
            s.results.push_back(text_rows(
                COLUMN_HEADERS,
                &[
                    &["id", "int", "NO", "", "0", "PRI", "true", "1"],
                    &["email", "varchar", "YES", "'none'", "255", "UNI", "false", "2"],
                    &["active", "tinyint", "NO", "1", "0", "", "false", "3"],
                ],
            ));
            s.results.push_back(text_rows(
                &[
                    "TABLE_NAME",
                    "COLUMN_NAME",
                    "CONSTRAINT_NAME",
                    "DELETE_RULE",
                    "REFERENCED_TABLE_NAME",
                    "REFERENCED_COLUMN_NAME",
                ],
                &[&["users", "org_id", "fk_org", "CASCADE", "orgs", "id"]],
            ));
            s.results.push_back(text_rows(
                &[
                    "TABLE_NAME",
                    "COLUMN_NAME",
                    "INDEX_NAME",
                    "SEQ_IN_INDEX",
                    "SORT",
                    "IS_UNIQUE",
                ],
                &[&["users", "email", "index_email", "1", "ASC", "true"]],
            ));
        });
        let engine = engine(&backend, Dialect::MySql);
        let desc = engine.describe("users").await.unwrap();

        assert_eq!(desc.columns.len(), 3);
        let id = &desc.columns[0];
        assert_eq!(id.key, KeyRole::Primary);
        assert!(id.auto_increment);
        assert!(!id.nullable);
        assert_eq!(id.default, None);

        let email = &desc.columns[1];
        assert_eq!(email.data_type, "varchar(255)");
        assert_eq!(email.default.as_deref(), Some("none"));
        assert_eq!(email.key.as_str(), "UNI");
        assert!(email.nullable);

        assert_eq!(desc.columns[2].default.as_deref(), Some("true"));

        assert_eq!(desc.foreign_keys[0].referenced_table_name, "orgs");
        assert_eq!(desc.foreign_keys[0].delete_rule, "CASCADE");

        let index = &desc.indexes[0];
        assert_eq!(index.order, 1);
        assert_eq!(index.sort, "asc");
        assert!(index.is_unique);

        let log = backend.log();
        assert_eq!(log.len(), 3);
        // Columns bind table first on MySQL, the others schema first.
        assert!(log[0].ends_with(r#"[String("users"), String("app")]"#));
        assert!(log[1].ends_with(r#"[String("app"), String("users")]"#));
    }

    #[tokio::test]
    async fn test_describe_sqlserver_max_size() {
        let backend = RecordingBackend::with(|s| {
            s.results.push_back(text_rows(
                COLUMN_HEADERS,
                &[&["body", "nvarchar", "YES", "(N'x')", "-1", "", "false", "1"]],
            ));
        });
        let engine = engine(&backend, Dialect::SqlServer);
        let desc = engine.describe("notes").await.unwrap();
        assert_eq!(desc.columns[0].data_type, "nvarchar(max)");
        assert_eq!(desc.columns[0].default.as_deref(), Some("x"));
        assert!(desc.foreign_keys.is_empty());
        assert!(desc.indexes.is_empty());
    }

    #[test]
    fn test_key_role_serializes_as_catalog_text() {
        assert_eq!(serde_json::to_string(&KeyRole::Multiple).unwrap(), r#""MUL""#);
        assert_eq!(serde_json::to_string(&KeyRole::None).unwrap(), r#""""#);
    }
}
