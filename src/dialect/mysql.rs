use super::{
    boolean_default, strip_quotes, CatalogBind, CatalogKind, CatalogQuery, Dialect,
    DialectAdapter, Pagination,
};
use crate::error::CompileError;

pub struct MySql;

const COLUMNS: CatalogQuery = CatalogQuery {
    sql: r#"
SELECT c.column_name AS 'COLUMN_NAME',
       c.data_type AS 'DATA_TYPE',
       c.is_nullable AS 'IS_NULLABLE',
       coalesce(c.column_default, '') AS 'COLUMN_DEFAULT',
       coalesce(c.character_maximum_length, 0) AS 'CHARACTER_MAXIMUM_LENGTH',
       CASE
           WHEN c.column_key IN ('PRI', 'UNI', 'MUL') THEN c.column_key
           ELSE ''
       END AS 'COLUMN_KEY',
       IF(upper(c.extra) = 'AUTO_INCREMENT', 'true', 'false') AS 'AUTO_INCREMENT',
       c.ordinal_position AS 'ORDINAL_POSITION'
FROM information_schema.columns c
WHERE c.table_name = ? AND c.table_schema = ?
ORDER BY c.ordinal_position;"#,
    binds: &[CatalogBind::Table, CatalogBind::Schema],
};

const FOREIGN_KEYS: CatalogQuery = CatalogQuery {
    sql: r#"
SELECT k.table_name AS 'TABLE_NAME',
       k.column_name AS 'COLUMN_NAME',
       k.constraint_name AS 'CONSTRAINT_NAME',
       r.delete_rule AS 'DELETE_RULE',
       k.referenced_table_name AS 'REFERENCED_TABLE_NAME',
       k.referenced_column_name AS 'REFERENCED_COLUMN_NAME'
FROM information_schema.key_column_usage k
         INNER JOIN information_schema.referential_constraints r
                    ON r.constraint_schema = k.constraint_schema
                        AND r.constraint_name = k.constraint_name
                        AND r.table_name = k.table_name
WHERE k.table_schema = ? AND k.table_name = ? AND k.referenced_table_name IS NOT NULL
ORDER BY k.constraint_name, k.ordinal_position;"#,
    binds: &[CatalogBind::Schema, CatalogBind::Table],
};

const INDEXES: CatalogQuery = CatalogQuery {
    sql: r#"
SELECT s.table_name AS 'TABLE_NAME',
       s.column_name AS 'COLUMN_NAME',
       s.index_name AS 'INDEX_NAME',
       s.seq_in_index AS 'SEQ_IN_INDEX',
       CASE WHEN s.collation = 'D' THEN 'desc' ELSE 'asc' END AS 'SORT',
       CASE WHEN s.non_unique = 0 THEN 'true' ELSE 'false' END AS 'IS_UNIQUE'
FROM information_schema.statistics s
WHERE s.table_schema = ? AND s.table_name = ?
  AND upper(s.index_name) <> 'PRIMARY'
  AND s.index_name REGEXP '^index'
ORDER BY s.index_name, s.seq_in_index;"#,
    binds: &[CatalogBind::Schema, CatalogBind::Table],
};

impl DialectAdapter for MySql {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn placeholder(&self, _position: usize) -> String {
        "?".to_string()
    }

    fn quote_chars(&self) -> &'static [char] {
        &['`', '"']
    }

    // Same-schema access: the connection already selects the database.
    fn namespaced_tables(&self) -> bool {
        false
    }

    fn contains(&self, column: &str, placeholder: &str) -> Result<String, CompileError> {
        Ok(format!("json_contains({},{})", column, placeholder))
    }

    fn regex(&self, column: &str, placeholder: &str) -> Result<String, CompileError> {
        Ok(format!("({} REGEXP {})", column, placeholder))
    }

    fn catalog(&self, kind: CatalogKind) -> &'static CatalogQuery {
        match kind {
            CatalogKind::Columns => &COLUMNS,
            CatalogKind::ForeignKeys => &FOREIGN_KEYS,
            CatalogKind::Indexes => &INDEXES,
        }
    }

    fn create_database(&self, name: &str) -> String {
        format!("CREATE DATABASE IF NOT EXISTS {}", name)
    }

    // OFFSET is only valid after LIMIT; the largest row count stands in for "all".
    fn pagination(
        &self,
        limit: Option<u64>,
        offset: Option<u64>,
        _ordered: bool,
    ) -> Result<Pagination, CompileError> {
        let suffix = match (limit, offset) {
            (Some(limit), Some(offset)) => Some(format!("LIMIT {} OFFSET {}", limit, offset)),
            (Some(limit), None) => Some(format!("LIMIT {}", limit)),
            (None, Some(offset)) => Some(format!("LIMIT {} OFFSET {}", u64::MAX, offset)),
            (None, None) => None,
        };
        Ok(Pagination { top: None, suffix })
    }

    fn normalize_default(&self, raw: &str, data_type: &str) -> String {
        let raw = raw.trim();
        let boolean_like = matches!(
            data_type.to_ascii_lowercase().as_str(),
            "tinyint" | "bit" | "bool" | "boolean"
        );
        if boolean_like {
            if let Some(b) = boolean_default(raw) {
                return b.to_string();
            }
        }
        strip_quotes(raw)
    }
}
