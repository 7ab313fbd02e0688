use super::{strip_quotes, CatalogBind, CatalogKind, CatalogQuery, Dialect, DialectAdapter};
use crate::ast::types::{Extremum, Value};
use crate::error::CompileError;

pub struct Postgres;

// information_schema columns are domain types; every projection is cast so
// the driver decodes plain text/int4.
const COLUMNS: CatalogQuery = CatalogQuery {
    sql: r#"
SELECT c.column_name::text AS "COLUMN_NAME",
       c.data_type::text AS "DATA_TYPE",
       c.is_nullable::text AS "IS_NULLABLE",
       coalesce(c.column_default, '')::text AS "COLUMN_DEFAULT",
       coalesce(c.character_maximum_length, 0)::int AS "CHARACTER_MAXIMUM_LENGTH",
       CASE
           WHEN EXISTS (SELECT 1
                        FROM information_schema.table_constraints tc
                                 INNER JOIN information_schema.key_column_usage kcu
                                            ON kcu.constraint_name = tc.constraint_name
                                                AND kcu.table_schema = tc.table_schema
                        WHERE tc.constraint_type = 'PRIMARY KEY'
                          AND tc.table_schema = c.table_schema
                          AND tc.table_name = c.table_name
                          AND kcu.column_name = c.column_name) THEN 'PRI'
           WHEN EXISTS (SELECT 1
                        FROM information_schema.table_constraints tc
                                 INNER JOIN information_schema.key_column_usage kcu
                                            ON kcu.constraint_name = tc.constraint_name
                                                AND kcu.table_schema = tc.table_schema
                        WHERE tc.constraint_type = 'UNIQUE'
                          AND tc.table_schema = c.table_schema
                          AND tc.table_name = c.table_name
                          AND kcu.column_name = c.column_name
                          AND (SELECT count(*)
                               FROM information_schema.key_column_usage k2
                               WHERE k2.constraint_name = tc.constraint_name
                                 AND k2.table_schema = tc.table_schema) = 1) THEN 'UNI'
           WHEN EXISTS (SELECT 1
                        FROM information_schema.table_constraints tc
                                 INNER JOIN information_schema.key_column_usage kcu
                                            ON kcu.constraint_name = tc.constraint_name
                                                AND kcu.table_schema = tc.table_schema
                        WHERE tc.constraint_type IN ('UNIQUE', 'FOREIGN KEY')
                          AND tc.table_schema = c.table_schema
                          AND tc.table_name = c.table_name
                          AND kcu.column_name = c.column_name) THEN 'MUL'
           ELSE ''
       END AS "COLUMN_KEY",
       CASE
           WHEN upper(coalesce(c.column_default, '')) LIKE 'NEXTVAL%' OR c.is_identity = 'YES' THEN 'true'
           ELSE 'false'
       END AS "AUTO_INCREMENT",
       c.ordinal_position::int AS "ORDINAL_POSITION"
FROM information_schema.columns c
WHERE c.table_schema = $1 AND c.table_name = $2
ORDER BY c.ordinal_position;"#,
    binds: &[CatalogBind::Schema, CatalogBind::Table],
};

const FOREIGN_KEYS: CatalogQuery = CatalogQuery {
    sql: r#"
SELECT tc.table_name::text AS "TABLE_NAME",
       kcu.column_name::text AS "COLUMN_NAME",
       tc.constraint_name::text AS "CONSTRAINT_NAME",
       rc.delete_rule::text AS "DELETE_RULE",
       ccu.table_name::text AS "REFERENCED_TABLE_NAME",
       ccu.column_name::text AS "REFERENCED_COLUMN_NAME"
FROM information_schema.table_constraints AS tc
         INNER JOIN information_schema.key_column_usage AS kcu
                    ON tc.constraint_name = kcu.constraint_name
                        AND tc.table_schema = kcu.table_schema
         INNER JOIN information_schema.constraint_column_usage AS ccu
                    ON ccu.constraint_name = tc.constraint_name
                        AND ccu.table_schema = tc.table_schema
         INNER JOIN information_schema.referential_constraints rc
                    ON rc.constraint_name = tc.constraint_name
                        AND rc.constraint_schema = tc.table_schema
WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_schema = $1 AND tc.table_name = $2
ORDER BY tc.constraint_name, kcu.ordinal_position;"#,
    binds: &[CatalogBind::Schema, CatalogBind::Table],
};

const INDEXES: CatalogQuery = CatalogQuery {
    sql: r#"
SELECT t.relname::text AS "TABLE_NAME",
       b.attname::text AS "COLUMN_NAME",
       a.relname::text AS "INDEX_NAME",
       (array_position(i.indkey, b.attnum) + 1)::int AS "SEQ_IN_INDEX",
       CASE WHEN i.indoption[array_position(i.indkey, b.attnum)] = 0 THEN 'asc' ELSE 'desc' END AS "SORT",
       CASE WHEN i.indisunique THEN 'true' ELSE 'false' END AS "IS_UNIQUE"
FROM pg_class a
         INNER JOIN pg_namespace n ON n.oid = a.relnamespace
         INNER JOIN pg_index i ON a.oid = i.indexrelid AND a.relkind = 'i' AND i.indisvalid = true
         INNER JOIN pg_class t ON t.oid = i.indrelid
         INNER JOIN pg_attribute b ON b.attrelid = t.oid AND b.attnum = ANY (i.indkey)
WHERE n.nspname = $1 AND t.relname = $2
  AND NOT i.indisprimary
  AND a.relname ~ '^index'
ORDER BY a.relname, 4;"#,
    binds: &[CatalogBind::Schema, CatalogBind::Table],
};

impl DialectAdapter for Postgres {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn placeholder(&self, position: usize) -> String {
        format!("${}", position)
    }

    fn quote_chars(&self) -> &'static [char] {
        &['"']
    }

    fn json_argument(&self, document: &serde_json::Value) -> Value {
        Value::Json(document.clone())
    }

    fn contains(&self, column: &str, placeholder: &str) -> Result<String, CompileError> {
        Ok(format!("{} @> {}", column, placeholder))
    }

    fn regex(&self, column: &str, placeholder: &str) -> Result<String, CompileError> {
        Ok(format!("({} ~ {})", column, placeholder))
    }

    fn catalog(&self, kind: CatalogKind) -> &'static CatalogQuery {
        match kind {
            CatalogKind::Columns => &COLUMNS,
            CatalogKind::ForeignKeys => &FOREIGN_KEYS,
            CatalogKind::Indexes => &INDEXES,
        }
    }

    fn create_database(&self, name: &str) -> String {
        format!("CREATE SCHEMA IF NOT EXISTS {}", name)
    }

    // GREATEST/LEAST skip NULL arguments, so a NULL column always changes.
    fn change_guard(&self, column: &str, extremum: Extremum, placeholder: &str) -> String {
        let cmp = match extremum {
            Extremum::Max => '<',
            Extremum::Min => '>',
        };
        format!("({0} IS NULL OR {0} {1} {2})", column, cmp, placeholder)
    }

    fn normalize_default(&self, raw: &str, _data_type: &str) -> String {
        // 'abc'::character varying -> abc
        let unquoted = strip_quotes(raw.trim());
        match unquoted.split_once("::") {
            Some((value, _cast)) => value.to_string(),
            None => unquoted,
        }
    }
}
