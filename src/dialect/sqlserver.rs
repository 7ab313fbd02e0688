use super::{
    boolean_default, strip_quotes, CatalogBind, CatalogKind, CatalogQuery, Dialect,
    DialectAdapter, Pagination,
};
use crate::ast::compiler::Params;
use crate::ast::types::{DateFunction, Extremum, Value};
use crate::error::CompileError;

pub struct SqlServer;

const COLUMNS: CatalogQuery = CatalogQuery {
    sql: r#"
SELECT c.COLUMN_NAME AS 'COLUMN_NAME',
       c.DATA_TYPE AS 'DATA_TYPE',
       c.IS_NULLABLE AS 'IS_NULLABLE',
       coalesce(c.COLUMN_DEFAULT, '') AS 'COLUMN_DEFAULT',
       coalesce(c.CHARACTER_MAXIMUM_LENGTH, 0) AS 'CHARACTER_MAXIMUM_LENGTH',
       CASE
           WHEN EXISTS (SELECT 1
                        FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc
                                 INNER JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu
                                            ON kcu.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
                                                AND kcu.TABLE_SCHEMA = tc.TABLE_SCHEMA
                        WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY'
                          AND tc.TABLE_SCHEMA = c.TABLE_SCHEMA
                          AND tc.TABLE_NAME = c.TABLE_NAME
                          AND kcu.COLUMN_NAME = c.COLUMN_NAME) THEN 'PRI'
           WHEN EXISTS (SELECT 1
                        FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc
                                 INNER JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu
                                            ON kcu.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
                                                AND kcu.TABLE_SCHEMA = tc.TABLE_SCHEMA
                        WHERE tc.CONSTRAINT_TYPE = 'UNIQUE'
                          AND tc.TABLE_SCHEMA = c.TABLE_SCHEMA
                          AND tc.TABLE_NAME = c.TABLE_NAME
                          AND kcu.COLUMN_NAME = c.COLUMN_NAME
                          AND (SELECT count(*)
                               FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE k2
                               WHERE k2.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
                                 AND k2.TABLE_SCHEMA = tc.TABLE_SCHEMA) = 1) THEN 'UNI'
           WHEN EXISTS (SELECT 1
                        FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc
                                 INNER JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu
                                            ON kcu.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
                                                AND kcu.TABLE_SCHEMA = tc.TABLE_SCHEMA
                        WHERE tc.CONSTRAINT_TYPE IN ('UNIQUE', 'FOREIGN KEY')
                          AND tc.TABLE_SCHEMA = c.TABLE_SCHEMA
                          AND tc.TABLE_NAME = c.TABLE_NAME
                          AND kcu.COLUMN_NAME = c.COLUMN_NAME) THEN 'MUL'
           ELSE ''
       END AS 'COLUMN_KEY',
       CASE
           WHEN COLUMNPROPERTY(object_id(c.TABLE_SCHEMA + '.' + c.TABLE_NAME), c.COLUMN_NAME, 'IsIdentity') = 1
               THEN 'true'
           ELSE 'false'
       END AS 'AUTO_INCREMENT',
       c.ORDINAL_POSITION AS 'ORDINAL_POSITION'
FROM INFORMATION_SCHEMA.COLUMNS c
WHERE c.TABLE_SCHEMA = @p1 AND c.TABLE_NAME = @p2
ORDER BY c.ORDINAL_POSITION;"#,
    binds: &[CatalogBind::Schema, CatalogBind::Table],
};

const FOREIGN_KEYS: CatalogQuery = CatalogQuery {
    sql: r#"
SELECT tp.name AS 'TABLE_NAME',
       cp.name AS 'COLUMN_NAME',
       fk.name AS 'CONSTRAINT_NAME',
       replace(fk.delete_referential_action_desc, '_', ' ') AS 'DELETE_RULE',
       tr.name AS 'REFERENCED_TABLE_NAME',
       cr.name AS 'REFERENCED_COLUMN_NAME'
FROM sys.foreign_keys fk
         INNER JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id = fk.object_id
         INNER JOIN sys.tables tp ON tp.object_id = fkc.parent_object_id
         INNER JOIN sys.columns cp ON cp.object_id = fkc.parent_object_id AND cp.column_id = fkc.parent_column_id
         INNER JOIN sys.tables tr ON tr.object_id = fkc.referenced_object_id
         INNER JOIN sys.columns cr ON cr.object_id = fkc.referenced_object_id AND cr.column_id = fkc.referenced_column_id
WHERE schema_name(tp.schema_id) = @p1 AND tp.name = @p2
ORDER BY fk.name, fkc.constraint_column_id;"#,
    binds: &[CatalogBind::Schema, CatalogBind::Table],
};

const INDEXES: CatalogQuery = CatalogQuery {
    sql: r#"
SELECT t.[name] AS 'TABLE_NAME',
       col.[name] AS 'COLUMN_NAME',
       i.[name] AS 'INDEX_NAME',
       ic.key_ordinal AS 'SEQ_IN_INDEX',
       CASE WHEN ic.is_descending_key = 1 THEN 'desc' ELSE 'asc' END AS 'SORT',
       CASE WHEN i.is_unique = 1 THEN 'true' ELSE 'false' END AS 'IS_UNIQUE'
FROM sys.indexes i
         INNER JOIN sys.objects t ON t.object_id = i.object_id
         INNER JOIN sys.index_columns ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id
         INNER JOIN sys.columns col ON col.object_id = ic.object_id AND col.column_id = ic.column_id
WHERE t.is_ms_shipped <> 1
  AND i.index_id > 0
  AND i.is_primary_key = 0
  AND i.[name] LIKE 'index%'
  AND schema_name(t.schema_id) = @p1
  AND t.[name] = @p2
ORDER BY i.[name], ic.key_ordinal;"#,
    binds: &[CatalogBind::Schema, CatalogBind::Table],
};

impl DialectAdapter for SqlServer {
    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
    }

    fn placeholder(&self, position: usize) -> String {
        format!("@p{}", position)
    }

    fn quote_chars(&self) -> &'static [char] {
        &['[', ']', '"']
    }

    fn contains(&self, _column: &str, _placeholder: &str) -> Result<String, CompileError> {
        Err(CompileError::Unsupported {
            feature: "$contains",
            dialect: Dialect::SqlServer,
        })
    }

    fn regex(&self, _column: &str, _placeholder: &str) -> Result<String, CompileError> {
        Err(CompileError::Unsupported {
            feature: "$regex",
            dialect: Dialect::SqlServer,
        })
    }

    // GREATEST/LEAST only exist from SQL Server 2022 on.
    fn conditional_write(
        &self,
        column: &str,
        extremum: Extremum,
        operand: Value,
        params: &mut Params<'_>,
    ) -> String {
        let cmp = match extremum {
            Extremum::Max => '>',
            Extremum::Min => '<',
        };
        let test = params.bind(operand.clone());
        let then = params.bind(operand);
        format!("{column}=CASE WHEN {test} {cmp} {column} THEN {then} ELSE {column} END")
    }

    fn date_function(&self, function: DateFunction) -> &'static str {
        match function {
            DateFunction::CurrentDate => "CAST( GETDATE() AS date )",
            DateFunction::CurrentTimestamp => "CURRENT_TIMESTAMP",
        }
    }

    fn pagination(
        &self,
        limit: Option<u64>,
        offset: Option<u64>,
        ordered: bool,
    ) -> Result<Pagination, CompileError> {
        match (limit, offset) {
            (_, Some(_)) if !ordered => Err(CompileError::SkipWithoutSort),
            (Some(limit), Some(offset)) => Ok(Pagination {
                top: None,
                suffix: Some(format!(
                    "OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
                    offset, limit
                )),
            }),
            (None, Some(offset)) => Ok(Pagination {
                top: None,
                suffix: Some(format!("OFFSET {} ROWS", offset)),
            }),
            (Some(limit), None) => Ok(Pagination {
                top: Some(limit),
                suffix: None,
            }),
            (None, None) => Ok(Pagination::default()),
        }
    }

    fn catalog(&self, kind: CatalogKind) -> &'static CatalogQuery {
        match kind {
            CatalogKind::Columns => &COLUMNS,
            CatalogKind::ForeignKeys => &FOREIGN_KEYS,
            CatalogKind::Indexes => &INDEXES,
        }
    }

    fn create_database(&self, name: &str) -> String {
        format!(
            "IF NOT EXISTS (SELECT * FROM sys.schemas WHERE name = N'{name}') BEGIN EXEC('CREATE SCHEMA [{name}]') END"
        )
    }

    fn normalize_default(&self, raw: &str, data_type: &str) -> String {
        // ((1)), ('abc'), (N'abc')
        let unwrapped: String = raw.trim().chars().filter(|c| *c != '(' && *c != ')').collect();
        let unwrapped = unwrapped
            .strip_prefix("N'")
            .map(|rest| format!("'{}", rest))
            .unwrap_or(unwrapped);
        let value = strip_quotes(&unwrapped);
        if data_type.eq_ignore_ascii_case("bit") {
            if let Some(b) = boolean_default(&value) {
                return b.to_string();
            }
        }
        value
    }
}
