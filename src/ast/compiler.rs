/// Unified AST → SQL renderer.
///
/// Walks a [`Statement`] once and asks the active [`DialectAdapter`] for every
/// backend-specific fragment (placeholders, JSON operators, pagination, date
/// functions). Arguments are collected in placeholder order.
use tracing::debug;

use super::types::*;
use crate::dialect::DialectAdapter;
use crate::error::CompileError;

/// Ordered bind arguments plus the dialect that numbers them.
pub struct Params<'a> {
    adapter: &'a dyn DialectAdapter,
    args: Vec<Value>,
}

impl<'a> Params<'a> {
    pub fn new(adapter: &'a dyn DialectAdapter) -> Self {
        Self {
            adapter,
            args: Vec::new(),
        }
    }

    /// Record `value` and return the placeholder that refers to it.
    pub fn bind(&mut self, value: Value) -> String {
        self.args.push(value);
        self.adapter.placeholder(self.args.len())
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn into_args(self) -> Vec<Value> {
        self.args
    }
}

/// Compile a statement into SQL text and its positional arguments.
pub fn compile(
    statement: &Statement,
    adapter: &dyn DialectAdapter,
) -> Result<CompiledStatement, CompileError> {
    let mut params = Params::new(adapter);
    let sql = match statement {
        Statement::Select(s) => compile_select(s, adapter, &mut params)?,
        Statement::Insert(i) => compile_insert(i, adapter, &mut params)?,
        Statement::Update(u) => compile_update(u, adapter, &mut params)?,
        Statement::Delete(d) => compile_delete(d, adapter, &mut params)?,
    };
    let args = params.into_args();
    debug!(
        dialect = %adapter.dialect(),
        kind = statement.kind(),
        args = args.len(),
        "compiled statement"
    );
    Ok(CompiledStatement { sql, args })
}

/// Compile a filter on its own; `None` when it matches every row.
pub fn compile_filter(
    filter: &Filter,
    adapter: &dyn DialectAdapter,
) -> Result<(Option<String>, Vec<Value>), CompileError> {
    let mut params = Params::new(adapter);
    let clause = render_filter(filter, adapter, &mut params)?;
    Ok((clause, params.into_args()))
}

fn compile_table_ref(table: &TableRef, adapter: &dyn DialectAdapter) -> String {
    let name = adapter.clean_identifier(&table.name);
    match &table.namespace {
        Some(ns) => format!("{}.{}", adapter.clean_identifier(ns), name),
        None => name,
    }
}

fn compile_select(
    select: &SelectStatement,
    adapter: &dyn DialectAdapter,
    params: &mut Params<'_>,
) -> Result<String, CompileError> {
    let pagination = adapter.pagination(select.limit, select.offset, !select.order_by.is_empty())?;
    let mut parts = Vec::new();

    // SELECT [DISTINCT] [TOP n] columns
    let mut select_clause = String::from("SELECT ");
    if let Projection::Distinct(_) = select.projection {
        select_clause.push_str("DISTINCT ");
    }
    if let Some(top) = pagination.top {
        select_clause.push_str(&format!("TOP {} ", top));
    }
    match &select.projection {
        Projection::All => select_clause.push('*'),
        Projection::Columns(cols) if cols.is_empty() => select_clause.push('*'),
        Projection::Columns(cols) => {
            let cols: Vec<String> = cols.iter().map(|c| adapter.clean_identifier(c)).collect();
            select_clause.push_str(&cols.join(", "));
        }
        Projection::Count => select_clause.push_str("COUNT(*)"),
        Projection::Distinct(col) => select_clause.push_str(&adapter.clean_identifier(col)),
        Projection::Aggregate {
            columns,
            aggregates,
        } => {
            let mut items: Vec<String> =
                columns.iter().map(|c| adapter.clean_identifier(c)).collect();
            items.extend(aggregates.iter().map(|a| compile_aggregate(a, adapter)));
            select_clause.push_str(&items.join(", "));
        }
    }
    parts.push(select_clause);

    parts.push(format!("FROM {}", compile_table_ref(&select.table, adapter)));

    if let Some(clause) = render_filter(&select.filter, adapter, params)? {
        parts.push(format!("WHERE {}", clause));
    }

    if !select.group_by.is_empty() {
        let cols: Vec<String> = select
            .group_by
            .iter()
            .map(|c| adapter.clean_identifier(c))
            .collect();
        parts.push(format!("GROUP BY {}", cols.join(", ")));
    }

    if !select.order_by.is_empty() {
        let orders: Vec<String> = select
            .order_by
            .iter()
            .map(|o| {
                let dir = if o.descending { "DESC" } else { "ASC" };
                format!("{} {}", adapter.clean_identifier(&o.column), dir)
            })
            .collect();
        parts.push(format!("ORDER BY {}", orders.join(", ")));
    }

    if let Some(suffix) = pagination.suffix {
        parts.push(suffix);
    }

    Ok(parts.join(" "))
}

fn compile_aggregate(aggregate: &Aggregate, adapter: &dyn DialectAdapter) -> String {
    let argument = if aggregate.column == "*" {
        "*".to_string()
    } else {
        adapter.clean_identifier(&aggregate.column)
    };
    format!(
        "{}({}) AS {}",
        aggregate.function.name().to_ascii_uppercase(),
        argument,
        adapter.clean_identifier(&aggregate.alias())
    )
}

fn compile_insert(
    insert: &InsertStatement,
    adapter: &dyn DialectAdapter,
    params: &mut Params<'_>,
) -> Result<String, CompileError> {
    let table = compile_table_ref(&insert.table, adapter);
    if insert.rows.is_empty() {
        return Err(CompileError::InvalidDocument(
            "no documents provided for insert".into(),
        ));
    }
    if insert.columns.is_empty() {
        if insert.rows.len() > 1 {
            return Err(CompileError::InvalidDocument(
                "multiple empty documents cannot be inserted".into(),
            ));
        }
        return Ok(format!("INSERT INTO {} DEFAULT VALUES", table));
    }

    let columns: Vec<String> = insert
        .columns
        .iter()
        .map(|c| adapter.clean_identifier(c))
        .collect();

    let mut row_strs = Vec::with_capacity(insert.rows.len());
    for row in &insert.rows {
        if row.len() != columns.len() {
            return Err(CompileError::InvalidDocument(
                "all documents must contain the same fields".into(),
            ));
        }
        let vals: Vec<String> = row
            .iter()
            .map(|v| match v {
                InsertValue::Bind(value) => params.bind(value.clone()),
                InsertValue::Native(function) => adapter.date_function(*function).to_string(),
            })
            .collect();
        row_strs.push(format!("({})", vals.join(", ")));
    }

    Ok(format!(
        "INSERT INTO {} ({}) VALUES {}",
        table,
        columns.join(", "),
        row_strs.join(", ")
    ))
}

fn compile_update(
    update: &UpdateStatement,
    adapter: &dyn DialectAdapter,
    params: &mut Params<'_>,
) -> Result<String, CompileError> {
    if update.assignments.is_empty() {
        return Err(CompileError::EmptyMutation);
    }
    let table = compile_table_ref(&update.table, adapter);

    let sets: Vec<String> = update
        .assignments
        .iter()
        .map(|a| compile_assignment(a, adapter, params))
        .collect();

    let filter = match render_filter(&update.filter, adapter, params)? {
        Some(f) => format!(" WHERE {}", f),
        None => String::new(),
    };

    Ok(format!("UPDATE {} SET {}{}", table, sets.join(","), filter))
}

fn compile_assignment(
    assignment: &Assignment,
    adapter: &dyn DialectAdapter,
    params: &mut Params<'_>,
) -> String {
    let column = adapter.clean_identifier(&assignment.column);
    match &assignment.value {
        SetExpr::Value(v) => {
            let ph = params.bind(v.clone());
            format!("{}={}", column, ph)
        }
        SetExpr::Arithmetic(op, v) => {
            let ph = params.bind(v.clone());
            format!("{}={}{}{}", column, column, op.symbol(), ph)
        }
        SetExpr::Conditional(extremum, v) => {
            adapter.conditional_write(&column, *extremum, v.clone(), params)
        }
        SetExpr::Date(function) => format!("{}={}", column, adapter.date_function(*function)),
    }
}

fn compile_delete(
    delete: &DeleteStatement,
    adapter: &dyn DialectAdapter,
    params: &mut Params<'_>,
) -> Result<String, CompileError> {
    let table = compile_table_ref(&delete.table, adapter);
    let filter = match render_filter(&delete.filter, adapter, params)? {
        Some(f) => format!(" WHERE {}", f),
        None => String::new(),
    };
    Ok(format!("DELETE FROM {}{}", table, filter))
}

fn render_filter(
    filter: &Filter,
    adapter: &dyn DialectAdapter,
    params: &mut Params<'_>,
) -> Result<Option<String>, CompileError> {
    let mut rendered = Vec::with_capacity(filter.clauses.len());
    for clause in &filter.clauses {
        rendered.push(render_clause(clause, adapter, params)?);
    }
    Ok(match rendered.len() {
        0 => None,
        1 => rendered.pop(),
        _ => Some(format!("({})", rendered.join(" AND "))),
    })
}

fn render_clause(
    clause: &Clause,
    adapter: &dyn DialectAdapter,
    params: &mut Params<'_>,
) -> Result<String, CompileError> {
    match clause {
        Clause::Compare { field, op, value } => {
            let field = adapter.clean_identifier(field);
            match (op, value) {
                (Comparison::Eq, Value::Null) => Ok(format!("({} IS NULL)", field)),
                (Comparison::Ne, Value::Null) => Ok(format!("({} IS NOT NULL)", field)),
                _ => {
                    let ph = params.bind(value.clone());
                    Ok(format!("({} {} {})", field, op.symbol(), ph))
                }
            }
        }
        Clause::In {
            field,
            values,
            negated,
        } => {
            if values.is_empty() {
                // IN () is not valid SQL
                return Ok(if *negated { "(1 = 1)" } else { "(1 = 0)" }.to_string());
            }
            let field = adapter.clean_identifier(field);
            let phs: Vec<String> = values.iter().map(|v| params.bind(v.clone())).collect();
            let not = if *negated { "NOT " } else { "" };
            Ok(format!("({} {}IN ({}))", field, not, phs.join(", ")))
        }
        Clause::Contains { field, document } => {
            let field = adapter.clean_identifier(field);
            let ph = params.bind(adapter.json_argument(document));
            adapter.contains(&field, &ph)
        }
        Clause::Like { field, pattern } => {
            let field = adapter.clean_identifier(field);
            let ph = params.bind(pattern.clone());
            Ok(format!("({} LIKE {})", field, ph))
        }
        Clause::Regex { field, pattern } => {
            let field = adapter.clean_identifier(field);
            let ph = params.bind(pattern.clone());
            adapter.regex(&field, &ph)
        }
        Clause::Changes {
            field,
            extremum,
            value,
        } => {
            let field = adapter.clean_identifier(field);
            let ph = params.bind(value.clone());
            Ok(adapter.change_guard(&field, *extremum, &ph))
        }
        Clause::Or(filters) => {
            let mut groups = Vec::with_capacity(filters.len());
            for f in filters {
                groups.push(render_filter(f, adapter, params)?.unwrap_or_else(|| "(1 = 1)".into()));
            }
            Ok(match groups.len() {
                0 => "(1 = 0)".to_string(),
                1 => groups.remove(0),
                _ => format!("({})", groups.join(" OR ")),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use sqlparser::dialect::{MsSqlDialect, MySqlDialect, PostgreSqlDialect};
    use sqlparser::parser::Parser;

    fn table(ns: Option<&str>, name: &str) -> TableRef {
        TableRef {
            namespace: ns.map(String::from),
            name: name.into(),
        }
    }

    fn eq(field: &str, value: impl Into<Value>) -> Clause {
        Clause::Compare {
            field: field.into(),
            op: Comparison::Eq,
            value: value.into(),
        }
    }

    fn delete(dialect: Dialect, filter: Filter) -> CompiledStatement {
        let ns = dialect.adapter().namespaced_tables().then_some("projectName");
        let stmt = Statement::Delete(DeleteStatement {
            table: table(ns, "fooTable"),
            filter,
        });
        compile(&stmt, dialect.adapter()).unwrap()
    }

    fn parses(dialect: Dialect, sql: &str) -> bool {
        match dialect {
            Dialect::MySql => Parser::parse_sql(&MySqlDialect {}, sql).is_ok(),
            Dialect::Postgres => Parser::parse_sql(&PostgreSqlDialect {}, sql).is_ok(),
            Dialect::SqlServer => Parser::parse_sql(&MsSqlDialect {}, sql).is_ok(),
        }
    }

    fn placeholder_count(dialect: Dialect, compiled: &CompiledStatement) -> usize {
        match dialect {
            Dialect::MySql => compiled.sql.matches('?').count(),
            Dialect::Postgres => (1..=compiled.args.len() + 1)
                .filter(|n| compiled.sql.contains(&format!("${}", n)))
                .count(),
            Dialect::SqlServer => (1..=compiled.args.len() + 1)
                .filter(|n| compiled.sql.contains(&format!("@p{}", n)))
                .count(),
        }
    }

    #[test]
    fn test_delete_with_equality_per_dialect() {
        let filter = Filter::default().and(eq("String1", "1"));

        let mysql = delete(Dialect::MySql, filter.clone());
        assert_eq!(mysql.sql, "DELETE FROM fooTable WHERE (String1 = ?)");
        assert_eq!(mysql.args, vec![Value::from("1")]);

        let pg = delete(Dialect::Postgres, filter.clone());
        assert_eq!(pg.sql, "DELETE FROM projectName.fooTable WHERE (String1 = $1)");

        let mssql = delete(Dialect::SqlServer, filter);
        assert_eq!(
            mssql.sql,
            "DELETE FROM projectName.fooTable WHERE (String1 = @p1)"
        );
    }

    #[test]
    fn test_empty_filter_has_no_where() {
        for dialect in Dialect::ALL {
            let compiled = delete(dialect, Filter::default());
            assert!(!compiled.sql.contains("WHERE"), "{}", compiled.sql);
            assert!(compiled.args.is_empty());
        }
    }

    #[test]
    fn test_in_clause_single_value() {
        let filter = Filter::default().and(Clause::In {
            field: "String1".into(),
            values: vec![Value::Int(1)],
            negated: false,
        });
        let compiled = delete(Dialect::MySql, filter);
        assert_eq!(compiled.sql, "DELETE FROM fooTable WHERE (String1 IN (?))");
        assert_eq!(compiled.args, vec![Value::Int(1)]);
    }

    #[test]
    fn test_empty_in_lists() {
        let filter = Filter::default()
            .and(Clause::In {
                field: "a".into(),
                values: vec![],
                negated: false,
            })
            .and(Clause::In {
                field: "b".into(),
                values: vec![],
                negated: true,
            });
        let compiled = delete(Dialect::Postgres, filter);
        assert_eq!(
            compiled.sql,
            "DELETE FROM projectName.fooTable WHERE ((1 = 0) AND (1 = 1))"
        );
        assert!(compiled.args.is_empty());
    }

    #[test]
    fn test_or_groups() {
        let filter = Filter::default().and(Clause::Or(vec![
            Filter::default().and(eq("a", 1i64)),
            Filter::default().and(eq("b", 2i64)).and(eq("c", 3i64)),
        ]));
        let compiled = delete(Dialect::Postgres, filter);
        assert_eq!(
            compiled.sql,
            "DELETE FROM projectName.fooTable WHERE ((a = $1) OR ((b = $2) AND (c = $3)))"
        );
        assert_eq!(
            compiled.args,
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );
    }

    #[test]
    fn test_or_with_empty_member_always_matches() {
        let filter = Filter::default().and(Clause::Or(vec![
            Filter::default(),
            Filter::default().and(eq("a", 1i64)),
        ]));
        let compiled = delete(Dialect::MySql, filter);
        assert_eq!(
            compiled.sql,
            "DELETE FROM fooTable WHERE ((1 = 1) OR (a = ?))"
        );
    }

    #[test]
    fn test_null_equality_uses_is_null() {
        let filter = Filter::default()
            .and(eq("a", Value::Null))
            .and(Clause::Compare {
                field: "b".into(),
                op: Comparison::Ne,
                value: Value::Null,
            });
        let compiled = delete(Dialect::MySql, filter);
        assert_eq!(
            compiled.sql,
            "DELETE FROM fooTable WHERE ((a IS NULL) AND (b IS NOT NULL))"
        );
        assert!(compiled.args.is_empty());
    }

    #[test]
    fn test_contains_per_dialect() {
        let doc = serde_json::json!({"k": "v"});
        let filter = Filter::default().and(Clause::Contains {
            field: "Obj1".into(),
            document: doc.clone(),
        });

        let mysql = delete(Dialect::MySql, filter.clone());
        assert_eq!(mysql.sql, "DELETE FROM fooTable WHERE json_contains(Obj1,?)");
        assert_eq!(mysql.args, vec![Value::String(r#"{"k":"v"}"#.into())]);

        let pg = delete(Dialect::Postgres, filter.clone());
        assert_eq!(pg.sql, "DELETE FROM projectName.fooTable WHERE Obj1 @> $1");
        assert_eq!(pg.args, vec![Value::Json(doc)]);

        let stmt = Statement::Delete(DeleteStatement {
            table: table(Some("projectName"), "fooTable"),
            filter,
        });
        let err = compile(&stmt, Dialect::SqlServer.adapter()).unwrap_err();
        assert!(matches!(err, CompileError::Unsupported { .. }));
    }

    #[test]
    fn test_identifier_quotes_are_stripped() {
        let stmt = Statement::Delete(DeleteStatement {
            table: table(Some("[app]"), "[users]"),
            filter: Filter::default().and(eq("[id]", 1i64)),
        });
        let compiled = compile(&stmt, Dialect::SqlServer.adapter()).unwrap();
        assert_eq!(compiled.sql, "DELETE FROM app.users WHERE (id = @p1)");
    }

    #[test]
    fn test_select_pagination_per_dialect() {
        let select = |dialect: Dialect, order: bool, offset: Option<u64>| {
            let stmt = Statement::Select(SelectStatement {
                table: table(None, "t"),
                projection: Projection::All,
                filter: Filter::default().and(eq("a", 1i64)),
                group_by: vec![],
                order_by: if order {
                    vec![OrderBy {
                        column: "a".into(),
                        descending: true,
                    }]
                } else {
                    vec![]
                },
                limit: Some(10),
                offset,
            });
            compile(&stmt, dialect.adapter())
        };

        assert_eq!(
            select(Dialect::MySql, true, Some(5)).unwrap().sql,
            "SELECT * FROM t WHERE (a = ?) ORDER BY a DESC LIMIT 10 OFFSET 5"
        );
        assert_eq!(
            select(Dialect::SqlServer, false, None).unwrap().sql,
            "SELECT TOP 10 * FROM t WHERE (a = @p1)"
        );
        assert_eq!(
            select(Dialect::SqlServer, true, Some(5)).unwrap().sql,
            "SELECT * FROM t WHERE (a = @p1) ORDER BY a DESC OFFSET 5 ROWS FETCH NEXT 10 ROWS ONLY"
        );
        assert_eq!(
            select(Dialect::SqlServer, false, Some(5)).unwrap_err(),
            CompileError::SkipWithoutSort
        );
    }

    #[test]
    fn test_select_projections() {
        let base = SelectStatement {
            table: table(Some("app"), "t"),
            projection: Projection::Count,
            filter: Filter::default(),
            group_by: vec![],
            order_by: vec![],
            limit: None,
            offset: None,
        };
        let adapter = Dialect::Postgres.adapter();
        let count = compile(&Statement::Select(base.clone()), adapter).unwrap();
        assert_eq!(count.sql, "SELECT COUNT(*) FROM app.t");

        let distinct = compile(
            &Statement::Select(SelectStatement {
                projection: Projection::Distinct("city".into()),
                ..base.clone()
            }),
            adapter,
        )
        .unwrap();
        assert_eq!(distinct.sql, "SELECT DISTINCT city FROM app.t");

        let cols = compile(
            &Statement::Select(SelectStatement {
                projection: Projection::Columns(vec!["a".into(), "b".into()]),
                ..base
            }),
            adapter,
        )
        .unwrap();
        assert_eq!(cols.sql, "SELECT a, b FROM app.t");
    }

    #[test]
    fn test_distinct_precedes_top() {
        let stmt = Statement::Select(SelectStatement {
            table: table(Some("db"), "t"),
            projection: Projection::Distinct("city".into()),
            filter: Filter::default(),
            group_by: vec![],
            order_by: vec![],
            limit: Some(100),
            offset: None,
        });
        let compiled = compile(&stmt, Dialect::SqlServer.adapter()).unwrap();
        assert_eq!(compiled.sql, "SELECT DISTINCT TOP 100 city FROM db.t");
        assert!(parses(Dialect::SqlServer, &compiled.sql));
    }

    #[test]
    fn test_mysql_offset_without_limit() {
        let stmt = Statement::Select(SelectStatement {
            table: table(None, "t"),
            projection: Projection::All,
            filter: Filter::default(),
            group_by: vec![],
            order_by: vec![],
            limit: None,
            offset: Some(5),
        });
        let compiled = compile(&stmt, Dialect::MySql.adapter()).unwrap();
        assert_eq!(compiled.sql, "SELECT * FROM t LIMIT 18446744073709551615 OFFSET 5");
        assert!(parses(Dialect::MySql, &compiled.sql));

        let pg = compile(&stmt, Dialect::Postgres.adapter()).unwrap();
        assert_eq!(pg.sql, "SELECT * FROM t OFFSET 5");
    }

    #[test]
    fn test_aggregate_with_group_by() {
        let stmt = Statement::Select(SelectStatement {
            table: table(Some("app"), "orders"),
            projection: Projection::Aggregate {
                columns: vec!["country".into()],
                aggregates: vec![
                    Aggregate {
                        function: AggregateFunction::Count,
                        column: "*".into(),
                    },
                    Aggregate {
                        function: AggregateFunction::Sum,
                        column: "total".into(),
                    },
                ],
            },
            filter: Filter::default().and(eq("status", "paid")),
            group_by: vec!["country".into()],
            order_by: vec![OrderBy {
                column: "country".into(),
                descending: false,
            }],
            limit: None,
            offset: None,
        });
        let pg = compile(&stmt, Dialect::Postgres.adapter()).unwrap();
        assert_eq!(
            pg.sql,
            "SELECT country, COUNT(*) AS count, SUM(total) AS sum_total FROM app.orders \
             WHERE (status = $1) GROUP BY country ORDER BY country ASC"
        );
        assert_eq!(pg.args, vec![Value::from("paid")]);
        for dialect in Dialect::ALL {
            let compiled = compile(&stmt, dialect.adapter()).unwrap();
            assert!(parses(dialect, &compiled.sql), "{}", compiled.sql);
        }
    }

    #[test]
    fn test_change_guard_clause_per_dialect() {
        let filter = Filter::default().and(Clause::Changes {
            field: "score".into(),
            extremum: Extremum::Max,
            value: Value::Int(10),
        });
        assert_eq!(
            delete(Dialect::MySql, filter.clone()).sql,
            "DELETE FROM fooTable WHERE (score < ?)"
        );
        assert_eq!(
            delete(Dialect::Postgres, filter.clone()).sql,
            "DELETE FROM projectName.fooTable WHERE (score IS NULL OR score < $1)"
        );
        let mssql = delete(Dialect::SqlServer, filter);
        assert_eq!(
            mssql.sql,
            "DELETE FROM projectName.fooTable WHERE (score < @p1)"
        );
        assert_eq!(mssql.args, vec![Value::Int(10)]);
    }

    #[test]
    fn test_insert_multi_row_and_default_values() {
        let stmt = Statement::Insert(InsertStatement {
            table: table(None, "t"),
            columns: vec!["a".into(), "b".into()],
            rows: vec![
                vec![InsertValue::Bind(1i64.into()), InsertValue::Bind("x".into())],
                vec![
                    InsertValue::Bind(2i64.into()),
                    InsertValue::Native(DateFunction::CurrentTimestamp),
                ],
            ],
        });
        let compiled = compile(&stmt, Dialect::MySql.adapter()).unwrap();
        assert_eq!(
            compiled.sql,
            "INSERT INTO t (a, b) VALUES (?, ?), (?, CURRENT_TIMESTAMP)"
        );
        assert_eq!(compiled.args.len(), 3);

        let empty = Statement::Insert(InsertStatement {
            table: table(Some("app"), "t"),
            columns: vec![],
            rows: vec![vec![]],
        });
        let compiled = compile(&empty, Dialect::Postgres.adapter()).unwrap();
        assert_eq!(compiled.sql, "INSERT INTO app.t DEFAULT VALUES");
    }

    #[test]
    fn test_insert_without_rows_is_rejected() {
        let stmt = Statement::Insert(InsertStatement {
            table: table(None, "t"),
            columns: vec!["a".into()],
            rows: vec![],
        });
        assert!(matches!(
            compile(&stmt, Dialect::MySql.adapter()),
            Err(CompileError::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_update_set_list() {
        let stmt = Statement::Update(UpdateStatement {
            table: table(None, "t"),
            assignments: vec![
                Assignment {
                    column: "a".into(),
                    value: SetExpr::Value("x".into()),
                },
                Assignment {
                    column: "b".into(),
                    value: SetExpr::Arithmetic(Arithmetic::Add, 2i64.into()),
                },
                Assignment {
                    column: "c".into(),
                    value: SetExpr::Conditional(Extremum::Max, 5i64.into()),
                },
                Assignment {
                    column: "d".into(),
                    value: SetExpr::Date(DateFunction::CurrentDate),
                },
            ],
            filter: Filter::default().and(eq("id", 1i64)),
        });

        let mysql = compile(&stmt, Dialect::MySql.adapter()).unwrap();
        assert_eq!(
            mysql.sql,
            "UPDATE t SET a=?,b=b+?,c=GREATEST(c,?),d=CURRENT_DATE WHERE (id = ?)"
        );
        assert_eq!(mysql.args.len(), 4);

        let mssql = compile(&stmt, Dialect::SqlServer.adapter()).unwrap();
        assert_eq!(
            mssql.sql,
            "UPDATE t SET a=@p1,b=b+@p2,c=CASE WHEN @p3 > c THEN @p4 ELSE c END,d=CAST( GETDATE() AS date ) WHERE (id = @p5)"
        );
        assert_eq!(mssql.args.len(), 5);
    }

    #[test]
    fn test_placeholder_count_matches_args() {
        let filter = Filter::default()
            .and(eq("a", 1i64))
            .and(Clause::In {
                field: "b".into(),
                values: vec![1i64.into(), 2i64.into(), 3i64.into()],
                negated: true,
            })
            .and(Clause::Like {
                field: "c".into(),
                pattern: "x%".into(),
            })
            .and(Clause::Or(vec![
                Filter::default().and(eq("d", 1i64)),
                Filter::default().and(eq("e", 2i64)),
            ]));
        for dialect in Dialect::ALL {
            let compiled = delete(dialect, filter.clone());
            assert_eq!(compiled.args.len(), 7);
            assert_eq!(placeholder_count(dialect, &compiled), 7, "{}", compiled.sql);
        }
    }

    #[test]
    fn test_compile_is_idempotent() {
        let filter = Filter::default()
            .and(eq("a", 1i64))
            .and(Clause::Or(vec![Filter::default().and(eq("b", "x"))]));
        for dialect in Dialect::ALL {
            assert_eq!(delete(dialect, filter.clone()), delete(dialect, filter.clone()));
        }
    }

    #[test]
    fn test_generated_sql_parses() {
        let filter = Filter::default()
            .and(eq("a", 1i64))
            .and(Clause::In {
                field: "b".into(),
                values: vec![1i64.into(), 2i64.into()],
                negated: false,
            });
        for dialect in Dialect::ALL {
            let compiled = delete(dialect, filter.clone());
            assert!(parses(dialect, &compiled.sql), "{}", compiled.sql);

            let select = Statement::Select(SelectStatement {
                table: table(None, "t"),
                projection: Projection::Columns(vec!["a".into()]),
                filter: filter.clone(),
                group_by: vec![],
                order_by: vec![OrderBy {
                    column: "a".into(),
                    descending: false,
                }],
                limit: Some(10),
                offset: Some(2),
            });
            let compiled = compile(&select, dialect.adapter()).unwrap();
            assert!(parses(dialect, &compiled.sql), "{}", compiled.sql);

            let update = Statement::Update(UpdateStatement {
                table: table(None, "t"),
                assignments: vec![Assignment {
                    column: "c".into(),
                    value: SetExpr::Arithmetic(Arithmetic::Multiply, 2i64.into()),
                }],
                filter: filter.clone(),
            });
            let compiled = compile(&update, dialect.adapter()).unwrap();
            assert!(parses(dialect, &compiled.sql), "{}", compiled.sql);
        }
    }
}
