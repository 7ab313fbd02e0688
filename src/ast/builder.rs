//! Request → statement construction for one dialect and namespace.

use super::compiler::compile;
use super::mutation::{build_update, Mutation};
use super::parser::{convert_value, parse_documents, parse_filter, parse_mutation};
use super::types::*;
use crate::dialect::{Dialect, DialectAdapter};
use crate::error::CompileError;
use crate::model::{CreateRequest, DeleteRequest, ReadOperation, ReadRequest, UpdateRequest};

/// Statements an upsert may run, all compiled before any I/O.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertPlan {
    pub count: CompiledStatement,
    pub insert: CompiledStatement,
    pub update: CompiledStatement,
}

#[derive(Debug, Clone)]
pub struct StatementBuilder {
    dialect: Dialect,
    namespace: String,
    fetch_limit: Option<u64>,
}

impl StatementBuilder {
    pub fn new(dialect: Dialect, namespace: impl Into<String>) -> Self {
        Self {
            dialect,
            namespace: namespace.into(),
            fetch_limit: None,
        }
    }

    /// Default row limit for `all`/`distinct` reads that give none.
    pub fn with_fetch_limit(mut self, limit: Option<u64>) -> Self {
        self.fetch_limit = limit;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn adapter(&self) -> &'static dyn DialectAdapter {
        self.dialect.adapter()
    }

    pub fn table(&self, name: &str) -> TableRef {
        TableRef {
            namespace: self
                .adapter()
                .namespaced_tables()
                .then(|| self.namespace.clone()),
            name: name.to_string(),
        }
    }

    pub fn compile(&self, statement: &Statement) -> Result<CompiledStatement, CompileError> {
        compile(statement, self.adapter())
    }

    pub fn create(&self, table: &str, req: &CreateRequest) -> Result<CompiledStatement, CompileError> {
        let documents = parse_documents(&req.document)?;
        let columns: Vec<String> = documents
            .first()
            .map(|doc| doc.keys().cloned().collect())
            .unwrap_or_default();

        let mut rows = Vec::with_capacity(documents.len());
        for doc in &documents {
            if doc.len() != columns.len() || !columns.iter().all(|c| doc.contains_key(c)) {
                return Err(CompileError::InvalidDocument(
                    "all documents must contain the same fields".into(),
                ));
            }
            rows.push(
                columns
                    .iter()
                    .filter_map(|c| doc.get(c))
                    .map(|v| InsertValue::Bind(self.bind_value(convert_value(v))))
                    .collect(),
            );
        }

        self.compile(&Statement::Insert(InsertStatement {
            table: self.table(table),
            columns,
            rows,
        }))
    }

    pub fn read(&self, table: &str, req: &ReadRequest) -> Result<CompiledStatement, CompileError> {
        let filter = parse_filter(&req.find)?;
        let options = &req.options;

        let columns: Vec<String> = options
            .select
            .as_ref()
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default();
        let order_by: Vec<OrderBy> = options
            .sort
            .iter()
            .map(|key| match key.strip_prefix('-') {
                Some(column) => OrderBy {
                    column: column.to_string(),
                    descending: true,
                },
                None => OrderBy {
                    column: key.to_string(),
                    descending: false,
                },
            })
            .collect();

        let aggregates = parse_aggregates(req)?;
        let select = match req.operation {
            ReadOperation::Count => SelectStatement {
                table: self.table(table),
                projection: Projection::Count,
                filter,
                group_by: vec![],
                order_by: vec![],
                limit: None,
                offset: None,
            },
            ReadOperation::Distinct => {
                let column = options.distinct.clone().ok_or_else(|| {
                    CompileError::InvalidDocument("distinct read requires a distinct column".into())
                })?;
                SelectStatement {
                    table: self.table(table),
                    projection: Projection::Distinct(column),
                    filter,
                    group_by: vec![],
                    order_by,
                    limit: options.limit.or(self.fetch_limit),
                    offset: options.skip,
                }
            }
            ReadOperation::One | ReadOperation::All => SelectStatement {
                table: self.table(table),
                projection: if aggregates.is_empty() {
                    Projection::Columns(columns)
                } else {
                    Projection::Aggregate {
                        columns,
                        aggregates,
                    }
                },
                filter,
                group_by: req.group_by.clone(),
                order_by,
                limit: if req.operation == ReadOperation::One {
                    Some(1)
                } else {
                    options.limit.or(self.fetch_limit)
                },
                offset: options.skip,
            },
        };
        self.compile(&Statement::Select(select))
    }

    /// Compile a plain (`all`) update.
    pub fn update(&self, table: &str, req: &UpdateRequest) -> Result<CompiledStatement, CompileError> {
        let filter = parse_filter(&req.find)?;
        let mutation = parse_mutation(&req.update)?;
        self.compile_update(table, filter, &mutation)
    }

    pub fn upsert(&self, table: &str, req: &UpdateRequest) -> Result<UpsertPlan, CompileError> {
        let filter = parse_filter(&req.find)?;
        let mutation = parse_mutation(&req.update)?;

        let count = self.compile(&Statement::Select(SelectStatement {
            table: self.table(table),
            projection: Projection::Count,
            filter: filter.clone(),
            group_by: vec![],
            order_by: vec![],
            limit: None,
            offset: None,
        }))?;

        let (columns, row) = mutation.upsert_row(&filter);
        let row = row
            .into_iter()
            .map(|v| match v {
                InsertValue::Bind(value) => InsertValue::Bind(self.bind_value(value)),
                native => native,
            })
            .collect();
        let insert = self.compile(&Statement::Insert(InsertStatement {
            table: self.table(table),
            columns,
            rows: vec![row],
        }))?;

        let update = self.compile_update(table, filter, &mutation)?;
        Ok(UpsertPlan {
            count,
            insert,
            update,
        })
    }

    pub fn delete(&self, table: &str, req: &DeleteRequest) -> Result<CompiledStatement, CompileError> {
        let filter = parse_filter(&req.find)?;
        self.compile(&Statement::Delete(DeleteStatement {
            table: self.table(table),
            filter,
        }))
    }

    fn compile_update(
        &self,
        table: &str,
        filter: Filter,
        mutation: &Mutation,
    ) -> Result<CompiledStatement, CompileError> {
        let mut update = build_update(self.table(table), filter, mutation);
        for assignment in &mut update.assignments {
            if let SetExpr::Value(value) = &mut assignment.value {
                *value = self.bind_value(std::mem::replace(value, Value::Null));
            }
        }
        self.compile(&Statement::Update(update))
    }

    /// Nested documents are written in the dialect's JSON bind form.
    fn bind_value(&self, value: Value) -> Value {
        match value {
            Value::Json(doc) => self.adapter().json_argument(&doc),
            other => other,
        }
    }
}

/// Aggregate projections and grouping only apply to `all` reads.
fn parse_aggregates(req: &ReadRequest) -> Result<Vec<Aggregate>, CompileError> {
    if req.aggregate.is_empty() && req.group_by.is_empty() {
        return Ok(Vec::new());
    }
    if req.operation != ReadOperation::All {
        return Err(CompileError::InvalidDocument(
            "aggregate and group can only be used with the all operation".into(),
        ));
    }
    let mut aggregates = Vec::new();
    for (name, columns) in &req.aggregate {
        let function = AggregateFunction::from_name(name)
            .ok_or_else(|| CompileError::UnknownOperator(name.clone()))?;
        for column in columns {
            if column == "*" && function != AggregateFunction::Count {
                return Err(CompileError::InvalidDocument(format!(
                    "{} requires a column name",
                    name
                )));
            }
            aggregates.push(Aggregate {
                function,
                column: column.clone(),
            });
        }
    }
    Ok(aggregates)
}
