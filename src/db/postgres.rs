use std::error::Error as StdError;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use deadpool_postgres::{Object, Pool, PoolError};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::Row;
use tracing::warn;
use uuid::Uuid;

use super::backend::{Backend, ColumnInfo, QueryResult, Transaction};
use crate::ast::types::Value;
use crate::error::{ErrorCategory, ExecutionError};

type BoxError = Box<dyn StdError + Sync + Send>;

type FinishFuture<'c> = Pin<Box<dyn Future<Output = Result<(), ExecutionError>> + Send + 'c>>;

/// Pooled PostgreSQL backend.
pub struct PgBackend {
    pool: Pool,
}

impl PgBackend {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn client(&self) -> Result<Object, ExecutionError> {
        self.pool.get().await.map_err(pool_error)
    }
}

#[async_trait]
impl Backend for PgBackend {
    async fn begin(&self) -> Result<Box<dyn Transaction>, ExecutionError> {
        let client = self.client().await?;
        client.batch_execute("BEGIN").await?;
        Ok(Box::new(PgTransaction {
            client: Some(client),
        }))
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> Result<u64, ExecutionError> {
        let client = self.client().await?;
        execute_on(&client, sql, args).await
    }

    async fn query(&self, sql: &str, args: &[Value]) -> Result<QueryResult, ExecutionError> {
        let client = self.client().await?;
        query_on(&client, sql, args).await
    }

    async fn ping(&self) -> Result<(), ExecutionError> {
        let client = self.client().await?;
        client.simple_query("SELECT 1").await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close();
    }
}

/// Transaction pinned to one pooled connection.
pub struct PgTransaction {
    client: Option<Object>,
}

impl PgTransaction {
    fn client(&self) -> Result<&Object, ExecutionError> {
        self.client.as_ref().ok_or_else(|| {
            ExecutionError::new(ErrorCategory::Transaction, "transaction already finished")
        })
    }

    async fn finish(&mut self, statement: &'static str) -> Result<(), ExecutionError> {
        finish_on(&mut self.client, move |client| {
            Box::pin(async move {
                client
                    .batch_execute(statement)
                    .await
                    .map_err(ExecutionError::from)
            })
        })
        .await
    }
}

/// Run the final statement of a transaction, releasing the connection only
/// once it succeeds. A cancelled or failed run leaves it in `slot` for the
/// drop guard.
async fn finish_on<C, F>(slot: &mut Option<C>, run: F) -> Result<(), ExecutionError>
where
    F: for<'c> FnOnce(&'c C) -> FinishFuture<'c>,
{
    let client = slot.as_ref().ok_or_else(|| {
        ExecutionError::new(ErrorCategory::Transaction, "transaction already finished")
    })?;
    run(client).await?;
    *slot = None;
    Ok(())
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<u64, ExecutionError> {
        execute_on(self.client()?, sql, args).await
    }

    async fn query(&mut self, sql: &str, args: &[Value]) -> Result<QueryResult, ExecutionError> {
        query_on(self.client()?, sql, args).await
    }

    async fn commit(mut self: Box<Self>) -> Result<(), ExecutionError> {
        self.finish("COMMIT").await
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), ExecutionError> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for PgTransaction {
    fn drop(&mut self) {
        // Cancelled mid-transaction: roll back before the connection is reused.
        if let Some(client) = self.client.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = client.batch_execute("ROLLBACK").await {
                        warn!(error = %e, "rollback of abandoned transaction failed");
                    }
                });
            }
        }
    }
}

fn params(args: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    args.iter().map(|a| a as &(dyn ToSql + Sync)).collect()
}

async fn execute_on(client: &Object, sql: &str, args: &[Value]) -> Result<u64, ExecutionError> {
    let statement = client.prepare_cached(sql).await?;
    Ok(client.execute(&statement, &params(args)).await?)
}

async fn query_on(client: &Object, sql: &str, args: &[Value]) -> Result<QueryResult, ExecutionError> {
    let statement = client.prepare_cached(sql).await?;
    if statement.columns().is_empty() {
        let affected = client.execute(&statement, &params(args)).await?;
        return Ok(QueryResult::with_affected(affected));
    }

    let columns: Vec<ColumnInfo> = statement
        .columns()
        .iter()
        .map(|col| ColumnInfo {
            name: col.name().to_string(),
            type_name: col.type_().name().to_string(),
        })
        .collect();
    let rows = client.query(&statement, &params(args)).await?;
    Ok(QueryResult {
        columns,
        rows: rows.iter().map(parse_row).collect(),
        affected_rows: None,
    })
}

fn parse_row(row: &Row) -> Vec<Value> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| extract_value(row, i, col.type_()))
        .collect()
}

fn extract_value(row: &Row, idx: usize, pg_type: &Type) -> Value {
    match *pg_type {
        Type::BOOL => row
            .try_get::<_, Option<bool>>(idx)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)
            .ok()
            .flatten()
            .map(|i| Value::Int(i.into()))
            .unwrap_or(Value::Null),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)
            .ok()
            .flatten()
            .map(|i| Value::Int(i.into()))
            .unwrap_or(Value::Null),
        Type::INT8 => row
            .try_get::<_, Option<i64>>(idx)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)
            .ok()
            .flatten()
            .map(|f| Value::Float(f.into()))
            .unwrap_or(Value::Null),
        Type::FLOAT8 => row
            .try_get::<_, Option<f64>>(idx)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),
        Type::BYTEA => row
            .try_get::<_, Option<Vec<u8>>>(idx)
            .ok()
            .flatten()
            .map(|b| Value::String(String::from_utf8_lossy(&b).into_owned()))
            .unwrap_or(Value::Null),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)
            .ok()
            .flatten()
            .map(|d| Value::String(d.to_string()))
            .unwrap_or(Value::Null),
        Type::TIME => row
            .try_get::<_, Option<NaiveTime>>(idx)
            .ok()
            .flatten()
            .map(|t| Value::String(t.to_string()))
            .unwrap_or(Value::Null),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)
            .ok()
            .flatten()
            .map(|dt| Value::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
            .unwrap_or(Value::Null),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)
            .ok()
            .flatten()
            .map(|dt| Value::String(dt.to_rfc3339()))
            .unwrap_or(Value::Null),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<serde_json::Value>>(idx)
            .ok()
            .flatten()
            .map(Value::Json)
            .unwrap_or(Value::Null),
        Type::NUMERIC => row
            .try_get::<_, Option<Decimal>>(idx)
            .ok()
            .flatten()
            .map(numeric_value)
            .unwrap_or(Value::Null),
        Type::UUID => row
            .try_get::<_, Option<Uuid>>(idx)
            .ok()
            .flatten()
            .map(|u| Value::String(u.to_string()))
            .unwrap_or(Value::Null),
        _ => {
            // Fallback: text-like types
            row.try_get::<_, Option<String>>(idx)
                .ok()
                .flatten()
                .map(Value::String)
                .unwrap_or(Value::Null)
        }
    }
}

/// Integral NUMERIC values that fit become `Int`; the rest keep their exact text.
fn numeric_value(d: Decimal) -> Value {
    if d.fract().is_zero() {
        if let Some(i) = d.to_i64() {
            return Value::Int(i);
        }
    }
    Value::String(d.to_string())
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => match *ty {
                Type::BOOL => b.to_sql(ty, out),
                Type::INT2 | Type::INT4 | Type::INT8 => Value::Int(i64::from(*b)).to_sql(ty, out),
                _ => b.to_string().to_sql(ty, out),
            },
            Value::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                Type::INT8 => i.to_sql(ty, out),
                Type::FLOAT4 => (*i as f32).to_sql(ty, out),
                Type::FLOAT8 => (*i as f64).to_sql(ty, out),
                Type::BOOL => (*i != 0).to_sql(ty, out),
                Type::JSON | Type::JSONB => serde_json::Value::from(*i).to_sql(ty, out),
                Type::NUMERIC => Decimal::from(*i).to_sql(ty, out),
                _ => i.to_string().to_sql(ty, out),
            },
            Value::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                Type::FLOAT8 => f.to_sql(ty, out),
                Type::JSON | Type::JSONB => serde_json::Value::from(*f).to_sql(ty, out),
                Type::NUMERIC => Decimal::try_from(*f)?.to_sql(ty, out),
                _ => f.to_string().to_sql(ty, out),
            },
            Value::String(s) => match *ty {
                Type::TIMESTAMPTZ => DateTime::parse_from_rfc3339(s)?
                    .with_timezone(&Utc)
                    .to_sql(ty, out),
                Type::TIMESTAMP => parse_naive_datetime(s)?.to_sql(ty, out),
                Type::DATE => NaiveDate::parse_from_str(s, "%Y-%m-%d")?.to_sql(ty, out),
                Type::JSON | Type::JSONB => {
                    serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out)
                }
                Type::INT2 => s.parse::<i16>()?.to_sql(ty, out),
                Type::INT4 => s.parse::<i32>()?.to_sql(ty, out),
                Type::INT8 => s.parse::<i64>()?.to_sql(ty, out),
                Type::FLOAT4 => s.parse::<f32>()?.to_sql(ty, out),
                Type::FLOAT8 => s.parse::<f64>()?.to_sql(ty, out),
                Type::BOOL => s.parse::<bool>()?.to_sql(ty, out),
                Type::NUMERIC => Decimal::from_str(s)?.to_sql(ty, out),
                Type::UUID => Uuid::parse_str(s)?.to_sql(ty, out),
                _ => s.as_str().to_sql(ty, out),
            },
            Value::Json(j) => match *ty {
                Type::JSON | Type::JSONB => j.to_sql(ty, out),
                _ => j.to_string().to_sql(ty, out),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn parse_naive_datetime(s: &str) -> Result<NaiveDateTime, BoxError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .map_err(Into::into)
}

impl From<tokio_postgres::Error> for ExecutionError {
    fn from(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            ExecutionError::with_code(db_err.code().code(), db_err.message())
        } else {
            // Non-database error (connection, protocol, etc.)
            let category = if err.source().is_some() || err.is_closed() {
                ErrorCategory::Connection
            } else {
                ErrorCategory::Unknown
            };
            ExecutionError::new(category, err.to_string())
        }
    }
}

fn pool_error(err: PoolError) -> ExecutionError {
    match err {
        PoolError::Backend(e) => e.into(),
        other => ExecutionError::new(ErrorCategory::Connection, other.to_string()),
    }
}
