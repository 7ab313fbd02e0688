//! Engine entry points: compile a request, then run it on the backend.
//!
//! Single creates and deletes are one auto-committed statement. Updates,
//! upserts and batches run inside a transaction that is committed only when
//! every step succeeded and is rolled back explicitly on every other exit.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::backend::{Backend, QueryResult, Transaction};
use crate::ast::builder::{StatementBuilder, UpsertPlan};
use crate::ast::types::CompiledStatement;
use crate::dialect::Dialect;
use crate::error::{BatchFailure, Error, ExecutionError, Result, TxStage};
use crate::model::{
    BatchItem, BatchRequest, CreateRequest, DeleteRequest, Operation, ReadOperation, ReadRequest,
    ReadResult, UpdateOperation, UpdateRequest,
};

enum UpdatePlan {
    All(CompiledStatement),
    Upsert(UpsertPlan),
}

/// Dialect-bound CRUD engine over a shared backend.
///
/// Holds no mutable state; share it behind an `Arc` across tasks.
pub struct SqlEngine {
    pub(super) backend: Arc<dyn Backend>,
    pub(super) builder: StatementBuilder,
    pub(super) statement_timeout: Option<Duration>,
}

impl SqlEngine {
    pub fn new(backend: Arc<dyn Backend>, dialect: Dialect, database: impl Into<String>) -> Self {
        Self {
            backend,
            builder: StatementBuilder::new(dialect, database),
            statement_timeout: None,
        }
    }

    pub fn with_fetch_limit(mut self, limit: Option<u64>) -> Self {
        self.builder = self.builder.with_fetch_limit(limit);
        self
    }

    pub fn with_statement_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.statement_timeout = timeout;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.builder.dialect()
    }

    pub fn builder(&self) -> &StatementBuilder {
        &self.builder
    }

    /// Await a backend call under the statement timeout.
    pub(super) async fn timed<T, F>(
        &self,
        call: F,
        map_err: impl FnOnce(ExecutionError) -> Error,
    ) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, ExecutionError>>,
    {
        let outcome = match self.statement_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => call.await,
        };
        outcome.map_err(map_err)
    }

    pub(super) async fn begin(&self) -> Result<Box<dyn Transaction>> {
        self.timed(self.backend.begin(), |e| Error::transaction(TxStage::Begin, e))
            .await
    }

    /// Commit on success, roll back on failure.
    pub(super) async fn finish<T>(&self, tx: Box<dyn Transaction>, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => {
                self.timed(tx.commit(), |e| Error::transaction(TxStage::Commit, e))
                    .await?;
                Ok(value)
            }
            Err(err) => {
                rollback(tx).await;
                Err(err)
            }
        }
    }

    /// Insert one document or an array of documents.
    pub async fn create(&self, table: &str, req: &CreateRequest) -> Result<u64> {
        let stmt = self.builder.create(table, req)?;
        self.timed(self.backend.execute(&stmt.sql, &stmt.args), Error::from)
            .await
    }

    pub async fn read(&self, table: &str, req: &ReadRequest) -> Result<ReadResult> {
        let stmt = self.builder.read(table, req)?;
        let result = self
            .timed(self.backend.query(&stmt.sql, &stmt.args), Error::from)
            .await?;

        match req.operation {
            ReadOperation::Count => Ok(ReadResult {
                count: first_count(&result),
                documents: vec![],
            }),
            ReadOperation::One if result.rows.is_empty() => {
                Err(Error::DocumentNotFound(table.to_string()))
            }
            _ => Ok(ReadResult {
                count: result.row_count() as u64,
                documents: result.to_documents(),
            }),
        }
    }

    /// Update (or upsert) in its own transaction.
    pub async fn update(&self, table: &str, req: &UpdateRequest) -> Result<u64> {
        let plan = self.plan_update(table, req)?;
        let mut tx = self.begin().await?;
        let outcome = self.apply_update(tx.as_mut(), &plan).await;
        self.finish(tx, outcome).await
    }

    pub async fn delete(&self, table: &str, req: &DeleteRequest) -> Result<u64> {
        let stmt = self.builder.delete(table, req)?;
        self.timed(self.backend.execute(&stmt.sql, &stmt.args), Error::from)
            .await
    }

    /// Run every item in order on one transaction.
    ///
    /// The returned counts are index-aligned with `req.requests`. On failure
    /// the transaction is rolled back and the counts gathered so far travel
    /// with the error.
    pub async fn batch(&self, req: &BatchRequest) -> std::result::Result<Vec<u64>, BatchFailure> {
        let mut counts = vec![0; req.requests.len()];
        if req.requests.is_empty() {
            return Ok(counts);
        }

        let mut tx = match self.begin().await {
            Ok(tx) => tx,
            Err(error) => return Err(BatchFailure { counts, error }),
        };

        for (idx, item) in req.requests.iter().enumerate() {
            match self.run_item(tx.as_mut(), item).await {
                Ok(affected) => counts[idx] = affected,
                Err(error) => {
                    debug!(index = idx, table = %item.table, error = %error, "batch item failed");
                    rollback(tx).await;
                    return Err(BatchFailure { counts, error });
                }
            }
        }

        match self
            .timed(tx.commit(), |e| Error::transaction(TxStage::Commit, e))
            .await
        {
            Ok(()) => Ok(counts),
            Err(error) => Err(BatchFailure { counts, error }),
        }
    }

    async fn run_item(&self, tx: &mut dyn Transaction, item: &BatchItem) -> Result<u64> {
        match &item.operation {
            Operation::Create(req) => {
                let stmt = self.builder.create(&item.table, req)?;
                self.execute_in(tx, &stmt).await
            }
            Operation::Update(req) => {
                let plan = self.plan_update(&item.table, req)?;
                self.apply_update(tx, &plan).await
            }
            Operation::Delete(req) => {
                let stmt = self.builder.delete(&item.table, req)?;
                self.execute_in(tx, &stmt).await
            }
        }
    }

    fn plan_update(&self, table: &str, req: &UpdateRequest) -> Result<UpdatePlan> {
        Ok(match req.operation {
            UpdateOperation::All => UpdatePlan::All(self.builder.update(table, req)?),
            UpdateOperation::Upsert => UpdatePlan::Upsert(self.builder.upsert(table, req)?),
        })
    }

    async fn apply_update(&self, tx: &mut dyn Transaction, plan: &UpdatePlan) -> Result<u64> {
        match plan {
            UpdatePlan::All(stmt) => self.execute_in(tx, stmt).await,
            UpdatePlan::Upsert(plan) => {
                let existing = self
                    .timed(tx.query(&plan.count.sql, &plan.count.args), Error::from)
                    .await?;
                if first_count(&existing) == 0 {
                    self.execute_in(tx, &plan.insert).await
                } else {
                    self.execute_in(tx, &plan.update).await
                }
            }
        }
    }

    pub(super) async fn execute_in(
        &self,
        tx: &mut dyn Transaction,
        stmt: &CompiledStatement,
    ) -> Result<u64> {
        self.timed(tx.execute(&stmt.sql, &stmt.args), Error::from)
            .await
    }
}

pub(super) async fn rollback(tx: Box<dyn Transaction>) {
    if let Err(e) = tx.rollback().await {
        let error = Error::transaction(TxStage::Rollback, e);
        warn!(%error, "keeping the original failure");
    }
}

fn first_count(result: &QueryResult) -> u64 {
    result
        .rows
        .first()
        .and_then(|row| row.first())
        .and_then(|v| v.as_i64())
        .map(|n| n.max(0) as u64)
        .unwrap_or(0)
}
