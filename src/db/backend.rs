use async_trait::async_trait;
use serde_json::{Map, Value as Json};

use crate::ast::types::Value;
use crate::error::ExecutionError;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub type_name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<Value>>,
    /// Set for statements that return no rows.
    pub affected_rows: Option<u64>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_affected(affected: u64) -> Self {
        Self {
            affected_rows: Some(affected),
            ..Self::default()
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Column position, matched case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Rows as JSON objects keyed by column name.
    pub fn to_documents(&self) -> Vec<Json> {
        self.rows
            .iter()
            .map(|row| {
                let doc: Map<String, Json> = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(col, value)| (col.name.clone(), value.to_json()))
                    .collect();
                Json::Object(doc)
            })
            .collect()
    }
}

/// A database the engine can run compiled statements against.
///
/// Arguments are positional and already ordered to match the placeholders
/// of the statement text.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn Transaction>, ExecutionError>;

    /// Run a statement and return the affected-row count.
    async fn execute(&self, sql: &str, args: &[Value]) -> Result<u64, ExecutionError>;

    async fn query(&self, sql: &str, args: &[Value]) -> Result<QueryResult, ExecutionError>;

    async fn ping(&self) -> Result<(), ExecutionError>;

    async fn close(&self);
}

/// An open transaction. Dropping it without commit or rollback rolls back.
#[async_trait]
pub trait Transaction: Send {
    async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<u64, ExecutionError>;

    async fn query(&mut self, sql: &str, args: &[Value]) -> Result<QueryResult, ExecutionError>;

    async fn commit(self: Box<Self>) -> Result<(), ExecutionError>;

    async fn rollback(self: Box<Self>) -> Result<(), ExecutionError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory backend that records every call.

    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::ErrorCategory;

    #[derive(Default)]
    pub struct Script {
        pub log: Vec<String>,
        pub fail_begin: bool,
        pub fail_commit: bool,
        pub fail_rollback: bool,
        pub fail_ping: bool,
        /// Statements containing this text fail.
        pub fail_on: Option<String>,
        /// Affected counts handed out in order; 1 when exhausted.
        pub affected: VecDeque<u64>,
        /// Query results handed out in order; empty when exhausted.
        pub results: VecDeque<QueryResult>,
        pub closed: bool,
    }

    #[derive(Clone, Default)]
    pub struct RecordingBackend {
        pub script: Arc<Mutex<Script>>,
    }

    impl RecordingBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(configure: impl FnOnce(&mut Script)) -> Self {
            let backend = Self::new();
            configure(&mut backend.script.lock().unwrap());
            backend
        }

        pub fn log(&self) -> Vec<String> {
            self.script.lock().unwrap().log.clone()
        }

        pub fn closed(&self) -> bool {
            self.script.lock().unwrap().closed
        }

        fn record(&self, prefix: &str, sql: &str, args: &[Value]) -> Result<(), ExecutionError> {
            let mut script = self.script.lock().unwrap();
            script.log.push(format!("{} {} {:?}", prefix, sql, args));
            match &script.fail_on {
                Some(needle) if sql.contains(needle.as_str()) => Err(ExecutionError::with_code(
                    "23505",
                    format!("statement failed: {}", sql),
                )),
                _ => Ok(()),
            }
        }

        fn run_execute(&self, prefix: &str, sql: &str, args: &[Value]) -> Result<u64, ExecutionError> {
            self.record(prefix, sql, args)?;
            Ok(self.script.lock().unwrap().affected.pop_front().unwrap_or(1))
        }

        fn run_query(
            &self,
            prefix: &str,
            sql: &str,
            args: &[Value],
        ) -> Result<QueryResult, ExecutionError> {
            self.record(prefix, sql, args)?;
            Ok(self
                .script
                .lock()
                .unwrap()
                .results
                .pop_front()
                .unwrap_or_default())
        }
    }

    pub struct RecordingTransaction {
        backend: RecordingBackend,
    }

    #[async_trait]
    impl Backend for RecordingBackend {
        async fn begin(&self) -> Result<Box<dyn Transaction>, ExecutionError> {
            let mut script = self.script.lock().unwrap();
            script.log.push("BEGIN".into());
            if script.fail_begin {
                return Err(ExecutionError::new(
                    ErrorCategory::Connection,
                    "connection refused",
                ));
            }
            Ok(Box::new(RecordingTransaction {
                backend: self.clone(),
            }))
        }

        async fn execute(&self, sql: &str, args: &[Value]) -> Result<u64, ExecutionError> {
            self.run_execute("EXEC", sql, args)
        }

        async fn query(&self, sql: &str, args: &[Value]) -> Result<QueryResult, ExecutionError> {
            self.run_query("QUERY", sql, args)
        }

        async fn ping(&self) -> Result<(), ExecutionError> {
            let mut script = self.script.lock().unwrap();
            script.log.push("PING".into());
            if script.fail_ping {
                return Err(ExecutionError::new(ErrorCategory::Connection, "broken pipe"));
            }
            Ok(())
        }

        async fn close(&self) {
            let mut script = self.script.lock().unwrap();
            script.log.push("CLOSE".into());
            script.closed = true;
        }
    }

    #[async_trait]
    impl Transaction for RecordingTransaction {
        async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<u64, ExecutionError> {
            self.backend.run_execute("TX EXEC", sql, args)
        }

        async fn query(&mut self, sql: &str, args: &[Value]) -> Result<QueryResult, ExecutionError> {
            self.backend.run_query("TX QUERY", sql, args)
        }

        async fn commit(self: Box<Self>) -> Result<(), ExecutionError> {
            let mut script = self.backend.script.lock().unwrap();
            script.log.push("COMMIT".into());
            if script.fail_commit {
                return Err(ExecutionError::with_code("40001", "could not serialize access"));
            }
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> Result<(), ExecutionError> {
            let mut script = self.backend.script.lock().unwrap();
            script.log.push("ROLLBACK".into());
            if script.fail_rollback {
                return Err(ExecutionError::new(ErrorCategory::Connection, "connection lost"));
            }
            Ok(())
        }
    }

    /// Single-row, text-only result for catalog fixtures.
    pub fn text_rows(columns: &[&str], rows: &[&[&str]]) -> QueryResult {
        QueryResult {
            columns: columns
                .iter()
                .map(|c| ColumnInfo {
                    name: c.to_string(),
                    type_name: "text".into(),
                })
                .collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|v| Value::from(*v)).collect())
                .collect(),
            affected_rows: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> QueryResult {
        QueryResult {
            columns: vec![
                ColumnInfo {
                    name: "COLUMN_NAME".into(),
                    type_name: "text".into(),
                },
                ColumnInfo {
                    name: "size".into(),
                    type_name: "int4".into(),
                },
            ],
            rows: vec![vec![Value::from("id"), Value::Int(4)]],
            affected_rows: None,
        }
    }

    #[test]
    fn test_get_is_case_insensitive() {
        let result = sample();
        assert_eq!(result.get(0, "column_name"), Some(&Value::from("id")));
        assert_eq!(result.get(0, "SIZE"), Some(&Value::Int(4)));
        assert_eq!(result.get(0, "missing"), None);
        assert_eq!(result.get(1, "size"), None);
    }

    #[test]
    fn test_to_documents() {
        let docs = sample().to_documents();
        assert_eq!(docs, vec![serde_json::json!({"COLUMN_NAME": "id", "size": 4})]);
    }

    #[test]
    fn test_empty_result() {
        let r = QueryResult::empty();
        assert!(r.columns.is_empty());
        assert_eq!(r.row_count(), 0);
        assert!(r.affected_rows.is_none());
        assert_eq!(QueryResult::with_affected(3).affected_rows, Some(3));
    }
}
