use tracing::{info, warn};

use super::backend::QueryResult;
use super::executor::SqlEngine;
use crate::ast::types::Value;
use crate::dialect::is_valid_identifier;
use crate::error::{Error, Result};

impl SqlEngine {
    /// One lightweight round trip. A failed ping closes the backend.
    pub async fn ping(&self) -> bool {
        match self.timed(self.backend.ping(), Error::from).await {
            Ok(_) => true,
            Err(e) => {
                warn!(dialect = %self.dialect(), error = %e, "ping failed, closing backend");
                self.backend.close().await;
                false
            }
        }
    }

    /// Create the logical database (MySQL) or schema if it is missing.
    pub async fn create_database_if_not_exist(&self, name: &str) -> Result<()> {
        if !is_valid_identifier(name) {
            return Err(Error::Config(format!(
                "invalid database name ({}): expected [A-Za-z_][A-Za-z0-9_]*",
                name
            )));
        }
        let sql = self.builder.adapter().create_database(name);
        self.timed(self.backend.execute(&sql, &[]), Error::from)
            .await?;
        info!(dialect = %self.dialect(), database = name, "ensured database exists");
        Ok(())
    }

    /// Run `statements` in one transaction, all or nothing.
    pub async fn raw_batch(&self, statements: &[String]) -> Result<()> {
        if statements.is_empty() {
            return Ok(());
        }
        let mut tx = self.begin().await?;
        let mut outcome = Ok(());
        for sql in statements {
            if let Err(e) = self.timed(tx.execute(sql, &[]), Error::from).await {
                outcome = Err(e);
                break;
            }
        }
        self.finish(tx, outcome).await
    }

    /// Run one statement with positional args.
    ///
    /// Row-returning statements yield their rows; others yield only the
    /// affected-row count.
    pub async fn raw_query(&self, sql: &str, args: &[Value]) -> Result<QueryResult> {
        self.timed(self.backend.query(sql, args), Error::from)
            .await
    }
}
