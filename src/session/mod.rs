//! The backing-store seam.
//!
//! Every component receives one shared `Arc<dyn Session>`. Statements are
//! always parameterized; structural identifiers in the SQL text come from
//! code-defined constants, never from caller input.

pub mod postgres;

use async_trait::async_trait;

use crate::core::{Result, Value};
use crate::result::QueryResult;

pub use postgres::PgSession;

/// A parameterized statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }
}

#[async_trait]
pub trait Session: Send + Sync {
    /// Runs a statement and returns the number of affected rows.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Runs a statement and returns its rows.
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Runs all statements as one transaction and returns the rows of the
    /// last one. Either every statement commits or none does.
    async fn atomic(&self, statements: &[Statement]) -> Result<QueryResult>;

    async fn run(&self, statement: &Statement) -> Result<u64> {
        self.execute(&statement.sql, &statement.params).await
    }
}
