//! In-crate test double for [`Session`].
//!
//! `ScriptedSession` records every statement, emulates the two catalog
//! lookups from the tables and types it has seen created, and answers
//! everything else from scripted responses (empty by default). `execute`
//! reports the row count of the scripted response as affected rows.

use std::collections::BTreeSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::{DbError, Result, Value};
use crate::result::QueryResult;
use crate::session::{Session, Statement};

type Failure = Box<dyn Fn() -> DbError + Send>;

#[derive(Default)]
struct State {
    tables: BTreeSet<String>,
    types: BTreeSet<String>,
    log: Vec<Statement>,
    failures: Vec<(String, Failure)>,
    responses: Vec<(String, QueryResult)>,
    atomic_batches: usize,
}

#[derive(Default)]
pub struct ScriptedSession {
    state: Mutex<State>,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&self, name: &str) {
        self.state.lock().unwrap().tables.insert(name.to_string());
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.state.lock().unwrap().tables.contains(name)
    }

    pub fn add_type(&self, name: &str) {
        self.state.lock().unwrap().types.insert(name.to_string());
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.state.lock().unwrap().types.contains(name)
    }

    /// Every statement whose SQL contains `pattern` fails with `make()`.
    pub fn fail_on(&self, pattern: &str, make: impl Fn() -> DbError + Send + 'static) {
        self.state
            .lock()
            .unwrap()
            .failures
            .push((pattern.to_string(), Box::new(make)));
    }

    /// The next statement whose SQL contains `pattern` answers `result`.
    pub fn respond(&self, pattern: &str, result: QueryResult) {
        self.state
            .lock()
            .unwrap()
            .responses
            .push((pattern.to_string(), result));
    }

    pub fn log(&self) -> Vec<Statement> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn atomic_batches(&self) -> usize {
        self.state.lock().unwrap().atomic_batches
    }

    fn handle(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let mut state = self.state.lock().unwrap();
        state.log.push(Statement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });

        if let Some((_, make)) = state.failures.iter().find(|(p, _)| sql.contains(p.as_str())) {
            return Err(make());
        }

        if sql.contains("information_schema.tables") {
            return Ok(catalog_answer(&state.tables, params));
        }
        if sql.contains("pg_catalog.pg_type") {
            return Ok(catalog_answer(&state.types, params));
        }

        if let Some(name) = created_name(sql, "CREATE TABLE IF NOT EXISTS modmail.") {
            state.tables.insert(name);
        }
        if let Some(name) = created_name(sql, "CREATE TYPE modmail.") {
            state.types.insert(name);
        }
        if let Some((from, to)) = renamed_table(sql) {
            if state.tables.remove(&from) {
                state.tables.insert(to);
            }
        }

        if let Some(idx) = state.responses.iter().position(|(p, _)| sql.contains(p.as_str())) {
            return Ok(state.responses.remove(idx).1);
        }

        Ok(QueryResult::empty())
    }
}

fn catalog_answer(names: &BTreeSet<String>, params: &[Value]) -> QueryResult {
    let found = params
        .get(1)
        .and_then(Value::as_str)
        .is_some_and(|name| names.contains(name));

    let rows = if found { vec![vec![Value::Integer(1)]] } else { Vec::new() };
    QueryResult::new(vec!["?column?".to_string()], rows)
}

fn created_name(sql: &str, prefix: &str) -> Option<String> {
    let rest = sql.trim_start().strip_prefix(prefix)?;
    let name: String = rest
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    Some(name)
}

fn renamed_table(sql: &str) -> Option<(String, String)> {
    let rest = sql.trim_start().strip_prefix("ALTER TABLE IF EXISTS modmail.")?;
    let (from, to) = rest.split_once(" RENAME TO ")?;
    Some((from.trim().to_string(), to.trim().to_string()))
}

#[async_trait]
impl Session for ScriptedSession {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        Ok(self.handle(sql, params)?.row_count() as u64)
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.handle(sql, params)
    }

    async fn atomic(&self, statements: &[Statement]) -> Result<QueryResult> {
        self.state.lock().unwrap().atomic_batches += 1;

        let mut last = QueryResult::empty();
        for statement in statements {
            last = self.handle(&statement.sql, &statement.params)?;
        }
        Ok(last)
    }
}

/// A single-column result, one row per value.
pub fn column(name: &str, values: Vec<Value>) -> QueryResult {
    QueryResult::new(
        vec![name.to_string()],
        values.into_iter().map(|v| vec![v]).collect(),
    )
}
