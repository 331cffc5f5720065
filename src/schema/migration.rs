use std::collections::HashSet;

use tracing::{Level, event};

use crate::core::{DbError, Result};
use crate::session::{Session, Statement};

/// One named, idempotent, forward-only migration step.
///
/// Every statement must be safe to repeat (`IF NOT EXISTS`, guarded `DO`
/// blocks, updates whose predicate excludes already-migrated rows).
#[derive(Debug, Clone)]
pub struct MigrationStep {
    pub name: &'static str,
    pub statements: Vec<Statement>,
}

impl MigrationStep {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            statements: Vec::new(),
        }
    }

    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.statements.push(Statement::new(sql));
        self
    }

    pub fn with_statement(mut self, statement: Statement) -> Self {
        self.statements.push(statement);
        self
    }
}

/// Ordered steps that bring one table from any known layout to the target.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    table: &'static str,
    steps: Vec<MigrationStep>,
}

impl MigrationPlan {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            steps: Vec::new(),
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    /// Adds a step, validating the plan immediately.
    pub fn add_step(&mut self, step: MigrationStep) -> Result<()> {
        self.steps.push(step);
        self.validate()
    }

    pub fn with_step(mut self, step: MigrationStep) -> Result<Self> {
        self.add_step(step)?;
        Ok(self)
    }

    /// Checks for:
    /// - empty step names,
    /// - steps without statements,
    /// - duplicate step names.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.name.is_empty() {
                return Err(DbError::InvalidSchema(format!(
                    "Migration step for {} has an empty name",
                    self.table
                )));
            }
            if step.statements.is_empty() {
                return Err(DbError::InvalidSchema(format!(
                    "Migration step '{}' for {} has no statements",
                    step.name, self.table
                )));
            }
            if !seen.insert(step.name) {
                return Err(DbError::InvalidSchema(format!(
                    "Duplicate migration step '{}' for {}",
                    step.name, self.table
                )));
            }
        }

        Ok(())
    }

    /// Runs every step in order. Returns the number of steps run.
    pub async fn run(&self, session: &dyn Session) -> Result<usize> {
        self.validate()?;

        for step in &self.steps {
            for statement in &step.statements {
                session.run(statement).await?;
            }
            event!(Level::DEBUG, table = self.table, step = step.name, "migration step applied");
        }

        Ok(self.steps.len())
    }
}
