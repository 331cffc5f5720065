use std::sync::Arc;

use crate::core::{DbError, Result, Value};
use crate::session::Session;

const TABLE_EXISTS_SQL: &str = "SELECT 1 FROM information_schema.tables \
     WHERE table_schema = $1::TEXT AND table_name = $2::TEXT";

const TYPE_EXISTS_SQL: &str = "SELECT 1 FROM pg_catalog.pg_type t \
     JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace \
     WHERE n.nspname = $1::TEXT AND t.typname = $2::TEXT";

/// Read-only catalog lookups.
///
/// A failed lookup is a [`DbError::Connectivity`], never `false`: a missing
/// answer must not be mistaken for a missing table.
#[derive(Clone)]
pub struct SchemaIntrospector {
    session: Arc<dyn Session>,
}

impl SchemaIntrospector {
    pub fn new(session: Arc<dyn Session>) -> Self {
        Self { session }
    }

    pub async fn exists(&self, namespace: &str, physical_name: &str) -> Result<bool> {
        self.lookup(TABLE_EXISTS_SQL, namespace, physical_name).await
    }

    pub async fn type_exists(&self, namespace: &str, type_name: &str) -> Result<bool> {
        self.lookup(TYPE_EXISTS_SQL, namespace, type_name).await
    }

    async fn lookup(&self, sql: &str, namespace: &str, name: &str) -> Result<bool> {
        let params = [Value::from(namespace), Value::from(name)];
        let res = self.session.query(sql, &params).await.map_err(|err| {
            DbError::Connectivity(format!(
                "catalog lookup for {}.{} failed: {}",
                namespace, name, err
            ))
        })?;

        Ok(!res.is_empty())
    }
}
