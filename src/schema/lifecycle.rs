use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{Level, event};

use super::descriptor::{EntityDescriptor, NAMESPACE};
use super::introspector::SchemaIntrospector;
use crate::core::{DbError, Result};
use crate::session::Session;

/// The per-entity schema capability.
///
/// `init` creates the table and its invariant-enforcing indexes with
/// create-if-missing semantics. `migrate` applies forward-only, additive,
/// individually idempotent steps to an existing table.
#[async_trait]
pub trait Table: Send + Sync {
    fn descriptor(&self) -> &'static EntityDescriptor;

    async fn init(&self) -> Result<()> {
        Err(DbError::NotImplemented(format!(
            "Table init for {} has not been implemented",
            self.descriptor().qualified_name
        )))
    }

    async fn migrate(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleOutcome {
    Created,
    Migrated,
}

/// Decides create vs. migrate for one table and executes it.
#[derive(Clone)]
pub struct LifecycleController {
    introspector: SchemaIntrospector,
}

impl LifecycleController {
    pub fn new(session: Arc<dyn Session>) -> Self {
        Self {
            introspector: SchemaIntrospector::new(session),
        }
    }

    pub fn introspector(&self) -> &SchemaIntrospector {
        &self.introspector
    }

    pub async fn validate(&self, table: &dyn Table) -> Result<LifecycleOutcome> {
        let descriptor = table.descriptor();
        let exists = self
            .introspector
            .exists(NAMESPACE, descriptor.physical_name)
            .await?;

        if exists {
            event!(Level::DEBUG, table = descriptor.qualified_name, "table exists, migrating");
            table.migrate().await?;
            Ok(LifecycleOutcome::Migrated)
        } else {
            event!(Level::DEBUG, table = descriptor.qualified_name, "table missing, creating");
            table.init().await?;
            Ok(LifecycleOutcome::Created)
        }
    }
}
