use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tracing::{Instrument, Level, event, info_span};

use super::descriptor::{EntityDescriptor, EntityKind, all_descriptors};
use super::lifecycle::{LifecycleController, LifecycleOutcome, Table};
use crate::core::{DbError, Result};
use crate::session::Session;

/// Entities with no dependency among themselves, eligible to run together.
pub type Rank = Vec<EntityKind>;

/// Groups descriptors into ranks: rank of an entity is one past the highest
/// rank of its dependencies. Inside a rank, declaration order is kept.
///
/// Rejects duplicate entities, dependencies on undeclared entities and
/// cycles.
pub fn derive_ranks(descriptors: &[&EntityDescriptor]) -> Result<Vec<Rank>> {
    let mut declared = HashSet::new();
    let mut names = HashSet::new();
    for descriptor in descriptors {
        if !declared.insert(descriptor.kind) || !names.insert(descriptor.physical_name) {
            return Err(DbError::InvalidSchema(format!(
                "Entity {} is declared twice",
                descriptor.physical_name
            )));
        }
    }

    for descriptor in descriptors {
        if let Some(missing) = descriptor.depends_on.iter().find(|dep| !declared.contains(*dep)) {
            return Err(DbError::InvalidSchema(format!(
                "{} depends on undeclared entity {:?}",
                descriptor.physical_name, missing
            )));
        }
    }

    let mut placed = HashSet::new();
    let mut remaining: Vec<&EntityDescriptor> = descriptors.to_vec();
    let mut ranks = Vec::new();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<_>, Vec<_>) = remaining
            .into_iter()
            .partition(|d| d.depends_on.iter().all(|dep| placed.contains(dep)));

        if ready.is_empty() {
            let cycle = blocked
                .iter()
                .map(|d| d.physical_name)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(DbError::InvalidSchema(format!(
                "Dependency cycle among: {}",
                cycle
            )));
        }

        let rank: Rank = ready.iter().map(|d| d.kind).collect();
        placed.extend(rank.iter().copied());
        ranks.push(rank);
        remaining = blocked;
    }

    Ok(ranks)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StartupReport {
    pub ranks: Vec<Rank>,
    /// Outcomes in completion order.
    pub outcomes: Vec<(EntityKind, LifecycleOutcome)>,
}

impl StartupReport {
    pub fn outcome(&self, kind: EntityKind) -> Option<LifecycleOutcome> {
        self.outcomes
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, outcome)| *outcome)
    }

    pub fn created(&self) -> impl Iterator<Item = EntityKind> + '_ {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == LifecycleOutcome::Created)
            .map(|(kind, _)| *kind)
    }
}

/// Runs lifecycle validation for every entity in dependency order.
pub struct Orchestrator {
    lifecycle: LifecycleController,
    descriptors: Vec<&'static EntityDescriptor>,
    tables: BTreeMap<EntityKind, Arc<dyn Table>>,
}

impl Orchestrator {
    /// An orchestrator over every modmail entity.
    pub fn new(session: Arc<dyn Session>) -> Self {
        Self::with_descriptors(session, all_descriptors())
    }

    pub fn with_descriptors(
        session: Arc<dyn Session>,
        descriptors: Vec<&'static EntityDescriptor>,
    ) -> Self {
        Self {
            lifecycle: LifecycleController::new(session),
            descriptors,
            tables: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, table: Arc<dyn Table>) -> &mut Self {
        self.tables.insert(table.descriptor().kind, table);
        self
    }

    pub fn plan(&self) -> Result<Vec<Rank>> {
        derive_ranks(&self.descriptors)
    }

    /// Validates rank by rank.
    ///
    /// A rank starts only after every entity of every earlier rank succeeded.
    /// Inside a rank all validations run concurrently; when one fails the
    /// others still run to completion and the first failure observed is
    /// returned.
    pub async fn run(&self) -> Result<StartupReport> {
        let ranks = self.plan()?;

        let resolved = ranks
            .iter()
            .map(|rank| rank.iter().map(|kind| self.table(*kind)).collect::<Result<Vec<_>>>())
            .collect::<Result<Vec<_>>>()?;

        let mut report = StartupReport {
            ranks: ranks.clone(),
            outcomes: Vec::new(),
        };

        async {
            for (index, tables) in resolved.into_iter().enumerate() {
                let span = info_span!("startup_rank", rank = index, entities = tables.len());
                self.run_rank(tables, &mut report).instrument(span).await?;
            }

            event!(Level::INFO, entities = report.outcomes.len(), "schema validated");
            Ok(report)
        }
        .instrument(info_span!("startup", ranks = ranks.len()))
        .await
    }

    async fn run_rank(&self, tables: Vec<&Arc<dyn Table>>, report: &mut StartupReport) -> Result<()> {
        let mut pending: FuturesUnordered<_> = tables
            .into_iter()
            .map(|table| async move {
                let kind = table.descriptor().kind;
                (kind, self.lifecycle.validate(table.as_ref()).await)
            })
            .collect();

        let mut first_error = None;
        while let Some((kind, result)) = pending.next().await {
            match result {
                Ok(outcome) => {
                    event!(Level::INFO, entity = %kind, ?outcome, "entity validated");
                    report.outcomes.push((kind, outcome));
                }
                Err(err) => {
                    event!(Level::ERROR, entity = %kind, error = %err, "entity validation failed");
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn table(&self, kind: EntityKind) -> Result<&Arc<dyn Table>> {
        self.tables.get(&kind).ok_or_else(|| {
            DbError::NotImplemented(format!(
                "No table registered for {}",
                kind.descriptor().qualified_name
            ))
        })
    }
}
