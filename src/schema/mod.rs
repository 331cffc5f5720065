//! Schema lifecycle: entity descriptors, catalog introspection, the
//! create-or-migrate controller and the dependency-ordered startup.

pub mod descriptor;
pub mod introspector;
pub mod lifecycle;
pub mod migration;
pub mod namespace;
pub mod orchestrator;

pub use descriptor::{EntityDescriptor, EntityKind, NAMESPACE};
pub use introspector::SchemaIntrospector;
pub use lifecycle::{LifecycleController, LifecycleOutcome, Table};
pub use migration::{MigrationPlan, MigrationStep};
pub use orchestrator::{Orchestrator, Rank, StartupReport, derive_ranks};
