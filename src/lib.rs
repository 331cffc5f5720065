// ============================================================================
// modmail-db: schema lifecycle and entity persistence for a modmail service
// ============================================================================

pub mod connection;
pub mod core;
pub mod models;
pub mod resolvable;
pub mod result;
pub mod schema;
pub mod session;
pub mod tables;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use tracing::{Level, event};

// Re-export main types for convenience
pub use connection::config::ConnectionConfig;
pub use core::{DbError, Result, SnowflakeGenerator, Value};
pub use resolvable::{CategoryResolvable, Resolvable};
pub use result::QueryResult;
pub use schema::{EntityKind, LifecycleOutcome, Orchestrator, StartupReport, Table};
pub use session::{PgSession, Session, Statement};

use tables::{
    AttachmentsTable, CategoriesTable, EditsTable, MessagesTable, MutesTable, PermissionsTable,
    StandardRepliesTable, ThreadsTable, UsersTable,
};

// ============================================================================
// DatabaseManager
// ============================================================================

/// Owns one entity manager per table over a shared session.
///
/// # Examples
///
/// ```no_run
/// use modmail_db::{CategoryResolvable, ConnectionConfig, DatabaseManager};
///
/// # async fn run() -> modmail_db::Result<()> {
/// let config = ConnectionConfig::from_env()?;
/// let (db, report) = DatabaseManager::connect(&config).await?;
/// println!("created: {:?}", report.created().collect::<Vec<_>>());
///
/// let active = db.categories().fetch_all(CategoryResolvable::Activity, "true").await?;
/// println!("{} active categories", active.len());
/// # Ok(())
/// # }
/// ```
pub struct DatabaseManager {
    session: Arc<dyn Session>,
    users: Arc<UsersTable>,
    categories: Arc<CategoriesTable>,
    threads: Arc<ThreadsTable>,
    messages: Arc<MessagesTable>,
    attachments: Arc<AttachmentsTable>,
    edits: Arc<EditsTable>,
    mutes: Arc<MutesTable>,
    permissions: Arc<PermissionsTable>,
    standard_replies: Arc<StandardRepliesTable>,
}

impl DatabaseManager {
    pub fn new(session: Arc<dyn Session>) -> Self {
        Self::with_ids(session, Arc::new(SnowflakeGenerator::default()))
    }

    /// Builds the managers with an explicit id generator.
    pub fn with_ids(session: Arc<dyn Session>, ids: Arc<SnowflakeGenerator>) -> Self {
        Self {
            users: Arc::new(UsersTable::new(session.clone())),
            categories: Arc::new(CategoriesTable::new(session.clone(), ids.clone())),
            threads: Arc::new(ThreadsTable::new(session.clone(), ids.clone())),
            messages: Arc::new(MessagesTable::new(session.clone(), ids.clone())),
            attachments: Arc::new(AttachmentsTable::new(session.clone(), ids.clone())),
            edits: Arc::new(EditsTable::new(session.clone())),
            mutes: Arc::new(MutesTable::new(session.clone())),
            permissions: Arc::new(PermissionsTable::new(session.clone())),
            standard_replies: Arc::new(StandardRepliesTable::new(session.clone(), ids)),
            session,
        }
    }

    /// Connects, then brings the schema up to date.
    pub async fn connect(config: &ConnectionConfig) -> Result<(Self, StartupReport)> {
        let session: Arc<dyn Session> = Arc::new(connection::connect(config).await?);
        let manager = Self::new(session);
        let report = manager.init().await?;
        Ok((manager, report))
    }

    /// Creates the namespace and enum types, then validates every table in
    /// dependency order.
    pub async fn init(&self) -> Result<StartupReport> {
        let orchestrator = self.orchestrator();
        schema::namespace::bootstrap(
            self.session.as_ref(),
            &schema::SchemaIntrospector::new(self.session.clone()),
        )
        .await?;

        let report = orchestrator.run().await?;
        event!(
            Level::INFO,
            created = report.created().count(),
            total = report.outcomes.len(),
            "database ready"
        );
        Ok(report)
    }

    /// An orchestrator with every manager registered.
    pub fn orchestrator(&self) -> Orchestrator {
        let mut orchestrator = Orchestrator::new(self.session.clone());
        orchestrator
            .register(self.users.clone())
            .register(self.categories.clone())
            .register(self.threads.clone())
            .register(self.messages.clone())
            .register(self.attachments.clone())
            .register(self.edits.clone())
            .register(self.mutes.clone())
            .register(self.permissions.clone())
            .register(self.standard_replies.clone());
        orchestrator
    }

    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    pub fn users(&self) -> &UsersTable {
        &self.users
    }

    pub fn categories(&self) -> &CategoriesTable {
        &self.categories
    }

    pub fn threads(&self) -> &ThreadsTable {
        &self.threads
    }

    pub fn messages(&self) -> &MessagesTable {
        &self.messages
    }

    pub fn attachments(&self) -> &AttachmentsTable {
        &self.attachments
    }

    pub fn edits(&self) -> &EditsTable {
        &self.edits
    }

    pub fn mutes(&self) -> &MutesTable {
        &self.mutes
    }

    pub fn permissions(&self) -> &PermissionsTable {
        &self.permissions
    }

    pub fn standard_replies(&self) -> &StandardRepliesTable {
        &self.standard_replies
    }
}
