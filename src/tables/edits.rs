//! The versioned record store.
//!
//! Each message carries a gapless, strictly increasing history of content
//! revisions numbered from 1. Appends for the same message are serialized by
//! the store itself: one transaction locks the parent message row, then
//! derives the next version from the current maximum. The unique index on
//! `(message, version)` backs that up.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{Level, event};

use super::{parse_all, parse_first, run_all};
use crate::core::{DbError, Result, Value};
use crate::models::Edit;
use crate::result::Record;
use crate::schema::descriptor::{EDITS, EntityDescriptor};
use crate::schema::{MigrationPlan, MigrationStep, Table};
use crate::session::{Session, Statement};

// Histories written without the unique index may repeat a version. Those
// messages are renumbered 1..N in their existing order before the index is
// built; with no duplicates the block does nothing.
const RENUMBER_SQL: &str = "DO $$
BEGIN
    IF EXISTS (SELECT 1 FROM modmail.edits GROUP BY message, version HAVING COUNT(*) > 1) THEN
        UPDATE modmail.edits AS e
        SET version = ranked.position
        FROM (SELECT ctid,
                     ROW_NUMBER() OVER (PARTITION BY message ORDER BY version, ctid) AS position
              FROM modmail.edits) AS ranked
        WHERE e.ctid = ranked.ctid
          AND e.version <> ranked.position;
    END IF;
END $$";

const UNIQUE_VERSION_SQL: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS edits_message_version_uindex ON modmail.edits (message, version)";

const INIT_SQL: [&str; 4] = [
    "ALTER TABLE IF EXISTS modmail.message_edits RENAME TO edits",
    "CREATE TABLE IF NOT EXISTS modmail.edits
(
    content TEXT              NOT NULL,
    message BIGINT            NOT NULL
        CONSTRAINT edits_messages_modmail_id_fk REFERENCES modmail.messages (modmail_id),
    version INTEGER DEFAULT 1 NOT NULL
)",
    RENUMBER_SQL,
    UNIQUE_VERSION_SQL,
];

const LOCK_PARENT_SQL: &str =
    "SELECT modmail_id FROM modmail.messages WHERE modmail_id = $1 FOR UPDATE";

const APPEND_SQL: &str = "INSERT INTO modmail.edits (content, message, version)
SELECT $1::TEXT, $2::BIGINT, COALESCE(MAX(version), 0) + 1
FROM modmail.edits
WHERE message = $2::BIGINT
RETURNING version";

pub struct EditsTable {
    session: Arc<dyn Session>,
}

impl EditsTable {
    pub fn new(session: Arc<dyn Session>) -> Self {
        Self { session }
    }

    pub fn migration_plan() -> Result<MigrationPlan> {
        MigrationPlan::new(EDITS.qualified_name)
            .with_step(MigrationStep::new("renumber_duplicate_versions").with_sql(RENUMBER_SQL))?
            .with_step(MigrationStep::new("unique_version").with_sql(UNIQUE_VERSION_SQL))
    }

    /// Appends a revision of `message` and returns its version.
    ///
    /// The first revision of a message is 1. Fails with a constraint
    /// violation when the message does not exist.
    pub async fn append(&self, message: i64, content: &str) -> Result<i32> {
        let batch = [
            Statement::new(LOCK_PARENT_SQL).bind(message),
            Statement::new(APPEND_SQL).bind(content).bind(message),
        ];

        let res = self.session.atomic(&batch).await?;
        let version = res
            .first()
            .ok_or_else(|| DbError::ExecutionError(format!("Append to message {} returned no version", message)))?
            .i64("version")?;
        let version = i32::try_from(version)
            .map_err(|_| DbError::TypeMismatch(format!("Version {} out of range", version)))?;

        event!(Level::DEBUG, message, version, "revision appended");
        Ok(version)
    }

    /// Every revision of `message`, oldest first.
    pub async fn history(&self, message: i64) -> Result<Vec<Edit>> {
        let res = self
            .session
            .query(
                "SELECT message, version, content FROM modmail.edits WHERE message = $1 ORDER BY version",
                &[Value::Integer(message)],
            )
            .await?;
        parse_all(&res, parse)
    }

    pub async fn latest(&self, message: i64) -> Result<Option<Edit>> {
        let res = self
            .session
            .query(
                "SELECT message, version, content FROM modmail.edits WHERE message = $1 ORDER BY version DESC LIMIT 1",
                &[Value::Integer(message)],
            )
            .await?;
        parse_first(&res, parse)
    }
}

fn parse(record: Record<'_>) -> Result<Edit> {
    let version = record.i64("version")?;
    Ok(Edit {
        message: record.i64("message")?,
        version: i32::try_from(version)
            .map_err(|_| DbError::TypeMismatch(format!("Version {} out of range", version)))?,
        content: record.text("content")?,
    })
}

#[async_trait]
impl Table for EditsTable {
    fn descriptor(&self) -> &'static EntityDescriptor {
        &EDITS
    }

    async fn init(&self) -> Result<()> {
        run_all(self.session.as_ref(), &INIT_SQL).await
    }

    async fn migrate(&self) -> Result<()> {
        Self::migration_plan()?.run(self.session.as_ref()).await?;
        Ok(())
    }
}
