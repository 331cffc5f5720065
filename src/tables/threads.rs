use std::sync::Arc;

use async_trait::async_trait;
use tracing::{Level, event};

use super::{parse_all, parse_first, run_all};
use crate::core::{Result, SnowflakeGenerator, Value};
use crate::models::Thread;
use crate::result::{QueryResult, Record};
use crate::schema::descriptor::{EntityDescriptor, THREADS};
use crate::schema::{MigrationPlan, MigrationStep, Table};
use crate::session::Session;

const COLUMNS: &str = "id, author, channel, category, is_active, is_admin_only";

const INIT_SQL: [&str; 2] = [
    "CREATE TABLE IF NOT EXISTS modmail.threads
(
    id            BIGINT                NOT NULL
        CONSTRAINT threads_pk PRIMARY KEY,
    author        BIGINT                NOT NULL
        CONSTRAINT threads_users_id_fk REFERENCES modmail.users,
    channel       BIGINT                NOT NULL,
    is_active     BOOLEAN DEFAULT true  NOT NULL,
    is_admin_only BOOLEAN DEFAULT false NOT NULL,
    category      BIGINT                NOT NULL
        CONSTRAINT threads_categories_id_fk REFERENCES modmail.categories
)",
    "CREATE UNIQUE INDEX IF NOT EXISTS threads_channel_uindex ON modmail.threads (channel)",
];

pub struct ThreadsTable {
    session: Arc<dyn Session>,
    ids: Arc<SnowflakeGenerator>,
}

impl ThreadsTable {
    pub fn new(session: Arc<dyn Session>, ids: Arc<SnowflakeGenerator>) -> Self {
        Self { session, ids }
    }

    pub fn migration_plan() -> Result<MigrationPlan> {
        MigrationPlan::new(THREADS.qualified_name)
            .with_step(MigrationStep::new("add_admin_only").with_sql(
                "ALTER TABLE modmail.threads ADD COLUMN IF NOT EXISTS is_admin_only BOOLEAN DEFAULT false NOT NULL",
            ))?
            .with_step(MigrationStep::new("unique_channel").with_sql(INIT_SQL[1]))
    }

    /// Opens a thread for `author` in `channel`, filed under `category`.
    pub async fn open(&self, author: i64, channel: i64, category: i64) -> Result<Thread> {
        let thread = Thread {
            id: self.ids.generate(),
            author,
            channel,
            category,
            is_active: true,
            is_admin_only: false,
        };

        self.session
            .execute(
                "INSERT INTO modmail.threads (id, author, channel, category) VALUES ($1, $2, $3, $4)",
                &[
                    Value::Integer(thread.id),
                    Value::Integer(author),
                    Value::Integer(channel),
                    Value::Integer(category),
                ],
            )
            .await?;

        event!(Level::INFO, thread = thread.id, author, channel, "thread opened");
        Ok(thread)
    }

    /// Closes the active thread bound to `channel`.
    pub async fn close(&self, channel: i64) -> Result<bool> {
        let updated = self
            .session
            .execute(
                "UPDATE modmail.threads SET is_active = false WHERE channel = $1 AND is_active = true",
                &[Value::Integer(channel)],
            )
            .await?;

        event!(Level::DEBUG, channel, updated, "thread closed");
        Ok(updated != 0)
    }

    /// Number of closed threads the user has authored.
    pub async fn count_user(&self, author: i64) -> Result<i64> {
        self.count(
            "SELECT COUNT(*) AS count FROM modmail.threads WHERE author = $1 AND is_active = false",
            author,
        )
        .await
    }

    /// Number of active threads in a category.
    pub async fn count_category(&self, category: i64) -> Result<i64> {
        self.count(
            "SELECT COUNT(*) AS count FROM modmail.threads WHERE category = $1 AND is_active = true",
            category,
        )
        .await
    }

    async fn count(&self, sql: &str, key: i64) -> Result<i64> {
        let res = self.session.query(sql, &[Value::Integer(key)]).await?;
        match res.first() {
            Some(record) => record.i64("count"),
            None => Ok(0),
        }
    }

    /// The user's active thread, if one is open.
    pub async fn get_by_user(&self, author: i64) -> Result<Option<Thread>> {
        let res = self
            .select("WHERE author = $1 AND is_active = true LIMIT 1", author)
            .await?;
        parse_first(&res, parse)
    }

    /// The active thread bound to `channel`.
    pub async fn get_by_channel(&self, channel: i64) -> Result<Option<Thread>> {
        let res = self
            .select("WHERE channel = $1 AND is_active = true LIMIT 1", channel)
            .await?;
        parse_first(&res, parse)
    }

    /// Every thread ever filed under `category`, newest first.
    pub async fn get_by_category(&self, category: i64) -> Result<Vec<Thread>> {
        let res = self.select("WHERE category = $1 ORDER BY id DESC", category).await?;
        parse_all(&res, parse)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Thread>> {
        let res = self.select("WHERE id = $1", id).await?;
        parse_first(&res, parse)
    }

    /// Moves a thread to another channel and category.
    pub async fn update_thread(&self, id: i64, channel: i64, category: i64) -> Result<bool> {
        let updated = self
            .session
            .execute(
                "UPDATE modmail.threads SET channel = $2, category = $3 WHERE id = $1",
                &[
                    Value::Integer(id),
                    Value::Integer(channel),
                    Value::Integer(category),
                ],
            )
            .await?;
        Ok(updated != 0)
    }

    pub async fn set_admin_only(&self, id: i64, admin_only: bool) -> Result<bool> {
        let updated = self
            .session
            .execute(
                "UPDATE modmail.threads SET is_admin_only = $2 WHERE id = $1",
                &[Value::Integer(id), Value::Boolean(admin_only)],
            )
            .await?;
        Ok(updated != 0)
    }

    async fn select(&self, tail: &str, key: i64) -> Result<QueryResult> {
        let sql = format!("SELECT {COLUMNS} FROM modmail.threads {tail}");
        self.session.query(&sql, &[Value::Integer(key)]).await
    }
}

fn parse(record: Record<'_>) -> Result<Thread> {
    Ok(Thread {
        id: record.i64("id")?,
        author: record.i64("author")?,
        channel: record.i64("channel")?,
        category: record.i64("category")?,
        is_active: record.bool("is_active")?,
        is_admin_only: record.bool("is_admin_only")?,
    })
}

#[async_trait]
impl Table for ThreadsTable {
    fn descriptor(&self) -> &'static EntityDescriptor {
        &THREADS
    }

    async fn init(&self) -> Result<()> {
        run_all(self.session.as_ref(), &INIT_SQL).await
    }

    async fn migrate(&self) -> Result<()> {
        Self::migration_plan()?.run(self.session.as_ref()).await?;
        Ok(())
    }
}
