use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{Level, event};

use super::{parse_all, parse_first, run_all};
use crate::core::{Result, Value};
use crate::models::MuteStatus;
use crate::result::Record;
use crate::schema::descriptor::{EntityDescriptor, MUTES};
use crate::schema::Table;
use crate::session::Session;

const INIT_SQL: [&str; 1] = ["CREATE TABLE IF NOT EXISTS modmail.mutes
(
    user_id     BIGINT NOT NULL
        CONSTRAINT mutes_users_id_fk REFERENCES modmail.users,
    category_id BIGINT NOT NULL
        CONSTRAINT mutes_categories_id_fk REFERENCES modmail.categories,
    till        BIGINT NOT NULL,
    reason      TEXT   NOT NULL,
    CONSTRAINT mutes_pk PRIMARY KEY (user_id, category_id)
)"];

/// Per-category mutes. A user has at most one mute per category; muting
/// again replaces the expiry and reason.
pub struct MutesTable {
    session: Arc<dyn Session>,
}

impl MutesTable {
    pub fn new(session: Arc<dyn Session>) -> Self {
        Self { session }
    }

    pub async fn add(&self, status: &MuteStatus) -> Result<()> {
        self.session
            .execute(
                "INSERT INTO modmail.mutes (user_id, category_id, till, reason) VALUES ($1, $2, $3, $4)
                 ON CONFLICT (user_id, category_id) DO UPDATE SET till = EXCLUDED.till, reason = EXCLUDED.reason",
                &[
                    Value::Integer(status.user_id),
                    Value::Integer(status.category_id),
                    Value::Integer(status.till),
                    Value::from(status.reason.as_str()),
                ],
            )
            .await?;

        event!(Level::INFO, user = status.user_id, category = status.category_id, till = status.till, "user muted");
        Ok(())
    }

    pub async fn remove(&self, user_id: i64, category_id: i64) -> Result<bool> {
        let removed = self
            .session
            .execute(
                "DELETE FROM modmail.mutes WHERE user_id = $1 AND category_id = $2",
                &[Value::Integer(user_id), Value::Integer(category_id)],
            )
            .await?;
        Ok(removed != 0)
    }

    /// Whether an unexpired mute exists right now.
    pub async fn is_muted(&self, user_id: i64, category_id: i64) -> Result<bool> {
        self.is_muted_at(user_id, category_id, Utc::now().timestamp()).await
    }

    /// Whether a mute exists that lapses after `now` (unix seconds).
    pub async fn is_muted_at(&self, user_id: i64, category_id: i64, now: i64) -> Result<bool> {
        let res = self
            .session
            .query(
                "SELECT 1 FROM modmail.mutes WHERE user_id = $1 AND category_id = $2 AND till > $3",
                &[
                    Value::Integer(user_id),
                    Value::Integer(category_id),
                    Value::Integer(now),
                ],
            )
            .await?;
        Ok(!res.is_empty())
    }

    /// The stored mute, expired or not.
    pub async fn fetch(&self, user_id: i64, category_id: i64) -> Result<Option<MuteStatus>> {
        let res = self
            .session
            .query(
                "SELECT user_id, category_id, till, reason FROM modmail.mutes WHERE user_id = $1 AND category_id = $2",
                &[Value::Integer(user_id), Value::Integer(category_id)],
            )
            .await?;
        parse_first(&res, parse)
    }

    /// Every mute in a category, including lapsed ones.
    pub async fn fetch_all(&self, category_id: i64) -> Result<Vec<MuteStatus>> {
        let res = self
            .session
            .query(
                "SELECT user_id, category_id, till, reason FROM modmail.mutes WHERE category_id = $1 ORDER BY till",
                &[Value::Integer(category_id)],
            )
            .await?;
        parse_all(&res, parse)
    }
}

fn parse(record: Record<'_>) -> Result<MuteStatus> {
    Ok(MuteStatus {
        user_id: record.i64("user_id")?,
        category_id: record.i64("category_id")?,
        till: record.i64("till")?,
        reason: record.text("reason")?,
    })
}

#[async_trait]
impl Table for MutesTable {
    fn descriptor(&self) -> &'static EntityDescriptor {
        &MUTES
    }

    async fn init(&self) -> Result<()> {
        run_all(self.session.as_ref(), &INIT_SQL).await
    }
}
