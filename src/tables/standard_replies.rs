use std::sync::Arc;

use async_trait::async_trait;
use tracing::{Level, event};

use super::{parse_all, parse_first, run_all};
use crate::core::{Result, SnowflakeGenerator, Value};
use crate::models::{CreateStandardReplyOpt, StandardReply};
use crate::result::Record;
use crate::schema::descriptor::{EntityDescriptor, STANDARD_REPLIES};
use crate::schema::Table;
use crate::session::Session;

const INIT_SQL: [&str; 2] = [
    "CREATE TABLE IF NOT EXISTS modmail.standard_replies
(
    id    BIGINT NOT NULL
        CONSTRAINT standard_replies_pk PRIMARY KEY,
    name  TEXT   NOT NULL,
    reply TEXT   NOT NULL
)",
    "CREATE UNIQUE INDEX IF NOT EXISTS standard_replies_name_uindex ON modmail.standard_replies (name)",
];

/// Canned replies, looked up by case-insensitive name.
pub struct StandardRepliesTable {
    session: Arc<dyn Session>,
    ids: Arc<SnowflakeGenerator>,
}

impl StandardRepliesTable {
    pub fn new(session: Arc<dyn Session>, ids: Arc<SnowflakeGenerator>) -> Self {
        Self { session, ids }
    }

    pub async fn create(&self, opt: CreateStandardReplyOpt) -> Result<StandardReply> {
        let reply = StandardReply {
            id: self.ids.generate(),
            name: opt.name.to_lowercase(),
            reply: opt.reply,
        };

        self.session
            .execute(
                "INSERT INTO modmail.standard_replies (id, name, reply) VALUES ($1, $2, $3)",
                &[
                    Value::Integer(reply.id),
                    Value::from(reply.name.as_str()),
                    Value::from(reply.reply.as_str()),
                ],
            )
            .await?;

        event!(Level::DEBUG, reply = reply.id, name = %reply.name, "standard reply created");
        Ok(reply)
    }

    /// Rewrites the reply identified by `key`: a numeric id, or else a name.
    pub async fn update(&self, opt: CreateStandardReplyOpt, key: &str) -> Result<bool> {
        let name = Value::from(opt.name.to_lowercase());
        let reply = Value::from(opt.reply);

        let updated = match key.parse::<i64>() {
            Ok(id) => {
                self.session
                    .execute(
                        "UPDATE modmail.standard_replies SET name = $1, reply = $2 WHERE id = $3",
                        &[name, reply, Value::Integer(id)],
                    )
                    .await?
            }
            Err(_) => {
                self.session
                    .execute(
                        "UPDATE modmail.standard_replies SET name = $1, reply = $2 WHERE name = $3",
                        &[name, reply, Value::from(key.to_lowercase())],
                    )
                    .await?
            }
        };

        Ok(updated != 0)
    }

    pub async fn remove(&self, name: &str) -> Result<bool> {
        let removed = self
            .session
            .execute(
                "DELETE FROM modmail.standard_replies WHERE name = $1",
                &[Value::from(name.to_lowercase())],
            )
            .await?;
        Ok(removed != 0)
    }

    pub async fn get(&self, name: &str) -> Result<Option<StandardReply>> {
        let res = self
            .session
            .query(
                "SELECT id, name, reply FROM modmail.standard_replies WHERE name = $1",
                &[Value::from(name.to_lowercase())],
            )
            .await?;
        parse_first(&res, parse)
    }

    pub async fn fetch_all(&self) -> Result<Vec<StandardReply>> {
        let res = self
            .session
            .query("SELECT id, name, reply FROM modmail.standard_replies ORDER BY name", &[])
            .await?;
        parse_all(&res, parse)
    }
}

fn parse(record: Record<'_>) -> Result<StandardReply> {
    Ok(StandardReply {
        id: record.i64("id")?,
        name: record.text("name")?,
        reply: record.text("reply")?,
    })
}

#[async_trait]
impl Table for StandardRepliesTable {
    fn descriptor(&self) -> &'static EntityDescriptor {
        &STANDARD_REPLIES
    }

    async fn init(&self) -> Result<()> {
        run_all(self.session.as_ref(), &INIT_SQL).await
    }
}
