use std::sync::Arc;

use async_trait::async_trait;
use tracing::{Level, event};

use super::{parse_all, parse_first, run_all};
use crate::core::{Result, SnowflakeGenerator, Value};
use crate::models::{CreateMessageOpt, Message};
use crate::result::Record;
use crate::schema::descriptor::{EntityDescriptor, MESSAGES};
use crate::schema::{MigrationPlan, MigrationStep, Table};
use crate::session::Session;

const COLUMNS: &str = "modmail_id, content, thread_id, sender, client_id, is_deleted, internal";

const INIT_SQL: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS modmail.messages
(
    modmail_id BIGINT                NOT NULL
        CONSTRAINT messages_pk PRIMARY KEY,
    content    TEXT                  NOT NULL,
    thread_id  BIGINT                NOT NULL
        CONSTRAINT messages_threads_id_fk REFERENCES modmail.threads,
    sender     BIGINT                NOT NULL
        CONSTRAINT messages_users_id_fk REFERENCES modmail.users,
    client_id  BIGINT,
    is_deleted BOOLEAN DEFAULT false NOT NULL,
    internal   BOOLEAN DEFAULT false NOT NULL
)",
    "CREATE UNIQUE INDEX IF NOT EXISTS messages_client_id_uindex ON modmail.messages (client_id)",
    "CREATE INDEX IF NOT EXISTS messages_thread_id_index ON modmail.messages (thread_id)",
];

/// Messages relayed through a thread.
///
/// `modmail_id` is minted here; `client_id` is the chat platform's own id,
/// when the message has one.
pub struct MessagesTable {
    session: Arc<dyn Session>,
    ids: Arc<SnowflakeGenerator>,
}

impl MessagesTable {
    pub fn new(session: Arc<dyn Session>, ids: Arc<SnowflakeGenerator>) -> Self {
        Self { session, ids }
    }

    pub fn migration_plan() -> Result<MigrationPlan> {
        MigrationPlan::new(MESSAGES.qualified_name)
            .with_step(MigrationStep::new("add_internal").with_sql(
                "ALTER TABLE modmail.messages ADD COLUMN IF NOT EXISTS internal BOOLEAN DEFAULT false NOT NULL",
            ))?
            .with_step(
                MigrationStep::new("indexes")
                    .with_sql(INIT_SQL[1])
                    .with_sql(INIT_SQL[2]),
            )
    }

    pub async fn add(&self, opt: CreateMessageOpt) -> Result<Message> {
        let message = Message {
            modmail_id: self.ids.generate(),
            content: opt.content,
            thread_id: opt.thread_id,
            sender: opt.sender,
            client_id: opt.client_id,
            is_deleted: false,
            internal: opt.internal,
        };

        self.session
            .execute(
                "INSERT INTO modmail.messages (modmail_id, content, thread_id, sender, client_id, internal)
                 VALUES ($1, $2, $3, $4, $5, $6)",
                &[
                    Value::Integer(message.modmail_id),
                    Value::from(message.content.as_str()),
                    Value::Integer(message.thread_id),
                    Value::Integer(message.sender),
                    Value::from(message.client_id),
                    Value::Boolean(message.internal),
                ],
            )
            .await?;

        event!(Level::DEBUG, message = message.modmail_id, thread = message.thread_id, "message added");
        Ok(message)
    }

    pub async fn fetch(&self, modmail_id: i64) -> Result<Option<Message>> {
        let sql = format!("SELECT {COLUMNS} FROM modmail.messages WHERE modmail_id = $1");
        let res = self.session.query(&sql, &[Value::Integer(modmail_id)]).await?;
        parse_first(&res, parse)
    }

    pub async fn fetch_by_client(&self, client_id: i64) -> Result<Option<Message>> {
        let sql = format!("SELECT {COLUMNS} FROM modmail.messages WHERE client_id = $1");
        let res = self.session.query(&sql, &[Value::Integer(client_id)]).await?;
        parse_first(&res, parse)
    }

    /// Every message of a thread, oldest first.
    pub async fn fetch_all(&self, thread_id: i64) -> Result<Vec<Message>> {
        let sql = format!("SELECT {COLUMNS} FROM modmail.messages WHERE thread_id = $1 ORDER BY modmail_id");
        let res = self.session.query(&sql, &[Value::Integer(thread_id)]).await?;
        parse_all(&res, parse)
    }

    /// Flags the message relayed as `client_id` as deleted.
    pub async fn set_deleted(&self, client_id: i64) -> Result<bool> {
        let updated = self
            .session
            .execute(
                "UPDATE modmail.messages SET is_deleted = true WHERE client_id = $1",
                &[Value::Integer(client_id)],
            )
            .await?;
        Ok(updated != 0)
    }

    /// Replaces the current content. Earlier content is kept only if the
    /// caller appends it to the edit history.
    pub async fn update_content(&self, modmail_id: i64, content: &str) -> Result<bool> {
        let updated = self
            .session
            .execute(
                "UPDATE modmail.messages SET content = $2 WHERE modmail_id = $1",
                &[Value::Integer(modmail_id), Value::from(content)],
            )
            .await?;
        Ok(updated != 0)
    }
}

fn parse(record: Record<'_>) -> Result<Message> {
    Ok(Message {
        modmail_id: record.i64("modmail_id")?,
        content: record.text("content")?,
        thread_id: record.i64("thread_id")?,
        sender: record.i64("sender")?,
        client_id: record.opt_i64("client_id")?,
        is_deleted: record.bool("is_deleted")?,
        internal: record.bool("internal")?,
    })
}

#[async_trait]
impl Table for MessagesTable {
    fn descriptor(&self) -> &'static EntityDescriptor {
        &MESSAGES
    }

    async fn init(&self) -> Result<()> {
        run_all(self.session.as_ref(), &INIT_SQL).await
    }

    async fn migrate(&self) -> Result<()> {
        Self::migration_plan()?.run(self.session.as_ref()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::QueryResult;
    use crate::test_support::ScriptedSession;

    fn table(session: &Arc<ScriptedSession>) -> MessagesTable {
        MessagesTable::new(session.clone(), Arc::new(SnowflakeGenerator::default()))
    }

    #[tokio::test]
    async fn test_add_without_client_id_binds_null() {
        let session = Arc::new(ScriptedSession::new());
        let message = table(&session)
            .add(CreateMessageOpt {
                content: "hello".into(),
                thread_id: 1,
                sender: 2,
                client_id: None,
                internal: true,
            })
            .await
            .unwrap();

        assert!(!message.is_deleted);
        let insert = &session.log()[0];
        assert_eq!(insert.params[4], Value::Null);
        assert_eq!(insert.params[5], Value::Boolean(true));
    }

    #[tokio::test]
    async fn test_fetch_all_is_ordered_by_id() {
        let session = Arc::new(ScriptedSession::new());
        session.respond(
            "WHERE thread_id = $1",
            QueryResult::new(
                COLUMNS.split(", ").map(str::to_string).collect(),
                vec![
                    vec![
                        Value::Integer(1),
                        Value::from("a"),
                        Value::Integer(9),
                        Value::Integer(2),
                        Value::Integer(55),
                        Value::Boolean(false),
                        Value::Boolean(false),
                    ],
                    vec![
                        Value::Integer(2),
                        Value::from("b"),
                        Value::Integer(9),
                        Value::Integer(2),
                        Value::Null,
                        Value::Boolean(true),
                        Value::Boolean(false),
                    ],
                ],
            ),
        );

        let messages = table(&session).fetch_all(9).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].client_id, Some(55));
        assert!(messages[1].is_deleted);
        assert!(session.log()[0].sql.ends_with("ORDER BY modmail_id"));
    }
}
