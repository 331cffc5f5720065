use std::sync::Arc;

use async_trait::async_trait;

use super::{parse_all, run_all};
use crate::core::{Result, SnowflakeGenerator, Value};
use crate::models::{Attachment, CreateAttachmentOpt, FileType};
use crate::result::Record;
use crate::schema::descriptor::{ATTACHMENTS, EntityDescriptor};
use crate::schema::Table;
use crate::session::Session;

const INIT_SQL: [&str; 1] = ["CREATE TABLE IF NOT EXISTS modmail.attachments
(
    id         BIGINT            NOT NULL
        CONSTRAINT attachments_pk PRIMARY KEY,
    message_id BIGINT            NOT NULL
        CONSTRAINT attachments_messages_modmail_id_fk REFERENCES modmail.messages (modmail_id),
    name       TEXT              NOT NULL,
    source     TEXT              NOT NULL,
    sender     BIGINT            NOT NULL
        CONSTRAINT attachments_users_id_fk REFERENCES modmail.users,
    type       modmail.file_type NOT NULL
)"];

pub struct AttachmentsTable {
    session: Arc<dyn Session>,
    ids: Arc<SnowflakeGenerator>,
}

impl AttachmentsTable {
    pub fn new(session: Arc<dyn Session>, ids: Arc<SnowflakeGenerator>) -> Self {
        Self { session, ids }
    }

    pub async fn create(&self, opt: CreateAttachmentOpt) -> Result<Attachment> {
        let attachment = Attachment {
            id: self.ids.generate(),
            message_id: opt.message_id,
            name: opt.name,
            source: opt.source,
            sender: opt.sender,
            file_type: opt.file_type,
        };

        self.session
            .execute(
                "INSERT INTO modmail.attachments (id, message_id, name, source, sender, type)
                 VALUES ($1, $2, $3, $4, $5, $6::TEXT::modmail.file_type)",
                &[
                    Value::Integer(attachment.id),
                    Value::Integer(attachment.message_id),
                    Value::from(attachment.name.as_str()),
                    Value::from(attachment.source.as_str()),
                    Value::Integer(attachment.sender),
                    Value::from(attachment.file_type.as_str()),
                ],
            )
            .await?;

        Ok(attachment)
    }

    /// Attachments of a message, in upload order.
    pub async fn fetch(&self, message_id: i64) -> Result<Vec<Attachment>> {
        let res = self
            .session
            .query(
                "SELECT id, message_id, name, source, sender, type::TEXT AS type
                 FROM modmail.attachments WHERE message_id = $1 ORDER BY id",
                &[Value::Integer(message_id)],
            )
            .await?;
        parse_all(&res, parse)
    }
}

fn parse(record: Record<'_>) -> Result<Attachment> {
    Ok(Attachment {
        id: record.i64("id")?,
        message_id: record.i64("message_id")?,
        name: record.text("name")?,
        source: record.text("source")?,
        sender: record.i64("sender")?,
        file_type: record.text("type")?.parse::<FileType>()?,
    })
}

#[async_trait]
impl Table for AttachmentsTable {
    fn descriptor(&self) -> &'static EntityDescriptor {
        &ATTACHMENTS
    }

    async fn init(&self) -> Result<()> {
        run_all(self.session.as_ref(), &INIT_SQL).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::QueryResult;
    use crate::test_support::ScriptedSession;

    #[tokio::test]
    async fn test_create_then_fetch() {
        let session = Arc::new(ScriptedSession::new());
        let attachments = AttachmentsTable::new(session.clone(), Arc::new(SnowflakeGenerator::default()));

        let created = attachments
            .create(CreateAttachmentOpt {
                message_id: 3,
                name: "log.txt".into(),
                source: "https://cdn.example/log.txt".into(),
                sender: 4,
                file_type: FileType::File,
            })
            .await
            .unwrap();
        assert_eq!(session.log()[0].params[5], Value::from("file"));

        session.respond(
            "FROM modmail.attachments",
            QueryResult::new(
                ["id", "message_id", "name", "source", "sender", "type"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
                vec![vec![
                    Value::Integer(created.id),
                    Value::Integer(3),
                    Value::from("log.txt"),
                    Value::from("https://cdn.example/log.txt"),
                    Value::Integer(4),
                    Value::from("file"),
                ]],
            ),
        );

        assert_eq!(attachments.fetch(3).await.unwrap(), vec![created]);
    }
}
