use std::sync::Arc;

use async_trait::async_trait;

use super::run_all;
use crate::core::{Result, Value};
use crate::schema::descriptor::{EntityDescriptor, USERS};
use crate::schema::Table;
use crate::session::Session;

const INIT_SQL: [&str; 1] = ["CREATE TABLE IF NOT EXISTS modmail.users
(
    id BIGINT NOT NULL
        CONSTRAINT users_pk PRIMARY KEY
)"];

pub struct UsersTable {
    session: Arc<dyn Session>,
}

impl UsersTable {
    pub fn new(session: Arc<dyn Session>) -> Self {
        Self { session }
    }

    /// Registers a user. Returns false when the user was already known.
    pub async fn create(&self, id: i64) -> Result<bool> {
        let inserted = self
            .session
            .execute(
                "INSERT INTO modmail.users (id) VALUES ($1) ON CONFLICT (id) DO NOTHING",
                &[Value::Integer(id)],
            )
            .await?;

        Ok(inserted != 0)
    }

    pub async fn exists(&self, id: i64) -> Result<bool> {
        let res = self
            .session
            .query("SELECT id FROM modmail.users WHERE id = $1", &[Value::Integer(id)])
            .await?;

        Ok(!res.is_empty())
    }
}

#[async_trait]
impl Table for UsersTable {
    fn descriptor(&self) -> &'static EntityDescriptor {
        &USERS
    }

    async fn init(&self) -> Result<()> {
        run_all(self.session.as_ref(), &INIT_SQL).await
    }
}
