use std::sync::Arc;

use async_trait::async_trait;
use tracing::{Level, event};

use super::{parse_all, parse_first, run_all};
use crate::core::{Result, Value};
use crate::models::{Role, RoleLevel};
use crate::result::Record;
use crate::schema::descriptor::{EntityDescriptor, PERMISSIONS};
use crate::schema::Table;
use crate::session::Session;

const INIT_SQL: [&str; 1] = ["CREATE TABLE IF NOT EXISTS modmail.permissions
(
    category_id BIGINT             NOT NULL
        CONSTRAINT permissions_categories_id_fk REFERENCES modmail.categories,
    role_id     BIGINT             NOT NULL,
    level       modmail.role_level NOT NULL,
    CONSTRAINT permissions_pk PRIMARY KEY (category_id, role_id)
)"];

const SELECT_SQL: &str = "SELECT category_id, role_id, level::TEXT AS level FROM modmail.permissions";

/// Role grants per category.
pub struct PermissionsTable {
    session: Arc<dyn Session>,
}

impl PermissionsTable {
    pub fn new(session: Arc<dyn Session>) -> Self {
        Self { session }
    }

    /// Grants a role, or changes the level of an existing grant.
    /// Returns true only when the role had no grant before.
    pub async fn add(&self, role: &Role) -> Result<bool> {
        let res = self
            .session
            .query(
                "INSERT INTO modmail.permissions (category_id, role_id, level)
                 VALUES ($1, $2, $3::TEXT::modmail.role_level)
                 ON CONFLICT (category_id, role_id) DO UPDATE SET level = EXCLUDED.level
                 RETURNING (xmax = 0) AS inserted",
                &[
                    Value::Integer(role.category_id),
                    Value::Integer(role.role_id),
                    Value::from(role.level.as_str()),
                ],
            )
            .await?;
        let inserted = match res.first() {
            Some(record) => record.bool("inserted")?,
            None => false,
        };

        event!(Level::DEBUG, category = role.category_id, role = role.role_id, level = %role.level, inserted, "role granted");
        Ok(inserted)
    }

    pub async fn remove(&self, category_id: i64, role_id: i64) -> Result<bool> {
        let removed = self
            .session
            .execute(
                "DELETE FROM modmail.permissions WHERE category_id = $1 AND role_id = $2",
                &[Value::Integer(category_id), Value::Integer(role_id)],
            )
            .await?;
        Ok(removed != 0)
    }

    pub async fn fetch_from(&self, category_id: i64) -> Result<Vec<Role>> {
        let sql = format!("{SELECT_SQL} WHERE category_id = $1 ORDER BY role_id");
        let res = self.session.query(&sql, &[Value::Integer(category_id)]).await?;
        parse_all(&res, parse)
    }

    pub async fn fetch_one(&self, category_id: i64, role_id: i64) -> Result<Option<Role>> {
        let sql = format!("{SELECT_SQL} WHERE category_id = $1 AND role_id = $2");
        let res = self
            .session
            .query(&sql, &[Value::Integer(category_id), Value::Integer(role_id)])
            .await?;
        parse_first(&res, parse)
    }
}

fn parse(record: Record<'_>) -> Result<Role> {
    Ok(Role {
        category_id: record.i64("category_id")?,
        role_id: record.i64("role_id")?,
        level: record.text("level")?.parse::<RoleLevel>()?,
    })
}

#[async_trait]
impl Table for PermissionsTable {
    fn descriptor(&self) -> &'static EntityDescriptor {
        &PERMISSIONS
    }

    async fn init(&self) -> Result<()> {
        run_all(self.session.as_ref(), &INIT_SQL).await
    }
}
