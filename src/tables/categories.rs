use std::sync::Arc;

use async_trait::async_trait;
use tracing::{Level, event};

use super::{parse_all, run_all};
use crate::core::{Result, SnowflakeGenerator, Value};
use crate::models::{Category, CreateCategoryOpt};
use crate::resolvable::{CategoryResolvable, Resolvable};
use crate::result::Record;
use crate::schema::descriptor::{CATEGORIES, EntityDescriptor};
use crate::schema::{MigrationPlan, MigrationStep, Table};
use crate::session::Session;

const COLUMNS: &str = "id, name, guild_id, emote, channel_id, is_active, description";

const INIT_SQL: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS modmail.categories
(
    id          BIGINT               NOT NULL
        CONSTRAINT categories_pk PRIMARY KEY,
    name        TEXT                 NOT NULL,
    guild_id    BIGINT               NOT NULL,
    emote       TEXT                 NOT NULL,
    channel_id  BIGINT,
    is_active   BOOLEAN DEFAULT true NOT NULL,
    description TEXT    DEFAULT ''   NOT NULL,
    CONSTRAINT categories_channel_activity_check
        CHECK ((channel_id IS NOT NULL) = is_active)
)",
    "CREATE UNIQUE INDEX IF NOT EXISTS categories_name_uindex ON modmail.categories (name)",
    "CREATE UNIQUE INDEX IF NOT EXISTS categories_emote_uindex ON modmail.categories (emote)",
    "CREATE UNIQUE INDEX IF NOT EXISTS categories_channel_id_uindex ON modmail.categories (channel_id)",
];

const RENAME_EMOJI_SQL: &str = "DO $$
BEGIN
    IF EXISTS (SELECT 1 FROM information_schema.columns
               WHERE table_schema = 'modmail' AND table_name = 'categories' AND column_name = 'emoji')
       AND NOT EXISTS (SELECT 1 FROM information_schema.columns
               WHERE table_schema = 'modmail' AND table_name = 'categories' AND column_name = 'emote')
    THEN
        ALTER TABLE modmail.categories RENAME COLUMN emoji TO emote;
    END IF;
END $$";

const ACTIVITY_CHECK_SQL: &str = "DO $$
BEGIN
    IF NOT EXISTS (SELECT 1 FROM pg_catalog.pg_constraint
                   WHERE conname = 'categories_channel_activity_check'
                     AND conrelid = 'modmail.categories'::regclass)
    THEN
        ALTER TABLE modmail.categories
            ADD CONSTRAINT categories_channel_activity_check
                CHECK ((channel_id IS NOT NULL) = is_active);
    END IF;
END $$";

/// Creates a single-column unique index unless one already covers `column`.
///
/// Older layouts declared `UNIQUE` inline, which left a `*_key` constraint
/// index behind.
fn unique_index_sql(column: &str) -> String {
    format!(
        "DO $$
BEGIN
    IF NOT EXISTS (SELECT 1
                   FROM pg_catalog.pg_index i
                            JOIN pg_catalog.pg_attribute a
                                 ON a.attrelid = i.indrelid AND a.attnum = i.indkey[0]
                   WHERE i.indrelid = 'modmail.categories'::regclass
                     AND i.indisunique
                     AND i.indnatts = 1
                     AND a.attname = '{column}')
    THEN
        CREATE UNIQUE INDEX categories_{column}_uindex ON modmail.categories ({column});
    END IF;
END $$"
    )
}

/// Categories and their activity state machine.
///
/// `channel_id` is bound exactly when `is_active` is true. Deactivation and
/// reactivation change both columns in one statement, and the store's check
/// constraint rejects any write that would split them.
pub struct CategoriesTable {
    session: Arc<dyn Session>,
    ids: Arc<SnowflakeGenerator>,
}

impl CategoriesTable {
    pub fn new(session: Arc<dyn Session>, ids: Arc<SnowflakeGenerator>) -> Self {
        Self { session, ids }
    }

    /// Steps that reconcile any known legacy layout with the current one.
    pub fn migration_plan() -> Result<MigrationPlan> {
        MigrationPlan::new(CATEGORIES.qualified_name)
            .with_step(MigrationStep::new("rename_emoji_to_emote").with_sql(RENAME_EMOJI_SQL))?
            .with_step(MigrationStep::new("add_description").with_sql(
                "ALTER TABLE modmail.categories ADD COLUMN IF NOT EXISTS description TEXT DEFAULT '' NOT NULL",
            ))?
            .with_step(
                MigrationStep::new("nullable_channel")
                    .with_sql("ALTER TABLE modmail.categories ALTER COLUMN channel_id DROP NOT NULL"),
            )?
            .with_step(MigrationStep::new("unbind_inactive_channels").with_sql(
                "UPDATE modmail.categories SET channel_id = NULL WHERE is_active = false AND channel_id IS NOT NULL",
            ))?
            .with_step(MigrationStep::new("deactivate_unbound").with_sql(
                "UPDATE modmail.categories SET is_active = false WHERE is_active = true AND channel_id IS NULL",
            ))?
            .with_step(MigrationStep::new("channel_activity_check").with_sql(ACTIVITY_CHECK_SQL))?
            .with_step(
                MigrationStep::new("unique_indexes")
                    .with_sql(unique_index_sql("name"))
                    .with_sql(unique_index_sql("emote"))
                    .with_sql(unique_index_sql("channel_id")),
            )
    }

    pub async fn create(&self, opt: CreateCategoryOpt) -> Result<Category> {
        let category = Category {
            id: self.ids.generate(),
            name: opt.name,
            guild_id: opt.guild_id,
            emote: opt.emote,
            channel_id: Some(opt.channel_id),
            description: opt.description.unwrap_or_default(),
            is_active: true,
        };

        self.session
            .execute(
                "INSERT INTO modmail.categories (id, name, guild_id, emote, channel_id, description, is_active)
                 VALUES ($1, $2, $3, $4, $5, $6, true)",
                &[
                    Value::Integer(category.id),
                    Value::from(category.name.as_str()),
                    Value::Integer(category.guild_id),
                    Value::from(category.emote.as_str()),
                    Value::from(category.channel_id),
                    Value::from(category.description.as_str()),
                ],
            )
            .await?;

        event!(Level::INFO, category = category.id, name = %category.name, "category created");
        Ok(category)
    }

    /// Marks a category inactive and unbinds its channel.
    pub async fn deactivate(&self, id: i64) -> Result<bool> {
        let updated = self
            .session
            .execute(
                "UPDATE modmail.categories SET is_active = false, channel_id = NULL WHERE id = $1",
                &[Value::Integer(id)],
            )
            .await?;

        event!(Level::DEBUG, category = id, updated, "category deactivated");
        Ok(updated != 0)
    }

    /// Marks a category active again, bound to `channel_id`.
    pub async fn reactivate(&self, id: i64, channel_id: i64) -> Result<bool> {
        let updated = self
            .session
            .execute(
                "UPDATE modmail.categories SET is_active = true, channel_id = $2 WHERE id = $1",
                &[Value::Integer(id), Value::Integer(channel_id)],
            )
            .await?;

        event!(Level::DEBUG, category = id, channel = channel_id, updated, "category reactivated");
        Ok(updated != 0)
    }

    pub async fn set_name(&self, id: i64, name: &str) -> Result<bool> {
        self.set_text("UPDATE modmail.categories SET name = $2 WHERE id = $1", id, name)
            .await
    }

    pub async fn set_emote(&self, id: i64, emote: &str) -> Result<bool> {
        self.set_text("UPDATE modmail.categories SET emote = $2 WHERE id = $1", id, emote)
            .await
    }

    pub async fn set_description(&self, id: i64, description: &str) -> Result<bool> {
        self.set_text(
            "UPDATE modmail.categories SET description = $2 WHERE id = $1",
            id,
            description,
        )
        .await
    }

    async fn set_text(&self, sql: &str, id: i64, value: &str) -> Result<bool> {
        let updated = self
            .session
            .execute(sql, &[Value::Integer(id), Value::from(value)])
            .await?;
        Ok(updated != 0)
    }

    /// Every category whose selected column equals `key`, ordered by id.
    pub async fn fetch_all(&self, by: CategoryResolvable, key: &str) -> Result<Vec<Category>> {
        let Some(value) = by.bind(key) else {
            return Ok(Vec::new());
        };

        let sql = format!(
            "SELECT {COLUMNS} FROM modmail.categories WHERE {} = $1 ORDER BY id",
            by.column()
        );
        let res = self.session.query(&sql, &[value]).await?;
        parse_all(&res, parse)
    }

    /// The first category, by id, whose selected column equals `key`.
    pub async fn fetch(&self, by: CategoryResolvable, key: &str) -> Result<Option<Category>> {
        Ok(self.fetch_all(by, key).await?.into_iter().next())
    }
}

fn parse(record: Record<'_>) -> Result<Category> {
    Ok(Category {
        id: record.i64("id")?,
        name: record.text("name")?,
        guild_id: record.i64("guild_id")?,
        emote: record.text("emote")?,
        channel_id: record.opt_i64("channel_id")?,
        description: record.text("description")?,
        is_active: record.bool("is_active")?,
    })
}

#[async_trait]
impl Table for CategoriesTable {
    fn descriptor(&self) -> &'static EntityDescriptor {
        &CATEGORIES
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
    use crate::core::DbError;
    use crate::result::QueryResult;
    use crate::schema::{LifecycleController, LifecycleOutcome};
    use crate::test_support::ScriptedSession;

    fn table(session: &Arc<ScriptedSession>) -> CategoriesTable {
        CategoriesTable::new(session.clone(), Arc::new(SnowflakeGenerator::default()))
    }

    fn category_rows(rows: Vec<Vec<Value>>) -> QueryResult {
        QueryResult::new(
            COLUMNS.split(", ").map(str::to_string).collect(),
            rows,
        )
    }

    #[tokio::test]
    async fn test_create_binds_channel_and_activates() {
        let session = Arc::new(ScriptedSession::new());
        let categories = table(&session);

        let created = categories
            .create(CreateCategoryOpt {
                name: "support".into(),
                description: None,
                guild_id: 1,
                emote: "🛟".into(),
                channel_id: 100,
            })
            .await
            .unwrap();

        assert!(created.is_active);
        assert_eq!(created.channel_id, Some(100));
        assert_eq!(created.description, "");

        let insert = &session.log()[0];
        assert_eq!(insert.params[4], Value::Integer(100));
        assert_eq!(insert.params[5], Value::from(""));
    }

    #[tokio::test]
    async fn test_deactivate_unbinds_in_one_statement() {
        let session = Arc::new(ScriptedSession::new());
        session.respond("SET is_active = false", QueryResult::new(vec![], vec![vec![]]));
        let categories = table(&session);

        assert!(categories.deactivate(7).await.unwrap());
        assert!(!categories.deactivate(8).await.unwrap());

        let log = session.log();
        assert_eq!(log.len(), 2);
        assert!(log[0].sql.contains("is_active = false, channel_id = NULL"));
    }

    #[tokio::test]
    async fn test_reactivate_rebinds_channel() {
        let session = Arc::new(ScriptedSession::new());
        let categories = table(&session);

        categories.reactivate(7, 200).await.unwrap();

        let stmt = &session.log()[0];
        assert!(stmt.sql.contains("is_active = true, channel_id = $2"));
        assert_eq!(stmt.params, vec![Value::Integer(7), Value::Integer(200)]);
    }

    #[tokio::test]
    async fn test_fetch_uses_selector_column_and_binds_key() {
        let session = Arc::new(ScriptedSession::new());
        session.respond(
            "WHERE name = $1",
            category_rows(vec![vec![
                Value::Integer(1),
                Value::from("support' OR '1'='1"),
                Value::Integer(1),
                Value::from("🛟"),
                Value::Null,
                Value::Boolean(false),
                Value::from(""),
            ]]),
        );
        let categories = table(&session);

        let found = categories
            .fetch(CategoryResolvable::Name, "support' OR '1'='1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.channel_id, None);
        assert!(!found.is_active);

        let stmt = &session.log()[0];
        assert!(!stmt.sql.contains("OR '1'"));
        assert_eq!(stmt.params, vec![Value::from("support' OR '1'='1")]);
    }

    #[tokio::test]
    async fn test_unparseable_numeric_key_matches_nothing() {
        let session = Arc::new(ScriptedSession::new());
        let categories = table(&session);

        let found = categories.fetch_all(CategoryResolvable::Channel, "c1").await.unwrap();
        assert!(found.is_empty());
        assert!(session.log().is_empty());
    }

    #[tokio::test]
    async fn test_activity_selector_binds_boolean() {
        let session = Arc::new(ScriptedSession::new());
        let categories = table(&session);

        categories.fetch_all(CategoryResolvable::Activity, "xyz").await.unwrap();

        let stmt = &session.log()[0];
        assert!(stmt.sql.contains("WHERE is_active = $1 ORDER BY id"));
        assert_eq!(stmt.params, vec![Value::Boolean(false)]);
    }

    #[test]
    fn test_migration_backfills_before_adding_check() {
        let plan = CategoriesTable::migration_plan().unwrap();
        let names: Vec<_> = plan.steps().iter().map(|s| s.name).collect();

        let backfill = names.iter().position(|n| *n == "unbind_inactive_channels").unwrap();
        let unbound = names.iter().position(|n| *n == "deactivate_unbound").unwrap();
        let check = names.iter().position(|n| *n == "channel_activity_check").unwrap();
        let relax = names.iter().position(|n| *n == "nullable_channel").unwrap();
        assert!(relax < backfill);
        assert!(backfill < check);
        assert!(unbound < check);
    }

    #[test]
    fn test_unique_indexes_skip_columns_already_unique() {
        let sql = unique_index_sql("channel_id");
        assert!(sql.contains("a.attname = 'channel_id'"));
        assert!(sql.contains("i.indisunique"));
        assert!(sql.contains("CREATE UNIQUE INDEX categories_channel_id_uindex ON modmail.categories (channel_id)"));
    }

    #[tokio::test]
    async fn test_validate_existing_table_runs_migration() {
        let session = Arc::new(ScriptedSession::new());
        session.add_table("categories");
        let controller = LifecycleController::new(session.clone());

        let outcome = controller.validate(&table(&session)).await.unwrap();
        assert_eq!(outcome, LifecycleOutcome::Migrated);

        let log = session.log();
        assert!(log.iter().any(|s| s.sql.contains("RENAME COLUMN emoji TO emote")));
        assert!(log.iter().any(|s| s.sql.starts_with("UPDATE modmail.categories SET channel_id = NULL")));
        assert!(log.iter().any(|s| s.sql.starts_with("UPDATE modmail.categories SET is_active = false")));
        assert!(!log.iter().any(|s| s.sql.starts_with("CREATE TABLE")));
    }

    #[tokio::test]
    async fn test_check_violation_surfaces_as_constraint_error() {
        let session = Arc::new(ScriptedSession::new());
        session.fail_on("SET is_active = true", || {
            DbError::constraint("categories_channel_activity_check", "check violation")
        });
        let categories = table(&session);

        let err = categories.reactivate(1, 2).await.unwrap_err();
        assert!(matches!(err, DbError::ConstraintViolation { .. }));
    }
}
