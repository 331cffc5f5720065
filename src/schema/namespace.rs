use tracing::{Level, event};

use super::descriptor::NAMESPACE;
use super::introspector::SchemaIntrospector;
use crate::core::Result;
use crate::session::Session;

/// A namespace-level enum type and the statement that creates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumType {
    pub name: &'static str,
    pub create_sql: &'static str,
}

pub const FILE_TYPE: EnumType = EnumType {
    name: "file_type",
    create_sql: "CREATE TYPE modmail.file_type AS ENUM ('image', 'file')",
};

pub const ROLE_LEVEL: EnumType = EnumType {
    name: "role_level",
    create_sql: "CREATE TYPE modmail.role_level AS ENUM ('admin', 'mod')",
};

pub const ENUM_TYPES: [EnumType; 2] = [FILE_TYPE, ROLE_LEVEL];

const CREATE_SCHEMA_SQL: &str = "CREATE SCHEMA IF NOT EXISTS modmail";

/// Creates the namespace and its enum types when missing.
///
/// `CREATE TYPE` has no `IF NOT EXISTS`, so each type is looked up first.
pub async fn bootstrap(session: &dyn Session, introspector: &SchemaIntrospector) -> Result<()> {
    session.execute(CREATE_SCHEMA_SQL, &[]).await?;

    for enum_type in ENUM_TYPES {
        if introspector.type_exists(NAMESPACE, enum_type.name).await? {
            continue;
        }
        session.execute(enum_type.create_sql, &[]).await?;
        event!(Level::INFO, r#type = enum_type.name, "enum type created");
    }

    Ok(())
}
