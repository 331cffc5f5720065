use std::fmt;

use serde::Serialize;

/// Namespace (PostgreSQL schema) holding every modmail table.
pub const NAMESPACE: &str = "modmail";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Users,
    Categories,
    Threads,
    Messages,
    Attachments,
    Edits,
    Mutes,
    Permissions,
    StandardReplies,
}

/// Static metadata of one entity.
///
/// `depends_on` lists the entities whose validation must complete before
/// this one starts: foreign-key targets, plus `messages` for the tail group
/// that is brought up once the message chain exists.
#[derive(Debug, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub kind: EntityKind,
    pub physical_name: &'static str,
    pub qualified_name: &'static str,
    pub depends_on: &'static [EntityKind],
}

pub static USERS: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Users,
    physical_name: "users",
    qualified_name: "modmail.users",
    depends_on: &[],
};

pub static CATEGORIES: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Categories,
    physical_name: "categories",
    qualified_name: "modmail.categories",
    depends_on: &[EntityKind::Users],
};

pub static THREADS: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Threads,
    physical_name: "threads",
    qualified_name: "modmail.threads",
    depends_on: &[EntityKind::Users, EntityKind::Categories],
};

pub static MESSAGES: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Messages,
    physical_name: "messages",
    qualified_name: "modmail.messages",
    depends_on: &[EntityKind::Threads, EntityKind::Users],
};

pub static ATTACHMENTS: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Attachments,
    physical_name: "attachments",
    qualified_name: "modmail.attachments",
    depends_on: &[EntityKind::Messages, EntityKind::Users],
};

pub static EDITS: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Edits,
    physical_name: "edits",
    qualified_name: "modmail.edits",
    depends_on: &[EntityKind::Messages],
};

pub static MUTES: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Mutes,
    physical_name: "mutes",
    qualified_name: "modmail.mutes",
    depends_on: &[EntityKind::Messages, EntityKind::Users, EntityKind::Categories],
};

pub static PERMISSIONS: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Permissions,
    physical_name: "permissions",
    qualified_name: "modmail.permissions",
    depends_on: &[EntityKind::Messages, EntityKind::Categories],
};

pub static STANDARD_REPLIES: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::StandardReplies,
    physical_name: "standard_replies",
    qualified_name: "modmail.standard_replies",
    depends_on: &[EntityKind::Messages],
};

impl EntityKind {
    pub const ALL: [EntityKind; 9] = [
        Self::Users,
        Self::Categories,
        Self::Threads,
        Self::Messages,
        Self::Attachments,
        Self::Edits,
        Self::Mutes,
        Self::Permissions,
        Self::StandardReplies,
    ];

    pub fn descriptor(self) -> &'static EntityDescriptor {
        match self {
            Self::Users => &USERS,
            Self::Categories => &CATEGORIES,
            Self::Threads => &THREADS,
            Self::Messages => &MESSAGES,
            Self::Attachments => &ATTACHMENTS,
            Self::Edits => &EDITS,
            Self::Mutes => &MUTES,
            Self::Permissions => &PERMISSIONS,
            Self::StandardReplies => &STANDARD_REPLIES,
        }
    }

    pub fn physical_name(self) -> &'static str {
        self.descriptor().physical_name
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.physical_name())
    }
}

/// Descriptors of every entity, in declaration order.
pub fn all_descriptors() -> Vec<&'static EntityDescriptor> {
    EntityKind::ALL.iter().map(|kind| kind.descriptor()).collect()
}
