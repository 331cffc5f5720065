//! Row-level domain types returned by the entity managers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::DbError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub guild_id: i64,
    pub emote: String,
    /// Bound iff the category is active.
    pub channel_id: Option<i64>,
    pub description: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCategoryOpt {
    pub name: String,
    pub description: Option<String>,
    pub guild_id: i64,
    pub emote: String,
    pub channel_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: i64,
    pub author: i64,
    pub channel: i64,
    pub category: i64,
    pub is_active: bool,
    pub is_admin_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub modmail_id: i64,
    pub content: String,
    pub thread_id: i64,
    pub sender: i64,
    pub client_id: Option<i64>,
    pub is_deleted: bool,
    pub internal: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMessageOpt {
    pub content: String,
    pub thread_id: i64,
    pub sender: i64,
    pub client_id: Option<i64>,
    pub internal: bool,
}

/// An immutable, versioned snapshot of a message's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    pub message: i64,
    pub version: i32,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MuteStatus {
    pub user_id: i64,
    pub category_id: i64,
    /// Unix seconds at which the mute lapses.
    pub till: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleLevel {
    Admin,
    Mod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub category_id: i64,
    pub role_id: i64,
    pub level: RoleLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Image,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub message_id: i64,
    pub name: String,
    pub source: String,
    pub sender: i64,
    pub file_type: FileType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAttachmentOpt {
    pub message_id: i64,
    pub name: String,
    pub source: String,
    pub sender: i64,
    pub file_type: FileType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardReply {
    pub id: i64,
    pub name: String,
    pub reply: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateStandardReplyOpt {
    pub name: String,
    pub reply: String,
}

macro_rules! db_enum {
    ($ty:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = DbError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok(Self::$variant),)+
                    other => Err(DbError::TypeMismatch(format!(
                        "'{}' is not a valid {}",
                        other,
                        stringify!($ty)
                    ))),
                }
            }
        }
    };
}

db_enum!(RoleLevel { Admin => "admin", Mod => "mod" });
db_enum!(FileType { Image => "image", File => "file" });
