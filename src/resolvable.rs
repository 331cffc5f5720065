//! Resolve-by-selector lookups.
//!
//! A selector, never caller input, picks the lookup column; the caller's key
//! is only ever a bound parameter.

use crate::core::Value;

/// A fixed, enumerated lookup selector for one table.
pub trait Resolvable: Copy {
    /// The trusted column identifier for this selector.
    fn column(self) -> &'static str;

    /// Coerces a caller-supplied key into the column's bound value.
    ///
    /// `None` means the key cannot denote any stored value, so the lookup
    /// matches nothing.
    fn bind(self, raw: &str) -> Option<Value>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryResolvable {
    Name,
    Channel,
    Emote,
    Activity,
    Id,
    Guild,
}

impl Resolvable for CategoryResolvable {
    fn column(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Channel => "channel_id",
            Self::Emote => "emote",
            Self::Activity => "is_active",
            Self::Id => "id",
            Self::Guild => "guild_id",
        }
    }

    fn bind(self, raw: &str) -> Option<Value> {
        match self {
            Self::Name | Self::Emote => Some(Value::from(raw)),
            // Exactly "true" is true; every other key is false.
            Self::Activity => Some(Value::Boolean(raw == "true")),
            Self::Channel | Self::Id | Self::Guild => raw.parse::<i64>().ok().map(Value::Integer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_come_from_fixed_set() {
        let columns: Vec<_> = [
            CategoryResolvable::Name,
            CategoryResolvable::Channel,
            CategoryResolvable::Emote,
            CategoryResolvable::Activity,
            CategoryResolvable::Id,
            CategoryResolvable::Guild,
        ]
        .into_iter()
        .map(Resolvable::column)
        .collect();

        assert_eq!(
            columns,
            vec!["name", "channel_id", "emote", "is_active", "id", "guild_id"]
        );
    }

    #[test]
    fn test_activity_coercion() {
        let activity = CategoryResolvable::Activity;
        assert_eq!(activity.bind("true"), Some(Value::Boolean(true)));
        assert_eq!(activity.bind("false"), Some(Value::Boolean(false)));
        assert_eq!(activity.bind("xyz"), Some(Value::Boolean(false)));
        assert_eq!(activity.bind("TRUE"), Some(Value::Boolean(false)));
        assert_eq!(activity.bind(" true"), Some(Value::Boolean(false)));
    }

    #[test]
    fn test_numeric_keys() {
        assert_eq!(CategoryResolvable::Id.bind("42"), Some(Value::Integer(42)));
        assert_eq!(CategoryResolvable::Guild.bind("not-a-snowflake"), None);
    }

    #[test]
    fn test_text_keys_bind_verbatim() {
        let hostile = "support' OR '1'='1";
        assert_eq!(CategoryResolvable::Name.bind(hostile), Some(Value::from(hostile)));
        assert_eq!(CategoryResolvable::Emote.bind("🛟"), Some(Value::from("🛟")));
    }
}
