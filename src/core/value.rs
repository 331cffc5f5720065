use std::fmt;

use crate::core::{DbError, Result};

/// A bound parameter or a decoded column value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Null,
    Integer(i64),
    Text(String),
    Boolean(bool),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Integer(_) => "INTEGER",
            Self::Text(_) => "TEXT",
            Self::Boolean(_) => "BOOLEAN",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn expect_i64(&self, column: &str) -> Result<i64> {
        self.as_i64().ok_or_else(|| mismatch(column, "INTEGER", self))
    }

    pub fn expect_text(&self, column: &str) -> Result<String> {
        self.as_str()
            .map(str::to_string)
            .ok_or_else(|| mismatch(column, "TEXT", self))
    }

    pub fn expect_bool(&self, column: &str) -> Result<bool> {
        self.as_bool().ok_or_else(|| mismatch(column, "BOOLEAN", self))
    }

    /// Reads a nullable integer column.
    pub fn optional_i64(&self, column: &str) -> Result<Option<i64>> {
        match self {
            Self::Null => Ok(None),
            other => other.expect_i64(column).map(Some),
        }
    }
}

fn mismatch(column: &str, expected: &str, got: &Value) -> DbError {
    DbError::TypeMismatch(format!(
        "Column '{}' expects type {}, got {}",
        column,
        expected,
        got.type_name()
    ))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Text(s) => write!(f, "{}", s),
            Self::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
