//! Record identifiers and the auto-generate sentinel.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A record's identifier: either a string or an integer, matching what the
/// caller may supply explicitly.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordId {
    Str(String),
    Int(i64),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s}"),
            Self::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for RecordId {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

/// The key a caller passes to `Table::insert`: either an explicit id or the
/// auto-generate sentinel.
///
/// The source uses a type itself as the sentinel value; here it is an
/// explicit enum variant instead (see design notes on sentinel types).
#[derive(Clone, Debug)]
pub enum Key {
    Auto,
    Given(RecordId),
}

impl From<RecordId> for Key {
    fn from(id: RecordId) -> Self {
        Self::Given(id)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::Given(RecordId::from(s))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self::Given(RecordId::from(s))
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Self::Given(RecordId::from(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_display() {
        assert_eq!(RecordId::Str("abc".into()).to_string(), "abc");
        assert_eq!(RecordId::Int(42).to_string(), "42");
    }

    #[test]
    fn test_key_from_conversions() {
        assert!(matches!(Key::from("a"), Key::Given(RecordId::Str(_))));
        assert!(matches!(Key::from(7i64), Key::Given(RecordId::Int(7))));
    }
}
