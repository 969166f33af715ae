//! Opaque user and call identifiers.
//!
//! Both are externally assigned, non-empty, case-sensitive strings compared
//! by equality (spec §3). Wrapping them in newtypes keeps a stray `String`
//! from being passed where a `UserId` or `CallId` is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<String> for CallId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl UserId {
    /// Non-empty after trimming ASCII/Unicode whitespace (spec §3: "opaque
    /// non-empty string").
    pub fn is_valid(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

impl CallId {
    pub fn is_valid(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_user_id() {
        assert!(!UserId("   ".to_string()).is_valid());
        assert!(!UserId(String::new()).is_valid());
    }

    #[test]
    fn accepts_nonempty_user_id() {
        assert!(UserId("alice".to_string()).is_valid());
    }

    #[test]
    fn display_matches_inner_string() {
        assert_eq!(UserId("alice".to_string()).to_string(), "alice");
        assert_eq!(CallId("c1".to_string()).to_string(), "c1");
    }
}
