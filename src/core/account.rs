use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of an account interacting with the pool.
///
/// An account owns at most one position and may act as caller,
/// beneficiary, liquidator or admin.
///
/// # Examples
///
/// ```
/// use margin_engine::core::account::AccountId;
///
/// let alice = AccountId::new("alice");
/// let bob = AccountId::new("bob");
/// assert_ne!(alice, bob);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string representation of this account.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_equality() {
        assert_eq!(AccountId::new("lender"), AccountId::from("lender"));
        assert_ne!(AccountId::new("lender"), AccountId::new("shorter"));
    }

    #[test]
    fn test_account_display() {
        assert_eq!(format!("{}", AccountId::new("treasury")), "treasury");
    }

    #[test]
    fn test_account_serializes_as_string() {
        let json = serde_json::to_string(&AccountId::new("alice")).unwrap();
        assert_eq!(json, "\"alice\"");
    }
}
