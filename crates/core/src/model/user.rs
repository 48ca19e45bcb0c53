use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::UserId;

/// Longest accepted player name, in characters.
pub const MAX_NAME_LEN: usize = 64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error("user name cannot be empty")]
    EmptyName,

    #[error("user name is longer than {max} characters")]
    NameTooLong { max: usize },
}

/// A registered player and the money they have won so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    name: String,
    balance: u64,
    created_at: DateTime<Utc>,
}

impl User {
    /// Normalize a player name.
    ///
    /// # Errors
    ///
    /// Returns `UserError` if the trimmed name is empty or too long.
    pub fn validate_name(name: &str) -> Result<String, UserError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(UserError::EmptyName);
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(UserError::NameTooLong { max: MAX_NAME_LEN });
        }
        Ok(name.to_owned())
    }

    /// # Errors
    ///
    /// Returns `UserError` if the name is invalid.
    pub fn from_persisted(
        id: UserId,
        name: &str,
        balance: u64,
        created_at: DateTime<Utc>,
    ) -> Result<Self, UserError> {
        Ok(Self {
            id,
            name: Self::validate_name(name)?,
            balance,
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn balance(&self) -> u64 {
        self.balance
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Add winnings; saturates instead of overflowing.
    pub fn credit(&mut self, amount: u64) {
        self.balance = self.balance.saturating_add(amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn name_is_trimmed() {
        let user = User::from_persisted(UserId::new(1), "  Ann ", 0, fixed_now()).unwrap();
        assert_eq!(user.name(), "Ann");
    }

    #[test]
    fn blank_or_long_names_are_rejected() {
        assert_eq!(User::validate_name("   "), Err(UserError::EmptyName));
        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert!(matches!(
            User::validate_name(&long),
            Err(UserError::NameTooLong { .. })
        ));
    }

    #[test]
    fn credit_adds_to_balance() {
        let mut user = User::from_persisted(UserId::new(1), "Ann", 100, fixed_now()).unwrap();
        user.credit(200);
        assert_eq!(user.balance(), 300);
    }
}
