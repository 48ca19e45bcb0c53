use chrono::Duration;
use thiserror::Error;

use crate::prize::PrizeTable;

/// Default time a player has to finish a game.
pub const DEFAULT_TIME_LIMIT_MINUTES: i64 = 35;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RulesError {
    #[error("time limit must be positive")]
    InvalidTimeLimit,
}

/// Per-deployment game configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRules {
    time_limit: Duration,
    prizes: PrizeTable,
}

impl GameRules {
    /// # Errors
    ///
    /// Returns `RulesError::InvalidTimeLimit` for zero or negative limits.
    pub fn new(time_limit: Duration) -> Result<Self, RulesError> {
        if time_limit <= Duration::zero() {
            return Err(RulesError::InvalidTimeLimit);
        }
        Ok(Self {
            time_limit,
            prizes: PrizeTable::STANDARD,
        })
    }

    /// # Errors
    ///
    /// Returns `RulesError::InvalidTimeLimit` for a zero limit.
    pub fn with_time_limit_minutes(minutes: u32) -> Result<Self, RulesError> {
        Self::new(Duration::minutes(i64::from(minutes)))
    }

    /// 35 minutes and the standard prize table.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            time_limit: Duration::minutes(DEFAULT_TIME_LIMIT_MINUTES),
            prizes: PrizeTable::STANDARD,
        }
    }

    #[must_use]
    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    #[must_use]
    pub fn prizes(&self) -> &PrizeTable {
        &self.prizes
    }
}

impl Default for GameRules {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_time_limit_is_rejected() {
        assert_eq!(
            GameRules::new(Duration::zero()).unwrap_err(),
            RulesError::InvalidTimeLimit
        );
        assert!(GameRules::with_time_limit_minutes(0).is_err());
    }

    #[test]
    fn standard_rules_allow_35_minutes() {
        let rules = GameRules::standard();
        assert_eq!(rules.time_limit(), Duration::minutes(35));
        assert_eq!(rules.prizes(), &PrizeTable::STANDARD);
    }
}
