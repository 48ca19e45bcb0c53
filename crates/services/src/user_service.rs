use std::sync::Arc;

use millionaire_core::model::{User, UserId};
use storage::repository::{StorageError, UserRepository};

use crate::Clock;
use crate::error::UserServiceError;

/// Player registration, balances and the leaderboard.
#[derive(Clone)]
pub struct UserService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
}

impl UserService {
    #[must_use]
    pub fn new(clock: Clock, users: Arc<dyn UserRepository>) -> Self {
        Self { clock, users }
    }

    /// Register a player under `name` (trimmed).
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::User` for an invalid name,
    /// `UserServiceError::NameTaken` if it is in use, and
    /// `UserServiceError::Storage` on repository failures.
    pub async fn register(&self, name: &str) -> Result<User, UserServiceError> {
        let name = User::validate_name(name)?;
        match self.users.create_user(&name, self.clock.now()).await {
            Ok(user) => {
                log::info!("registered user {} as {}", user.name(), user.id());
                Ok(user)
            }
            Err(StorageError::Conflict) => Err(UserServiceError::NameTaken(name)),
            Err(err) => Err(err.into()),
        }
    }

    /// Look up `name`, registering it on first use.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::register`].
    pub async fn get_or_register(&self, name: &str) -> Result<User, UserServiceError> {
        let name = User::validate_name(name)?;
        if let Some(user) = self.users.find_user_by_name(&name).await? {
            return Ok(user);
        }
        match self.register(&name).await {
            // Lost a race with another registration of the same name.
            Err(UserServiceError::NameTaken(_)) => self
                .users
                .find_user_by_name(&name)
                .await?
                .ok_or(UserServiceError::NotFound),
            other => other,
        }
    }

    /// # Errors
    ///
    /// Returns `UserServiceError::NotFound` for an unknown id.
    pub async fn get_user(&self, id: UserId) -> Result<User, UserServiceError> {
        self.users
            .get_user(id)
            .await?
            .ok_or(UserServiceError::NotFound)
    }

    /// Players ordered by balance, richest first.
    ///
    /// # Errors
    ///
    /// Returns `UserServiceError::Storage` on repository failures.
    pub async fn leaderboard(&self, limit: u32) -> Result<Vec<User>, UserServiceError> {
        Ok(self.users.leaderboard(limit).await?)
    }
}
