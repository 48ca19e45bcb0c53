//! Shared error types for the services crate.

use thiserror::Error;

use millionaire_core::ladder::LadderError;
use millionaire_core::model::{GameError, GameId, UserError};
use millionaire_core::rules::RulesError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `GameService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GameServiceError {
    #[error("not enough questions to build a game (level {level} has none)")]
    InsufficientQuestions { level: u8 },
    #[error("user already has game {0} in progress")]
    GameInProgress(GameId),
    #[error("game or user not found")]
    NotFound,
    #[error("game belongs to another user")]
    NotOwner,
    #[error(transparent)]
    Game(#[from] GameError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<LadderError> for GameServiceError {
    fn from(err: LadderError) -> Self {
        match err {
            LadderError::InsufficientQuestions { level } => Self::InsufficientQuestions { level },
        }
    }
}

/// Errors emitted by `UserService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UserServiceError {
    #[error("name {0:?} is already taken")]
    NameTaken(String),
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Rules(#[from] RulesError),
}
