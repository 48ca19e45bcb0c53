use std::sync::Arc;

use millionaire_core::rules::GameRules;
use storage::repository::Storage;

use crate::Clock;
use crate::error::AppServicesError;
use crate::game_service::GameService;
use crate::user_service::UserService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    games: Arc<GameService>,
    users: Arc<UserService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// `seed` makes question selection, shuffles and help results
    /// reproducible.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        rules: GameRules,
        seed: Option<u64>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, rules, seed))
    }

    #[must_use]
    pub fn in_memory(clock: Clock, rules: GameRules, seed: Option<u64>) -> Self {
        Self::from_storage(&Storage::in_memory(), clock, rules, seed)
    }

    #[must_use]
    pub fn from_storage(
        storage: &Storage,
        clock: Clock,
        rules: GameRules,
        seed: Option<u64>,
    ) -> Self {
        let mut games = GameService::new(
            clock,
            rules,
            Arc::clone(&storage.questions),
            Arc::clone(&storage.users),
            Arc::clone(&storage.games),
        );
        if let Some(seed) = seed {
            games = games.with_seed(seed);
        }
        let users = UserService::new(clock, Arc::clone(&storage.users));
        Self {
            games: Arc::new(games),
            users: Arc::new(users),
        }
    }

    #[must_use]
    pub fn games(&self) -> Arc<GameService> {
        Arc::clone(&self.games)
    }

    #[must_use]
    pub fn users(&self) -> Arc<UserService> {
        Arc::clone(&self.users)
    }
}
