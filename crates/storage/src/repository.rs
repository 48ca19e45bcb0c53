use async_trait::async_trait;
use chrono::{DateTime, Utc};
use millionaire_core::model::{
    Game, GameDraft, GameId, Question, QuestionId, User, UserId, ValidatedQuestion,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A game together with the revision it was read at.
///
/// The revision is bumped on every successful save; saving with a stale
/// revision fails with `StorageError::Conflict`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredGame {
    pub game: Game,
    pub revision: u64,
}

/// Money to credit to a user in the same write as a game update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payout {
    pub user_id: UserId,
    pub amount: u64,
}

/// Question bank access.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Add a question to the bank.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn insert_question(&self, question: ValidatedQuestion)
    -> Result<QuestionId, StorageError>;

    /// All questions of the given difficulty level.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the bank cannot be read.
    async fn candidates(&self, level: u8) -> Result<Vec<Question>, StorageError>;

    /// Number of questions per level. Levels without questions are absent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the bank cannot be read.
    async fn count_by_level(&self) -> Result<BTreeMap<u8, u64>, StorageError>;
}

/// Players and their balances.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Register a user with a zero balance.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the name is taken.
    async fn create_user(&self, name: &str, created_at: DateTime<Utc>)
    -> Result<User, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn find_user_by_name(&self, name: &str) -> Result<Option<User>, StorageError>;

    /// Users with the highest balances first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn leaderboard(&self, limit: u32) -> Result<Vec<User>, StorageError>;
}

/// Game sessions and their question snapshots.
#[async_trait]
pub trait GameRepository: Send + Sync {
    /// Store a new game and its full ladder.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the user already has an unfinished game.
    async fn insert_game(&self, draft: GameDraft) -> Result<StoredGame, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the game cannot be read or rehydrated.
    async fn get_game(&self, id: GameId) -> Result<Option<StoredGame>, StorageError>;

    /// Id of the user's unfinished game, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn active_game_for_user(&self, user_id: UserId) -> Result<Option<GameId>, StorageError>;

    /// The user's games, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the games cannot be read.
    async fn games_for_user(&self, user_id: UserId, limit: u32)
    -> Result<Vec<Game>, StorageError>;

    /// Write back a game read at `expected_revision`, crediting `payout` in
    /// the same transaction. Returns the new revision.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the game changed since it was read
    /// or was already finished, and `StorageError::NotFound` if the game or
    /// the payout user does not exist. Nothing is written on error.
    async fn save_game(
        &self,
        game: &Game,
        expected_revision: u64,
        payout: Option<Payout>,
    ) -> Result<u64, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    questions: Vec<Question>,
    users: HashMap<UserId, User>,
    games: HashMap<GameId, StoredGame>,
    next_question_id: u64,
    next_user_id: u64,
    next_game_id: u64,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

fn next_id(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn insert_question(
        &self,
        question: ValidatedQuestion,
    ) -> Result<QuestionId, StorageError> {
        let mut guard = self.lock()?;
        let id = QuestionId::new(next_id(&mut guard.next_question_id));
        guard.questions.push(question.assign_id(id));
        Ok(id)
    }

    async fn candidates(&self, level: u8) -> Result<Vec<Question>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .questions
            .iter()
            .filter(|q| q.level() == level)
            .cloned()
            .collect())
    }

    async fn count_by_level(&self) -> Result<BTreeMap<u8, u64>, StorageError> {
        let guard = self.lock()?;
        let mut counts = BTreeMap::new();
        for q in &guard.questions {
            *counts.entry(q.level()).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn create_user(
        &self,
        name: &str,
        created_at: DateTime<Utc>,
    ) -> Result<User, StorageError> {
        let mut guard = self.lock()?;
        if guard.users.values().any(|u| u.name() == name) {
            return Err(StorageError::Conflict);
        }
        let id = UserId::new(next_id(&mut guard.next_user_id));
        let user = User::from_persisted(id, name, 0, created_at)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        guard.users.insert(id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn find_user_by_name(&self, name: &str) -> Result<Option<User>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.users.values().find(|u| u.name() == name).cloned())
    }

    async fn leaderboard(&self, limit: u32) -> Result<Vec<User>, StorageError> {
        let guard = self.lock()?;
        let mut users: Vec<User> = guard.users.values().cloned().collect();
        users.sort_by_key(|u| (std::cmp::Reverse(u.balance()), u.id()));
        users.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(users)
    }
}

#[async_trait]
impl GameRepository for InMemoryRepository {
    async fn insert_game(&self, draft: GameDraft) -> Result<StoredGame, StorageError> {
        let mut guard = self.lock()?;
        let user_id = draft.user_id();
        if !guard.users.contains_key(&user_id) {
            return Err(StorageError::NotFound);
        }
        if guard
            .games
            .values()
            .any(|s| s.game.user_id() == user_id && !s.game.is_finished())
        {
            return Err(StorageError::Conflict);
        }
        let id = GameId::new(next_id(&mut guard.next_game_id));
        let stored = StoredGame {
            game: draft.assign_id(id),
            revision: 0,
        };
        guard.games.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_game(&self, id: GameId) -> Result<Option<StoredGame>, StorageError> {
        Ok(self.lock()?.games.get(&id).cloned())
    }

    async fn active_game_for_user(&self, user_id: UserId) -> Result<Option<GameId>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .games
            .values()
            .find(|s| s.game.user_id() == user_id && !s.game.is_finished())
            .map(|s| s.game.id()))
    }

    async fn games_for_user(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<Game>, StorageError> {
        let guard = self.lock()?;
        let mut games: Vec<Game> = guard
            .games
            .values()
            .filter(|s| s.game.user_id() == user_id)
            .map(|s| s.game.clone())
            .collect();
        games.sort_by_key(|g| std::cmp::Reverse((g.created_at(), g.id())));
        games.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(games)
    }

    async fn save_game(
        &self,
        game: &Game,
        expected_revision: u64,
        payout: Option<Payout>,
    ) -> Result<u64, StorageError> {
        let mut guard = self.lock()?;
        let current = guard.games.get(&game.id()).ok_or(StorageError::NotFound)?;
        if current.revision != expected_revision || current.game.is_finished() {
            return Err(StorageError::Conflict);
        }
        if let Some(p) = payout
            && !guard.users.contains_key(&p.user_id)
        {
            return Err(StorageError::NotFound);
        }

        let revision = expected_revision + 1;
        guard.games.insert(
            game.id(),
            StoredGame {
                game: game.clone(),
                revision,
            },
        );
        if let Some(p) = payout
            && let Some(user) = guard.users.get_mut(&p.user_id)
        {
            user.credit(p.amount);
        }
        Ok(revision)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionRepository>,
    pub users: Arc<dyn UserRepository>,
    pub games: Arc<dyn GameRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let users: Arc<dyn UserRepository> = Arc::new(repo.clone());
        let games: Arc<dyn GameRepository> = Arc::new(repo);
        Self {
            questions,
            users,
            games,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use millionaire_core::ladder::LadderBuilder;
    use millionaire_core::model::{QuestionDraft, levels};
    use millionaire_core::rules::GameRules;
    use millionaire_core::time::fixed_now;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    async fn seeded_repo() -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        for level in levels() {
            let q = QuestionDraft::new(level, format!("Q{level}"), "right", ["w1", "w2", "w3"])
                .validate()
                .unwrap();
            repo.insert_question(q).await.unwrap();
        }
        repo
    }

    async fn draft_for(repo: &InMemoryRepository, user_id: UserId) -> GameDraft {
        let mut pool = Vec::new();
        for level in levels() {
            pool.extend(repo.candidates(level).await.unwrap());
        }
        let mut rng = StdRng::seed_from_u64(1);
        LadderBuilder::new(&GameRules::standard())
            .build(user_id, &pool, fixed_now(), &mut rng)
            .unwrap()
    }

    #[tokio::test]
    async fn second_active_game_conflicts() {
        let repo = seeded_repo().await;
        let user = repo.create_user("ann", fixed_now()).await.unwrap();

        let first = repo.insert_game(draft_for(&repo, user.id()).await).await.unwrap();
        let err = repo
            .insert_game(draft_for(&repo, user.id()).await)
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Conflict));
        assert_eq!(
            repo.active_game_for_user(user.id()).await.unwrap(),
            Some(first.game.id())
        );
    }

    #[tokio::test]
    async fn stale_revision_is_rejected() {
        let repo = seeded_repo().await;
        let user = repo.create_user("bob", fixed_now()).await.unwrap();
        let stored = repo.insert_game(draft_for(&repo, user.id()).await).await.unwrap();

        let mut game = stored.game.clone();
        let key = game.current_game_question().unwrap().correct_answer_key();
        game.answer_current_question(key.as_str(), fixed_now()).unwrap();

        assert_eq!(repo.save_game(&game, 0, None).await.unwrap(), 1);
        let err = repo.save_game(&game, 0, None).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn payout_credits_balance_with_game_update() {
        let repo = seeded_repo().await;
        let user = repo.create_user("cat", fixed_now()).await.unwrap();
        let stored = repo.insert_game(draft_for(&repo, user.id()).await).await.unwrap();

        let mut game = stored.game;
        let key = game.current_game_question().unwrap().correct_answer_key();
        game.answer_current_question(key.as_str(), fixed_now()).unwrap();
        let result = game.take_money(fixed_now()).unwrap();
        let payout = Payout {
            user_id: user.id(),
            amount: result.prize,
        };
        repo.save_game(&game, stored.revision, Some(payout))
            .await
            .unwrap();

        let user = repo.get_user(user.id()).await.unwrap().unwrap();
        assert_eq!(user.balance(), 100);
        assert_eq!(repo.active_game_for_user(user.id()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn leaderboard_orders_by_balance() {
        let repo = seeded_repo().await;
        let low = repo.create_user("low", fixed_now()).await.unwrap();
        let high = repo.create_user("high", fixed_now()).await.unwrap();
        {
            let mut guard = repo.lock().unwrap();
            guard.users.get_mut(&high.id()).unwrap().credit(500);
            guard.users.get_mut(&low.id()).unwrap().credit(5);
        }

        let board = repo.leaderboard(10).await.unwrap();
        let names: Vec<&str> = board.iter().map(User::name).collect();
        assert_eq!(names, vec!["high", "low"]);
        assert_eq!(repo.count_by_level().await.unwrap().len(), 15);
    }
}
