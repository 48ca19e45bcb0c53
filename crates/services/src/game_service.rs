use std::sync::{Arc, Mutex, PoisonError};

use millionaire_core::help::{HelpState, HelpType};
use millionaire_core::ladder::LadderBuilder;
use millionaire_core::model::{
    AnswerOutcome, Game, GameError, GameId, GameResult, UserId, levels,
};
use millionaire_core::rules::GameRules;
use rand::SeedableRng;
use rand::rngs::StdRng;
use storage::repository::{
    GameRepository, Payout, QuestionRepository, StorageError, StoredGame, UserRepository,
};

use crate::Clock;
use crate::error::GameServiceError;

/// Orchestrates a player's games: creation, answers, help, cash-out.
///
/// Every mutation is written back with the revision it was read at, so a
/// duplicate submission racing the first one fails with a storage conflict
/// instead of applying twice. Finishing a game credits its prize to the
/// owner in the same write.
#[derive(Clone)]
pub struct GameService {
    clock: Clock,
    rules: GameRules,
    rng: Arc<Mutex<StdRng>>,
    questions: Arc<dyn QuestionRepository>,
    users: Arc<dyn UserRepository>,
    games: Arc<dyn GameRepository>,
}

impl GameService {
    #[must_use]
    pub fn new(
        clock: Clock,
        rules: GameRules,
        questions: Arc<dyn QuestionRepository>,
        users: Arc<dyn UserRepository>,
        games: Arc<dyn GameRepository>,
    ) -> Self {
        Self {
            clock,
            rules,
            rng: Arc::new(Mutex::new(StdRng::from_os_rng())),
            questions,
            users,
            games,
        }
    }

    /// Replace the random source with a seeded one.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Arc::new(Mutex::new(StdRng::seed_from_u64(seed)));
        self
    }

    #[must_use]
    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Start a new game for `user_id`.
    ///
    /// An unfinished game whose time is up is closed as a timeout first.
    ///
    /// # Errors
    ///
    /// Returns `GameServiceError::GameInProgress` if the user still has a live
    /// game, `GameServiceError::InsufficientQuestions` if some level has no
    /// question, `GameServiceError::NotFound` for an unknown user, and
    /// `GameServiceError::Storage` on repository failures.
    pub async fn create_game(&self, user_id: UserId) -> Result<Game, GameServiceError> {
        if self.users.get_user(user_id).await?.is_none() {
            return Err(GameServiceError::NotFound);
        }
        if let Some(active) = self.games.active_game_for_user(user_id).await?
            && self.expire_if_due(active).await?.is_none()
        {
            log::warn!("user {user_id} asked for a new game while {active} is in progress");
            return Err(GameServiceError::GameInProgress(active));
        }

        let mut pool = Vec::new();
        for level in levels() {
            pool.extend(self.questions.candidates(level).await?);
        }
        let draft = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            LadderBuilder::new(&self.rules).build(user_id, &pool, self.clock.now(), &mut *rng)?
        };

        match self.games.insert_game(draft).await {
            Ok(stored) => {
                log::info!("user {user_id} started game {}", stored.game.id());
                Ok(stored.game)
            }
            Err(StorageError::Conflict) => {
                let active = self.games.active_game_for_user(user_id).await?;
                Err(active.map_or(
                    GameServiceError::Storage(StorageError::Conflict),
                    GameServiceError::GameInProgress,
                ))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Fetch a game owned by `user_id`, closing it if its time ran out.
    ///
    /// # Errors
    ///
    /// Returns `GameServiceError::NotFound` or `GameServiceError::NotOwner`
    /// when the game is not visible to the user, and
    /// `GameServiceError::Storage` on repository failures.
    pub async fn get_game(&self, game_id: GameId, user_id: UserId) -> Result<Game, GameServiceError> {
        let stored = self.load_owned(game_id, user_id).await?;
        let mut game = stored.game.clone();
        if game.time_out(self.clock.now()).is_none() {
            return Ok(game);
        }
        match self.persist(&game, stored.revision).await {
            Ok(()) => Ok(game),
            // Someone else finished it first; theirs is the stored truth.
            Err(GameServiceError::Storage(StorageError::Conflict)) => {
                Ok(self.load_owned(game_id, user_id).await?.game)
            }
            Err(err) => Err(err),
        }
    }

    /// Submit `letter` for the current question.
    ///
    /// # Errors
    ///
    /// Returns `GameServiceError::Game(GameError::AlreadyFinished)` for a
    /// finished game, ownership errors as in [`Self::get_game`], and
    /// `GameServiceError::Storage` if the write loses a race.
    pub async fn answer(
        &self,
        game_id: GameId,
        user_id: UserId,
        letter: &str,
    ) -> Result<AnswerOutcome, GameServiceError> {
        let stored = self.load_owned(game_id, user_id).await?;
        let mut game = stored.game;
        let outcome = game.answer_current_question(letter, self.clock.now())?;
        self.persist(&game, stored.revision).await?;

        match outcome {
            AnswerOutcome::Continue { current_level } => {
                log::debug!("game {game_id}: correct answer, now at level {current_level}");
            }
            AnswerOutcome::Finished(result) => {
                log::info!("game {game_id} finished: {} with {}", result.status, result.prize);
            }
        }
        Ok(outcome)
    }

    /// Spend `help` on the current question and return its result.
    ///
    /// # Errors
    ///
    /// Returns `GameServiceError::Game` with `HelpAlreadyUsed` when the help
    /// was spent earlier in this game, or `AlreadyFinished` when the game is
    /// over (including when its time has just run out).
    pub async fn use_help(
        &self,
        game_id: GameId,
        user_id: UserId,
        help: HelpType,
    ) -> Result<HelpState, GameServiceError> {
        let stored = self.load_owned(game_id, user_id).await?;
        let mut game = stored.game;

        if game.time_out(self.clock.now()).is_some() {
            self.persist(&game, stored.revision).await?;
            return Err(GameError::AlreadyFinished.into());
        }

        let state = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            match game.use_help(help, &mut *rng) {
                Ok(state) => state.clone(),
                Err(err) => {
                    log::warn!("game {game_id}: rejected help {help}: {err}");
                    return Err(err.into());
                }
            }
        };
        self.persist(&game, stored.revision).await?;
        log::debug!("game {game_id}: used {help}");
        Ok(state)
    }

    /// Stop playing and keep the prize for the last answered question.
    ///
    /// # Errors
    ///
    /// Returns `GameServiceError::Game(GameError::AlreadyFinished)` for a
    /// finished game and ownership or storage errors as in [`Self::answer`].
    pub async fn take_money(
        &self,
        game_id: GameId,
        user_id: UserId,
    ) -> Result<GameResult, GameServiceError> {
        let stored = self.load_owned(game_id, user_id).await?;
        let mut game = stored.game;
        let result = game.take_money(self.clock.now())?;
        self.persist(&game, stored.revision).await?;
        log::info!("game {game_id} finished: {} with {}", result.status, result.prize);
        Ok(result)
    }

    /// The user's games, newest first.
    ///
    /// # Errors
    ///
    /// Returns `GameServiceError::Storage` on repository failures.
    pub async fn games_for_user(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<Game>, GameServiceError> {
        Ok(self.games.games_for_user(user_id, limit).await?)
    }

    async fn load_owned(
        &self,
        game_id: GameId,
        user_id: UserId,
    ) -> Result<StoredGame, GameServiceError> {
        let stored = self
            .games
            .get_game(game_id)
            .await?
            .ok_or(GameServiceError::NotFound)?;
        if stored.game.user_id() != user_id {
            log::warn!("user {user_id} tried to access game {game_id}");
            return Err(GameServiceError::NotOwner);
        }
        Ok(stored)
    }

    /// Close `game_id` if its time is up. Returns the result if it was closed.
    async fn expire_if_due(&self, game_id: GameId) -> Result<Option<GameResult>, GameServiceError> {
        let Some(stored) = self.games.get_game(game_id).await? else {
            return Ok(None);
        };
        let mut game = stored.game;
        let Some(result) = game.time_out(self.clock.now()) else {
            return Ok(None);
        };
        self.persist(&game, stored.revision).await?;
        log::info!("game {game_id} timed out with {}", result.prize);
        Ok(Some(result))
    }

    async fn persist(&self, game: &Game, revision: u64) -> Result<(), GameServiceError> {
        let payout = game
            .result()
            .filter(|result| result.prize > 0)
            .map(|result| Payout {
                user_id: game.user_id(),
                amount: result.prize,
            });
        match self.games.save_game(game, revision, payout).await {
            Ok(_) => Ok(()),
            Err(err) => {
                if matches!(err, StorageError::Conflict) {
                    log::warn!("game {}: concurrent update rejected", game.id());
                }
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use millionaire_core::model::{GameStatus, QuestionDraft};
    use millionaire_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryRepository;

    async fn setup(clock: Clock) -> (InMemoryRepository, GameService, UserId) {
        let repo = InMemoryRepository::new();
        for level in levels() {
            let q = QuestionDraft::new(level, format!("Q{level}"), "right", ["a", "b", "c"])
                .validate()
                .unwrap();
            repo.insert_question(q).await.unwrap();
        }
        let user = repo.create_user("ann", fixed_now()).await.unwrap();
        (repo.clone(), service(&repo, clock), user.id())
    }

    fn service(repo: &InMemoryRepository, clock: Clock) -> GameService {
        GameService::new(
            clock,
            GameRules::standard(),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
        .with_seed(7)
    }

    #[tokio::test]
    async fn second_game_is_refused_while_first_is_live() {
        let (_repo, svc, user) = setup(fixed_clock()).await;
        let game = svc.create_game(user).await.unwrap();

        let err = svc.create_game(user).await.unwrap_err();
        assert!(matches!(err, GameServiceError::GameInProgress(id) if id == game.id()));
    }

    #[tokio::test]
    async fn expired_game_is_closed_before_a_new_one_starts() {
        let (repo, svc, user) = setup(fixed_clock()).await;
        let first = svc.create_game(user).await.unwrap();

        let later = service(&repo, fixed_clock().advanced(Duration::minutes(36)));
        let second = later.create_game(user).await.unwrap();
        assert_ne!(second.id(), first.id());

        let closed = later.get_game(first.id(), user).await.unwrap();
        assert_eq!(closed.status(), GameStatus::Timeout);
    }

    #[tokio::test]
    async fn other_users_cannot_see_a_game() {
        let (repo, svc, user) = setup(fixed_clock()).await;
        let intruder = repo.create_user("eve", fixed_now()).await.unwrap();
        let game = svc.create_game(user).await.unwrap();

        let err = svc.get_game(game.id(), intruder.id()).await.unwrap_err();
        assert!(matches!(err, GameServiceError::NotOwner));
        let err = svc.get_game(GameId::new(404), user).await.unwrap_err();
        assert!(matches!(err, GameServiceError::NotFound));
    }

    #[tokio::test]
    async fn empty_bank_reports_missing_level() {
        let repo = InMemoryRepository::new();
        let user = repo.create_user("bob", fixed_now()).await.unwrap();
        let svc = service(&repo, fixed_clock());

        let err = svc.create_game(user.id()).await.unwrap_err();
        assert!(matches!(err, GameServiceError::InsufficientQuestions { level: 0 }));
    }

    #[tokio::test]
    async fn help_after_timeout_is_refused_and_game_closed() {
        let (repo, svc, user) = setup(fixed_clock()).await;
        let game = svc.create_game(user).await.unwrap();

        let later = service(&repo, fixed_clock().advanced(Duration::minutes(40)));
        let err = later
            .use_help(game.id(), user, HelpType::AudienceHelp)
            .await
            .unwrap_err();
        assert!(matches!(err, GameServiceError::Game(GameError::AlreadyFinished)));
        assert_eq!(
            later.get_game(game.id(), user).await.unwrap().status(),
            GameStatus::Timeout
        );
    }
}
