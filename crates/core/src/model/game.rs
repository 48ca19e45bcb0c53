use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::help::{self, HelpState, HelpType};
use crate::model::game_question::GameQuestion;
use crate::model::ids::{GameId, UserId};
use crate::model::question::LADDER_LENGTH;
use crate::rules::GameRules;

/// Level reached once every question has been answered.
pub const FINAL_LEVEL: u8 = 15;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GameError {
    #[error("game is already finished")]
    AlreadyFinished,

    #[error("help {0} was already used in this game")]
    HelpAlreadyUsed(HelpType),

    #[error("invalid persisted game: {0}")]
    InvalidPersistedState(String),
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    InProgress,
    Won,
    Failed,
    Timeout,
    CashedOut,
}

impl GameStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Won => "won",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
            Self::CashedOut => "cashed_out",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a finished game ended and what it paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameResult {
    pub status: GameStatus,
    pub prize: u64,
}

/// Result of submitting an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// Correct; the game moves on to `current_level`.
    Continue { current_level: u8 },
    Finished(GameResult),
}

impl AnswerOutcome {
    #[must_use]
    pub fn answered_correctly(&self) -> bool {
        match self {
            Self::Continue { .. } => true,
            Self::Finished(result) => result.status == GameStatus::Won,
        }
    }

    #[must_use]
    pub fn result(&self) -> Option<GameResult> {
        match self {
            Self::Continue { .. } => None,
            Self::Finished(result) => Some(*result),
        }
    }
}

//
// ─── HELP USAGE ────────────────────────────────────────────────────────────────
//

/// Which of the once-per-game help options have been spent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HelpUsage {
    pub audience_help: bool,
    pub fifty_fifty: bool,
    pub friend_call: bool,
}

impl HelpUsage {
    #[must_use]
    pub fn is_used(&self, help: HelpType) -> bool {
        match help {
            HelpType::AudienceHelp => self.audience_help,
            HelpType::FiftyFifty => self.fifty_fifty,
            HelpType::FriendCall => self.friend_call,
        }
    }

    fn mark(&mut self, help: HelpType) {
        match help {
            HelpType::AudienceHelp => self.audience_help = true,
            HelpType::FiftyFifty => self.fifty_fifty = true,
            HelpType::FriendCall => self.friend_call = true,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> Vec<HelpType> {
        HelpType::ALL
            .into_iter()
            .filter(|help| !self.is_used(*help))
            .collect()
    }
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// A freshly built game that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameDraft {
    user_id: UserId,
    questions: Vec<GameQuestion>,
    created_at: DateTime<Utc>,
    rules: GameRules,
}

impl GameDraft {
    pub(crate) fn new(
        user_id: UserId,
        questions: Vec<GameQuestion>,
        created_at: DateTime<Utc>,
        rules: GameRules,
    ) -> Self {
        Self {
            user_id,
            questions,
            created_at,
            rules,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn questions(&self) -> &[GameQuestion] {
        &self.questions
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    #[must_use]
    pub fn assign_id(self, id: GameId) -> Game {
        Game {
            id,
            user_id: self.user_id,
            questions: self.questions,
            current_level: 0,
            created_at: self.created_at,
            finished_at: None,
            prize: 0,
            cashed_out: false,
            help_used: HelpUsage::default(),
            rules: self.rules,
        }
    }
}

/// Stored fields of a game, as read back by a repository.
#[derive(Debug, Clone)]
pub struct PersistedGame {
    pub id: GameId,
    pub user_id: UserId,
    pub questions: Vec<GameQuestion>,
    pub current_level: u8,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub prize: u64,
    pub cashed_out: bool,
    pub help_used: HelpUsage,
    pub time_limit: Duration,
}

//
// ─── GAME ──────────────────────────────────────────────────────────────────────
//

/// One player's run up the question ladder.
///
/// While `finished_at` is unset the game is in progress; once set, the game
/// never changes again and its status is derived from the stored fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    id: GameId,
    user_id: UserId,
    questions: Vec<GameQuestion>,
    current_level: u8,
    created_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    prize: u64,
    cashed_out: bool,
    help_used: HelpUsage,
    rules: GameRules,
}

impl Game {
    /// Rehydrate a game from storage.
    ///
    /// # Errors
    ///
    /// Returns `GameError::InvalidPersistedState` if the stored fields break
    /// a game invariant.
    pub fn from_persisted(stored: PersistedGame) -> Result<Self, GameError> {
        let invalid = |msg: String| -> Result<Self, GameError> {
            Err(GameError::InvalidPersistedState(msg))
        };

        if stored.questions.len() != LADDER_LENGTH {
            return invalid(format!(
                "expected {LADDER_LENGTH} questions, got {}",
                stored.questions.len()
            ));
        }
        for (idx, gq) in stored.questions.iter().enumerate() {
            if usize::from(gq.level()) != idx {
                return invalid(format!(
                    "question at position {idx} has level {}",
                    gq.level()
                ));
            }
        }
        if stored.current_level > FINAL_LEVEL {
            return invalid(format!("current level {} out of range", stored.current_level));
        }
        if stored.finished_at.is_none()
            && (stored.current_level == FINAL_LEVEL || stored.cashed_out || stored.prize > 0)
        {
            return invalid("unfinished game carries a final state".into());
        }
        if stored.finished_at.is_some_and(|at| at < stored.created_at) {
            return invalid("finished_at is before created_at".into());
        }
        let rules = GameRules::new(stored.time_limit)
            .map_err(|e| GameError::InvalidPersistedState(e.to_string()))?;
        if stored.prize > rules.prizes().max_prize() {
            return invalid(format!("prize {} exceeds the top prize", stored.prize));
        }

        Ok(Self {
            id: stored.id,
            user_id: stored.user_id,
            questions: stored.questions,
            current_level: stored.current_level,
            created_at: stored.created_at,
            finished_at: stored.finished_at,
            prize: stored.prize,
            cashed_out: stored.cashed_out,
            help_used: stored.help_used,
            rules,
        })
    }

    #[must_use]
    pub fn id(&self) -> GameId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn game_questions(&self) -> &[GameQuestion] {
        &self.questions
    }

    #[must_use]
    pub fn current_level(&self) -> u8 {
        self.current_level
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    #[must_use]
    pub fn prize(&self) -> u64 {
        self.prize
    }

    #[must_use]
    pub fn is_cashed_out(&self) -> bool {
        self.cashed_out
    }

    #[must_use]
    pub fn help_usage(&self) -> HelpUsage {
        self.help_used
    }

    #[must_use]
    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    #[must_use]
    pub fn status(&self) -> GameStatus {
        let Some(finished_at) = self.finished_at else {
            return GameStatus::InProgress;
        };
        if self.cashed_out {
            GameStatus::CashedOut
        } else if self.current_level == FINAL_LEVEL {
            GameStatus::Won
        } else if finished_at - self.created_at > self.rules.time_limit() {
            GameStatus::Timeout
        } else {
            GameStatus::Failed
        }
    }

    /// Outcome of a finished game, `None` while in progress.
    #[must_use]
    pub fn result(&self) -> Option<GameResult> {
        self.is_finished().then(|| GameResult {
            status: self.status(),
            prize: self.prize,
        })
    }

    /// True once more than the time limit has passed since creation.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at > self.rules.time_limit()
    }

    /// Time left to play, zero once expired.
    #[must_use]
    pub fn time_left(&self, now: DateTime<Utc>) -> Duration {
        let left = self.created_at + self.rules.time_limit() - now;
        left.max(Duration::zero())
    }

    #[must_use]
    pub fn current_game_question(&self) -> Option<&GameQuestion> {
        self.questions.get(usize::from(self.current_level))
    }

    #[must_use]
    pub fn previous_game_question(&self) -> Option<&GameQuestion> {
        let previous = usize::from(self.current_level).checked_sub(1)?;
        self.questions.get(previous)
    }

    /// `current_level - 1`; negative at level 0.
    #[must_use]
    pub fn previous_level(&self) -> i16 {
        i16::from(self.current_level) - 1
    }

    /// Submit `letter` as the answer to the current question.
    ///
    /// An expired game finishes as `Timeout` whatever the answer. A wrong
    /// answer finishes as `Failed`. Both keep only the checkpoint prize.
    ///
    /// # Errors
    ///
    /// Returns `GameError::AlreadyFinished` for a finished game; nothing changes.
    pub fn answer_current_question(
        &mut self,
        letter: &str,
        now: DateTime<Utc>,
    ) -> Result<AnswerOutcome, GameError> {
        if self.is_finished() {
            return Err(GameError::AlreadyFinished);
        }
        if let Some(result) = self.time_out(now) {
            return Ok(AnswerOutcome::Finished(result));
        }
        let Some(question) = self.current_game_question() else {
            return Err(GameError::AlreadyFinished);
        };

        if !question.answer_correct(letter) {
            let prize = self.rules.prizes().checkpoint_prize(self.current_level);
            return Ok(AnswerOutcome::Finished(self.finish(prize, now)));
        }

        self.current_level += 1;
        if self.current_level == FINAL_LEVEL {
            let prize = self.rules.prizes().max_prize();
            return Ok(AnswerOutcome::Finished(self.finish(prize, now)));
        }
        Ok(AnswerOutcome::Continue {
            current_level: self.current_level,
        })
    }

    /// Stop and keep the prize for the last question answered.
    ///
    /// If the time limit has already passed the game ends as `Timeout`
    /// instead.
    ///
    /// # Errors
    ///
    /// Returns `GameError::AlreadyFinished` for a finished game.
    pub fn take_money(&mut self, now: DateTime<Utc>) -> Result<GameResult, GameError> {
        if self.is_finished() {
            return Err(GameError::AlreadyFinished);
        }
        if let Some(result) = self.time_out(now) {
            return Ok(result);
        }
        let prize = self.rules.prizes().cash_out_prize(self.current_level);
        self.cashed_out = true;
        Ok(self.finish(prize, now))
    }

    /// Finish an in-progress game whose time is up. Returns the result if
    /// this call ended the game.
    pub fn time_out(&mut self, now: DateTime<Utc>) -> Option<GameResult> {
        if self.is_finished() || !self.is_expired(now) {
            return None;
        }
        let prize = self.rules.prizes().checkpoint_prize(self.current_level);
        Some(self.finish(prize, now))
    }

    /// Spend `help` on the current question.
    ///
    /// # Errors
    ///
    /// Returns `GameError::AlreadyFinished` for a finished game and
    /// `GameError::HelpAlreadyUsed` if this help was spent earlier.
    pub fn use_help<R: Rng + ?Sized>(
        &mut self,
        help: HelpType,
        rng: &mut R,
    ) -> Result<&HelpState, GameError> {
        if self.is_finished() {
            return Err(GameError::AlreadyFinished);
        }
        if self.help_used.is_used(help) {
            return Err(GameError::HelpAlreadyUsed(help));
        }
        let idx = usize::from(self.current_level);
        let Some(question) = self.questions.get_mut(idx) else {
            return Err(GameError::AlreadyFinished);
        };
        // A result already on the snapshot is kept; the flag is what gates reuse.
        let _ = help::apply(question, help, rng);
        self.help_used.mark(help);
        Ok(question.help_state())
    }

    fn finish(&mut self, prize: u64, now: DateTime<Utc>) -> GameResult {
        self.finished_at = Some(now.max(self.created_at));
        self.prize = prize;
        GameResult {
            status: self.status(),
            prize,
        }
    }
}
