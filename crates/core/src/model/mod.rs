mod game;
mod game_question;
mod ids;
mod question;
mod user;

pub use ids::{GameId, ParseIdError, QuestionId, UserId};

pub use game::{
    AnswerOutcome, FINAL_LEVEL, Game, GameDraft, GameError, GameResult, GameStatus, HelpUsage,
    PersistedGame,
};
pub use game_question::{AnswerKey, GameQuestion, GameQuestionError, SlotMapping};
pub use question::{
    ANSWER_COUNT, CORRECT_SLOT, LADDER_LENGTH, MAX_LEVEL, Question, QuestionDraft, QuestionError,
    ValidatedQuestion, levels,
};
pub use user::{User, UserError};
