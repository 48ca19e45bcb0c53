use thiserror::Error;

use crate::model::ids::QuestionId;

/// Number of steps on the ladder of one game.
pub const LADDER_LENGTH: usize = 15;

/// Highest question level (levels are 0-indexed).
pub const MAX_LEVEL: u8 = 14;

/// Number of answer options per question.
pub const ANSWER_COUNT: usize = 4;

/// Answer slot that always holds the correct answer text.
pub const CORRECT_SLOT: u8 = 1;

/// Every valid question level, easiest first.
pub fn levels() -> impl Iterator<Item = u8> {
    0..=MAX_LEVEL
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question level {0} is out of range 0..=14")]
    InvalidLevel(u8),

    #[error("question text cannot be empty")]
    EmptyText,

    #[error("answer {slot} cannot be empty")]
    EmptyAnswer { slot: u8 },
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Unvalidated question as entered into the question bank.
///
/// `answers[0]` is the correct answer; the others are distractors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub level: u8,
    pub text: String,
    pub answers: [String; ANSWER_COUNT],
}

impl QuestionDraft {
    #[must_use]
    pub fn new(
        level: u8,
        text: impl Into<String>,
        correct: impl Into<String>,
        wrong: [&str; 3],
    ) -> Self {
        Self {
            level,
            text: text.into(),
            answers: [
                correct.into(),
                wrong[0].to_owned(),
                wrong[1].to_owned(),
                wrong[2].to_owned(),
            ],
        }
    }

    /// Trim and check the draft.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the level is out of range or any text is blank.
    pub fn validate(self) -> Result<ValidatedQuestion, QuestionError> {
        if self.level > MAX_LEVEL {
            return Err(QuestionError::InvalidLevel(self.level));
        }
        let text = self.text.trim().to_owned();
        if text.is_empty() {
            return Err(QuestionError::EmptyText);
        }
        let mut answers: [String; ANSWER_COUNT] = Default::default();
        for (idx, raw) in self.answers.into_iter().enumerate() {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(QuestionError::EmptyAnswer {
                    slot: slot_for_index(idx),
                });
            }
            answers[idx] = trimmed.to_owned();
        }

        Ok(ValidatedQuestion {
            level: self.level,
            text,
            answers,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuestion {
    level: u8,
    text: String,
    answers: [String; ANSWER_COUNT],
}

impl ValidatedQuestion {
    #[must_use]
    pub fn level(&self) -> u8 {
        self.level
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn answers(&self) -> &[String; ANSWER_COUNT] {
        &self.answers
    }

    #[must_use]
    pub fn assign_id(self, id: QuestionId) -> Question {
        Question {
            id,
            level: self.level,
            text: self.text,
            answers: self.answers,
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A question from the question bank. Read-only to the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    level: u8,
    text: String,
    answers: [String; ANSWER_COUNT],
}

impl Question {
    /// Rehydrate a question from storage.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the stored values fail validation.
    pub fn from_persisted(
        id: QuestionId,
        level: u8,
        text: String,
        answers: [String; ANSWER_COUNT],
    ) -> Result<Self, QuestionError> {
        Ok(QuestionDraft {
            level,
            text,
            answers,
        }
        .validate()?
        .assign_id(id))
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn level(&self) -> u8 {
        self.level
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Answer text stored in the 1-based `slot`, or `None` outside 1..=4.
    #[must_use]
    pub fn answer(&self, slot: u8) -> Option<&str> {
        let idx = usize::from(slot).checked_sub(1)?;
        self.answers.get(idx).map(String::as_str)
    }

    #[must_use]
    pub fn answers(&self) -> &[String; ANSWER_COUNT] {
        &self.answers
    }

    #[must_use]
    pub fn correct_answer(&self) -> &str {
        &self.answers[0]
    }
}

fn slot_for_index(idx: usize) -> u8 {
    u8::try_from(idx + 1).unwrap_or(u8::MAX)
}
