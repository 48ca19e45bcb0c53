use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::help::HelpState;
use crate::model::question::{ANSWER_COUNT, CORRECT_SLOT, Question};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GameQuestionError {
    #[error("answer slots {0:?} are not a permutation of 1..=4")]
    InvalidSlots([u8; ANSWER_COUNT]),

    #[error("unknown answer key: {0:?}")]
    UnknownAnswerKey(String),
}

//
// ─── ANSWER KEY ────────────────────────────────────────────────────────────────
//

/// Label of an answer option as shown to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerKey {
    A,
    B,
    C,
    D,
}

impl AnswerKey {
    pub const ALL: [AnswerKey; ANSWER_COUNT] = [Self::A, Self::B, Self::C, Self::D];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
            Self::C => "c",
            Self::D => "d",
        }
    }

    /// Uppercase form used in player-facing text.
    #[must_use]
    pub fn as_upper(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }

    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::C => 2,
            Self::D => 3,
        }
    }
}

impl fmt::Display for AnswerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnswerKey {
    type Err = GameQuestionError;

    /// Parses `a`..`d`, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Ok(Self::A),
            "b" => Ok(Self::B),
            "c" => Ok(Self::C),
            "d" => Ok(Self::D),
            _ => Err(GameQuestionError::UnknownAnswerKey(s.to_owned())),
        }
    }
}

//
// ─── SLOT MAPPING ──────────────────────────────────────────────────────────────
//

/// Which answer slot of the question each label shows.
///
/// Always a bijection from {a, b, c, d} onto {1, 2, 3, 4}. Slot 1 holds the
/// correct answer, so the label mapped to 1 is the correct key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotMapping {
    slots: [u8; ANSWER_COUNT],
    correct: AnswerKey,
}

impl SlotMapping {
    /// Build a mapping from the slots shown under labels a, b, c, d.
    ///
    /// # Errors
    ///
    /// Returns `GameQuestionError::InvalidSlots` unless the values are a
    /// permutation of 1..=4.
    pub fn new(slots: [u8; ANSWER_COUNT]) -> Result<Self, GameQuestionError> {
        let mut seen = [false; ANSWER_COUNT];
        for &slot in &slots {
            let idx = usize::from(slot)
                .checked_sub(1)
                .filter(|i| *i < ANSWER_COUNT)
                .ok_or(GameQuestionError::InvalidSlots(slots))?;
            if seen[idx] {
                return Err(GameQuestionError::InvalidSlots(slots));
            }
            seen[idx] = true;
        }

        let correct = AnswerKey::ALL
            .into_iter()
            .find(|key| slots[key.index()] == CORRECT_SLOT)
            .ok_or(GameQuestionError::InvalidSlots(slots))?;

        Ok(Self { slots, correct })
    }

    /// Uniformly random mapping, one of the 24 permutations.
    ///
    /// The labels are shuffled and dealt slots 1..=4 in order, so the first
    /// label dealt holds the correct answer.
    pub fn shuffled<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut keys = AnswerKey::ALL;
        keys.shuffle(rng);
        let mut slots = [0; ANSWER_COUNT];
        for (slot, key) in (CORRECT_SLOT..).zip(keys) {
            slots[key.index()] = slot;
        }
        let mapping = Self {
            slots,
            correct: keys[0],
        };
        debug_assert_eq!(Self::new(slots), Ok(mapping));
        mapping
    }

    #[must_use]
    pub fn slot(&self, key: AnswerKey) -> u8 {
        self.slots[key.index()]
    }

    #[must_use]
    pub fn as_array(&self) -> [u8; ANSWER_COUNT] {
        self.slots
    }

    #[must_use]
    pub fn correct_key(&self) -> AnswerKey {
        self.correct
    }
}

//
// ─── GAME QUESTION ─────────────────────────────────────────────────────────────
//

/// A question bound to one game at one level, with its shuffled labels and
/// whatever help the player has taken on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameQuestion {
    question: Question,
    slots: SlotMapping,
    help: HelpState,
}

impl GameQuestion {
    #[must_use]
    pub fn new(question: Question, slots: SlotMapping) -> Self {
        Self::from_persisted(question, slots, HelpState::default())
    }

    #[must_use]
    pub fn from_persisted(question: Question, slots: SlotMapping, help: HelpState) -> Self {
        Self {
            question,
            slots,
            help,
        }
    }

    #[must_use]
    pub fn question(&self) -> &Question {
        &self.question
    }

    #[must_use]
    pub fn slots(&self) -> &SlotMapping {
        &self.slots
    }

    #[must_use]
    pub fn level(&self) -> u8 {
        self.question.level()
    }

    #[must_use]
    pub fn text(&self) -> &str {
        self.question.text()
    }

    #[must_use]
    pub fn help_state(&self) -> &HelpState {
        &self.help
    }

    pub(crate) fn help_state_mut(&mut self) -> &mut HelpState {
        &mut self.help
    }

    /// Answer texts keyed by label, ordered a..d.
    #[must_use]
    pub fn variants(&self) -> BTreeMap<AnswerKey, &str> {
        AnswerKey::ALL
            .into_iter()
            .map(|key| {
                let text = self.question.answer(self.slots.slot(key)).unwrap_or_default();
                (key, text)
            })
            .collect()
    }

    #[must_use]
    pub fn correct_answer_key(&self) -> AnswerKey {
        self.slots.correct_key()
    }

    #[must_use]
    pub fn is_correct(&self, key: AnswerKey) -> bool {
        key == self.correct_answer_key()
    }

    /// Case-insensitive check of a raw letter; anything unparseable is wrong.
    #[must_use]
    pub fn answer_correct(&self, letter: &str) -> bool {
        letter
            .parse::<AnswerKey>()
            .is_ok_and(|key| self.is_correct(key))
    }

    #[must_use]
    pub fn correct_answer(&self) -> &str {
        self.question.correct_answer()
    }

    /// Labels still in play: the 50/50 survivors if that help was used.
    #[must_use]
    pub fn keys_in_play(&self) -> Vec<AnswerKey> {
        match self.help.fifty_fifty() {
            Some(kept) => kept.to_vec(),
            None => AnswerKey::ALL.to_vec(),
        }
    }
}
