use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::IndexedRandom;
use thiserror::Error;

use crate::model::{GameDraft, GameQuestion, LADDER_LENGTH, Question, SlotMapping, UserId, levels};
use crate::rules::GameRules;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LadderError {
    #[error("no questions available for level {level}")]
    InsufficientQuestions { level: u8 },
}

/// Builds the question ladder for a new game: one question per level,
/// picked uniformly among that level's candidates, each with a fresh
/// random label shuffle.
pub struct LadderBuilder<'a> {
    rules: &'a GameRules,
}

impl<'a> LadderBuilder<'a> {
    #[must_use]
    pub fn new(rules: &'a GameRules) -> Self {
        Self { rules }
    }

    /// Build a game for `user_id` from the candidate `pool`.
    ///
    /// The pool may mix levels; each question is only considered for its own
    /// level and never used twice.
    ///
    /// # Errors
    ///
    /// Returns `LadderError::InsufficientQuestions` for the first level with
    /// no unused candidate.
    pub fn build<R: Rng + ?Sized>(
        self,
        user_id: UserId,
        pool: &[Question],
        created_at: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<GameDraft, LadderError> {
        let mut used = HashSet::with_capacity(LADDER_LENGTH);
        let mut questions = Vec::with_capacity(LADDER_LENGTH);

        for level in levels() {
            let candidates: Vec<&Question> = pool
                .iter()
                .filter(|q| q.level() == level && !used.contains(&q.id()))
                .collect();
            let Some(&picked) = candidates.choose(rng) else {
                return Err(LadderError::InsufficientQuestions { level });
            };
            used.insert(picked.id());
            questions.push(GameQuestion::new(picked.clone(), SlotMapping::shuffled(rng)));
        }

        Ok(GameDraft::new(user_id, questions, created_at, self.rules.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuestionDraft, QuestionId};
    use crate::time::fixed_now;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn pool(per_level: u64) -> Vec<Question> {
        let mut out = Vec::new();
        let mut next_id = 1;
        for level in levels() {
            for n in 0..per_level {
                let q = QuestionDraft::new(level, format!("L{level} #{n}"), "yes", ["a", "b", "c"])
                    .validate()
                    .unwrap()
                    .assign_id(QuestionId::new(next_id));
                next_id += 1;
                out.push(q);
            }
        }
        out
    }

    #[test]
    fn builds_one_question_per_level_in_order() {
        let mut rng = StdRng::seed_from_u64(1);
        let draft = LadderBuilder::new(&GameRules::standard())
            .build(UserId::new(5), &pool(4), fixed_now(), &mut rng)
            .unwrap();

        assert_eq!(draft.questions().len(), 15);
        let levels: Vec<u8> = draft.questions().iter().map(GameQuestion::level).collect();
        assert_eq!(levels, (0..=14).collect::<Vec<u8>>());
        assert_eq!(draft.user_id(), UserId::new(5));
        assert_eq!(draft.created_at(), fixed_now());

        let ids: HashSet<_> = draft.questions().iter().map(|gq| gq.question().id()).collect();
        assert_eq!(ids.len(), 15);
    }

    #[test]
    fn every_snapshot_gets_a_valid_shuffle() {
        let mut rng = StdRng::seed_from_u64(2);
        let draft = LadderBuilder::new(&GameRules::standard())
            .build(UserId::new(1), &pool(2), fixed_now(), &mut rng)
            .unwrap();

        for gq in draft.questions() {
            let mut slots = gq.slots().as_array();
            slots.sort_unstable();
            assert_eq!(slots, [1, 2, 3, 4]);
            assert_eq!(gq.variants()[&gq.correct_answer_key()], "yes");
        }
    }

    #[test]
    fn missing_level_fails() {
        let mut rng = StdRng::seed_from_u64(3);
        let questions: Vec<Question> = pool(1).into_iter().filter(|q| q.level() != 6).collect();

        let err = LadderBuilder::new(&GameRules::standard())
            .build(UserId::new(1), &questions, fixed_now(), &mut rng)
            .unwrap_err();

        assert_eq!(err, LadderError::InsufficientQuestions { level: 6 });
    }

    #[test]
    fn same_seed_builds_same_ladder() {
        let questions = pool(5);
        let build = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            LadderBuilder::new(&GameRules::standard())
                .build(UserId::new(1), &questions, fixed_now(), &mut rng)
                .unwrap()
        };
        assert_eq!(build(9), build(9));
    }
}
