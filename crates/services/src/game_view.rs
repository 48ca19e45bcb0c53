use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use millionaire_core::help::{FriendCall, HelpType};
use millionaire_core::model::{AnswerKey, Game, GameId, GameQuestion, GameStatus};

/// One rung of the prize ladder as shown to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrizeStep {
    pub level: u8,
    pub prize: u64,
    pub checkpoint: bool,
    /// The question at this level is the one being played.
    pub current: bool,
    /// Answered correctly.
    pub cleared: bool,
}

/// An answer option still on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionView {
    pub key: AnswerKey,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub level: u8,
    pub text: String,
    /// Options in label order; 50/50 removes the eliminated pair.
    pub options: Vec<OptionView>,
    pub audience_help: Option<BTreeMap<AnswerKey, u8>>,
    pub friend_call: Option<FriendCall>,
}

/// The question a finished game stopped on, with its answer revealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevealedQuestion {
    pub text: String,
    pub correct_key: AnswerKey,
    pub correct_answer: String,
}

/// Presentation-agnostic snapshot of a game.
///
/// No pre-formatted strings beyond the stored help texts; the front end
/// decides how to render amounts and time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameView {
    pub id: GameId,
    pub status: GameStatus,
    pub current_level: u8,
    pub prize: u64,
    pub time_left_secs: i64,
    pub ladder: Vec<PrizeStep>,
    pub question: Option<QuestionView>,
    pub revealed: Option<RevealedQuestion>,
    pub remaining_help: Vec<HelpType>,
}

impl GameView {
    #[must_use]
    pub fn from_game(game: &Game, now: DateTime<Utc>) -> Self {
        let prizes = game.rules().prizes();
        let status = game.status();
        let ladder = game
            .game_questions()
            .iter()
            .map(|gq| {
                let level = gq.level();
                PrizeStep {
                    level,
                    prize: prizes.prize_at(level).unwrap_or(0),
                    checkpoint: prizes.is_checkpoint(level),
                    current: !status.is_terminal() && level == game.current_level(),
                    cleared: level < game.current_level(),
                }
            })
            .collect();

        let (question, revealed) = if status.is_terminal() {
            let revealed = matches!(status, GameStatus::Failed | GameStatus::Timeout)
                .then(|| game.current_game_question())
                .flatten()
                .map(reveal);
            (None, revealed)
        } else {
            (game.current_game_question().map(question_view), None)
        };

        let time_left_secs = if status.is_terminal() {
            0
        } else {
            game.time_left(now).num_seconds()
        };

        Self {
            id: game.id(),
            status,
            current_level: game.current_level(),
            prize: game.prize(),
            time_left_secs,
            ladder,
            question,
            revealed,
            remaining_help: if status.is_terminal() {
                Vec::new()
            } else {
                game.help_usage().remaining()
            },
        }
    }
}

fn question_view(gq: &GameQuestion) -> QuestionView {
    let mut in_play = gq.keys_in_play();
    in_play.sort_unstable();
    let variants = gq.variants();
    let options = in_play
        .into_iter()
        .filter_map(|key| {
            variants.get(&key).map(|text| OptionView {
                key,
                text: (*text).to_owned(),
            })
        })
        .collect();
    let help = gq.help_state();

    QuestionView {
        level: gq.level(),
        text: gq.text().to_owned(),
        options,
        audience_help: help.audience_help().cloned(),
        friend_call: help.friend_call().cloned(),
    }
}

fn reveal(gq: &GameQuestion) -> RevealedQuestion {
    RevealedQuestion {
        text: gq.text().to_owned(),
        correct_key: gq.correct_answer_key(),
        correct_answer: gq.correct_answer().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use millionaire_core::ladder::LadderBuilder;
    use millionaire_core::model::{QuestionDraft, QuestionId, UserId, levels};
    use millionaire_core::rules::GameRules;
    use millionaire_core::time::fixed_now;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn game() -> Game {
        let pool: Vec<_> = levels()
            .map(|level| {
                QuestionDraft::new(level, format!("Q{level}"), "right", ["x", "y", "z"])
                    .validate()
                    .unwrap()
                    .assign_id(QuestionId::new(u64::from(level) + 1))
            })
            .collect();
        let mut rng = StdRng::seed_from_u64(3);
        LadderBuilder::new(&GameRules::standard())
            .build(UserId::new(1), &pool, fixed_now(), &mut rng)
            .unwrap()
            .assign_id(GameId::new(1))
    }

    #[test]
    fn fresh_game_shows_first_rung_and_all_options() {
        let view = GameView::from_game(&game(), fixed_now());

        assert_eq!(view.status, GameStatus::InProgress);
        assert_eq!(view.ladder.len(), 15);
        assert!(view.ladder[0].current);
        assert!(view.ladder[4].checkpoint);
        assert_eq!(view.ladder[14].prize, 1_000_000);
        assert_eq!(view.time_left_secs, 35 * 60);
        assert_eq!(view.remaining_help.len(), 3);

        let question = view.question.unwrap();
        let keys: Vec<AnswerKey> = question.options.iter().map(|o| o.key).collect();
        assert_eq!(keys, AnswerKey::ALL.to_vec());
    }

    #[test]
    fn fifty_fifty_hides_two_options() {
        let mut g = game();
        let mut rng = StdRng::seed_from_u64(4);
        g.use_help(HelpType::FiftyFifty, &mut rng).unwrap();

        let view = GameView::from_game(&g, fixed_now());
        let question = view.question.unwrap();
        assert_eq!(question.options.len(), 2);
        assert!(question.options.iter().any(|o| o.text == "right"));
        assert!(!view.remaining_help.contains(&HelpType::FiftyFifty));
    }

    #[test]
    fn failed_game_reveals_the_missed_answer() {
        let mut g = game();
        let correct = g.current_game_question().unwrap().correct_answer_key();
        let wrong = AnswerKey::ALL.into_iter().find(|k| *k != correct).unwrap();
        g.answer_current_question(wrong.as_str(), fixed_now()).unwrap();

        let view = GameView::from_game(&g, fixed_now());
        assert_eq!(view.status, GameStatus::Failed);
        assert!(view.question.is_none());
        let revealed = view.revealed.unwrap();
        assert_eq!(revealed.correct_key, correct);
        assert_eq!(revealed.correct_answer, "right");

        let json = serde_json::to_value(GameView::from_game(&g, fixed_now())).unwrap();
        assert_eq!(json["status"], "failed");
    }
}
