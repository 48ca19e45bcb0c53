//! One-shot help options a player can take on the current question.
//!
//! Each effect writes its result into the question's [`HelpState`]. Writing
//! is first-wins: a second application leaves the stored result untouched.
//! Whether the player may take the help at all is decided by the game's
//! per-session flags, not here.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{AnswerKey, GameQuestion};

/// Chance that the friend on the phone names the correct answer.
pub const FRIEND_ACCURACY: f64 = 0.8;

const FRIEND_NAMES: [&str; 6] = [
    "Vasily Petrovich",
    "Anna Sergeevna",
    "Uncle Misha",
    "Your old physics teacher",
    "Grandma Olga",
    "Your neighbour Igor",
];

//
// ─── HELP TYPE ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown help type: {0:?}")]
pub struct UnknownHelpType(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HelpType {
    AudienceHelp,
    FiftyFifty,
    FriendCall,
}

impl HelpType {
    pub const ALL: [HelpType; 3] = [Self::AudienceHelp, Self::FiftyFifty, Self::FriendCall];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AudienceHelp => "audience_help",
            Self::FiftyFifty => "fifty_fifty",
            Self::FriendCall => "friend_call",
        }
    }
}

impl fmt::Display for HelpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HelpType {
    type Err = UnknownHelpType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "audience_help" => Ok(Self::AudienceHelp),
            "fifty_fifty" => Ok(Self::FiftyFifty),
            "friend_call" => Ok(Self::FriendCall),
            other => Err(UnknownHelpType(other.to_owned())),
        }
    }
}

//
// ─── HELP STATE ────────────────────────────────────────────────────────────────
//

/// Advice received from a phoned friend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendCall {
    pub advised: AnswerKey,
    pub message: String,
}

/// Results of the help options used on one game question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    audience_help: Option<BTreeMap<AnswerKey, u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fifty_fifty: Option<[AnswerKey; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    friend_call: Option<FriendCall>,
}

impl HelpState {
    /// Simulated audience votes per label, in percent. Need not sum to 100.
    #[must_use]
    pub fn audience_help(&self) -> Option<&BTreeMap<AnswerKey, u8>> {
        self.audience_help.as_ref()
    }

    /// The two labels left after 50/50.
    #[must_use]
    pub fn fifty_fifty(&self) -> Option<&[AnswerKey; 2]> {
        self.fifty_fifty.as_ref()
    }

    #[must_use]
    pub fn friend_call(&self) -> Option<&FriendCall> {
        self.friend_call.as_ref()
    }

    #[must_use]
    pub fn contains(&self, help: HelpType) -> bool {
        match help {
            HelpType::AudienceHelp => self.audience_help.is_some(),
            HelpType::FiftyFifty => self.fifty_fifty.is_some(),
            HelpType::FriendCall => self.friend_call.is_some(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        HelpType::ALL.into_iter().all(|help| !self.contains(help))
    }
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// Apply `help` to the question. Returns `false` if it was already applied.
pub fn apply<R: Rng + ?Sized>(question: &mut GameQuestion, help: HelpType, rng: &mut R) -> bool {
    match help {
        HelpType::AudienceHelp => add_audience_help(question, rng),
        HelpType::FiftyFifty => add_fifty_fifty(question, rng),
        HelpType::FriendCall => add_friend_call(question, rng),
    }
}

/// Write a vote in `[0, 100)` for every label.
pub fn add_audience_help<R: Rng + ?Sized>(question: &mut GameQuestion, rng: &mut R) -> bool {
    if question.help_state().audience_help.is_some() {
        return false;
    }
    let votes = AnswerKey::ALL
        .into_iter()
        .map(|key| (key, rng.random_range(0..100)))
        .collect();
    question.help_state_mut().audience_help = Some(votes);
    true
}

/// Keep the correct label and one random wrong label.
pub fn add_fifty_fifty<R: Rng + ?Sized>(question: &mut GameQuestion, rng: &mut R) -> bool {
    if question.help_state().fifty_fifty.is_some() {
        return false;
    }
    let correct = question.correct_answer_key();
    let wrong: Vec<AnswerKey> = AnswerKey::ALL
        .into_iter()
        .filter(|key| *key != correct)
        .collect();
    let Some(&other) = wrong.choose(rng) else {
        return false;
    };
    question.help_state_mut().fifty_fifty = Some([other, correct]);
    true
}

/// Ask a friend, who only considers the labels still in play.
pub fn add_friend_call<R: Rng + ?Sized>(question: &mut GameQuestion, rng: &mut R) -> bool {
    if question.help_state().friend_call.is_some() {
        return false;
    }
    let pool = question.keys_in_play();
    let advised = friend_pick(&pool, question.correct_answer_key(), rng);
    let name = FRIEND_NAMES.choose(rng).copied().unwrap_or(FRIEND_NAMES[0]);
    question.help_state_mut().friend_call = Some(FriendCall {
        advised,
        message: format!("{name} thinks the answer is {}", advised.as_upper()),
    });
    true
}

fn friend_pick<R: Rng + ?Sized>(pool: &[AnswerKey], correct: AnswerKey, rng: &mut R) -> AnswerKey {
    let others: Vec<AnswerKey> = pool.iter().copied().filter(|k| *k != correct).collect();
    let correct_in_pool = pool.contains(&correct);

    if correct_in_pool && (others.is_empty() || rng.random_bool(FRIEND_ACCURACY)) {
        return correct;
    }
    others
        .choose(rng)
        .copied()
        .or_else(|| pool.first().copied())
        .unwrap_or(correct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuestionDraft, QuestionId, SlotMapping};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn game_question() -> GameQuestion {
        let q = QuestionDraft::new(0, "Largest planet?", "Jupiter", ["Mars", "Venus", "Earth"])
            .validate()
            .unwrap()
            .assign_id(QuestionId::new(1));
        GameQuestion::new(q, SlotMapping::new([2, 1, 4, 3]).unwrap())
    }

    #[test]
    fn audience_help_votes_for_every_label() {
        let mut gq = game_question();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(!gq.help_state().contains(HelpType::AudienceHelp));

        assert!(add_audience_help(&mut gq, &mut rng));

        let votes = gq.help_state().audience_help().unwrap();
        assert_eq!(votes.keys().copied().collect::<Vec<_>>(), AnswerKey::ALL);
        assert!(votes.values().all(|v| *v < 100));
    }

    #[test]
    fn fifty_fifty_keeps_correct_and_one_other() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..50 {
            let mut gq = game_question();
            add_fifty_fifty(&mut gq, &mut rng);
            let kept = gq.help_state().fifty_fifty().unwrap();
            assert!(kept.contains(&AnswerKey::B));
            assert_ne!(kept[0], kept[1]);
        }
    }

    #[test]
    fn second_application_changes_nothing() {
        let mut gq = game_question();
        let mut rng = StdRng::seed_from_u64(3);
        assert!(add_audience_help(&mut gq, &mut rng));
        let before = gq.help_state().clone();

        assert!(!apply(&mut gq, HelpType::AudienceHelp, &mut rng));
        assert_eq!(gq.help_state(), &before);
    }

    #[test]
    fn friend_call_stays_inside_fifty_fifty_pool() {
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..100 {
            let mut gq = game_question();
            add_fifty_fifty(&mut gq, &mut rng);
            add_friend_call(&mut gq, &mut rng);
            let kept = *gq.help_state().fifty_fifty().unwrap();
            let call = gq.help_state().friend_call().unwrap();
            assert!(kept.contains(&call.advised));
            assert!(call.message.ends_with(call.advised.as_upper()));
        }
    }

    #[test]
    fn friend_usually_knows_the_answer() {
        let mut rng = StdRng::seed_from_u64(5);
        let correct = (0..500)
            .filter(|_| friend_pick(&AnswerKey::ALL, AnswerKey::C, &mut rng) == AnswerKey::C)
            .count();
        assert!(correct > 300, "friend was right only {correct} times");
    }

    #[test]
    fn help_state_round_trips_through_json() {
        let mut gq = game_question();
        let mut rng = StdRng::seed_from_u64(6);
        add_fifty_fifty(&mut gq, &mut rng);
        add_friend_call(&mut gq, &mut rng);

        let json = serde_json::to_string(gq.help_state()).unwrap();
        assert!(!json.contains("audience_help"));
        let back: HelpState = serde_json::from_str(&json).unwrap();
        assert_eq!(&back, gq.help_state());
        assert_eq!(serde_json::from_str::<HelpState>("{}").unwrap(), HelpState::default());
    }

    #[test]
    fn help_type_parses_request_names() {
        for help in HelpType::ALL {
            assert_eq!(help.as_str().parse::<HelpType>().unwrap(), help);
        }
        assert!("phone_a_friend".parse::<HelpType>().is_err());
    }

    #[test]
    fn help_types_list_in_declaration_order() {
        let names: Vec<&str> = HelpType::ALL.iter().map(|h| h.as_str()).collect();
        assert_eq!(names, ["audience_help", "fifty_fifty", "friend_call"]);
    }
}
