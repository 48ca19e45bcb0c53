use thiserror::Error;

use crate::ladder::LadderError;
use crate::model::{GameError, GameQuestionError, QuestionError, UserError};
use crate::rules::RulesError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    GameQuestion(#[from] GameQuestionError),
    #[error(transparent)]
    Ladder(#[from] LadderError),
    #[error(transparent)]
    Game(#[from] GameError),
    #[error(transparent)]
    Rules(#[from] RulesError),
    #[error(transparent)]
    User(#[from] UserError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder_step() -> Result<(), Error> {
        Err(LadderError::InsufficientQuestions { level: 3 })?
    }

    #[test]
    fn domain_errors_convert_transparently() {
        let err = ladder_step().unwrap_err();
        assert!(matches!(err, Error::Ladder(_)));
        assert_eq!(err.to_string(), "no questions available for level 3");

        let err: Error = GameError::AlreadyFinished.into();
        assert_eq!(err.to_string(), "game is already finished");
    }
}
