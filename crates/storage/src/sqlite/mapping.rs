use millionaire_core::help::HelpState;
use millionaire_core::model::{GameId, Question, QuestionId, User, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Map a driver error, turning constraint violations into `Conflict`.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    if let Some(db) = e.as_database_error()
        && db.is_unique_violation()
    {
        return StorageError::Conflict;
    }
    if let Some(db) = e.as_database_error()
        && db.is_foreign_key_violation()
    {
        return StorageError::NotFound;
    }
    StorageError::Connection(e.to_string())
}

pub(crate) fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn i64_to_u8(field: &'static str, v: i64) -> Result<u8, StorageError> {
    u8::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

pub(crate) fn game_id_from_i64(v: i64) -> Result<GameId, StorageError> {
    Ok(GameId::new(i64_to_u64("game_id", v)?))
}

/// Expects `id, level, text, answer_1..answer_4` columns.
pub(crate) fn map_question_row(row: &SqliteRow) -> Result<Question, StorageError> {
    let answers = [
        row.try_get::<String, _>("answer_1").map_err(ser)?,
        row.try_get::<String, _>("answer_2").map_err(ser)?,
        row.try_get::<String, _>("answer_3").map_err(ser)?,
        row.try_get::<String, _>("answer_4").map_err(ser)?,
    ];
    Question::from_persisted(
        question_id_from_i64(row.try_get("id").map_err(ser)?)?,
        i64_to_u8("level", row.try_get("level").map_err(ser)?)?,
        row.try_get::<String, _>("text").map_err(ser)?,
        answers,
    )
    .map_err(ser)
}

pub(crate) fn map_user_row(row: &SqliteRow) -> Result<User, StorageError> {
    let name: String = row.try_get("name").map_err(ser)?;
    User::from_persisted(
        user_id_from_i64(row.try_get("id").map_err(ser)?)?,
        &name,
        i64_to_u64("balance", row.try_get("balance").map_err(ser)?)?,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn help_state_to_json(state: &HelpState) -> Result<String, StorageError> {
    serde_json::to_string(state).map_err(ser)
}

pub(crate) fn help_state_from_json(raw: &str) -> Result<HelpState, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_help_state_is_an_empty_object() {
        let json = help_state_to_json(&HelpState::default()).unwrap();
        assert_eq!(json, "{}");
        assert_eq!(help_state_from_json(&json).unwrap(), HelpState::default());
    }

    #[test]
    fn negative_ids_are_rejected() {
        assert!(matches!(
            user_id_from_i64(-1),
            Err(StorageError::Serialization(_))
        ));
        assert_eq!(game_id_from_i64(7).unwrap(), GameId::new(7));
    }
}
