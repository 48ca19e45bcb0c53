use std::collections::HashMap;

use chrono::Duration;
use millionaire_core::model::{
    Game, GameDraft, GameId, GameQuestion, HelpUsage, PersistedGame, SlotMapping, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{
    db_err, game_id_from_i64, help_state_from_json, help_state_to_json, i64_to_u64, i64_to_u8,
    map_question_row, ser, u64_to_i64, user_id_from_i64,
};
use crate::repository::{GameRepository, Payout, StorageError, StoredGame};

fn flag(row: &SqliteRow, column: &str) -> Result<bool, StorageError> {
    Ok(row.try_get::<i64, _>(column).map_err(ser)? != 0)
}

fn map_game_question_row(row: &SqliteRow) -> Result<GameQuestion, StorageError> {
    let question = map_question_row(row)?;
    let slots = SlotMapping::new([
        i64_to_u8("slot_a", row.try_get("slot_a").map_err(ser)?)?,
        i64_to_u8("slot_b", row.try_get("slot_b").map_err(ser)?)?,
        i64_to_u8("slot_c", row.try_get("slot_c").map_err(ser)?)?,
        i64_to_u8("slot_d", row.try_get("slot_d").map_err(ser)?)?,
    ])
    .map_err(ser)?;
    let help = help_state_from_json(&row.try_get::<String, _>("help_state").map_err(ser)?)?;
    Ok(GameQuestion::from_persisted(question, slots, help))
}

fn map_game_row(row: &SqliteRow, questions: Vec<GameQuestion>) -> Result<StoredGame, StorageError> {
    let help_used = HelpUsage {
        audience_help: flag(row, "audience_help_used")?,
        fifty_fifty: flag(row, "fifty_fifty_used")?,
        friend_call: flag(row, "friend_call_used")?,
    };
    let game = Game::from_persisted(PersistedGame {
        id: game_id_from_i64(row.try_get("id").map_err(ser)?)?,
        user_id: user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
        questions,
        current_level: i64_to_u8("current_level", row.try_get("current_level").map_err(ser)?)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        finished_at: row.try_get("finished_at").map_err(ser)?,
        prize: i64_to_u64("prize", row.try_get("prize").map_err(ser)?)?,
        cashed_out: flag(row, "cashed_out")?,
        help_used,
        time_limit: Duration::seconds(row.try_get("time_limit_secs").map_err(ser)?),
    })
    .map_err(ser)?;
    let revision = i64_to_u64("revision", row.try_get("revision").map_err(ser)?)?;
    Ok(StoredGame { game, revision })
}

impl SqliteRepository {
    async fn load_game(&self, id: i64) -> Result<Option<StoredGame>, StorageError> {
        let Some(row) = sqlx::query(
            r"
            SELECT id, user_id, current_level, created_at, finished_at, prize, cashed_out,
                   audience_help_used, fifty_fifty_used, friend_call_used,
                   time_limit_secs, revision
            FROM games WHERE id = ?1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        else {
            return Ok(None);
        };

        let question_rows = sqlx::query(
            r"
            SELECT q.id AS id, q.level AS level, q.text AS text,
                   q.answer_1 AS answer_1, q.answer_2 AS answer_2,
                   q.answer_3 AS answer_3, q.answer_4 AS answer_4,
                   gq.slot_a, gq.slot_b, gq.slot_c, gq.slot_d, gq.help_state
            FROM game_questions gq
            JOIN questions q ON q.id = gq.question_id
            WHERE gq.game_id = ?1
            ORDER BY gq.level ASC
            ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let questions = question_rows
            .iter()
            .map(map_game_question_row)
            .collect::<Result<Vec<_>, _>>()?;
        map_game_row(&row, questions).map(Some)
    }
}

#[async_trait::async_trait]
impl GameRepository for SqliteRepository {
    async fn insert_game(&self, draft: GameDraft) -> Result<StoredGame, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let res = sqlx::query(
            r"
            INSERT INTO games (user_id, current_level, created_at, time_limit_secs, revision)
            VALUES (?1, 0, ?2, ?3, 0)
            ",
        )
        .bind(u64_to_i64("user_id", draft.user_id().value())?)
        .bind(draft.created_at())
        .bind(draft.rules().time_limit().num_seconds())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        let game_id = res.last_insert_rowid();

        for gq in draft.questions() {
            let [a, b, c, d] = gq.slots().as_array();
            sqlx::query(
                r"
                INSERT INTO game_questions
                    (game_id, level, question_id, slot_a, slot_b, slot_c, slot_d, help_state)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ",
            )
            .bind(game_id)
            .bind(i64::from(gq.level()))
            .bind(u64_to_i64("question_id", gq.question().id().value())?)
            .bind(i64::from(a))
            .bind(i64::from(b))
            .bind(i64::from(c))
            .bind(i64::from(d))
            .bind(help_state_to_json(gq.help_state())?)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        log::debug!("stored game {game_id} for user {}", draft.user_id());

        Ok(StoredGame {
            game: draft.assign_id(game_id_from_i64(game_id)?),
            revision: 0,
        })
    }

    async fn get_game(&self, id: GameId) -> Result<Option<StoredGame>, StorageError> {
        self.load_game(u64_to_i64("game_id", id.value())?).await
    }

    async fn active_game_for_user(&self, user_id: UserId) -> Result<Option<GameId>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id FROM games
            WHERE user_id = ?1 AND finished_at IS NULL
            ",
        )
        .bind(u64_to_i64("user_id", user_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(|r| game_id_from_i64(r.try_get("id").map_err(ser)?))
            .transpose()
    }

    async fn games_for_user(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<Game>, StorageError> {
        let user_id = u64_to_i64("user_id", user_id.value())?;
        let limit = i64::from(limit);

        let game_rows = sqlx::query(
            r"
            SELECT id, user_id, current_level, created_at, finished_at, prize, cashed_out,
                   audience_help_used, fifty_fifty_used, friend_call_used,
                   time_limit_secs, revision
            FROM games
            WHERE user_id = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            ",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        // Snapshots for the whole page in one pass, grouped by game.
        let question_rows = sqlx::query(
            r"
            SELECT gq.game_id AS game_id,
                   q.id AS id, q.level AS level, q.text AS text,
                   q.answer_1 AS answer_1, q.answer_2 AS answer_2,
                   q.answer_3 AS answer_3, q.answer_4 AS answer_4,
                   gq.slot_a, gq.slot_b, gq.slot_c, gq.slot_d, gq.help_state
            FROM game_questions gq
            JOIN questions q ON q.id = gq.question_id
            WHERE gq.game_id IN (
                SELECT id FROM games
                WHERE user_id = ?1
                ORDER BY created_at DESC, id DESC
                LIMIT ?2
            )
            ORDER BY gq.game_id, gq.level ASC
            ",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut snapshots: HashMap<i64, Vec<GameQuestion>> = HashMap::new();
        for row in &question_rows {
            let game_id: i64 = row.try_get("game_id").map_err(ser)?;
            snapshots
                .entry(game_id)
                .or_default()
                .push(map_game_question_row(row)?);
        }

        game_rows
            .iter()
            .map(|row| {
                let id: i64 = row.try_get("id").map_err(ser)?;
                let questions = snapshots.remove(&id).unwrap_or_default();
                map_game_row(row, questions).map(|stored| stored.game)
            })
            .collect()
    }

    async fn save_game(
        &self,
        game: &Game,
        expected_revision: u64,
        payout: Option<Payout>,
    ) -> Result<u64, StorageError> {
        let game_id = u64_to_i64("game_id", game.id().value())?;
        let help = game.help_usage();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let res = sqlx::query(
            r"
            UPDATE games SET
                current_level = ?1,
                finished_at = ?2,
                prize = ?3,
                cashed_out = ?4,
                audience_help_used = ?5,
                fifty_fifty_used = ?6,
                friend_call_used = ?7,
                revision = revision + 1
            WHERE id = ?8 AND revision = ?9 AND finished_at IS NULL
            ",
        )
        .bind(i64::from(game.current_level()))
        .bind(game.finished_at())
        .bind(u64_to_i64("prize", game.prize())?)
        .bind(i64::from(game.is_cashed_out()))
        .bind(i64::from(help.audience_help))
        .bind(i64::from(help.fifty_fifty))
        .bind(i64::from(help.friend_call))
        .bind(game_id)
        .bind(u64_to_i64("revision", expected_revision)?)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM games WHERE id = ?1")
                .bind(game_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?
                .is_some();
            log::debug!("save of game {game_id} at revision {expected_revision} rejected");
            return Err(if exists {
                StorageError::Conflict
            } else {
                StorageError::NotFound
            });
        }

        for gq in game.game_questions() {
            if gq.help_state().is_empty() {
                continue;
            }
            sqlx::query(
                r"
                UPDATE game_questions SET help_state = ?1
                WHERE game_id = ?2 AND level = ?3
                ",
            )
            .bind(help_state_to_json(gq.help_state())?)
            .bind(game_id)
            .bind(i64::from(gq.level()))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        if let Some(payout) = payout {
            let credited = sqlx::query("UPDATE users SET balance = balance + ?1 WHERE id = ?2")
                .bind(u64_to_i64("amount", payout.amount)?)
                .bind(u64_to_i64("user_id", payout.user_id.value())?)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            if credited.rows_affected() == 0 {
                return Err(StorageError::NotFound);
            }
        }

        tx.commit().await.map_err(db_err)?;
        Ok(expected_revision + 1)
    }
}
