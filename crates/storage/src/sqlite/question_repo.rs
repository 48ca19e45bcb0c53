use std::collections::BTreeMap;

use millionaire_core::model::{Question, QuestionId, ValidatedQuestion};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{db_err, i64_to_u64, i64_to_u8, map_question_row, question_id_from_i64, ser};
use crate::repository::{QuestionRepository, StorageError};

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn insert_question(
        &self,
        question: ValidatedQuestion,
    ) -> Result<QuestionId, StorageError> {
        let [a1, a2, a3, a4] = question.answers().clone();
        let res = sqlx::query(
            r"
            INSERT INTO questions (level, text, answer_1, answer_2, answer_3, answer_4)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(i64::from(question.level()))
        .bind(question.text().to_owned())
        .bind(a1)
        .bind(a2)
        .bind(a3)
        .bind(a4)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        question_id_from_i64(res.last_insert_rowid())
    }

    async fn candidates(&self, level: u8) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, level, text, answer_1, answer_2, answer_3, answer_4
            FROM questions
            WHERE level = ?1
            ORDER BY id ASC
            ",
        )
        .bind(i64::from(level))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_question_row).collect()
    }

    async fn count_by_level(&self) -> Result<BTreeMap<u8, u64>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT level, COUNT(*) AS n
            FROM questions
            GROUP BY level
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let level = i64_to_u8("level", row.try_get("level").map_err(ser)?)?;
            let n = i64_to_u64("count", row.try_get("n").map_err(ser)?)?;
            counts.insert(level, n);
        }
        Ok(counts)
    }
}
