use chrono::{DateTime, Utc};
use millionaire_core::model::{User, UserId};

use super::SqliteRepository;
use super::mapping::{db_err, map_user_row, ser, u64_to_i64, user_id_from_i64};
use crate::repository::{StorageError, UserRepository};

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn create_user(
        &self,
        name: &str,
        created_at: DateTime<Utc>,
    ) -> Result<User, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO users (name, balance, created_at)
            VALUES (?1, 0, ?2)
            ",
        )
        .bind(name.to_owned())
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let id = user_id_from_i64(res.last_insert_rowid())?;
        User::from_persisted(id, name, 0, created_at).map_err(ser)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, name, balance, created_at
            FROM users WHERE id = ?1
            ",
        )
        .bind(u64_to_i64("user_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_user_row).transpose()
    }

    async fn find_user_by_name(&self, name: &str) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, name, balance, created_at
            FROM users WHERE name = ?1
            ",
        )
        .bind(name.to_owned())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_user_row).transpose()
    }

    async fn leaderboard(&self, limit: u32) -> Result<Vec<User>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, name, balance, created_at
            FROM users
            ORDER BY balance DESC, id ASC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_user_row).collect()
    }
}
