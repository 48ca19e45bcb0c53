use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            balance INTEGER NOT NULL DEFAULT 0 CHECK (balance >= 0),
            created_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS questions (
            id INTEGER PRIMARY KEY,
            level INTEGER NOT NULL CHECK (level BETWEEN 0 AND 14),
            text TEXT NOT NULL,
            answer_1 TEXT NOT NULL,
            answer_2 TEXT NOT NULL,
            answer_3 TEXT NOT NULL,
            answer_4 TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS games (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            current_level INTEGER NOT NULL DEFAULT 0 CHECK (current_level BETWEEN 0 AND 15),
            created_at TEXT NOT NULL,
            finished_at TEXT,
            prize INTEGER NOT NULL DEFAULT 0 CHECK (prize >= 0),
            cashed_out INTEGER NOT NULL DEFAULT 0,
            audience_help_used INTEGER NOT NULL DEFAULT 0,
            fifty_fifty_used INTEGER NOT NULL DEFAULT 0,
            friend_call_used INTEGER NOT NULL DEFAULT 0,
            time_limit_secs INTEGER NOT NULL CHECK (time_limit_secs > 0),
            revision INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS game_questions (
            game_id INTEGER NOT NULL,
            level INTEGER NOT NULL CHECK (level BETWEEN 0 AND 14),
            question_id INTEGER NOT NULL,
            slot_a INTEGER NOT NULL CHECK (slot_a BETWEEN 1 AND 4),
            slot_b INTEGER NOT NULL CHECK (slot_b BETWEEN 1 AND 4),
            slot_c INTEGER NOT NULL CHECK (slot_c BETWEEN 1 AND 4),
            slot_d INTEGER NOT NULL CHECK (slot_d BETWEEN 1 AND 4),
            help_state TEXT NOT NULL DEFAULT '{}',
            PRIMARY KEY (game_id, level),
            FOREIGN KEY (game_id) REFERENCES games(id) ON DELETE CASCADE,
            FOREIGN KEY (question_id) REFERENCES questions(id)
        );
    ",
    // At most one unfinished game per user.
    r"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_games_one_active
            ON games(user_id) WHERE finished_at IS NULL;
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_games_user_created
            ON games(user_id, created_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_questions_level
            ON questions(level);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_users_balance
            ON users(balance DESC, id);
    ",
];

/// Runs versioned migrations for the current schema.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: users, question bank, games and their question snapshots.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1 {
            sqlx::query(*statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        log::info!("applied schema migration 1");
    }

    Ok(())
}
