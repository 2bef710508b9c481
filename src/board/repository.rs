//! Board repository.
//!
//! This module provides CRUD operations for boards and their subscriptions.

use std::collections::{BTreeSet, HashMap};

use sqlx::SqliteConnection;

use super::types::{Board, NewBoard};
use crate::auth::LockSet;
use crate::db::DbPool;
use crate::{ForumError, Result};

/// Repository for board CRUD operations.
pub struct BoardRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> BoardRepository<'a> {
    /// Create a new BoardRepository with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new board in the database.
    ///
    /// Returns the created board with the assigned ID. A name that collides
    /// with an existing board, ignoring case, is a validation error.
    pub async fn create(&self, new_board: &NewBoard) -> Result<Board> {
        let name = new_board.validate()?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO boards (name, max_posts, max_age_days, locks)
             VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(&name)
        .bind(new_board.max_posts)
        .bind(new_board.max_age_days)
        .bind(new_board.locks.to_string())
        .fetch_one(self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                ForumError::Validation(format!("a board named '{name}' already exists"))
            }
            e => ForumError::Database(e.to_string()),
        })?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| ForumError::NotFound("board".to_string()))
    }

    /// Get a board by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Board>> {
        let result: Option<BoardRow> = sqlx::query_as(
            "SELECT id, name, max_posts, max_age_days, locks FROM boards WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| ForumError::Database(e.to_string()))?;

        match result {
            Some(row) => {
                let subscribers = self.subscribers(id).await?;
                Ok(Some(row.into_board(subscribers)?))
            }
            None => Ok(None),
        }
    }

    /// List all boards ordered by ID.
    pub async fn list_all(&self) -> Result<Vec<Board>> {
        let rows: Vec<BoardRow> = sqlx::query_as(
            "SELECT id, name, max_posts, max_age_days, locks FROM boards ORDER BY id",
        )
        .fetch_all(self.pool)
        .await
        .map_err(|e| ForumError::Database(e.to_string()))?;

        let pairs: Vec<(i64, i64)> =
            sqlx::query_as("SELECT board_id, player_id FROM board_subscriptions")
                .fetch_all(self.pool)
                .await
                .map_err(|e| ForumError::Database(e.to_string()))?;

        let mut subscribers: HashMap<i64, BTreeSet<i64>> = HashMap::new();
        for (board_id, player_id) in pairs {
            subscribers.entry(board_id).or_default().insert(player_id);
        }

        rows.into_iter()
            .map(|row| {
                let subs = subscribers.remove(&row.id).unwrap_or_default();
                row.into_board(subs)
            })
            .collect()
    }

    /// Check if a board name is already taken, ignoring case.
    pub async fn name_exists(&self, name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM boards WHERE name = ?)")
            .bind(name.trim())
            .fetch_one(self.pool)
            .await
            .map_err(|e| ForumError::Database(e.to_string()))?;
        Ok(exists)
    }

    /// Replace a board's locks.
    ///
    /// Returns false if the board does not exist.
    pub async fn update_locks(&self, id: i64, locks: &LockSet) -> Result<bool> {
        let result = sqlx::query("UPDATE boards SET locks = ?, revision = revision + 1 WHERE id = ?")
            .bind(locks.to_string())
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| ForumError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace a board's retention limits.
    ///
    /// Returns false if the board does not exist.
    pub async fn update_retention(
        &self,
        id: i64,
        max_posts: Option<i64>,
        max_age_days: Option<i64>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE boards SET max_posts = ?, max_age_days = ?, revision = revision + 1
             WHERE id = ?",
        )
        .bind(max_posts)
        .bind(max_age_days)
        .bind(id)
        .execute(self.pool)
        .await
        .map_err(|e| ForumError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    /// Subscribe or unsubscribe a player.
    ///
    /// Returns true if the subscription changed.
    pub async fn set_subscribed(
        &self,
        board_id: i64,
        player_id: i64,
        subscribed: bool,
    ) -> Result<bool> {
        let sql = if subscribed {
            "INSERT OR IGNORE INTO board_subscriptions (board_id, player_id) VALUES (?, ?)"
        } else {
            "DELETE FROM board_subscriptions WHERE board_id = ? AND player_id = ?"
        };
        let result = sqlx::query(sql)
            .bind(board_id)
            .bind(player_id)
            .execute(self.pool)
            .await
            .map_err(|e| ForumError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    /// Player IDs subscribed to a board.
    pub async fn subscribers(&self, board_id: i64) -> Result<BTreeSet<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT player_id FROM board_subscriptions WHERE board_id = ? ORDER BY player_id",
        )
        .bind(board_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| ForumError::Database(e.to_string()))?;
        Ok(ids.into_iter().collect())
    }

    /// Board IDs a player is subscribed to, ascending.
    pub async fn subscribed_board_ids(&self, player_id: i64) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT board_id FROM board_subscriptions WHERE player_id = ? ORDER BY board_id",
        )
        .bind(player_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| ForumError::Database(e.to_string()))?;
        Ok(ids)
    }
}

/// Take the board's write lock inside a transaction.
///
/// Every write that touches a board's posts starts with this statement, so
/// SQLite grants the transaction its write lock before anything is read.
/// Concurrent writers on the board queue behind it.
pub(crate) async fn lock_board(conn: &mut SqliteConnection, board_id: i64) -> Result<()> {
    let result = sqlx::query("UPDATE boards SET revision = revision + 1 WHERE id = ?")
        .bind(board_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| ForumError::Database(e.to_string()))?;

    if result.rows_affected() == 0 {
        return Err(ForumError::NotFound("board".to_string()));
    }
    Ok(())
}

/// Internal struct for mapping database rows to Board.
#[derive(sqlx::FromRow)]
struct BoardRow {
    id: i64,
    name: String,
    max_posts: Option<i64>,
    max_age_days: Option<i64>,
    locks: String,
}

impl BoardRow {
    fn into_board(self, subscribers: BTreeSet<i64>) -> Result<Board> {
        let locks = LockSet::parse(&self.locks).map_err(|e| {
            ForumError::Database(format!("stored locks for board {} are invalid: {e}", self.id))
        })?;
        Ok(Board {
            id: self.id,
            name: self.name,
            max_posts: self.max_posts,
            max_age_days: self.max_age_days,
            locks,
            subscribers,
        })
    }
}
