//! Read state tracking.
//!
//! Read marks are kept per player and per post. Only players have read
//! state; object viewers and anonymous listings see nothing as unread.

use sqlx::SqliteConnection;

use crate::auth::Actor;
use crate::db::DbPool;
use crate::{ForumError, Result};

use super::Post;

/// A post together with the viewer's read state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedPost {
    /// The post.
    pub post: Post,
    /// Whether the viewer has not read it yet.
    pub unread: bool,
}

/// Check if a post is unread for a viewer.
pub fn is_unread(post: &Post, viewer: Option<&Actor>) -> bool {
    match viewer.and_then(Actor::player_id) {
        Some(player_id) => !post.is_read_by(player_id),
        None => false,
    }
}

/// Annotate posts with the viewer's read state, keeping their order.
pub fn annotate(posts: Vec<Post>, viewer: Option<&Actor>) -> Vec<AnnotatedPost> {
    posts
        .into_iter()
        .map(|post| {
            let unread = is_unread(&post, viewer);
            AnnotatedPost { post, unread }
        })
        .collect()
}

/// Repository for read marks.
pub struct ReadRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> ReadRepository<'a> {
    /// Create a new ReadRepository with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Mark a post read or unread for a player.
    ///
    /// Returns true if the mark changed. Repeating the same call is a no-op.
    pub async fn mark_read(&self, post_id: i64, player_id: i64, read: bool) -> Result<bool> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| ForumError::Database(e.to_string()))?;
        set_read(&mut conn, post_id, player_id, read).await
    }

    /// Mark several posts read for a player in one transaction.
    ///
    /// Returns how many marks were added.
    pub async fn mark_many_read(&self, post_ids: &[i64], player_id: i64) -> Result<usize> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ForumError::Database(e.to_string()))?;

        let mut added = 0;
        for &post_id in post_ids {
            if set_read(&mut tx, post_id, player_id, true).await? {
                added += 1;
            }
        }

        tx.commit()
            .await
            .map_err(|e| ForumError::Database(e.to_string()))?;
        Ok(added)
    }

}

/// Add or remove one read mark on an open connection or transaction.
pub(crate) async fn set_read(
    conn: &mut SqliteConnection,
    post_id: i64,
    player_id: i64,
    read: bool,
) -> Result<bool> {
    let sql = if read {
        "INSERT OR IGNORE INTO post_readers (post_id, player_id) VALUES (?, ?)"
    } else {
        "DELETE FROM post_readers WHERE post_id = ? AND player_id = ?"
    };
    let result = sqlx::query(sql)
        .bind(post_id)
        .bind(player_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| ForumError::Database(e.to_string()))?;
    Ok(result.rows_affected() > 0)
}
