//! Post repository.
//!
//! Reads go through the pool. Writes that must be atomic with other
//! statements are free functions taking an open transaction, so the caller
//! decides what one unit of work contains.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::post::{Author, NewPost, Post};
use super::repository::lock_board;
use crate::auth::Identity;
use crate::db::DbPool;
use crate::{ForumError, Result};

const POST_COLUMNS: &str = "id, board_id, parent_id, author_name, author_player_id, \
                            author_object_id, subject, body, created_at, pinned";

/// Repository for post operations.
pub struct PostRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> PostRepository<'a> {
    /// Create a new PostRepository with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a post in its own transaction.
    ///
    /// Returns the created post with the assigned ID.
    pub async fn create(&self, new_post: &NewPost) -> Result<Post> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ForumError::Database(e.to_string()))?;

        lock_board(&mut tx, new_post.board_id).await?;
        let id = insert(&mut tx, new_post).await?;

        tx.commit()
            .await
            .map_err(|e| ForumError::Database(e.to_string()))?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| ForumError::NotFound("post".to_string()))
    }

    /// Get a post by ID, readers included.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ForumError::Database(e.to_string()))?;
        let post = fetch_post(&mut tx, id).await?;
        tx.commit()
            .await
            .map_err(|e| ForumError::Database(e.to_string()))?;
        Ok(post)
    }

    /// List every post on a board, regardless of expiry, with readers.
    ///
    /// Posts and read marks are read from one snapshot. Ordered by creation
    /// time, then ID.
    pub async fn list_by_board(&self, board_id: i64) -> Result<Vec<Post>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ForumError::Database(e.to_string()))?;

        let rows: Vec<PostRow> = sqlx::query_as(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE board_id = ? ORDER BY created_at, id"
        ))
        .bind(board_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| ForumError::Database(e.to_string()))?;

        let marks: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT r.post_id, r.player_id FROM post_readers r
             JOIN posts p ON p.id = r.post_id
             WHERE p.board_id = ?",
        )
        .bind(board_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| ForumError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| ForumError::Database(e.to_string()))?;

        let mut readers: HashMap<i64, BTreeSet<i64>> = HashMap::new();
        for (post_id, player_id) in marks {
            readers.entry(post_id).or_default().insert(player_id);
        }

        let mut posts: Vec<Post> = rows
            .into_iter()
            .map(|row| {
                let r = readers.remove(&row.id).unwrap_or_default();
                row.into_post(r)
            })
            .collect();
        posts.sort_by_key(Post::chrono_key);
        Ok(posts)
    }

    /// Count all posts on a board, expired ones included.
    pub async fn count_by_board(&self, board_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE board_id = ?")
            .bind(board_id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| ForumError::Database(e.to_string()))?;
        Ok(count)
    }
}

/// Insert a post and return its ID.
///
/// Subject, body and author name must not be blank. A parent must exist on
/// the same board. If the author is a player, the new post starts out read
/// for them.
pub(crate) async fn insert(conn: &mut SqliteConnection, new_post: &NewPost) -> Result<i64> {
    new_post.validate()?;

    if let Some(parent_id) = new_post.parent_id {
        let parent_board: Option<i64> =
            sqlx::query_scalar("SELECT board_id FROM posts WHERE id = ?")
                .bind(parent_id)
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| ForumError::Database(e.to_string()))?;

        match parent_board {
            None => return Err(ForumError::NotFound("parent post".to_string())),
            Some(board_id) if board_id != new_post.board_id => {
                return Err(ForumError::Validation(
                    "a reply must be on the same board as its parent".to_string(),
                ));
            }
            Some(_) => {}
        }
    }

    let created_at = new_post.created_at.unwrap_or_else(Utc::now);
    let author = &new_post.author;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO posts (board_id, parent_id, author_name, author_player_id,
                            author_object_id, subject, body, created_at, pinned)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0) RETURNING id",
    )
    .bind(new_post.board_id)
    .bind(new_post.parent_id)
    .bind(&author.name)
    .bind(author.identity.and_then(|i| i.player_id()))
    .bind(author.identity.and_then(|i| i.object_id()))
    .bind(&new_post.subject)
    .bind(&new_post.text)
    .bind(created_at)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| ForumError::Database(e.to_string()))?;

    if let Some(player_id) = author.player_id() {
        super::unread::set_read(conn, id, player_id, true).await?;
    }

    Ok(id)
}

/// Fetch a post with its readers on an open connection.
pub(crate) async fn fetch_post(conn: &mut SqliteConnection, id: i64) -> Result<Option<Post>> {
    let row: Option<PostRow> =
        sqlx::query_as(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| ForumError::Database(e.to_string()))?;

    let Some(row) = row else {
        return Ok(None);
    };

    let readers: Vec<i64> =
        sqlx::query_scalar("SELECT player_id FROM post_readers WHERE post_id = ?")
            .bind(id)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| ForumError::Database(e.to_string()))?;

    Ok(Some(row.into_post(readers.into_iter().collect())))
}

/// Follow parent links from a post to the top of its thread.
pub(crate) async fn thread_root(conn: &mut SqliteConnection, id: i64) -> Result<Option<Post>> {
    let mut current = id;
    let mut seen = HashSet::new();
    loop {
        let parent: Option<Option<i64>> =
            sqlx::query_scalar("SELECT parent_id FROM posts WHERE id = ?")
                .bind(current)
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| ForumError::Database(e.to_string()))?;

        match parent {
            None if current == id => return Ok(None),
            Some(Some(next)) if seen.insert(current) => current = next,
            _ => break,
        }
    }
    fetch_post(conn, current).await
}

/// Replace a post's body.
pub(crate) async fn update_text(conn: &mut SqliteConnection, id: i64, text: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE posts SET body = ? WHERE id = ?")
        .bind(text)
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(|e| ForumError::Database(e.to_string()))?;
    Ok(result.rows_affected() > 0)
}

/// Set or clear a post's pinned flag.
pub(crate) async fn set_pinned(conn: &mut SqliteConnection, id: i64, pinned: bool) -> Result<bool> {
    let result = sqlx::query("UPDATE posts SET pinned = ? WHERE id = ?")
        .bind(pinned)
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(|e| ForumError::Database(e.to_string()))?;
    Ok(result.rows_affected() > 0)
}

/// Delete a post after moving its direct replies up to its own parent.
///
/// Returns how many replies were relinked.
pub(crate) async fn delete_with_relink(
    conn: &mut SqliteConnection,
    id: i64,
    parent_id: Option<i64>,
) -> Result<u64> {
    let relinked = sqlx::query("UPDATE posts SET parent_id = ? WHERE parent_id = ?")
        .bind(parent_id)
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(|e| ForumError::Database(e.to_string()))?
        .rows_affected();

    let deleted = sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(|e| ForumError::Database(e.to_string()))?;

    if deleted.rows_affected() == 0 {
        return Err(ForumError::NotFound("post".to_string()));
    }
    Ok(relinked)
}

/// Internal struct for mapping database rows to Post.
#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    board_id: i64,
    parent_id: Option<i64>,
    author_name: String,
    author_player_id: Option<i64>,
    author_object_id: Option<i64>,
    subject: String,
    body: String,
    created_at: DateTime<Utc>,
    pinned: bool,
}

impl PostRow {
    fn into_post(self, readers: BTreeSet<i64>) -> Post {
        let identity = match (self.author_player_id, self.author_object_id) {
            (Some(id), _) => Some(Identity::Player(id)),
            (None, Some(id)) => Some(Identity::Object(id)),
            (None, None) => None,
        };
        Post {
            id: self.id,
            board_id: self.board_id,
            parent_id: self.parent_id,
            author: Author {
                name: self.author_name,
                identity,
            },
            subject: self.subject,
            text: self.body,
            created_at: self.created_at,
            pinned: self.pinned,
            readers,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::board::{BoardRepository, NewBoard};
    use crate::Database;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    async fn create_board(db: &Database, name: &str) -> i64 {
        BoardRepository::new(db.pool())
            .create(&NewBoard::new(name))
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_create_post() {
        let db = setup_db().await;
        let board_id = create_board(&db, "General").await;
        let repo = PostRepository::new(db.pool());

        let new_post = NewPost::new(
            board_id,
            "Hello",
            "World",
            Author::new("Alice", Identity::Player(1)),
        );
        let post = repo.create(&new_post).await.unwrap();

        assert_eq!(post.board_id, board_id);
        assert_eq!(post.subject, "Hello");
        assert_eq!(post.text, "World");
        assert_eq!(post.author.name, "Alice");
        assert_eq!(post.author.identity, Some(Identity::Player(1)));
        assert!(post.parent_id.is_none());
        assert!(!post.pinned);
        assert!(post.is_read_by(1));
    }

    #[tokio::test]
    async fn test_create_post_object_author_not_marked_read() {
        let db = setup_db().await;
        let board_id = create_board(&db, "General").await;
        let repo = PostRepository::new(db.pool());

        let new_post = NewPost::new(
            board_id,
            "Beep",
            "Boop",
            Author::new("Robot", Identity::Object(12)),
        );
        let post = repo.create(&new_post).await.unwrap();

        assert_eq!(post.author.identity, Some(Identity::Object(12)));
        assert!(post.readers.is_empty());
    }

    #[tokio::test]
    async fn test_create_on_missing_board() {
        let db = setup_db().await;
        let repo = PostRepository::new(db.pool());

        let result = repo
            .create(&NewPost::new(99, "Hello", "World", Author::named("Alice")))
            .await;
        assert!(matches!(result, Err(ForumError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_reply_parent_must_share_board() {
        let db = setup_db().await;
        let first = create_board(&db, "First").await;
        let second = create_board(&db, "Second").await;
        let repo = PostRepository::new(db.pool());

        let root = repo
            .create(&NewPost::new(first, "Root", "Text", Author::named("Alice")))
            .await
            .unwrap();

        let cross = repo
            .create(&NewPost::new(second, "Reply", "Text", Author::named("Bob")).with_parent(root.id))
            .await;
        assert!(matches!(cross, Err(ForumError::Validation(_))));

        let missing = repo
            .create(&NewPost::new(first, "Reply", "Text", Author::named("Bob")).with_parent(999))
            .await;
        assert!(matches!(missing, Err(ForumError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_by_board_sorted_with_readers() {
        let db = setup_db().await;
        let board_id = create_board(&db, "General").await;
        let other_id = create_board(&db, "Other").await;
        let repo = PostRepository::new(db.pool());
        let now = Utc::now();

        repo.create(
            &NewPost::new(board_id, "Newer", "b", Author::new("Alice", Identity::Player(1)))
                .with_created_at(now),
        )
        .await
        .unwrap();
        repo.create(
            &NewPost::new(board_id, "Older", "a", Author::named("Bob"))
                .with_created_at(now - Duration::days(2)),
        )
        .await
        .unwrap();
        repo.create(&NewPost::new(other_id, "Elsewhere", "c", Author::named("Carol")))
            .await
            .unwrap();

        let posts = repo.list_by_board(board_id).await.unwrap();
        let subjects: Vec<&str> = posts.iter().map(|p| p.subject.as_str()).collect();

        assert_eq!(subjects, vec!["Older", "Newer"]);
        assert!(posts[1].is_read_by(1));
        assert!(posts[0].readers.is_empty());
        assert_eq!(repo.count_by_board(board_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_created_at_round_trip() {
        let db = setup_db().await;
        let board_id = create_board(&db, "General").await;
        let repo = PostRepository::new(db.pool());
        let when = DateTime::parse_from_rfc3339("2023-02-03T04:05:06Z")
            .unwrap()
            .with_timezone(&Utc);

        let post = repo
            .create(&NewPost::new(board_id, "Old", "Text", Author::named("Alice")).with_created_at(when))
            .await
            .unwrap();
        assert_eq!(post.created_at, when);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_fields() {
        let db = setup_db().await;
        let board_id = create_board(&db, "General").await;
        let repo = PostRepository::new(db.pool());

        let result = repo
            .create(&NewPost::new(board_id, "", "", Author::named("")))
            .await;
        assert!(matches!(result, Err(ForumError::Validation(_))));

        let result = repo
            .create(&NewPost::new(board_id, "Hello", "World", Author::named("   ")))
            .await;
        assert!(matches!(result, Err(ForumError::Validation(_))));

        assert_eq!(repo.count_by_board(board_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_thread_root() {
        let db = setup_db().await;
        let board_id = create_board(&db, "General").await;
        let repo = PostRepository::new(db.pool());

        let root = repo
            .create(&NewPost::new(board_id, "Root", "Text", Author::named("Alice")))
            .await
            .unwrap();
        let child = repo
            .create(&NewPost::new(board_id, "Child", "Text", Author::named("Bob")).with_parent(root.id))
            .await
            .unwrap();
        let grandchild = repo
            .create(&NewPost::new(board_id, "Grand", "Text", Author::named("Carol")).with_parent(child.id))
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let found = thread_root(&mut conn, grandchild.id).await.unwrap().unwrap();
        assert_eq!(found.id, root.id);
        let found = thread_root(&mut conn, root.id).await.unwrap().unwrap();
        assert_eq!(found.id, root.id);
        assert!(thread_root(&mut conn, 999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_with_relink() {
        let db = setup_db().await;
        let board_id = create_board(&db, "General").await;
        let repo = PostRepository::new(db.pool());

        let root = repo
            .create(&NewPost::new(board_id, "Root", "Text", Author::named("Alice")))
            .await
            .unwrap();
        let middle = repo
            .create(&NewPost::new(board_id, "Middle", "Text", Author::named("Bob")).with_parent(root.id))
            .await
            .unwrap();
        let leaf = repo
            .create(&NewPost::new(board_id, "Leaf", "Text", Author::named("Carol")).with_parent(middle.id))
            .await
            .unwrap();

        let mut tx = db.begin().await.unwrap();
        let relinked = delete_with_relink(&mut tx, middle.id, middle.parent_id)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(relinked, 1);
        assert!(repo.get_by_id(middle.id).await.unwrap().is_none());
        let leaf = repo.get_by_id(leaf.id).await.unwrap().unwrap();
        assert_eq!(leaf.parent_id, Some(root.id));
    }

    #[tokio::test]
    async fn test_update_text_and_pin() {
        let db = setup_db().await;
        let board_id = create_board(&db, "General").await;
        let repo = PostRepository::new(db.pool());
        let post = repo
            .create(&NewPost::new(board_id, "Hello", "World", Author::named("Alice")))
            .await
            .unwrap();

        let mut tx = db.begin().await.unwrap();
        assert!(update_text(&mut tx, post.id, "Edited").await.unwrap());
        assert!(set_pinned(&mut tx, post.id, true).await.unwrap());
        assert!(!set_pinned(&mut tx, 999, true).await.unwrap());
        tx.commit().await.unwrap();

        let post = repo.get_by_id(post.id).await.unwrap().unwrap();
        assert_eq!(post.text, "Edited");
        assert_eq!(post.subject, "Hello");
        assert!(post.pinned);
    }
}
