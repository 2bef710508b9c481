//! Board service.
//!
//! This module provides the high-level board operations with permission
//! checking built in: administration, reading, subscriptions and the post
//! lifecycle. Every write that touches a board's posts runs in one
//! transaction that first takes the board's write lock.

use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::auth::{AccessType, Actor, LockExpr};
use crate::config::ForumConfig;
use crate::db::Database;
use crate::{ForumError, Result};

use super::access::{can_post, can_read, has_access, post_has_access};
use super::post::{Author, NewPost, Post, PostDraft};
use super::post_repository::{self, PostRepository};
use super::registry::BoardRegistry;
use super::repository::{lock_board, BoardRepository};
use super::retention::PostOrder;
use super::thread::{self, ThreadLinks, ThreadSummary};
use super::types::{validate_retention, Board, BoardSummary, NewBoard};
use super::unread::{AnnotatedPost, ReadRepository};

/// Who should hear about a new post.
///
/// Delivery is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Board the post was made on.
    pub board_id: i64,
    /// Board name, for the announcement text.
    pub board_name: String,
    /// The new post.
    pub post_id: i64,
    /// 1-based position of the post in the board listing, if it is active.
    pub post_number: Option<usize>,
    /// Author display name.
    pub author_name: String,
    /// Post subject.
    pub subject: String,
    /// Subscribed player IDs.
    pub recipients: BTreeSet<i64>,
}

impl Notification {
    /// Announcement line, e.g. `New post by Alice: (General/3) Hello`.
    pub fn message(&self) -> String {
        match self.post_number {
            Some(n) => format!(
                "New post by {}: ({}/{}) {}",
                self.author_name, self.board_name, n, self.subject
            ),
            None => format!(
                "New post by {}: ({}) {}",
                self.author_name, self.board_name, self.subject
            ),
        }
    }
}

/// Build the notification for a new post: every subscriber of the board.
pub fn notify_subscribers(board: &Board, post: &Post, post_number: Option<usize>) -> Notification {
    Notification {
        board_id: board.id,
        board_name: board.name.clone(),
        post_id: post.id,
        post_number,
        author_name: post.author.name.clone(),
        subject: post.subject.clone(),
        recipients: board.subscribers.clone(),
    }
}

/// A successfully created post and who to tell about it.
#[derive(Debug, Clone)]
pub struct Posted {
    /// The stored post.
    pub post: Post,
    /// Subscribers to announce it to.
    pub notification: Notification,
}

/// One search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Board name.
    pub board_name: String,
    /// The matching post with the searcher's read state.
    pub post: AnnotatedPost,
}

/// Service for board operations with permission checking.
pub struct BoardService<'a> {
    db: &'a Database,
    config: ForumConfig,
}

impl<'a> BoardService<'a> {
    /// Create a new BoardService with default post limits.
    pub fn new(db: &'a Database) -> Self {
        Self::with_config(db, ForumConfig::default())
    }

    /// Create a new BoardService with the given post limits.
    pub fn with_config(db: &'a Database, config: ForumConfig) -> Self {
        Self { db, config }
    }

    fn registry(&self) -> BoardRegistry<'a> {
        BoardRegistry::new(self.db)
    }

    // ========== Administration ==========

    /// Create a board. Administrators only.
    pub async fn create_board(&self, actor: &Actor, new_board: &NewBoard) -> Result<Board> {
        require_admin(actor, "create boards")?;
        let name = new_board.validate()?;

        let repo = BoardRepository::new(self.db.pool());
        if repo.name_exists(&name).await? {
            return Err(ForumError::Validation(format!(
                "a board named '{name}' already exists"
            )));
        }

        let board = repo.create(new_board).await?;
        info!(board_id = board.id, name = %board.name, by = %actor.identity, "board created");
        Ok(board)
    }

    /// Define or replace one lock on a board. Administrators only.
    pub async fn set_lock(
        &self,
        actor: &Actor,
        board_id: i64,
        access: AccessType,
        expr: &str,
    ) -> Result<Board> {
        require_admin(actor, "change board locks")?;
        let expr: LockExpr = expr.parse()?;

        let mut board = self.load_board(board_id).await?;
        board.locks.set(access, expr);
        BoardRepository::new(self.db.pool())
            .update_locks(board.id, &board.locks)
            .await?;

        info!(board_id, locks = %board.locks, "board locks updated");
        Ok(board)
    }

    /// Remove one lock from a board. Administrators only.
    pub async fn clear_lock(&self, actor: &Actor, board_id: i64, access: AccessType) -> Result<Board> {
        require_admin(actor, "change board locks")?;

        let mut board = self.load_board(board_id).await?;
        if board.locks.remove(access) {
            BoardRepository::new(self.db.pool())
                .update_locks(board.id, &board.locks)
                .await?;
            info!(board_id, %access, "board lock cleared");
        }
        Ok(board)
    }

    /// Set a board's expiry rules. Administrators only.
    pub async fn set_retention(
        &self,
        actor: &Actor,
        board_id: i64,
        max_posts: Option<i64>,
        max_age_days: Option<i64>,
    ) -> Result<Board> {
        require_admin(actor, "change board retention")?;
        validate_retention(max_posts, max_age_days)?;

        let updated = BoardRepository::new(self.db.pool())
            .update_retention(board_id, max_posts, max_age_days)
            .await?;
        if !updated {
            return Err(ForumError::NotFound("board".to_string()));
        }

        info!(board_id, ?max_posts, ?max_age_days, "board retention updated");
        self.load_board(board_id).await
    }

    // ========== Reading ==========

    /// Every board the actor can read, with unread and total counts.
    pub async fn list_boards(&self, actor: &Actor) -> Result<Vec<BoardSummary>> {
        self.registry().summaries(actor).await
    }

    /// Get a board the actor can read.
    pub async fn get_board(&self, actor: &Actor, board_id: i64) -> Result<Board> {
        self.readable_board(actor, board_id).await
    }

    /// Resolve a board by position, name or unique prefix.
    pub async fn resolve_board(&self, actor: &Actor, token: &str) -> Result<Board> {
        self.registry().resolve(actor, token).await
    }

    /// Resolve a `<board>/<n>` post reference.
    pub async fn resolve_post(&self, actor: &Actor, reference: &str) -> Result<(Board, AnnotatedPost)> {
        self.registry().resolve_post(actor, reference).await
    }

    /// The board's active posts, pinned first, with the actor's read state.
    pub async fn posts(&self, actor: &Actor, board_id: i64) -> Result<Vec<AnnotatedPost>> {
        let board = self.readable_board(actor, board_id).await?;
        self.registry()
            .active_posts(&board, Some(actor), PostOrder::PinnedFirst)
            .await
    }

    /// The board's threads, pinned first, then most recently active.
    pub async fn threads(&self, actor: &Actor, board_id: i64) -> Result<Vec<ThreadSummary>> {
        let board = self.readable_board(actor, board_id).await?;
        let (posts, links) = self
            .registry()
            .thread_view(&board, Some(actor), PostOrder::Chronological)
            .await?;
        Ok(thread::threads(&posts, &links))
    }

    /// Read one active post and mark it read.
    ///
    /// The returned read state is the one from before this read.
    pub async fn read_post(&self, actor: &Actor, post_id: i64) -> Result<AnnotatedPost> {
        let (posts, _) = self.active_set_containing(actor, post_id).await?;
        let post = posts
            .into_iter()
            .find(|a| a.post.id == post_id)
            .ok_or_else(|| ForumError::NotFound("post".to_string()))?;

        if let (Some(player_id), true) = (actor.player_id(), post.unread) {
            ReadRepository::new(self.db.pool())
                .mark_read(post_id, player_id, true)
                .await?;
        }
        Ok(post)
    }

    /// Read a whole thread: the root followed by its replies, ascending.
    ///
    /// `post_id` may be any post in the thread. Every post returned is
    /// marked read; the returned read state is the one from before.
    pub async fn read_thread(&self, actor: &Actor, post_id: i64) -> Result<Vec<AnnotatedPost>> {
        let (posts, links) = self.active_set_containing(actor, post_id).await?;
        let root_id = thread::root_of(post_id, &posts, &links)
            .ok_or_else(|| ForumError::NotFound("post".to_string()))?;

        let root = posts
            .iter()
            .find(|a| a.post.id == root_id)
            .cloned()
            .ok_or_else(|| ForumError::NotFound("post".to_string()))?;
        let mut thread = vec![root];
        thread.extend(thread::replies_of(root_id, &posts, &links));

        if let Some(player_id) = actor.player_id() {
            let unread: Vec<i64> = thread
                .iter()
                .filter(|a| a.unread)
                .map(|a| a.post.id)
                .collect();
            ReadRepository::new(self.db.pool())
                .mark_many_read(&unread, player_id)
                .await?;
        }
        Ok(thread)
    }

    /// Mark a post read or unread for the actor.
    ///
    /// Returns true if the read state changed.
    pub async fn mark_read(&self, actor: &Actor, post_id: i64, read: bool) -> Result<bool> {
        let player_id = require_player(actor, "track read posts")?;
        let (_, post) = self.readable_post(actor, post_id).await?;
        ReadRepository::new(self.db.pool())
            .mark_read(post.id, player_id, read)
            .await
    }

    /// Mark every active post on a board read. Returns how many changed.
    pub async fn mark_all_read(&self, actor: &Actor, board_id: i64) -> Result<usize> {
        let board = self.readable_board(actor, board_id).await?;
        let Some(player_id) = actor.player_id() else {
            return Ok(0);
        };

        let unread: Vec<i64> = self
            .registry()
            .active_posts(&board, Some(actor), PostOrder::Chronological)
            .await?
            .into_iter()
            .filter(|a| a.unread)
            .map(|a| a.post.id)
            .collect();

        let marked = ReadRepository::new(self.db.pool())
            .mark_many_read(&unread, player_id)
            .await?;
        info!(board_id, player_id, marked, "board caught up");
        Ok(marked)
    }

    /// The first unread post across visible boards, in board order and then
    /// listing order.
    pub async fn first_unread(&self, actor: &Actor) -> Result<Option<(Board, AnnotatedPost)>> {
        let registry = self.registry();
        for board in registry.visible_boards(actor).await? {
            let posts = registry
                .active_posts(&board, Some(actor), PostOrder::PinnedFirst)
                .await?;
            if let Some(post) = posts.into_iter().find(|a| a.unread) {
                return Ok(Some((board, post)));
            }
        }
        Ok(None)
    }

    /// Visible boards that have unread posts for the actor.
    pub async fn scan(&self, actor: &Actor) -> Result<Vec<BoardSummary>> {
        let summaries = self.registry().summaries(actor).await?;
        Ok(summaries.into_iter().filter(BoardSummary::has_unread).collect())
    }

    /// Case-insensitive substring search over active posts.
    ///
    /// Searches one board, or every board the actor can read. Results are
    /// ascending by creation time.
    pub async fn search(
        &self,
        actor: &Actor,
        needle: &str,
        board_id: Option<i64>,
    ) -> Result<Vec<SearchHit>> {
        let needle = needle.trim();
        if needle.is_empty() {
            return Err(ForumError::Validation(
                "search text cannot be empty".to_string(),
            ));
        }

        let registry = self.registry();
        let boards = match board_id {
            Some(id) => vec![self.readable_board(actor, id).await?],
            None => registry.visible_boards(actor).await?,
        };

        let mut hits = Vec::new();
        for board in boards {
            let posts = registry
                .active_posts(&board, Some(actor), PostOrder::Chronological)
                .await?;
            hits.extend(
                posts
                    .into_iter()
                    .filter(|a| a.post.matches(needle))
                    .map(|post| SearchHit {
                        board_name: board.name.clone(),
                        post,
                    }),
            );
        }
        hits.sort_by_key(|h| h.post.post.chrono_key());
        Ok(hits)
    }

    // ========== Subscriptions ==========

    /// Subscribe or unsubscribe the actor. Returns true if anything changed.
    ///
    /// Subscribing needs read access; unsubscribing always works.
    pub async fn set_subscribed(&self, actor: &Actor, board_id: i64, subscribed: bool) -> Result<bool> {
        let player_id = require_player(actor, "subscribe to boards")?;
        if subscribed {
            self.readable_board(actor, board_id).await?;
        } else {
            self.load_board(board_id).await?;
        }

        let changed = BoardRepository::new(self.db.pool())
            .set_subscribed(board_id, player_id, subscribed)
            .await?;
        if changed {
            info!(board_id, player_id, subscribed, "subscription changed");
        }
        Ok(changed)
    }

    /// Check whether the actor is subscribed to a board.
    pub async fn is_subscribed(&self, actor: &Actor, board_id: i64) -> Result<bool> {
        let board = self.load_board(board_id).await?;
        Ok(actor.player_id().is_some_and(|id| board.is_subscribed(id)))
    }

    /// Boards the actor subscribes to and can still read.
    pub async fn subscriptions(&self, actor: &Actor) -> Result<Vec<Board>> {
        let player_id = require_player(actor, "subscribe to boards")?;
        let subscribed: BTreeSet<i64> = BoardRepository::new(self.db.pool())
            .subscribed_board_ids(player_id)
            .await?
            .into_iter()
            .collect();
        if subscribed.is_empty() {
            return Ok(Vec::new());
        }

        let boards = self.registry().visible_boards(actor).await?;
        Ok(boards
            .into_iter()
            .filter(|b| subscribed.contains(&b.id))
            .collect())
    }

    // ========== Post lifecycle ==========

    /// Start a new thread on a board.
    pub async fn create_post(&self, actor: &Actor, board_id: i64, draft: &PostDraft) -> Result<Posted> {
        self.validate_subject(&draft.subject)?;
        self.validate_author_name(&draft.author_name)?;
        self.validate_text(&draft.text)?;

        let board = self.readable_board(actor, board_id).await?;
        require_post(&board, actor)?;

        let new_post = NewPost::new(
            board.id,
            draft.subject.trim(),
            draft.text.as_str(),
            Author::new(draft.author_name.trim(), actor.identity),
        );

        let mut tx = self.db.begin().await?;
        lock_board(&mut tx, board.id).await?;
        let post_id = post_repository::insert(&mut tx, &new_post).await?;
        tx.commit().await?;

        self.finish_post(board, post_id).await
    }

    /// Reply to a post.
    ///
    /// Replies always hang from the thread root, and take the root's
    /// subject with the configured reply prefix.
    pub async fn reply(
        &self,
        actor: &Actor,
        parent_id: i64,
        text: &str,
        author_name: &str,
    ) -> Result<Posted> {
        self.validate_author_name(author_name)?;
        self.validate_text(text)?;

        let (board, _) = self.readable_post(actor, parent_id).await?;
        require_post(&board, actor)?;

        let mut tx = self.db.begin().await?;
        lock_board(&mut tx, board.id).await?;
        let root = post_repository::thread_root(&mut tx, parent_id)
            .await?
            .ok_or_else(|| ForumError::NotFound("post".to_string()))?;

        let new_post = NewPost::new(
            board.id,
            self.reply_subject(&root.subject),
            text,
            Author::new(author_name.trim(), actor.identity),
        )
        .with_parent(root.id);
        let post_id = post_repository::insert(&mut tx, &new_post).await?;
        tx.commit().await?;

        self.finish_post(board, post_id).await
    }

    /// Replace a post's text. Subjects never change.
    pub async fn edit_post(&self, actor: &Actor, post_id: i64, text: &str) -> Result<Post> {
        self.validate_text(text)?;

        let (board, post) = self.readable_post(actor, post_id).await?;
        if !post_has_access(&board, &post, actor, AccessType::Edit) {
            warn!(post_id, by = %actor.identity, "edit denied");
            return Err(ForumError::Permission(
                "you cannot edit this post".to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;
        lock_board(&mut tx, board.id).await?;
        if !post_repository::update_text(&mut tx, post_id, text).await? {
            return Err(ForumError::NotFound("post".to_string()));
        }
        tx.commit().await?;

        info!(post_id, by = %actor.identity, "post edited");
        self.load_post(post_id).await
    }

    /// Delete a post, moving its direct replies up to its parent.
    pub async fn delete_post(&self, actor: &Actor, post_id: i64) -> Result<()> {
        let (board, post) = self.readable_post(actor, post_id).await?;
        if !post_has_access(&board, &post, actor, AccessType::Delete) {
            warn!(post_id, by = %actor.identity, "delete denied");
            return Err(ForumError::Permission(
                "you cannot delete this post".to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;
        lock_board(&mut tx, board.id).await?;
        let current = post_repository::fetch_post(&mut tx, post_id)
            .await?
            .ok_or_else(|| ForumError::NotFound("post".to_string()))?;
        let relinked =
            post_repository::delete_with_relink(&mut tx, post_id, current.parent_id).await?;
        tx.commit().await?;

        info!(post_id, board_id = board.id, relinked, by = %actor.identity, "post deleted");
        Ok(())
    }

    /// Pin or unpin a post.
    pub async fn set_pinned(&self, actor: &Actor, post_id: i64, pinned: bool) -> Result<Post> {
        let (board, _) = self.readable_post(actor, post_id).await?;
        if !has_access(&board, actor, AccessType::Pin, false) {
            warn!(post_id, by = %actor.identity, "pin denied");
            return Err(ForumError::Permission(format!(
                "you cannot pin posts on '{}'",
                board.name
            )));
        }

        let mut tx = self.db.begin().await?;
        lock_board(&mut tx, board.id).await?;
        if !post_repository::set_pinned(&mut tx, post_id, pinned).await? {
            return Err(ForumError::NotFound("post".to_string()));
        }
        tx.commit().await?;

        info!(post_id, pinned, by = %actor.identity, "post pin changed");
        self.load_post(post_id).await
    }

    // ========== Helpers ==========

    async fn load_board(&self, board_id: i64) -> Result<Board> {
        BoardRepository::new(self.db.pool())
            .get_by_id(board_id)
            .await?
            .ok_or_else(|| ForumError::NotFound("board".to_string()))
    }

    async fn readable_board(&self, actor: &Actor, board_id: i64) -> Result<Board> {
        let board = self.load_board(board_id).await?;
        if !can_read(&board, actor) {
            return Err(ForumError::NotFound("board".to_string()));
        }
        Ok(board)
    }

    async fn load_post(&self, post_id: i64) -> Result<Post> {
        PostRepository::new(self.db.pool())
            .get_by_id(post_id)
            .await?
            .ok_or_else(|| ForumError::NotFound("post".to_string()))
    }

    async fn readable_post(&self, actor: &Actor, post_id: i64) -> Result<(Board, Post)> {
        let post = self.load_post(post_id).await?;
        let board = self.readable_board(actor, post.board_id).await?;
        Ok((board, post))
    }

    async fn active_set_containing(
        &self,
        actor: &Actor,
        post_id: i64,
    ) -> Result<(Vec<AnnotatedPost>, ThreadLinks)> {
        let (board, _) = self.readable_post(actor, post_id).await?;
        let (posts, links) = self
            .registry()
            .thread_view(&board, Some(actor), PostOrder::Chronological)
            .await?;
        if !posts.iter().any(|a| a.post.id == post_id) {
            return Err(ForumError::NotFound("post".to_string()));
        }
        Ok((posts, links))
    }

    async fn finish_post(&self, board: Board, post_id: i64) -> Result<Posted> {
        let post = self.load_post(post_id).await?;
        let listing = self
            .registry()
            .active_posts(&board, None, PostOrder::PinnedFirst)
            .await?;
        let number = listing
            .iter()
            .position(|a| a.post.id == post_id)
            .map(|i| i + 1);

        info!(
            post_id,
            board = %board.name,
            parent_id = ?post.parent_id,
            author = %post.author.name,
            "post created"
        );
        let notification = notify_subscribers(&board, &post, number);
        Ok(Posted { post, notification })
    }

    fn reply_subject(&self, subject: &str) -> String {
        let prefix = &self.config.reply_prefix;
        let full = if subject.starts_with(prefix.as_str()) {
            subject.to_string()
        } else {
            format!("{prefix}{subject}")
        };
        full.chars().take(self.config.max_subject_length).collect()
    }

    fn validate_subject(&self, subject: &str) -> Result<()> {
        validate_field("subject", subject, self.config.max_subject_length)
    }

    fn validate_text(&self, text: &str) -> Result<()> {
        validate_field("text", text, self.config.max_body_length)
    }

    fn validate_author_name(&self, name: &str) -> Result<()> {
        validate_field("author name", name, self.config.max_author_name_length)
    }
}

fn validate_field(field: &str, value: &str, max: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ForumError::Validation(format!("{field} cannot be empty")));
    }
    if value.chars().count() > max {
        return Err(ForumError::Validation(format!(
            "{field} is too long (max {max} characters)"
        )));
    }
    Ok(())
}

fn require_admin(actor: &Actor, action: &str) -> Result<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        warn!(by = %actor.identity, action, "administrator action denied");
        Err(ForumError::Permission(format!(
            "only administrators can {action}"
        )))
    }
}

fn require_player(actor: &Actor, action: &str) -> Result<i64> {
    actor
        .player_id()
        .ok_or_else(|| ForumError::Validation(format!("only players can {action}")))
}

fn require_post(board: &Board, actor: &Actor) -> Result<()> {
    if can_post(board, actor) {
        Ok(())
    } else {
        warn!(board = %board.name, by = %actor.identity, "post denied");
        Err(ForumError::Permission(format!(
            "you cannot post to '{}'",
            board.name
        )))
    }
}
