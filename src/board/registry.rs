//! Board registry.
//!
//! Resolves user-typed board and post references against the boards an
//! actor can see. Boards the actor cannot read are never matched, so a
//! reference to one reads as "no such board".

use chrono::Utc;
use tracing::debug;

use crate::auth::Actor;
use crate::db::Database;
use crate::{ForumError, Result};

use super::access::can_read;
use super::post_repository::PostRepository;
use super::repository::BoardRepository;
use super::retention::{active_posts, PostOrder};
use super::thread::ThreadLinks;
use super::types::{Board, BoardSummary};
use super::unread::{annotate, AnnotatedPost};

/// Match a token against a list of boards.
///
/// A positive integer is a 1-based position in `boards`. Anything else
/// matches a board name exactly, ignoring case, or failing that a single
/// board whose name starts with the token. An ambiguous prefix matches
/// nothing.
pub fn match_board<'b>(boards: &'b [Board], token: &str) -> Option<&'b Board> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    if let Ok(index) = token.parse::<i64>() {
        if index > 0 {
            return usize::try_from(index - 1).ok().and_then(|i| boards.get(i));
        }
        if token.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
    }

    let wanted = token.to_lowercase();
    if let Some(board) = boards.iter().find(|b| b.name.to_lowercase() == wanted) {
        return Some(board);
    }

    let mut prefixed = boards
        .iter()
        .filter(|b| b.name.to_lowercase().starts_with(&wanted));
    match (prefixed.next(), prefixed.next()) {
        (Some(board), None) => Some(board),
        _ => None,
    }
}

/// Split a `<board>/<n>` post reference.
///
/// Returns None unless `n` is a positive integer.
pub fn parse_post_ref(reference: &str) -> Option<(&str, usize)> {
    let (board, number) = reference.trim().split_once('/')?;
    let number: usize = number.trim().parse().ok()?;
    if number == 0 || board.trim().is_empty() {
        return None;
    }
    Some((board.trim(), number))
}

/// Registry of boards as seen by an actor.
pub struct BoardRegistry<'a> {
    db: &'a Database,
}

impl<'a> BoardRegistry<'a> {
    /// Create a new BoardRegistry with the given database reference.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Boards the actor can read, ordered by ID.
    pub async fn visible_boards(&self, actor: &Actor) -> Result<Vec<Board>> {
        let boards = BoardRepository::new(self.db.pool()).list_all().await?;
        Ok(boards.into_iter().filter(|b| can_read(b, actor)).collect())
    }

    /// The board's active posts, annotated for the viewer.
    pub async fn active_posts(
        &self,
        board: &Board,
        viewer: Option<&Actor>,
        order: PostOrder,
    ) -> Result<Vec<AnnotatedPost>> {
        let (posts, _) = self.thread_view(board, viewer, order).await?;
        Ok(posts)
    }

    /// The board's active posts together with the parent links of every
    /// stored post, both from one snapshot.
    pub async fn thread_view(
        &self,
        board: &Board,
        viewer: Option<&Actor>,
        order: PostOrder,
    ) -> Result<(Vec<AnnotatedPost>, ThreadLinks)> {
        let posts = PostRepository::new(self.db.pool())
            .list_by_board(board.id)
            .await?;
        let links = ThreadLinks::new(&posts);
        let active = active_posts(board, posts, Utc::now(), order);
        Ok((annotate(active, viewer), links))
    }

    /// Unread and total counts for one board.
    pub async fn summarize(&self, board: Board, actor: &Actor) -> Result<BoardSummary> {
        let posts = self
            .active_posts(&board, Some(actor), PostOrder::Chronological)
            .await?;

        Ok(BoardSummary {
            unread_count: posts.iter().filter(|a| a.unread).count(),
            total_count: posts.len(),
            last_post: posts.into_iter().last().map(|a| a.post),
            board,
        })
    }

    /// Every visible board with the actor's unread and total counts.
    pub async fn summaries(&self, actor: &Actor) -> Result<Vec<BoardSummary>> {
        let mut summaries = Vec::new();
        for board in self.visible_boards(actor).await? {
            summaries.push(self.summarize(board, actor).await?);
        }
        Ok(summaries)
    }

    /// Resolve a board token for an actor.
    pub async fn resolve(&self, actor: &Actor, token: &str) -> Result<Board> {
        let boards = self.visible_boards(actor).await?;
        match match_board(&boards, token) {
            Some(board) => Ok(board.clone()),
            None => {
                debug!(token, identity = %actor.identity, "board reference did not resolve");
                Err(ForumError::NotFound(format!("board '{}'", token.trim())))
            }
        }
    }

    /// Resolve a `<board>/<n>` reference, `n` counting from 1 in the
    /// board's pinned-first listing.
    pub async fn resolve_post(&self, actor: &Actor, reference: &str) -> Result<(Board, AnnotatedPost)> {
        let (token, number) = parse_post_ref(reference)
            .ok_or_else(|| ForumError::NotFound(format!("post '{}'", reference.trim())))?;

        let board = self.resolve(actor, token).await?;
        let mut posts = self
            .active_posts(&board, Some(actor), PostOrder::PinnedFirst)
            .await?;

        if number > posts.len() {
            return Err(ForumError::NotFound(format!("post '{}'", reference.trim())));
        }
        let post = posts.swap_remove(number - 1);
        Ok((board, post))
    }
}
