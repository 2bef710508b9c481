//! Board model.
//!
//! This module defines the Board struct, its creation builder and the
//! per-viewer summary returned by board listings.

use std::collections::BTreeSet;

use crate::auth::{AccessType, LockExpr, LockSet};
use crate::{ForumError, Result};

use super::Post;

/// Board entity representing a bulletin board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    /// Unique board ID.
    pub id: i64,
    /// Board name (unique, case-insensitive).
    pub name: String,
    /// Maximum number of active posts, pinned posts included.
    pub max_posts: Option<i64>,
    /// Posts older than this many days expire unless pinned.
    pub max_age_days: Option<i64>,
    /// Permission locks.
    pub locks: LockSet,
    /// Player IDs subscribed to new-post announcements.
    pub subscribers: BTreeSet<i64>,
}

impl Board {
    /// Check if a player is subscribed to this board.
    pub fn is_subscribed(&self, player_id: i64) -> bool {
        self.subscribers.contains(&player_id)
    }

    /// Whether any expiry rule is configured.
    pub fn has_retention(&self) -> bool {
        self.max_posts.is_some() || self.max_age_days.is_some()
    }
}

/// Data for creating a new board.
#[derive(Debug, Clone)]
pub struct NewBoard {
    /// Board name.
    pub name: String,
    /// Maximum number of active posts.
    pub max_posts: Option<i64>,
    /// Maximum post age in days.
    pub max_age_days: Option<i64>,
    /// Initial locks (defaults to none, i.e. open to everyone).
    pub locks: LockSet,
}

impl NewBoard {
    /// Create a new board with minimal required fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_posts: None,
            max_age_days: None,
            locks: LockSet::new(),
        }
    }

    /// Set the maximum number of active posts.
    pub fn with_max_posts(mut self, max_posts: i64) -> Self {
        self.max_posts = Some(max_posts);
        self
    }

    /// Set the maximum post age in days.
    pub fn with_max_age_days(mut self, days: i64) -> Self {
        self.max_age_days = Some(days);
        self
    }

    /// Add a lock for one access type.
    pub fn with_lock(mut self, access: AccessType, expr: LockExpr) -> Self {
        self.locks.set(access, expr);
        self
    }

    /// Check the name and retention values, returning the normalized name.
    pub fn validate(&self) -> Result<String> {
        let name = validate_board_name(&self.name)?;
        validate_retention(self.max_posts, self.max_age_days)?;
        Ok(name)
    }
}

/// Validate a board name and return it trimmed.
///
/// Purely numeric names are reserved for positional board references, and
/// `/` separates a board from a post number in post references.
pub fn validate_board_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ForumError::Validation(
            "board name cannot be empty".to_string(),
        ));
    }
    if name.chars().all(|c| c.is_ascii_digit()) {
        return Err(ForumError::Validation(
            "board names cannot be purely numeric".to_string(),
        ));
    }
    if name.contains('/') {
        return Err(ForumError::Validation(
            "board names cannot contain '/'".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// Validate retention limits. Both are optional but must be positive.
pub fn validate_retention(max_posts: Option<i64>, max_age_days: Option<i64>) -> Result<()> {
    if matches!(max_posts, Some(n) if n <= 0) {
        return Err(ForumError::Validation(
            "max posts must be a positive number".to_string(),
        ));
    }
    if matches!(max_age_days, Some(n) if n <= 0) {
        return Err(ForumError::Validation(
            "max age must be a positive number of days".to_string(),
        ));
    }
    Ok(())
}

/// A visible board annotated for one viewer.
#[derive(Debug, Clone)]
pub struct BoardSummary {
    /// The board.
    pub board: Board,
    /// Active posts the viewer has not read.
    pub unread_count: usize,
    /// Active posts.
    pub total_count: usize,
    /// Most recently created active post.
    pub last_post: Option<Post>,
}

impl BoardSummary {
    /// Whether the viewer has anything unread on this board.
    pub fn has_unread(&self) -> bool {
        self.unread_count > 0
    }
}
