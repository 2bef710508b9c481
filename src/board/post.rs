//! Post model.
//!
//! This module defines the Post struct, its author and the builder used to
//! create new posts.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::auth::{Actor, Identity};
use crate::{ForumError, Result};

/// Who wrote a post.
///
/// The display name is always set. At most one identity reference is kept,
/// either a player or an in-world object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    /// Display name shown with the post.
    pub name: String,
    /// Player or object identity, if the author has one.
    pub identity: Option<Identity>,
}

impl Author {
    /// An author known only by display name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity: None,
        }
    }

    /// An author identified by display name and actor identity.
    pub fn new(name: impl Into<String>, identity: Identity) -> Self {
        Self {
            name: name.into(),
            identity: Some(identity),
        }
    }

    /// Whether this author is the given actor.
    pub fn is(&self, actor: &Actor) -> bool {
        self.identity == Some(actor.identity)
    }

    /// Player ID of the author, if any.
    pub fn player_id(&self) -> Option<i64> {
        self.identity.and_then(|i| i.player_id())
    }
}

/// Post entity representing a message on a board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    /// Unique post ID.
    pub id: i64,
    /// ID of the board this post belongs to.
    pub board_id: i64,
    /// Parent post (None for thread roots).
    pub parent_id: Option<i64>,
    /// Author.
    pub author: Author,
    /// Subject line.
    pub subject: String,
    /// Post body.
    pub text: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Exempt from expiry.
    pub pinned: bool,
    /// Player IDs that have read this post.
    pub readers: BTreeSet<i64>,
}

impl Post {
    /// Check if this post starts a thread.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Check if a player has read this post.
    pub fn is_read_by(&self, player_id: i64) -> bool {
        self.readers.contains(&player_id)
    }

    /// Case-insensitive substring match on subject or body.
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.subject.to_lowercase().contains(&needle) || self.text.to_lowercase().contains(&needle)
    }

    /// Sort key: creation time, ties broken by ID.
    pub fn chrono_key(&self) -> (DateTime<Utc>, i64) {
        (self.created_at, self.id)
    }
}

/// Data for creating a new post.
#[derive(Debug, Clone)]
pub struct NewPost {
    /// ID of the board.
    pub board_id: i64,
    /// Parent post, for replies.
    pub parent_id: Option<i64>,
    /// Author.
    pub author: Author,
    /// Subject line.
    pub subject: String,
    /// Post body.
    pub text: String,
    /// Explicit creation time; defaults to now.
    pub created_at: Option<DateTime<Utc>>,
}

impl NewPost {
    /// Create a new root post with required fields.
    pub fn new(
        board_id: i64,
        subject: impl Into<String>,
        text: impl Into<String>,
        author: Author,
    ) -> Self {
        Self {
            board_id,
            parent_id: None,
            author,
            subject: subject.into(),
            text: text.into(),
            created_at: None,
        }
    }

    /// Make this post a reply to another post.
    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Set an explicit creation time (imports and tests).
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Reject a post with a blank subject, body or author name.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("subject", &self.subject),
            ("text", &self.text),
            ("author name", &self.author.name),
        ] {
            if value.trim().is_empty() {
                return Err(ForumError::Validation(format!("{field} cannot be empty")));
            }
        }
        Ok(())
    }
}

/// User-supplied content for a new root post.
#[derive(Debug, Clone)]
pub struct PostDraft {
    /// Subject line.
    pub subject: String,
    /// Post body.
    pub text: String,
    /// Display name for the author.
    pub author_name: String,
}

impl PostDraft {
    /// Create a new draft.
    pub fn new(
        subject: impl Into<String>,
        text: impl Into<String>,
        author_name: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            text: text.into(),
            author_name: author_name.into(),
        }
    }
}
