//! Board module.
//!
//! This module provides the bulletin board engine:
//! - Board and post models and their repositories
//! - Lock-based access checks for boards and posts
//! - Retention filtering of expired posts
//! - Per-player read state
//! - Thread grouping and board/post reference resolution
//! - The post lifecycle with subscriber notification

mod access;
mod post;
mod post_repository;
mod registry;
mod repository;
mod retention;
mod service;
mod thread;
mod types;
mod unread;

pub use access::{can_post, can_read, has_access, post_has_access};
pub use post::{Author, NewPost, Post, PostDraft};
pub use post_repository::PostRepository;
pub use registry::{match_board, parse_post_ref, BoardRegistry};
pub use repository::BoardRepository;
pub use retention::{active_posts, PostOrder};
pub use service::{notify_subscribers, BoardService, Notification, Posted, SearchHit};
pub use thread::{replies_of, root_of, threads, ThreadLinks, ThreadSummary};
pub use types::{validate_board_name, validate_retention, Board, BoardSummary, NewBoard};
pub use unread::{annotate, is_unread, AnnotatedPost, ReadRepository};
