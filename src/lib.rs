//! bbs-forum - bulletin board engine
//!
//! Boards, posts and threads with lock-based access control, lazy
//! retention filtering and per-player read tracking, stored in SQLite.
//!
//! The entry point for callers is [`board::BoardService`]; command and web
//! adapters translate user input into its operations.

pub mod auth;
pub mod board;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;

pub use auth::{AccessType, Actor, Identity, LockExpr, LockSet, Role};
pub use board::{
    AnnotatedPost, Board, BoardRegistry, BoardService, BoardSummary, NewBoard, NewPost,
    Notification, Post, PostDraft, Posted, ThreadSummary,
};
pub use config::Config;
pub use db::Database;
pub use error::{ForumError, Result};
