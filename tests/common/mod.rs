//! Test helpers for integration tests.

#![allow(dead_code)]

use bbs_forum::board::{BoardService, NewBoard, Post, PostDraft};
use bbs_forum::{Actor, Board, Database, Role};

/// Administrator used to set up boards.
pub fn admin() -> Actor {
    Actor::player(1, Role::SysOp)
}

/// A regular member.
pub fn member(id: i64) -> Actor {
    Actor::player(id, Role::Member)
}

/// Open a fresh in-memory database.
pub async fn setup_db() -> Database {
    Database::open_in_memory().await.unwrap()
}

/// Create a board as the administrator.
pub async fn create_board(db: &Database, new_board: NewBoard) -> Board {
    BoardService::new(db)
        .create_board(&admin(), &new_board)
        .await
        .unwrap()
}

/// Create a root post.
pub async fn create_post(
    db: &Database,
    actor: &Actor,
    board_id: i64,
    subject: &str,
    text: &str,
    author_name: &str,
) -> Post {
    BoardService::new(db)
        .create_post(actor, board_id, &PostDraft::new(subject, text, author_name))
        .await
        .unwrap()
        .post
}
