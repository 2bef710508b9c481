//! Board and post permission checks.
//!
//! Locks are evaluated against an [`Actor`]. Administrators pass every
//! check, and a board with no locks at all is open to everyone.

use crate::auth::{AccessType, Actor};

use super::{Board, Post};

/// Check whether an actor has a kind of access to a board.
///
/// When the board defines no lock for `access`, `default` is returned.
pub fn has_access(board: &Board, actor: &Actor, access: AccessType, default: bool) -> bool {
    if actor.is_admin() || board.locks.is_empty() {
        return true;
    }
    match board.locks.get(access) {
        Some(expr) => expr.eval(actor),
        None => default,
    }
}

/// Check read access. Boards are readable unless a read lock says otherwise.
pub fn can_read(board: &Board, actor: &Actor) -> bool {
    has_access(board, actor, AccessType::Read, true)
}

/// Check post access. Without a post lock this follows read access.
pub fn can_post(board: &Board, actor: &Actor) -> bool {
    let read = can_read(board, actor);
    has_access(board, actor, AccessType::Post, read)
}

/// Check access to a single post.
///
/// The post's own author always passes; everyone else falls back to the
/// board lock for `access`, which denies when undefined.
pub fn post_has_access(board: &Board, post: &Post, actor: &Actor, access: AccessType) -> bool {
    post.author.is(actor) || has_access(board, actor, access, false)
}
