//! Actors, roles and board lock strings.
//!
//! Authentication itself happens outside this crate; callers hand in an
//! already-resolved [`Actor`].

mod actor;
mod lock;

pub use actor::{Actor, Identity, Role};
pub use lock::{AccessType, LockExpr, LockSet};
