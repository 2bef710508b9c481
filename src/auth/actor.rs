//! Actor model for the forum.
//!
//! An actor is whoever invokes an operation: a player account or an
//! in-world object acting on its own behalf, together with the role used
//! for permission checks.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Role for permission management.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Guest (not registered).
    Guest = 0,
    /// Regular member.
    #[default]
    Member = 1,
    /// Sub-operator (moderator).
    SubOp = 2,
    /// System operator (administrator). Bypasses every board lock.
    SysOp = 3,
}

impl Role {
    /// Convert role to its storage/lock-string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Member => "member",
            Role::SubOp => "subop",
            Role::SysOp => "sysop",
        }
    }

    /// Check if this role has at least the required permission level.
    ///
    /// # Examples
    ///
    /// ```
    /// use bbs_forum::auth::Role;
    ///
    /// assert!(Role::SysOp.can_access(Role::Member));
    /// assert!(Role::Member.can_access(Role::Member));
    /// assert!(!Role::Guest.can_access(Role::Member));
    /// ```
    pub fn can_access(&self, required: Role) -> bool {
        *self >= required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "guest" => Ok(Role::Guest),
            "member" => Ok(Role::Member),
            "subop" => Ok(Role::SubOp),
            "sysop" => Ok(Role::SysOp),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

/// Identity of an author or actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Identity {
    /// A player account.
    Player(i64),
    /// An in-world object.
    Object(i64),
}

impl Identity {
    /// Player id, if this is a player identity.
    pub fn player_id(&self) -> Option<i64> {
        match self {
            Identity::Player(id) => Some(*id),
            Identity::Object(_) => None,
        }
    }

    /// Object id, if this is an object identity.
    pub fn object_id(&self) -> Option<i64> {
        match self {
            Identity::Object(id) => Some(*id),
            Identity::Player(_) => None,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Player(id) => write!(f, "player#{id}"),
            Identity::Object(id) => write!(f, "object#{id}"),
        }
    }
}

/// The party performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// Who is acting.
    pub identity: Identity,
    /// Role used for lock evaluation.
    pub role: Role,
}

impl Actor {
    /// Create a player actor.
    pub fn player(id: i64, role: Role) -> Self {
        Self {
            identity: Identity::Player(id),
            role,
        }
    }

    /// Create an object actor.
    pub fn object(id: i64, role: Role) -> Self {
        Self {
            identity: Identity::Object(id),
            role,
        }
    }

    /// Player id used for read marks and subscriptions.
    pub fn player_id(&self) -> Option<i64> {
        self.identity.player_id()
    }

    /// Object id, if the actor is an object.
    pub fn object_id(&self) -> Option<i64> {
        self.identity.object_id()
    }

    /// Whether this actor holds the administrator role.
    pub fn is_admin(&self) -> bool {
        self.role == Role::SysOp
    }
}
