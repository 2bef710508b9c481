//! Board lock strings.
//!
//! A board stores its locks as a single string of `type:expression` pairs
//! separated by semicolons:
//!
//! ```text
//! read:all();post:perm(member) AND NOT pid(13);pin:perm(subop)
//! ```
//!
//! Expressions are built from lock functions combined with `NOT`, `AND`
//! and `OR` (`AND` binds tighter than `OR`; parentheses group):
//!
//! - `all()` - always passes
//! - `none()` / `false()` - never passes
//! - `perm(<role>)` - actor role is at least `<role>`
//! - `pid(<n>)` - actor is player `<n>`
//! - `oid(<n>)` - actor is object `<n>`

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::actor::{Actor, Identity, Role};
use crate::{ForumError, Result};

/// Kinds of access a board lock can govern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessType {
    /// See the board and read its posts.
    Read,
    /// Create posts and replies.
    Post,
    /// Edit any post on the board.
    Edit,
    /// Delete any post on the board.
    Delete,
    /// Pin or unpin posts.
    Pin,
}

impl AccessType {
    /// All access types, in storage order.
    pub const ALL: [AccessType; 5] = [
        AccessType::Read,
        AccessType::Post,
        AccessType::Edit,
        AccessType::Delete,
        AccessType::Pin,
    ];

    /// Lock-string key for this access type.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::Read => "read",
            AccessType::Post => "post",
            AccessType::Edit => "edit",
            AccessType::Delete => "delete",
            AccessType::Pin => "pin",
        }
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AccessType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "read" => Ok(AccessType::Read),
            "post" => Ok(AccessType::Post),
            "edit" => Ok(AccessType::Edit),
            "delete" => Ok(AccessType::Delete),
            "pin" => Ok(AccessType::Pin),
            _ => Err(format!("unknown access type: {s}")),
        }
    }
}

/// A parsed lock expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockExpr {
    /// `all()`
    All,
    /// `none()`
    Deny,
    /// `perm(role)`
    Perm(Role),
    /// `pid(n)`
    Player(i64),
    /// `oid(n)`
    Object(i64),
    /// `NOT expr`
    Not(Box<LockExpr>),
    /// `a AND b`
    And(Box<LockExpr>, Box<LockExpr>),
    /// `a OR b`
    Or(Box<LockExpr>, Box<LockExpr>),
}

impl LockExpr {
    /// Evaluate the expression for an actor.
    pub fn eval(&self, actor: &Actor) -> bool {
        match self {
            LockExpr::All => true,
            LockExpr::Deny => false,
            LockExpr::Perm(role) => actor.role.can_access(*role),
            LockExpr::Player(id) => actor.identity == Identity::Player(*id),
            LockExpr::Object(id) => actor.identity == Identity::Object(*id),
            LockExpr::Not(inner) => !inner.eval(actor),
            LockExpr::And(a, b) => a.eval(actor) && b.eval(actor),
            LockExpr::Or(a, b) => a.eval(actor) || b.eval(actor),
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, parent_is_and: bool) -> fmt::Result {
        let needs_parens = match self {
            LockExpr::Or(..) => true,
            LockExpr::And(..) => !parent_is_and,
            _ => false,
        };
        if needs_parens {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

impl fmt::Display for LockExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockExpr::All => write!(f, "all()"),
            LockExpr::Deny => write!(f, "none()"),
            LockExpr::Perm(role) => write!(f, "perm({role})"),
            LockExpr::Player(id) => write!(f, "pid({id})"),
            LockExpr::Object(id) => write!(f, "oid({id})"),
            LockExpr::Not(inner) => {
                write!(f, "NOT ")?;
                inner.fmt_operand(f, false)
            }
            LockExpr::And(a, b) => {
                a.fmt_operand(f, true)?;
                write!(f, " AND ")?;
                b.fmt_operand(f, true)
            }
            LockExpr::Or(a, b) => write!(f, "{a} OR {b}"),
        }
    }
}

impl FromStr for LockExpr {
    type Err = ForumError;

    fn from_str(s: &str) -> Result<Self> {
        let tokens = tokenize(s)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(lock_error(s, "unexpected trailing input"));
        }
        Ok(expr)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Open,
    Close,
}

fn lock_error(source: &str, reason: &str) -> ForumError {
    ForumError::Validation(format!("invalid lock '{source}': {reason}"))
}

fn tokenize(s: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut word = String::new();

    for c in s.chars() {
        match c {
            '(' | ')' => {
                if !word.is_empty() {
                    tokens.push(Token::Word(std::mem::take(&mut word)));
                }
                tokens.push(if c == '(' { Token::Open } else { Token::Close });
            }
            c if c.is_whitespace() => {
                if !word.is_empty() {
                    tokens.push(Token::Word(std::mem::take(&mut word)));
                }
            }
            c if c.is_alphanumeric() || c == '_' || c == '-' => word.push(c),
            other => return Err(lock_error(s, &format!("unexpected character '{other}'"))),
        }
    }
    if !word.is_empty() {
        tokens.push(Token::Word(word));
    }
    if tokens.is_empty() {
        return Err(lock_error(s, "empty expression"));
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.tokens.get(self.pos), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn source(&self) -> String {
        self.tokens
            .iter()
            .map(|t| match t {
                Token::Word(w) => w.as_str(),
                Token::Open => "(",
                Token::Close => ")",
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn parse_or(&mut self) -> Result<LockExpr> {
        let mut expr = self.parse_and()?;
        while self.peek_keyword("or") {
            self.pos += 1;
            let rhs = self.parse_and()?;
            expr = LockExpr::Or(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<LockExpr> {
        let mut expr = self.parse_unary()?;
        while self.peek_keyword("and") {
            self.pos += 1;
            let rhs = self.parse_unary()?;
            expr = LockExpr::And(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<LockExpr> {
        if self.peek_keyword("not") {
            self.pos += 1;
            let inner = self.parse_unary()?;
            return Ok(LockExpr::Not(Box::new(inner)));
        }

        match self.next() {
            Some(Token::Open) => {
                let expr = self.parse_or()?;
                match self.next() {
                    Some(Token::Close) => Ok(expr),
                    _ => Err(lock_error(&self.source(), "missing ')'")),
                }
            }
            Some(Token::Word(name)) => self.parse_call(&name),
            _ => Err(lock_error(&self.source(), "expected a lock function")),
        }
    }

    fn parse_call(&mut self, name: &str) -> Result<LockExpr> {
        if self.next() != Some(Token::Open) {
            return Err(lock_error(&self.source(), &format!("'{name}' needs '('")));
        }
        let arg = match self.tokens.get(self.pos) {
            Some(Token::Word(w)) => {
                let w = w.clone();
                self.pos += 1;
                Some(w)
            }
            _ => None,
        };
        if self.next() != Some(Token::Close) {
            return Err(lock_error(&self.source(), &format!("'{name}' needs ')'")));
        }

        let source = self.source();
        let parse_id = |arg: Option<String>| -> Result<i64> {
            arg.as_deref()
                .and_then(|a| a.parse::<i64>().ok())
                .ok_or_else(|| lock_error(&source, &format!("'{name}' needs a numeric id")))
        };

        match name.to_lowercase().as_str() {
            "all" | "true" if arg.is_none() => Ok(LockExpr::All),
            "none" | "false" if arg.is_none() => Ok(LockExpr::Deny),
            "perm" => {
                let role = arg
                    .as_deref()
                    .ok_or_else(|| lock_error(&source, "'perm' needs a role"))?
                    .parse::<Role>()
                    .map_err(|e| lock_error(&source, &e))?;
                Ok(LockExpr::Perm(role))
            }
            "pid" => Ok(LockExpr::Player(parse_id(arg)?)),
            "oid" => Ok(LockExpr::Object(parse_id(arg)?)),
            _ => Err(lock_error(
                &source,
                &format!("unknown lock function '{name}'"),
            )),
        }
    }
}

/// The full set of locks defined on a board.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockSet {
    locks: BTreeMap<AccessType, LockExpr>,
}

impl LockSet {
    /// Create an empty lock set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a stored lock string. An empty string yields an empty set.
    ///
    /// When a type is defined twice, the later definition wins.
    pub fn parse(s: &str) -> Result<Self> {
        let mut set = Self::new();
        for part in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (kind, expr) = part
                .split_once(':')
                .ok_or_else(|| lock_error(part, "expected 'type:expression'"))?;
            let kind = kind
                .parse::<AccessType>()
                .map_err(|e| lock_error(part, &e))?;
            set.locks.insert(kind, expr.parse()?);
        }
        Ok(set)
    }

    /// Whether no locks are configured at all.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Lock for the given access type, if defined.
    pub fn get(&self, access: AccessType) -> Option<&LockExpr> {
        self.locks.get(&access)
    }

    /// Define or replace the lock for an access type.
    pub fn set(&mut self, access: AccessType, expr: LockExpr) {
        self.locks.insert(access, expr);
    }

    /// Remove the lock for an access type. Returns true if one was defined.
    pub fn remove(&mut self, access: AccessType) -> bool {
        self.locks.remove(&access).is_some()
    }

    /// Iterate over the defined locks in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (AccessType, &LockExpr)> {
        self.locks.iter().map(|(k, v)| (*k, v))
    }
}

impl fmt::Display for LockSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (kind, expr) in &self.locks {
            if !first {
                write!(f, ";")?;
            }
            first = false;
            write!(f, "{kind}:{expr}")?;
        }
        Ok(())
    }
}
