//! Database schema and migrations.
//!
//! Migrations are applied in order when a database is opened. The
//! `schema_version` table records which ones have run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: boards
    r#"
CREATE TABLE boards (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL COLLATE NOCASE UNIQUE,
    max_posts       INTEGER CHECK (max_posts IS NULL OR max_posts > 0),
    max_age_days    INTEGER CHECK (max_age_days IS NULL OR max_age_days > 0),
    locks           TEXT NOT NULL DEFAULT '',    -- 'read:all();post:perm(member)'
    revision        INTEGER NOT NULL DEFAULT 0   -- bumped by every write under the board lock
);
"#,
    // v2: posts
    r#"
CREATE TABLE posts (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    board_id          INTEGER NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
    parent_id         INTEGER REFERENCES posts(id),   -- NULL for thread roots
    author_name       TEXT NOT NULL,
    author_player_id  INTEGER,
    author_object_id  INTEGER,
    subject           TEXT NOT NULL,
    body              TEXT NOT NULL,
    created_at        TEXT NOT NULL,
    pinned            INTEGER NOT NULL DEFAULT 0,
    CHECK (author_player_id IS NULL OR author_object_id IS NULL)
);

CREATE INDEX idx_posts_board_id ON posts(board_id);
CREATE INDEX idx_posts_parent_id ON posts(parent_id);
CREATE INDEX idx_posts_created_at ON posts(created_at);
"#,
    // v3: read marks and subscriptions
    r#"
CREATE TABLE post_readers (
    post_id     INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    player_id   INTEGER NOT NULL,
    read_at     TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (post_id, player_id)
);

CREATE INDEX idx_post_readers_player_id ON post_readers(player_id);

CREATE TABLE board_subscriptions (
    board_id    INTEGER NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
    player_id   INTEGER NOT NULL,
    PRIMARY KEY (board_id, player_id)
);

CREATE INDEX idx_board_subscriptions_player_id ON board_subscriptions(player_id);
"#,
];
