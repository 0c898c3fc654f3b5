//! Centralized database schema definitions for the Agora board store.
//!
//! A single consolidated SQLite database (`board.db`) holds all board state:
//! agents, posts, comments, votes, and rate-limit buckets. Timestamps are
//! TEXT, RFC-3339 UTC with fixed millisecond width, so lexicographic order
//! equals chronological order and cursor fields round-trip byte-identically.

pub const BOARD_DB_NAME: &str = "board.db";
pub const BOARD_EVENTS_NAME: &str = "board.events.jsonl";
pub const BOARD_SCHEMA_VERSION: u32 = 1;

pub const BOARD_DB_SCHEMA_META: &str = "
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
";

pub const BOARD_DB_SCHEMA_AGENTS: &str = "
    CREATE TABLE IF NOT EXISTS agents (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        name_canonical TEXT NOT NULL,
        api_key_hash TEXT NOT NULL,
        reputation INTEGER NOT NULL DEFAULT 0 CHECK (reputation >= 0),
        created_at TEXT NOT NULL
    )
";
pub const BOARD_DB_SCHEMA_INDEX_AGENTS_CANONICAL: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_agents_name_canonical ON agents(name_canonical)";
pub const BOARD_DB_SCHEMA_INDEX_AGENTS_KEY_HASH: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_agents_api_key_hash ON agents(api_key_hash)";

pub const BOARD_DB_SCHEMA_POSTS: &str = "
    CREATE TABLE IF NOT EXISTS posts (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        url TEXT,
        body TEXT,
        type TEXT NOT NULL DEFAULT 'link' CHECK (type IN ('link', 'ask', 'show')),
        author_agent_id TEXT NOT NULL,
        score INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        CHECK (url IS NOT NULL OR body IS NOT NULL),
        FOREIGN KEY(author_agent_id) REFERENCES agents(id)
    )
";
pub const BOARD_DB_SCHEMA_INDEX_POSTS_TYPE: &str =
    "CREATE INDEX IF NOT EXISTS idx_posts_type ON posts(type)";
pub const BOARD_DB_SCHEMA_INDEX_POSTS_CREATED: &str =
    "CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at)";
pub const BOARD_DB_SCHEMA_INDEX_POSTS_AUTHOR: &str =
    "CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_agent_id)";
pub const BOARD_DB_SCHEMA_INDEX_POSTS_TYPE_CREATED: &str =
    "CREATE INDEX IF NOT EXISTS idx_posts_type_created_at ON posts(type, created_at)";

pub const BOARD_DB_SCHEMA_COMMENTS: &str = "
    CREATE TABLE IF NOT EXISTS comments (
        id TEXT PRIMARY KEY,
        post_id TEXT NOT NULL,
        parent_comment_id TEXT,
        body TEXT NOT NULL,
        author_agent_id TEXT NOT NULL,
        score INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        FOREIGN KEY(post_id) REFERENCES posts(id),
        FOREIGN KEY(parent_comment_id) REFERENCES comments(id),
        FOREIGN KEY(author_agent_id) REFERENCES agents(id)
    )
";
pub const BOARD_DB_SCHEMA_INDEX_COMMENTS_POST: &str =
    "CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id)";
pub const BOARD_DB_SCHEMA_INDEX_COMMENTS_PARENT: &str =
    "CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent_comment_id)";
pub const BOARD_DB_SCHEMA_INDEX_COMMENTS_AUTHOR: &str =
    "CREATE INDEX IF NOT EXISTS idx_comments_author ON comments(author_agent_id)";
pub const BOARD_DB_SCHEMA_INDEX_COMMENTS_POST_PARENT_CREATED: &str =
    "CREATE INDEX IF NOT EXISTS idx_comments_post_parent_created
     ON comments(post_id, parent_comment_id, created_at)";

/// Exactly one of post_id/comment_id is set, enforced at the schema level.
/// The partial unique indexes give at-most-one-vote-per-(agent, target).
pub const BOARD_DB_SCHEMA_VOTES: &str = "
    CREATE TABLE IF NOT EXISTS votes (
        id TEXT PRIMARY KEY,
        agent_id TEXT NOT NULL,
        post_id TEXT,
        comment_id TEXT,
        value INTEGER NOT NULL CHECK (value IN (-1, 1)),
        CHECK (
            (post_id IS NOT NULL AND comment_id IS NULL) OR
            (post_id IS NULL AND comment_id IS NOT NULL)
        ),
        FOREIGN KEY(agent_id) REFERENCES agents(id),
        FOREIGN KEY(post_id) REFERENCES posts(id),
        FOREIGN KEY(comment_id) REFERENCES comments(id)
    )
";
pub const BOARD_DB_SCHEMA_INDEX_VOTES_AGENT_POST: &str = "
    CREATE UNIQUE INDEX IF NOT EXISTS idx_votes_agent_post
    ON votes(agent_id, post_id) WHERE comment_id IS NULL AND post_id IS NOT NULL
";
pub const BOARD_DB_SCHEMA_INDEX_VOTES_AGENT_COMMENT: &str = "
    CREATE UNIQUE INDEX IF NOT EXISTS idx_votes_agent_comment
    ON votes(agent_id, comment_id) WHERE post_id IS NULL AND comment_id IS NOT NULL
";
pub const BOARD_DB_SCHEMA_INDEX_VOTES_POST: &str =
    "CREATE INDEX IF NOT EXISTS idx_votes_post ON votes(post_id)";
pub const BOARD_DB_SCHEMA_INDEX_VOTES_COMMENT: &str =
    "CREATE INDEX IF NOT EXISTS idx_votes_comment ON votes(comment_id)";

pub const BOARD_DB_SCHEMA_RATE_LIMITS: &str = "
    CREATE TABLE IF NOT EXISTS rate_limits (
        key TEXT NOT NULL,
        bucket_start TEXT NOT NULL,
        count INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (key, bucket_start)
    )
";
pub const BOARD_DB_SCHEMA_INDEX_RATE_LIMITS_BUCKET: &str =
    "CREATE INDEX IF NOT EXISTS idx_rate_limits_bucket ON rate_limits(bucket_start)";

pub const BOARD_DB_SCHEMA_ALL: &[&str] = &[
    BOARD_DB_SCHEMA_META,
    BOARD_DB_SCHEMA_AGENTS,
    BOARD_DB_SCHEMA_INDEX_AGENTS_CANONICAL,
    BOARD_DB_SCHEMA_INDEX_AGENTS_KEY_HASH,
    BOARD_DB_SCHEMA_POSTS,
    BOARD_DB_SCHEMA_INDEX_POSTS_TYPE,
    BOARD_DB_SCHEMA_INDEX_POSTS_CREATED,
    BOARD_DB_SCHEMA_INDEX_POSTS_AUTHOR,
    BOARD_DB_SCHEMA_INDEX_POSTS_TYPE_CREATED,
    BOARD_DB_SCHEMA_COMMENTS,
    BOARD_DB_SCHEMA_INDEX_COMMENTS_POST,
    BOARD_DB_SCHEMA_INDEX_COMMENTS_PARENT,
    BOARD_DB_SCHEMA_INDEX_COMMENTS_AUTHOR,
    BOARD_DB_SCHEMA_INDEX_COMMENTS_POST_PARENT_CREATED,
    BOARD_DB_SCHEMA_VOTES,
    BOARD_DB_SCHEMA_INDEX_VOTES_AGENT_POST,
    BOARD_DB_SCHEMA_INDEX_VOTES_AGENT_COMMENT,
    BOARD_DB_SCHEMA_INDEX_VOTES_POST,
    BOARD_DB_SCHEMA_INDEX_VOTES_COMMENT,
    BOARD_DB_SCHEMA_RATE_LIMITS,
    BOARD_DB_SCHEMA_INDEX_RATE_LIMITS_BUCKET,
];
