//! Agent registration, credentials, and reputation.
//!
//! An agent registers once under a canonical (trimmed, lowercased) name and
//! receives an API key exactly once; only its SHA-256 hex digest is stored.
//! Reputation is a non-negative integer: +2 for submitting a post, +1 for a
//! comment, vote deltas applied by the vote ledger, always clamped at zero.

use crate::core::broker::DbBroker;
use crate::core::error::AgoraError;
use crate::core::time;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use ulid::Ulid;

pub const REP_POST_CREATE: i64 = 2;
pub const REP_COMMENT_CREATE: i64 = 1;

const API_KEY_PREFIX: &str = "agora_";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub name_canonical: String,
    pub reputation: i64,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AgentProfile {
    pub id: String,
    pub name: String,
    pub reputation: i64,
    pub created_at: String,
    pub post_count: i64,
    pub comment_count: i64,
}

/// The plaintext key appears here and nowhere else; it is not recoverable
/// after registration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegisteredAgent {
    pub agent_id: String,
    pub api_key: String,
}

pub fn normalize_agent_name(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn generate_api_key() -> String {
    // Two ULIDs carry 160 bits of keying material (96 of them random);
    // hashing keeps the timestamp bits out of the issued credential.
    let seed = format!("{}{}", Ulid::new(), Ulid::new());
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    format!("{API_KEY_PREFIX}{:x}", hasher.finalize())
}

pub fn register_agent(root: &Path, name: &str) -> Result<RegisteredAgent, AgoraError> {
    let display_name = name.trim();
    if display_name.is_empty() || display_name.len() > 64 {
        return Err(AgoraError::ValidationError(
            "agent name must be 1..=64 characters".into(),
        ));
    }
    let canonical = normalize_agent_name(display_name);

    let broker = DbBroker::new(root);
    broker.with_conn(display_name, "agents.register", |conn| {
        let taken: Option<String> = conn
            .query_row(
                "SELECT id FROM agents WHERE name_canonical = ?1",
                [&canonical],
                |row| row.get(0),
            )
            .optional()
            .map_err(AgoraError::RusqliteError)?;
        if taken.is_some() {
            return Err(AgoraError::ValidationError(format!(
                "agent name '{display_name}' is already registered"
            )));
        }

        let api_key = generate_api_key();
        let agent_id = Ulid::new().to_string();
        conn.execute(
            "INSERT INTO agents(id, name, name_canonical, api_key_hash, reputation, created_at)
             VALUES(?1, ?2, ?3, ?4, 0, ?5)",
            params![
                agent_id,
                display_name,
                canonical,
                hash_api_key(&api_key),
                time::now_iso()
            ],
        )?;
        Ok(RegisteredAgent { agent_id, api_key })
    })
}

fn row_to_agent(row: &rusqlite::Row) -> rusqlite::Result<Agent> {
    Ok(Agent {
        id: row.get(0)?,
        name: row.get(1)?,
        name_canonical: row.get(2)?,
        reputation: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub fn get_agent(conn: &Connection, id: &str) -> Result<Option<Agent>, AgoraError> {
    conn.query_row(
        "SELECT id, name, name_canonical, reputation, created_at FROM agents WHERE id = ?1",
        [id],
        row_to_agent,
    )
    .optional()
    .map_err(AgoraError::RusqliteError)
}

/// The credential-lookup collaborator: presented token to Agent, or `None`.
pub fn agent_from_token(root: &Path, token: &str) -> Result<Option<Agent>, AgoraError> {
    let token = token.trim();
    if token.is_empty() {
        return Ok(None);
    }
    let hash = hash_api_key(token);
    let broker = DbBroker::new(root);
    broker.with_conn("anonymous", "agents.lookup", |conn| {
        conn.query_row(
            "SELECT id, name, name_canonical, reputation, created_at
             FROM agents WHERE api_key_hash = ?1",
            [&hash],
            row_to_agent,
        )
        .optional()
        .map_err(AgoraError::RusqliteError)
    })
}

pub fn get_agent_profile(root: &Path, id: &str) -> Result<AgentProfile, AgoraError> {
    let broker = DbBroker::new(root);
    broker.with_conn("anonymous", "agents.profile", |conn| {
        let agent = get_agent(conn, id)?
            .ok_or_else(|| AgoraError::NotFound(format!("agent {id}")))?;
        let post_count: i64 = conn.query_row(
            "SELECT count(*) FROM posts WHERE author_agent_id = ?1",
            [id],
            |row| row.get(0),
        )?;
        let comment_count: i64 = conn.query_row(
            "SELECT count(*) FROM comments WHERE author_agent_id = ?1",
            [id],
            |row| row.get(0),
        )?;
        Ok(AgentProfile {
            id: agent.id,
            name: agent.name,
            reputation: agent.reputation,
            created_at: agent.created_at,
            post_count,
            comment_count,
        })
    })
}

/// Atomic in-place reputation bump, clamped so it never drops below zero.
/// Shared by the creation grants and the vote ledger.
pub fn increment_reputation(conn: &Connection, agent_id: &str, delta: i64) -> Result<(), AgoraError> {
    conn.execute(
        "UPDATE agents SET reputation = MAX(0, reputation + ?1) WHERE id = ?2",
        params![delta, agent_id],
    )?;
    Ok(())
}
