//! The vote ledger: at most one vote per (agent, target), delta-applied
//! scores, reputation propagation to content authors.
//!
//! Everything runs inside one IMMEDIATE transaction. SQLite's writer lock in
//! the shared database file is the serialization primitive: concurrent votes
//! on the same target (or by the same agent) serialize there, across
//! processes, not just in this one. A writer that cannot acquire the lock
//! within the busy timeout surfaces as `TransactionConflict` for the caller
//! to retry; the ledger never retries on its own.

use crate::board::agents;
use crate::core::broker::DbBroker;
use crate::core::error::AgoraError;
use clap::ValueEnum;
use rusqlite::{OptionalExtension, TransactionBehavior, params};
use serde::{Deserialize, Serialize};
use std::path::Path;
use ulid::Ulid;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Post,
    Comment,
}

impl TargetType {
    fn table(&self) -> &'static str {
        match self {
            TargetType::Post => "posts",
            TargetType::Comment => "comments",
        }
    }

    fn vote_column(&self) -> &'static str {
        match self {
            TargetType::Post => "post_id",
            TargetType::Comment => "comment_id",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VoteOutcome {
    pub target_type: TargetType,
    pub target_id: String,
    pub value: i64,
    /// 0 when the same value was re-cast (a no-op).
    pub delta: i64,
}

pub fn cast_vote(
    root: &Path,
    agent_id: &str,
    target_type: TargetType,
    target_id: &str,
    value: i64,
) -> Result<VoteOutcome, AgoraError> {
    if value != 1 && value != -1 {
        return Err(AgoraError::ValidationError("vote value must be -1 or +1".into()));
    }

    let broker = DbBroker::new(root);
    broker.with_conn(agent_id, "votes.cast", |conn| {
        if agents::get_agent(conn, agent_id)?.is_none() {
            return Err(AgoraError::NotFound(format!("agent {agent_id}")));
        }

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| AgoraError::from_sql(e, "votes.cast begin"))?;

        // Resolve the target's author inside the transaction; a vanished
        // target is NotFound, not a constraint blowup later.
        let author_agent_id: String = tx
            .query_row(
                &format!(
                    "SELECT author_agent_id FROM {} WHERE id = ?1",
                    target_type.table()
                ),
                [target_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(AgoraError::RusqliteError)?
            .ok_or_else(|| {
                let kind = match target_type {
                    TargetType::Post => "post",
                    TargetType::Comment => "comment",
                };
                AgoraError::NotFound(format!("{kind} {target_id}"))
            })?;

        let existing: Option<(String, i64, Option<String>, Option<String>)> = tx
            .query_row(
                &format!(
                    "SELECT id, value, post_id, comment_id FROM votes
                     WHERE agent_id = ?1 AND {} = ?2",
                    target_type.vote_column()
                ),
                params![agent_id, target_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()
            .map_err(AgoraError::RusqliteError)?;

        if let Some((vote_id, _, post_id, comment_id)) = &existing {
            // The ledger is the sole writer; a row with both or neither
            // target set means the store is corrupt, not retryable.
            if post_id.is_some() == comment_id.is_some() {
                return Err(AgoraError::DataIntegrityError(format!(
                    "vote {vote_id} does not reference exactly one target"
                )));
            }
        }

        let previous = existing.as_ref().map(|(_, v, _, _)| *v).unwrap_or(0);
        let delta = value - previous;

        match &existing {
            Some((vote_id, _, _, _)) => {
                tx.execute(
                    "UPDATE votes SET value = ?1 WHERE id = ?2",
                    params![value, vote_id],
                )?;
            }
            None => {
                let (post_id, comment_id) = match target_type {
                    TargetType::Post => (Some(target_id), None),
                    TargetType::Comment => (None, Some(target_id)),
                };
                tx.execute(
                    "INSERT INTO votes(id, agent_id, post_id, comment_id, value)
                     VALUES(?1, ?2, ?3, ?4, ?5)",
                    params![Ulid::new().to_string(), agent_id, post_id, comment_id, value],
                )?;
            }
        }

        if delta != 0 {
            // In-database increments: concurrent votes by other agents on
            // this target can never lose an update to a stale read.
            tx.execute(
                &format!(
                    "UPDATE {} SET score = score + ?1 WHERE id = ?2",
                    target_type.table()
                ),
                params![delta, target_id],
            )?;
            agents::increment_reputation(&tx, &author_agent_id, delta)?;
        }

        tx.commit()
            .map_err(|e| AgoraError::from_sql(e, "votes.cast commit"))?;

        Ok(VoteOutcome {
            target_type,
            target_id: target_id.to_string(),
            value,
            delta,
        })
    })
}
