//! Comment creation. Comments form a forest per post: a parent comment, if
//! given, must belong to the same post.

use crate::board::agents;
use crate::board::posts;
use crate::core::broker::DbBroker;
use crate::core::error::AgoraError;
use crate::core::time;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::path::Path;
use ulid::Ulid;

const BODY_MAX: usize = 100_000;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub parent_comment_id: Option<String>,
    pub body: String,
    pub author_agent_id: String,
    pub score: i64,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CommentWithAuthor {
    pub id: String,
    pub post_id: String,
    pub parent_comment_id: Option<String>,
    pub body: String,
    pub author_agent_id: String,
    pub author_name: Option<String>,
    pub score: i64,
    pub created_at: String,
}

pub fn create_comment(
    root: &Path,
    author_agent_id: &str,
    post_id: &str,
    parent_comment_id: Option<&str>,
    body: &str,
) -> Result<Comment, AgoraError> {
    let body = body.trim();
    if body.is_empty() || body.len() > BODY_MAX {
        return Err(AgoraError::ValidationError(format!(
            "comment body must be 1..={BODY_MAX} characters"
        )));
    }

    let broker = DbBroker::new(root);
    broker.with_conn(author_agent_id, "comments.add", |conn| {
        if agents::get_agent(conn, author_agent_id)?.is_none() {
            return Err(AgoraError::NotFound(format!("agent {author_agent_id}")));
        }
        if posts::get_post(conn, post_id)?.is_none() {
            return Err(AgoraError::NotFound(format!("post {post_id}")));
        }
        if let Some(parent_id) = parent_comment_id {
            let parent_post: Option<String> = conn
                .query_row(
                    "SELECT post_id FROM comments WHERE id = ?1",
                    [parent_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(AgoraError::RusqliteError)?;
            match parent_post {
                None => {
                    return Err(AgoraError::NotFound(format!("comment {parent_id}")));
                }
                Some(pp) if pp != post_id => {
                    return Err(AgoraError::ValidationError(
                        "parent comment belongs to a different post".into(),
                    ));
                }
                Some(_) => {}
            }
        }

        let comment = Comment {
            id: Ulid::new().to_string(),
            post_id: post_id.to_string(),
            parent_comment_id: parent_comment_id.map(|s| s.to_string()),
            body: body.to_string(),
            author_agent_id: author_agent_id.to_string(),
            score: 0,
            created_at: time::now_iso(),
        };
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO comments(id, post_id, parent_comment_id, body, author_agent_id, score, created_at)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                comment.id,
                comment.post_id,
                comment.parent_comment_id,
                comment.body,
                comment.author_agent_id,
                comment.score,
                comment.created_at
            ],
        )?;
        agents::increment_reputation(&tx, author_agent_id, agents::REP_COMMENT_CREATE)?;
        tx.commit()?;
        Ok(comment)
    })
}

pub fn get_comment(conn: &Connection, id: &str) -> Result<Option<Comment>, AgoraError> {
    conn.query_row(
        "SELECT id, post_id, parent_comment_id, body, author_agent_id, score, created_at
         FROM comments WHERE id = ?1",
        [id],
        |row| {
            Ok(Comment {
                id: row.get(0)?,
                post_id: row.get(1)?,
                parent_comment_id: row.get(2)?,
                body: row.get(3)?,
                author_agent_id: row.get(4)?,
                score: row.get(5)?,
                created_at: row.get(6)?,
            })
        },
    )
    .optional()
    .map_err(AgoraError::RusqliteError)
}
