//! Thread views: cursor pagination over top-level comments plus a recursive
//! descendant fetch.
//!
//! Pagination is anchored at the top level only. Paginating the flattened
//! tree by creation time would split replies from their parents across
//! pages; instead a page always shows complete sub-threads for whichever
//! roots it includes. Descendants are fetched with a single recursive
//! closure query, so query count is independent of thread depth.

use crate::board::comments::CommentWithAuthor;
use crate::board::posts::{self, PostWithAuthor};
use crate::core::broker::DbBroker;
use crate::core::config;
use crate::core::cursor::{self, CommentCursor};
use crate::core::error::AgoraError;
use rusqlite::{Connection, types::ToSql};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ThreadPage {
    pub post: PostWithAuthor,
    /// The paginated roots followed by every descendant of those roots,
    /// flat, ordered `(created_at, id)` ascending. `children_of` regroups
    /// them for rendering.
    pub comments: Vec<CommentWithAuthor>,
    pub next_cursor: Option<String>,
    pub prev_cursor: Option<String>,
}

const SELECT_COMMENT_WITH_AUTHOR: &str = "
    SELECT c.id, c.post_id, c.parent_comment_id, c.body, c.author_agent_id,
           a.name, c.score, c.created_at
    FROM comments c LEFT JOIN agents a ON c.author_agent_id = a.id
";

fn row_to_comment(row: &rusqlite::Row) -> rusqlite::Result<CommentWithAuthor> {
    Ok(CommentWithAuthor {
        id: row.get(0)?,
        post_id: row.get(1)?,
        parent_comment_id: row.get(2)?,
        body: row.get(3)?,
        author_agent_id: row.get(4)?,
        author_name: row.get(5)?,
        score: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Top-level comments (`parent IS NULL`) for one post, `(created_at, id)`
/// ascending, with the same exact-boundary cursor comparisons as the "new"
/// feed — just oldest-first instead of newest-first.
fn list_roots(
    conn: &Connection,
    post_id: &str,
    limit: u32,
    after: Option<&CommentCursor>,
    before: Option<&CommentCursor>,
) -> Result<Vec<CommentWithAuthor>, AgoraError> {
    let mut sql = String::from(SELECT_COMMENT_WITH_AUTHOR);
    sql.push_str(" WHERE c.post_id = ? AND c.parent_comment_id IS NULL");
    let mut params: Vec<&dyn ToSql> = vec![&post_id as &dyn ToSql];

    let backward = before.is_some();
    if let Some(c) = after {
        sql.push_str(" AND (c.created_at > ? OR (c.created_at = ? AND c.id > ?))");
        params.push(&c.created_at);
        params.push(&c.created_at);
        params.push(&c.id);
    } else if let Some(c) = before {
        sql.push_str(" AND (c.created_at < ? OR (c.created_at = ? AND c.id < ?))");
        params.push(&c.created_at);
        params.push(&c.created_at);
        params.push(&c.id);
    }

    if backward {
        sql.push_str(" ORDER BY c.created_at DESC, c.id DESC");
    } else {
        sql.push_str(" ORDER BY c.created_at ASC, c.id ASC");
    }
    sql.push_str(&format!(" LIMIT {limit}"));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params.as_slice(), row_to_comment)?;
    let mut roots = Vec::new();
    for r in rows {
        roots.push(r?);
    }
    if backward {
        roots.reverse();
    }
    Ok(roots)
}

/// Transitive closure of replies under `root_ids`, scoped to the post, in
/// one `WITH RECURSIVE` pass. Includes the roots themselves.
pub fn descendants_of(
    conn: &Connection,
    post_id: &str,
    root_ids: &[String],
) -> Result<Vec<CommentWithAuthor>, AgoraError> {
    if root_ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; root_ids.len()].join(", ");
    let sql = format!(
        "WITH RECURSIVE comment_tree AS (
             SELECT c.id, c.post_id, c.parent_comment_id, c.body,
                    c.author_agent_id, c.score, c.created_at
             FROM comments c
             WHERE c.post_id = ?1 AND c.id IN ({placeholders})
             UNION ALL
             SELECT c.id, c.post_id, c.parent_comment_id, c.body,
                    c.author_agent_id, c.score, c.created_at
             FROM comments c
             INNER JOIN comment_tree ct ON c.parent_comment_id = ct.id
             WHERE c.post_id = ?1
         )
         SELECT ct.id, ct.post_id, ct.parent_comment_id, ct.body,
                ct.author_agent_id, a.name, ct.score, ct.created_at
         FROM comment_tree ct
         LEFT JOIN agents a ON ct.author_agent_id = a.id
         ORDER BY ct.created_at ASC, ct.id ASC"
    );

    let mut params: Vec<&dyn ToSql> = vec![&post_id as &dyn ToSql];
    for id in root_ids {
        params.push(id);
    }
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params.as_slice(), row_to_comment)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn list_thread(
    root: &Path,
    post_id: &str,
    limit: u32,
    after: Option<&str>,
    before: Option<&str>,
) -> Result<ThreadPage, AgoraError> {
    if after.is_some() && before.is_some() {
        return Err(AgoraError::ValidationError(
            "use either `after` or `before`, not both".into(),
        ));
    }
    if limit == 0 || limit > config::MAX_PAGE_SIZE {
        return Err(AgoraError::ValidationError(format!(
            "limit must be 1..={}",
            config::MAX_PAGE_SIZE
        )));
    }
    let after = after.and_then(cursor::decode_comment_cursor);
    let before = before.and_then(cursor::decode_comment_cursor);

    let broker = DbBroker::new(root);
    broker.with_conn("anonymous", "thread.list", |conn| {
        let post = posts::get_post_with_author(conn, post_id)?
            .ok_or_else(|| AgoraError::NotFound(format!("post {post_id}")))?;

        let roots = list_roots(conn, post_id, limit, after.as_ref(), before.as_ref())?;

        let next_cursor = if roots.len() == limit as usize {
            roots.last().map(|c| {
                cursor::encode_comment_cursor(&CommentCursor {
                    created_at: c.created_at.clone(),
                    id: c.id.clone(),
                })
            })
        } else {
            None
        };
        let prev_cursor = roots.first().map(|c| {
            cursor::encode_comment_cursor(&CommentCursor {
                created_at: c.created_at.clone(),
                id: c.id.clone(),
            })
        });

        let root_ids: Vec<String> = roots.iter().map(|c| c.id.clone()).collect();
        let comments = descendants_of(conn, post_id, &root_ids)?;

        Ok(ThreadPage { post, comments, next_cursor, prev_cursor })
    })
}

/// Groups a flat thread page by parent id; the tree is rebuilt by filtering
/// children per level. `None` keys are the page's roots.
pub fn children_of(comments: &[CommentWithAuthor]) -> FxHashMap<Option<String>, Vec<&CommentWithAuthor>> {
    let mut by_parent: FxHashMap<Option<String>, Vec<&CommentWithAuthor>> = FxHashMap::default();
    for comment in comments {
        by_parent
            .entry(comment.parent_comment_id.clone())
            .or_default()
            .push(comment);
    }
    by_parent
}
