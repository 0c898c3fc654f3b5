//! Ranked, type-filtered, cursor-paginated post listings.
//!
//! Three sorts share one pagination contract: the cursor records the exact
//! sort key of the boundary row (ranking value, created_at, id) and page
//! boundaries are always evaluated against the cursor's *recorded* ranking
//! value. Votes and comments keep accruing between requests; the recorded
//! value keeps the boundary comparison deterministic anyway, so chained
//! pages never repeat or skip a row.

use crate::board::posts::PostType;
use crate::core::broker::DbBroker;
use crate::core::config;
use crate::core::cursor::{self, PostCursor};
use crate::core::error::AgoraError;
use crate::core::ranking;
use crate::core::time;
use clap::ValueEnum;
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, types::ToSql};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FeedSort {
    Top,
    New,
    Discussed,
}

#[derive(Debug, Clone)]
pub struct FeedQuery {
    pub sort: FeedSort,
    pub limit: u32,
    pub type_filter: Option<PostType>,
    pub after: Option<String>,
    pub before: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RankedPost {
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    pub body: Option<String>,
    pub post_type: PostType,
    pub author_agent_id: String,
    pub author_name: Option<String>,
    pub score: i64,
    pub created_at: String,
    pub comment_count: i64,
    /// Decayed score for "top", comment count for "discussed", absent for
    /// "new" (creation time is the ranking value there).
    pub sort_value: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FeedPage {
    pub posts: Vec<RankedPost>,
    pub next_cursor: Option<String>,
    pub prev_cursor: Option<String>,
}

fn encode_feed_cursor(post: &RankedPost) -> String {
    cursor::encode_post_cursor(&PostCursor {
        created_at: post.created_at.clone(),
        id: post.id.clone(),
        score: Some(post.score),
        comment_count: Some(post.comment_count),
        sort_value: post.sort_value,
    })
}

fn page_cursors(posts: &[RankedPost], limit: u32) -> (Option<String>, Option<String>) {
    let next = if posts.len() == limit as usize {
        posts.last().map(encode_feed_cursor)
    } else {
        None
    };
    let prev = posts.first().map(encode_feed_cursor);
    (next, prev)
}

/// The boundary ranking value a cursor carries for a ranked sort. `None`
/// means the cursor has nothing usable for this mode (e.g. a "new" cursor
/// replayed against "top"); the caller then ignores it and serves the first
/// page.
fn cursor_sort_value(sort: FeedSort, c: &PostCursor, now_ms: i64) -> Option<f64> {
    match sort {
        FeedSort::Discussed => c
            .sort_value
            .or_else(|| c.comment_count.map(|n| n as f64)),
        FeedSort::Top => c.sort_value.or_else(|| {
            // Older cursors carried raw score + comment count instead of the
            // computed value; reconstitute one at current wall clock.
            let score = c.score?;
            let comment_count = c.comment_count.unwrap_or(0);
            let created_ms = time::ms_from_iso(&c.created_at)?;
            Some(ranking::ranking_score(score, comment_count, created_ms, now_ms))
        }),
        FeedSort::New => None,
    }
}

pub fn list_feed(root: &Path, query: &FeedQuery) -> Result<FeedPage, AgoraError> {
    if query.after.is_some() && query.before.is_some() {
        return Err(AgoraError::ValidationError(
            "use either `after` or `before`, not both".into(),
        ));
    }
    if query.limit == 0 || query.limit > config::MAX_PAGE_SIZE {
        return Err(AgoraError::ValidationError(format!(
            "limit must be 1..={}",
            config::MAX_PAGE_SIZE
        )));
    }
    let after = query.after.as_deref().and_then(cursor::decode_post_cursor);
    let before = query.before.as_deref().and_then(cursor::decode_post_cursor);

    let broker = DbBroker::new(root);
    broker.with_conn("anonymous", "feed.list", |conn| match query.sort {
        FeedSort::New => list_new(conn, query, after.as_ref(), before.as_ref()),
        FeedSort::Top | FeedSort::Discussed => {
            list_ranked(conn, query, after.as_ref(), before.as_ref())
        }
    })
}

const SELECT_POST_WITH_AUTHOR: &str = "
    SELECT p.id, p.title, p.url, p.body, p.type, p.author_agent_id, a.name,
           p.score, p.created_at
    FROM posts p LEFT JOIN agents a ON p.author_agent_id = a.id
";

fn row_to_post(row: &rusqlite::Row) -> rusqlite::Result<(RankedPost, String)> {
    let ty: String = row.get(4)?;
    Ok((
        RankedPost {
            id: row.get(0)?,
            title: row.get(1)?,
            url: row.get(2)?,
            body: row.get(3)?,
            post_type: PostType::Link, // patched by the caller from `ty`
            author_agent_id: row.get(5)?,
            author_name: row.get(6)?,
            score: row.get(7)?,
            created_at: row.get(8)?,
            comment_count: 0,
            sort_value: None,
        },
        ty,
    ))
}

fn collect_posts(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Vec<RankedPost>, AgoraError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, row_to_post)?;
    let mut out = Vec::new();
    for r in rows {
        let (mut post, ty) = r?;
        post.post_type = PostType::from_db(&ty)?;
        out.push(post);
    }
    Ok(out)
}

/// Strict reverse-chronological order with `(created_at, id)` cursor
/// predicates pushed into SQL. Fixed-width RFC-3339 text makes the string
/// comparison chronological.
fn list_new(
    conn: &Connection,
    query: &FeedQuery,
    after: Option<&PostCursor>,
    before: Option<&PostCursor>,
) -> Result<FeedPage, AgoraError> {
    let mut sql = String::from(SELECT_POST_WITH_AUTHOR);
    sql.push_str(" WHERE 1=1");
    let mut params: Vec<&dyn ToSql> = Vec::new();

    let type_str = query.type_filter.map(|t| t.as_str().to_string());
    if let Some(t) = &type_str {
        sql.push_str(" AND p.type = ?");
        params.push(t);
    }

    let backward = before.is_some();
    if let Some(c) = after {
        sql.push_str(" AND (p.created_at < ? OR (p.created_at = ? AND p.id < ?))");
        params.push(&c.created_at);
        params.push(&c.created_at);
        params.push(&c.id);
    } else if let Some(c) = before {
        sql.push_str(" AND (p.created_at > ? OR (p.created_at = ? AND p.id > ?))");
        params.push(&c.created_at);
        params.push(&c.created_at);
        params.push(&c.id);
    }

    if backward {
        sql.push_str(" ORDER BY p.created_at ASC, p.id ASC");
    } else {
        sql.push_str(" ORDER BY p.created_at DESC, p.id DESC");
    }
    sql.push_str(&format!(" LIMIT {}", query.limit));

    let mut posts = collect_posts(conn, &sql, &params)?;
    if backward {
        // Fetched nearest-to-boundary first; un-reverse into display order.
        posts.reverse();
    }

    attach_comment_counts(conn, &mut posts)?;
    let (next_cursor, prev_cursor) = page_cursors(&posts, query.limit);
    Ok(FeedPage { posts, next_cursor, prev_cursor })
}

fn attach_comment_counts(conn: &Connection, posts: &mut [RankedPost]) -> Result<(), AgoraError> {
    if posts.is_empty() {
        return Ok(());
    }
    let placeholders = vec!["?"; posts.len()].join(", ");
    let sql = format!(
        "SELECT post_id, count(*) FROM comments WHERE post_id IN ({placeholders}) GROUP BY post_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn ToSql> = posts.iter().map(|p| &p.id as &dyn ToSql).collect();
    let rows = stmt.query_map(params.as_slice(), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    let mut counts: FxHashMap<String, i64> = FxHashMap::default();
    for r in rows {
        let (post_id, count) = r?;
        counts.insert(post_id, count);
    }
    for post in posts {
        post.comment_count = counts.get(&post.id).copied().unwrap_or(0);
    }
    Ok(())
}

/// Computes the "top" ranking value inside SQLite with the exact same f64
/// arithmetic as [`ranking::ranking_score`], so a value compared in SQL is
/// bit-identical to one recorded in a cursor.
fn register_rank_value(conn: &Connection) -> Result<(), AgoraError> {
    conn.create_scalar_function(
        "rank_value",
        4,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let score: i64 = ctx.get(0)?;
            let comment_count: i64 = ctx.get(1)?;
            let created_at: String = ctx.get(2)?;
            let now_ms: i64 = ctx.get(3)?;
            let created_ms = time::ms_from_iso(&created_at).unwrap_or(now_ms);
            Ok(ranking::ranking_score(score, comment_count, created_ms, now_ms))
        },
    )?;
    Ok(())
}

/// "top" and "discussed": ranking values are computed live per row at query
/// time (never pre-stored), with `now` snapshotted once so a page is
/// internally consistent. Ordering, the boundary predicate, and LIMIT all
/// run inside SQLite; only one page of rows is materialized.
fn list_ranked(
    conn: &Connection,
    query: &FeedQuery,
    after: Option<&PostCursor>,
    before: Option<&PostCursor>,
) -> Result<FeedPage, AgoraError> {
    register_rank_value(conn)?;
    let now_ms = time::now_ms();
    let type_str = query.type_filter.map(|t| t.as_str().to_string());
    let after_sv = after.and_then(|c| cursor_sort_value(query.sort, c, now_ms));
    let before_sv = before.and_then(|c| cursor_sort_value(query.sort, c, now_ms));

    let sv_expr = match query.sort {
        FeedSort::Top => "rank_value(p.score, COALESCE(cc.n, 0), p.created_at, ?)",
        _ => "CAST(COALESCE(cc.n, 0) AS REAL)",
    };
    let mut sql = format!(
        "SELECT id, title, url, body, type, author_agent_id, author_name,
                score, created_at, comment_count, sv
         FROM (
             SELECT p.id AS id, p.title AS title, p.url AS url, p.body AS body,
                    p.type AS type, p.author_agent_id AS author_agent_id,
                    a.name AS author_name, p.score AS score,
                    p.created_at AS created_at, COALESCE(cc.n, 0) AS comment_count,
                    {sv_expr} AS sv
             FROM posts p
             LEFT JOIN agents a ON p.author_agent_id = a.id
             LEFT JOIN (SELECT post_id, count(*) AS n FROM comments GROUP BY post_id) cc
               ON cc.post_id = p.id"
    );
    let mut params: Vec<&dyn ToSql> = Vec::new();
    if matches!(query.sort, FeedSort::Top) {
        params.push(&now_ms);
    }
    if let Some(t) = &type_str {
        sql.push_str(" WHERE p.type = ?");
        params.push(t);
    }
    sql.push_str(") WHERE 1=1");

    // Descending position in the ranked total order is (sv, created_at, id);
    // ULID ids are unique, so the order is strict. Boundaries compare
    // against the cursor's recorded value.
    let backward = before_sv.is_some();
    if let (Some(sv), Some(c)) = (&after_sv, after) {
        sql.push_str(
            " AND (sv < ? OR (sv = ? AND (created_at < ? OR (created_at = ? AND id < ?))))",
        );
        params.push(sv);
        params.push(sv);
        params.push(&c.created_at);
        params.push(&c.created_at);
        params.push(&c.id);
    } else if let (Some(sv), Some(c)) = (&before_sv, before) {
        sql.push_str(
            " AND (sv > ? OR (sv = ? AND (created_at > ? OR (created_at = ? AND id > ?))))",
        );
        params.push(sv);
        params.push(sv);
        params.push(&c.created_at);
        params.push(&c.created_at);
        params.push(&c.id);
    }

    if backward {
        sql.push_str(" ORDER BY sv ASC, created_at ASC, id ASC");
    } else {
        sql.push_str(" ORDER BY sv DESC, created_at DESC, id DESC");
    }
    sql.push_str(&format!(" LIMIT {}", query.limit));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params.as_slice(), |row| {
        let (mut post, ty) = row_to_post(row)?;
        post.comment_count = row.get(9)?;
        post.sort_value = Some(row.get(10)?);
        Ok((post, ty))
    })?;
    let mut posts = Vec::new();
    for r in rows {
        let (mut post, ty) = r?;
        post.post_type = PostType::from_db(&ty)?;
        posts.push(post);
    }
    if backward {
        // Fetched nearest-to-boundary first; un-reverse into display order.
        posts.reverse();
    }

    let (next_cursor, prev_cursor) = page_cursors(&posts, query.limit);
    Ok(FeedPage { posts, next_cursor, prev_cursor })
}
