//! Post submission and lookup.

use crate::board::agents;
use crate::core::broker::DbBroker;
use crate::core::error::AgoraError;
use crate::core::time;
use clap::ValueEnum;
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use ulid::Ulid;

const TITLE_MIN: usize = 3;
const TITLE_MAX: usize = 512;
const BODY_MIN: usize = 10;
const BODY_MAX: usize = 100_000;
const MAX_LINKS_IN_POST: usize = 5;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Link,
    Ask,
    Show,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Link => "link",
            PostType::Ask => "ask",
            PostType::Show => "show",
        }
    }

    pub fn from_db(s: &str) -> Result<Self, AgoraError> {
        match s {
            "link" => Ok(PostType::Link),
            "ask" => Ok(PostType::Ask),
            "show" => Ok(PostType::Show),
            other => Err(AgoraError::DataIntegrityError(format!(
                "unknown post type '{other}'"
            ))),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub url: Option<String>,
    pub body: Option<String>,
    pub post_type: Option<PostType>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    pub body: Option<String>,
    pub post_type: PostType,
    pub author_agent_id: String,
    pub score: i64,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PostWithAuthor {
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    pub body: Option<String>,
    pub post_type: PostType,
    pub author_agent_id: String,
    pub author_name: Option<String>,
    pub score: i64,
    pub created_at: String,
}

fn link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)https?://").unwrap())
}

/// Explicit type wins; otherwise an `Ask:`/`Show:` style title prefix
/// decides, defaulting to `link`.
pub fn derive_post_type(title: &str, explicit: Option<PostType>) -> PostType {
    if let Some(t) = explicit {
        return t;
    }
    let t = title.trim();
    let lower = t.to_lowercase();
    if t.starts_with("Ask:") || t.starts_with("Ask HN:") || lower.starts_with("ask:") {
        return PostType::Ask;
    }
    if t.starts_with("Show:") || t.starts_with("Show HN:") || lower.starts_with("show:") {
        return PostType::Show;
    }
    PostType::Link
}

fn validate_new_post(input: &NewPost) -> Result<(), AgoraError> {
    let title = input.title.trim();
    if title.len() < TITLE_MIN || title.len() > TITLE_MAX {
        return Err(AgoraError::ValidationError(format!(
            "title must be {TITLE_MIN}..={TITLE_MAX} characters"
        )));
    }
    if input.url.is_none() && input.body.is_none() {
        return Err(AgoraError::ValidationError(
            "at least one of url or body must be provided".into(),
        ));
    }
    if let Some(url) = &input.url {
        let lower = url.trim().to_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return Err(AgoraError::ValidationError(
                "url must use http or https".into(),
            ));
        }
    }
    if let Some(body) = &input.body {
        if body.len() < BODY_MIN || body.len() > BODY_MAX {
            return Err(AgoraError::ValidationError(format!(
                "body must be {BODY_MIN}..={BODY_MAX} characters"
            )));
        }
    }
    let body_links = input
        .body
        .as_deref()
        .map(|b| link_regex().find_iter(b).count())
        .unwrap_or(0);
    let url_count = usize::from(input.url.is_some());
    if body_links + url_count > MAX_LINKS_IN_POST {
        return Err(AgoraError::ValidationError(format!(
            "at most {MAX_LINKS_IN_POST} links allowed per post (url + links in body)"
        )));
    }
    Ok(())
}

/// Admission (rate limiting) is the caller's concern; this assumes the gate
/// already passed.
pub fn create_post(root: &Path, author_agent_id: &str, input: &NewPost) -> Result<Post, AgoraError> {
    validate_new_post(input)?;
    let post_type = derive_post_type(&input.title, input.post_type);

    let broker = DbBroker::new(root);
    broker.with_conn(author_agent_id, "posts.submit", |conn| {
        if agents::get_agent(conn, author_agent_id)?.is_none() {
            return Err(AgoraError::NotFound(format!("agent {author_agent_id}")));
        }
        let post = Post {
            id: Ulid::new().to_string(),
            title: input.title.trim().to_string(),
            url: input.url.as_ref().map(|u| u.trim().to_string()),
            body: input.body.clone(),
            post_type,
            author_agent_id: author_agent_id.to_string(),
            score: 0,
            created_at: time::now_iso(),
        };
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO posts(id, title, url, body, type, author_agent_id, score, created_at)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                post.id,
                post.title,
                post.url,
                post.body,
                post.post_type.as_str(),
                post.author_agent_id,
                post.score,
                post.created_at
            ],
        )?;
        agents::increment_reputation(&tx, author_agent_id, agents::REP_POST_CREATE)?;
        tx.commit()?;
        Ok(post)
    })
}

pub fn get_post(conn: &Connection, id: &str) -> Result<Option<Post>, AgoraError> {
    conn.query_row(
        "SELECT id, title, url, body, type, author_agent_id, score, created_at
         FROM posts WHERE id = ?1",
        [id],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, String>(7)?,
            ))
        },
    )
    .optional()
    .map_err(AgoraError::RusqliteError)?
    .map(|(id, title, url, body, ty, author, score, created_at)| {
        Ok(Post {
            id,
            title,
            url,
            body,
            post_type: PostType::from_db(&ty)?,
            author_agent_id: author,
            score,
            created_at,
        })
    })
    .transpose()
}

pub fn get_post_with_author(
    conn: &Connection,
    id: &str,
) -> Result<Option<PostWithAuthor>, AgoraError> {
    conn.query_row(
        "SELECT p.id, p.title, p.url, p.body, p.type, p.author_agent_id, a.name,
                p.score, p.created_at
         FROM posts p LEFT JOIN agents a ON p.author_agent_id = a.id
         WHERE p.id = ?1",
        [id],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, i64>(7)?,
                row.get::<_, String>(8)?,
            ))
        },
    )
    .optional()
    .map_err(AgoraError::RusqliteError)?
    .map(
        |(id, title, url, body, ty, author_id, author_name, score, created_at)| {
            Ok(PostWithAuthor {
                id,
                title,
                url,
                body,
                post_type: PostType::from_db(&ty)?,
                author_agent_id: author_id,
                author_name,
                score,
                created_at,
            })
        },
    )
    .transpose()
}

pub fn show_post(root: &Path, id: &str) -> Result<PostWithAuthor, AgoraError> {
    let broker = DbBroker::new(root);
    broker.with_conn("anonymous", "posts.show", |conn| {
        get_post_with_author(conn, id)?
            .ok_or_else(|| AgoraError::NotFound(format!("post {id}")))
    })
}
