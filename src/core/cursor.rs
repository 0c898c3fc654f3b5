//! Opaque pagination cursors.
//!
//! A cursor captures the exact sort key of a boundary row so forward and
//! backward traversal are exact inverses even while ranking values drift
//! underneath. Wire format is base64url (no padding) over camelCase JSON,
//! safe for URL query parameters. Decoding is total: malformed input means
//! "no cursor applied", never an error.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

/// Feed boundary. `score`/`comment_count`/`sort_value` are carried so the
/// ranked sorts compare against the value the cursor recorded, not a
/// freshly recomputed one.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostCursor {
    pub created_at: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_value: Option<f64>,
}

/// Thread boundary: top-level comments paginate by `(created_at, id)` only.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommentCursor {
    pub created_at: String,
    pub id: String,
}

fn encode<T: Serialize>(cursor: &T) -> String {
    // Serialization of these shapes cannot fail; fall back to an empty
    // token (decodes to None) rather than propagating.
    let json = serde_json::to_vec(cursor).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

fn decode<T: DeserializeOwned>(token: &str) -> Option<T> {
    let bytes = URL_SAFE_NO_PAD.decode(token.as_bytes()).ok()?;
    serde_json::from_slice(&bytes).ok()
}

pub fn encode_post_cursor(cursor: &PostCursor) -> String {
    encode(cursor)
}

/// `None` for bad base64, bad JSON, or a shape whose `createdAt`/`id` are
/// missing or non-string (serde enforces the field types).
pub fn decode_post_cursor(token: &str) -> Option<PostCursor> {
    decode(token)
}

pub fn encode_comment_cursor(cursor: &CommentCursor) -> String {
    encode(cursor)
}

pub fn decode_comment_cursor(token: &str) -> Option<CommentCursor> {
    decode(token)
}
