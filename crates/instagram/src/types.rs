//! Provider-facing data types and Graph API wire shapes.

use serde::{Deserialize, Serialize};

use replyflow_core::types::Timestamp;

use crate::error::ProviderError;

// ---------------------------------------------------------------------------
// Engine-facing types
// ---------------------------------------------------------------------------

/// One comment on a monitored post. Ephemeral -- never persisted as its own
/// entity, only referenced inside audit events.
#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: String,
    pub text: String,
    pub username: String,
    /// Provider id of the commenter; the DM recipient.
    pub user_id: String,
    pub timestamp: Timestamp,
}

/// One page of comments plus the cursor for the next page, if any.
#[derive(Debug, Clone, Default)]
pub struct CommentPage {
    pub comments: Vec<Comment>,
    pub next_cursor: Option<String>,
}

/// Provider acknowledgement of an outbound DM.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub message_id: String,
}

// ---------------------------------------------------------------------------
// Graph API wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct GraphCommentsResponse {
    #[serde(default)]
    pub data: Vec<GraphComment>,
    pub paging: Option<GraphPaging>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphComment {
    pub id: String,
    #[serde(default)]
    pub text: String,
    pub username: Option<String>,
    pub user: Option<GraphUser>,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphUser {
    pub id: String,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphPaging {
    pub cursors: Option<GraphCursors>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphCursors {
    pub after: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphErrorResponse {
    pub error: Option<GraphErrorBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphErrorBody {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphSendResponse {
    pub message_id: Option<String>,
    pub id: Option<String>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// Graph timestamps come as ISO 8601 with a zone offset, with or without the
/// colon (`+00:00` / `+0000`). Accept both. Public because webhook ingestion
/// parses the same format.
pub fn parse_graph_timestamp(raw: &str) -> Result<Timestamp, ProviderError> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&chrono::Utc));
    }
    chrono::DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z")
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| ProviderError::InvalidResponse(format!("bad timestamp '{raw}': {e}")))
}

impl GraphComment {
    /// Map a wire comment into the engine-facing shape.
    ///
    /// The commenter id falls back to the username when the provider omits
    /// the `user` object (personal accounts); the username falls back the
    /// other way around.
    pub(crate) fn into_comment(self) -> Result<Comment, ProviderError> {
        let timestamp = parse_graph_timestamp(&self.timestamp)?;
        let user_node_id = self.user.as_ref().map(|u| u.id.clone());
        let user_node_name = self.user.as_ref().and_then(|u| u.username.clone());
        let username = self
            .username
            .or(user_node_name)
            .unwrap_or_default();
        let user_id = user_node_id.unwrap_or_else(|| username.clone());
        Ok(Comment {
            id: self.id,
            text: self.text,
            username,
            user_id,
            timestamp,
        })
    }
}

/// Assemble a [`CommentPage`] from a wire response: map each comment, drop
/// anything at or below the `since` watermark, and order oldest-first so the
/// engine processes chronologically.
pub(crate) fn page_from_graph(
    response: GraphCommentsResponse,
    since: Option<Timestamp>,
) -> Result<CommentPage, ProviderError> {
    let next_cursor = response
        .paging
        .and_then(|p| p.cursors)
        .and_then(|c| c.after);

    let mut comments = Vec::with_capacity(response.data.len());
    for wire in response.data {
        let comment = wire.into_comment()?;
        if let Some(watermark) = since {
            if comment.timestamp <= watermark {
                continue;
            }
        }
        comments.push(comment);
    }
    comments.sort_by_key(|c| c.timestamp);

    Ok(CommentPage {
        comments,
        next_cursor,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_fixture(entries: &[(&str, &str, &str)]) -> GraphCommentsResponse {
        let data = entries
            .iter()
            .map(|(id, text, ts)| {
                serde_json::json!({
                    "id": id,
                    "text": text,
                    "username": "alice",
                    "user": {"id": "u_alice", "username": "alice"},
                    "timestamp": ts,
                })
            })
            .collect::<Vec<_>>();
        serde_json::from_value(serde_json::json!({ "data": data })).unwrap()
    }

    #[test]
    fn parses_offset_timestamps_with_and_without_colon() {
        assert!(parse_graph_timestamp("2024-01-15T10:00:00+0000").is_ok());
        assert!(parse_graph_timestamp("2024-01-15T10:00:00+00:00").is_ok());
        assert!(parse_graph_timestamp("yesterday").is_err());
    }

    #[test]
    fn comments_are_ordered_oldest_first() {
        let response = graph_fixture(&[
            ("c2", "later", "2024-01-15T10:05:00+0000"),
            ("c1", "earlier", "2024-01-15T10:00:00+0000"),
        ]);
        let page = page_from_graph(response, None).unwrap();
        let ids: Vec<&str> = page.comments.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c1", "c2"]);
    }

    #[test]
    fn watermark_filters_old_and_equal_comments() {
        let response = graph_fixture(&[
            ("c1", "old", "2024-01-15T10:00:00+0000"),
            ("c2", "at watermark", "2024-01-15T10:05:00+0000"),
            ("c3", "new", "2024-01-15T10:06:00+0000"),
        ]);
        let watermark = parse_graph_timestamp("2024-01-15T10:05:00+0000").unwrap();
        let page = page_from_graph(response, Some(watermark)).unwrap();
        let ids: Vec<&str> = page.comments.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c3"]);
    }

    #[test]
    fn commenter_id_falls_back_to_username() {
        let wire: GraphComment = serde_json::from_value(serde_json::json!({
            "id": "c1",
            "text": "hello",
            "username": "bob",
            "timestamp": "2024-01-15T10:00:00+0000",
        }))
        .unwrap();
        let comment = wire.into_comment().unwrap();
        assert_eq!(comment.user_id, "bob");
        assert_eq!(comment.username, "bob");
    }

    #[test]
    fn deserializes_page_cursor() {
        let response: GraphCommentsResponse = serde_json::from_value(serde_json::json!({
            "data": [],
            "paging": {"cursors": {"after": "QVFIU"}},
        }))
        .unwrap();
        let page = page_from_graph(response, None).unwrap();
        assert_eq!(page.next_cursor.as_deref(), Some("QVFIU"));
    }
}
