//! UI-agnostic conversation state types
//!
//! These are the records the session store persists and the front end renders.
//! They don't depend on any specific UI framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Title shown for a session before its first exchange
pub const DEFAULT_TITLE: &str = "New chat";

/// Maximum number of characters of the first query used as a title
pub const TITLE_MAX_CHARS: usize = 40;

/// A chat message in a conversation thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.into(),
        }
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One independent conversation thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Supplementary results from the most recent successful exchange
    #[serde(default)]
    pub candidates: Vec<Value>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// A fresh, empty session with a new id
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            candidates: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Partial update for a session. Fields left as `None` are not touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    pub title: Option<String>,
    pub messages: Option<Vec<ChatMessage>>,
    pub candidates: Option<Vec<Value>>,
}

impl SessionPatch {
    /// Patch that appends one message to the current history
    pub fn append_message(session: &Session, message: ChatMessage) -> Self {
        let mut messages = session.messages.clone();
        messages.push(message);
        Self {
            messages: Some(messages),
            ..Self::default()
        }
    }

    pub(crate) fn apply(self, session: &mut Session) {
        if let Some(title) = self.title {
            session.title = title;
        }
        if let Some(messages) = self.messages {
            session.messages = messages;
        }
        if let Some(candidates) = self.candidates {
            session.candidates = candidates;
        }
    }
}

/// Derive a session title from the first query of a conversation
pub fn title_from_query(query: &str) -> String {
    let query = query.trim();
    if query.chars().count() > TITLE_MAX_CHARS {
        let head: String = query.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}…", head)
    } else {
        query.to_string()
    }
}

/// Display view of a candidate object returned by the answer service.
///
/// Candidates are persisted as opaque JSON; this only picks out the fields
/// worth showing and ignores everything else.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSummary {
    pub name: String,
    pub skills: Vec<String>,
    pub experience_years: Option<u64>,
    pub availability: Option<String>,
    pub match_score: Option<f64>,
}

impl CandidateSummary {
    pub fn from_value(value: &Value) -> Option<Self> {
        let name = value.get("name")?.as_str()?.trim();
        if name.is_empty() {
            return None;
        }

        let skills = value
            .get("skills")
            .and_then(Value::as_array)
            .map(|skills| {
                skills
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            name: name.to_string(),
            skills,
            experience_years: value.get("experience_years").and_then(Value::as_u64),
            availability: value
                .get("availability")
                .and_then(Value::as_str)
                .map(str::to_string),
            match_score: value.get("match_score").and_then(Value::as_f64),
        })
    }
}
