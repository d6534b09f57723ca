//! The authoritative collection of chat sessions.
//!
//! Every mutation is mirrored to the key-value backend before it returns.
//! Backend failures are logged and swallowed: the in-memory collection stays
//! correct for the life of the process even when the durable copy can't be
//! written.

use crate::state::{Session, SessionPatch};
use crate::storage::KeyValueStore;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Key owning the serialized session collection
pub const STORAGE_KEY: &str = "hr_chats_v1";

pub struct SessionStore {
    sessions: Vec<Session>,
    backend: Box<dyn KeyValueStore>,
}

impl SessionStore {
    /// Load sessions from the backend, seeding one empty session when the
    /// stored data is missing, unreadable, or empty.
    pub fn initialize(backend: Box<dyn KeyValueStore>) -> Self {
        let sessions = load_sessions(backend.as_ref()).unwrap_or_else(|| vec![Session::new()]);
        let mut store = Self { sessions, backend };
        store.persist();
        store
    }

    /// Sessions in display order, most recent first. Never empty.
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn first(&self) -> &Session {
        &self.sessions[0]
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Prepend a new empty session and return its id
    pub fn create_session(&mut self) -> String {
        let session = Session::new();
        let id = session.id.clone();
        self.sessions.insert(0, session);
        debug!(session_id = %id, "created session");
        self.persist();
        id
    }

    /// Remove a session and return the id that should become active next.
    ///
    /// That is the session just before the deleted one, else the first
    /// remaining session, else a freshly created replacement.
    pub fn delete_session(&mut self, id: &str) -> String {
        let index = self.sessions.iter().position(|s| s.id == id);
        self.sessions.retain(|s| s.id != id);

        let next_id = if self.sessions.is_empty() {
            let replacement = Session::new();
            let replacement_id = replacement.id.clone();
            self.sessions.push(replacement);
            replacement_id
        } else {
            let neighbor = index.map_or(0, |i| i.saturating_sub(1));
            self.sessions
                .get(neighbor)
                .unwrap_or(&self.sessions[0])
                .id
                .clone()
        };

        debug!(session_id = %id, next = %next_id, "deleted session");
        self.persist();
        next_id
    }

    /// Merge the fields returned by `patch` into the matching session.
    ///
    /// `patch` sees the session as it is right now, never a stale copy.
    /// Returns false (and changes nothing) when no session has this id.
    pub fn update_session<F>(&mut self, id: &str, patch: F) -> bool
    where
        F: FnOnce(&Session) -> SessionPatch,
    {
        let Some(session) = self.sessions.iter_mut().find(|s| s.id == id) else {
            debug!(session_id = %id, "update for unknown session ignored");
            return false;
        };

        let update = patch(&*session);
        update.apply(session);
        self.persist();
        true
    }

    fn persist(&mut self) {
        let raw = match serde_json::to_string(&self.sessions) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "failed to serialize sessions");
                return;
            }
        };

        if let Err(e) = self.backend.set(STORAGE_KEY, &raw) {
            warn!(error = %e, "failed to persist sessions; keeping in-memory state");
        }
    }
}

fn load_sessions(backend: &dyn KeyValueStore) -> Option<Vec<Session>> {
    let raw = match backend.get(STORAGE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!(error = %e, "failed to read stored sessions; starting fresh");
            return None;
        }
    };

    let sessions: Vec<Session> = match serde_json::from_str(&raw) {
        Ok(sessions) => sessions,
        Err(e) => {
            warn!(error = %e, "stored sessions are corrupt; starting fresh");
            return None;
        }
    };

    let mut seen = HashSet::new();
    let sessions: Vec<Session> = sessions
        .into_iter()
        .filter(|s| seen.insert(s.id.clone()))
        .collect();

    if sessions.is_empty() {
        None
    } else {
        Some(sessions)
    }
}
