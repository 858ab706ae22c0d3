//! Registry of live streaming sessions.
//!
//! Entries are read-only views: the registry can list sessions and report
//! their state, but it cannot cancel or otherwise drive a session.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use std::net::IpAddr;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use super::state::{SessionState, StateHandle};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Session already active: {0}")]
    DuplicateSession(String),
}

/// Registered session.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub id: String,
    pub state: StateHandle,
    pub created_at: OffsetDateTime,
    pub client_ip: Option<IpAddr>,
}

impl SessionEntry {
    pub fn new(id: impl Into<String>, state: StateHandle, client_ip: Option<IpAddr>) -> Self {
        Self {
            id: id.into(),
            state,
            created_at: OffsetDateTime::now_utc(),
            client_ip,
        }
    }
}

/// Point-in-time copy of an entry, for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub state: SessionState,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub client_ip: Option<IpAddr>,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, SessionEntry>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry. Fails if the id is already registered.
    pub fn insert(&self, entry: SessionEntry) -> Result<(), RegistryError> {
        match self.sessions.entry(entry.id.clone()) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateSession(entry.id)),
            Entry::Vacant(slot) => {
                debug!(session_id = %entry.id, "Session registered");
                slot.insert(entry);
                Ok(())
            }
        }
    }

    pub fn remove(&self, id: &str) -> Option<SessionEntry> {
        self.sessions.remove(id).map(|(_, entry)| entry)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn state_of(&self, id: &str) -> Option<SessionState> {
        self.sessions.get(id).map(|entry| entry.state.get())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// All sessions, oldest first.
    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        let mut sessions: Vec<SessionSnapshot> = self
            .sessions
            .iter()
            .map(|entry| SessionSnapshot {
                id: entry.id.clone(),
                state: entry.state.get(),
                created_at: entry.created_at,
                client_ip: entry.client_ip,
            })
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        sessions
    }
}
