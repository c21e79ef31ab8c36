//! Session store: in-memory map of user identity to session.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use super::session::Session;

/// Shared handle to one user's session.
///
/// Holding the lock for the whole dispatch serializes events for the same
/// identity.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Keyed store of sessions, one per user identity.
///
/// Sessions are created lazily and live until the process exits.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Get the session for `identity`, creating it if absent.
    pub async fn get(&self, identity: &str) -> SessionHandle {
        {
            let sessions = self.sessions.read().await;
            if let Some(handle) = sessions.get(identity) {
                return Arc::clone(handle);
            }
        }

        let mut sessions = self.sessions.write().await;
        // Another task may have inserted between the two locks.
        let handle = sessions.entry(identity.to_string()).or_insert_with(|| {
            debug!(user_id = %identity, "Creating session");
            Arc::new(Mutex::new(Session::default()))
        });
        Arc::clone(handle)
    }

    /// Reset the transient fields of `identity`'s session, if it exists.
    pub async fn reset(&self, identity: &str) {
        let handle = self.sessions.read().await.get(identity).cloned();
        if let Some(handle) = handle {
            handle.lock().await.reset();
        }
    }

    /// Number of known sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
