//! Request gateway: CSRF tokens, `{id, cls}` resolution and zip artifacts
//!
//! Every network endpoint goes through [`Gateway::resolve`] before it touches a
//! button. Tokens live in a [`SessionStore`] under the key
//! `{dom-class}-{id}-csrf`, one per (session, button).

use rand::Rng;
use rand::distributions::Alphanumeric;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::button::{DownloadButton, dom_id};
use crate::db::RecordStore;
use crate::error::{Error, Result};
use crate::pipeline::{ButtonClass, ButtonRegistry};
use crate::types::{ButtonId, SessionId};

pub mod artifacts;
pub mod session;

pub use artifacts::{Artifact, ArtifactStore, SuffixPool};
pub use session::{MemorySessionStore, SessionStore};

/// Token issuing and request authentication
#[derive(Clone)]
pub struct Gateway {
    sessions: Arc<dyn SessionStore>,
    registry: Arc<ButtonRegistry>,
    token_length: usize,
}

impl Gateway {
    /// Gateway over a session store and the registered button classes
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        registry: Arc<ButtonRegistry>,
        token_length: usize,
    ) -> Self {
        Self {
            sessions,
            registry,
            token_length,
        }
    }

    /// Mint a fresh token for the button and store it in the session
    ///
    /// Replaces any token issued earlier for the same button.
    pub fn issue_token(&self, session: &SessionId, button: &DownloadButton) -> String {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.token_length)
            .map(char::from)
            .collect();

        let key = token_key(button.class_name(), button.id());
        let replaced = self.sessions.insert(session, &key, token.clone());
        debug!(
            button_id = %button.id(),
            class = button.class_name(),
            replaced = replaced.is_some(),
            "csrf token issued"
        );
        token
    }

    /// Whether `supplied` is the latest token issued for the button in this session
    ///
    /// A session with no stored token never validates.
    pub fn validate(
        &self,
        session: &SessionId,
        id: ButtonId,
        cls: &str,
        supplied: Option<&str>,
    ) -> bool {
        let (Some(supplied), Some(stored)) =
            (supplied, self.sessions.get(session, &token_key(cls, id)))
        else {
            return false;
        };
        constant_time_eq(supplied.as_bytes(), stored.as_bytes())
    }

    /// [`validate`](Self::validate), as an error
    pub fn authenticate(
        &self,
        session: &SessionId,
        id: ButtonId,
        cls: &str,
        supplied: Option<&str>,
    ) -> Result<()> {
        if self.validate(session, id, cls, supplied) {
            return Ok(());
        }
        warn!(
            button_id = %id,
            class = cls,
            token_supplied = supplied.is_some(),
            "csrf token rejected"
        );
        Err(Error::Authentication(format!(
            "invalid or missing csrf_token for {cls}/{id}"
        )))
    }

    /// Forget the button's token; the next request must come from a fresh render
    pub fn revoke_token(&self, session: &SessionId, id: ButtonId, cls: &str) -> Option<String> {
        let revoked = self.sessions.remove(session, &token_key(cls, id));
        if revoked.is_some() {
            debug!(button_id = %id, class = cls, "csrf token revoked");
        }
        revoked
    }

    /// Authenticate a request and load the button it names
    ///
    /// The token is checked first, so an unauthenticated caller learns nothing
    /// about which buttons exist.
    pub async fn resolve(
        &self,
        store: &dyn RecordStore,
        session: &SessionId,
        id: ButtonId,
        cls: &str,
        supplied: Option<&str>,
    ) -> Result<(Arc<ButtonClass>, DownloadButton)> {
        self.authenticate(session, id, cls, supplied)?;

        let class = self.registry.get(cls)?;
        let button = store
            .query_by_id(id)
            .await?
            .filter(|button| button.class_name() == cls)
            .ok_or_else(|| Error::UnknownEntity {
                id,
                cls: cls.to_string(),
            })?;

        Ok((class, button))
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("registry", &self.registry)
            .field("token_length", &self.token_length)
            .finish()
    }
}

/// Session key holding a button's token
pub fn token_key(class_name: &str, id: ButtonId) -> String {
    dom_id(class_name, id, "csrf")
}

/// Constant-time byte comparison.
/// Always compares all bytes regardless of where the first mismatch occurs.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
