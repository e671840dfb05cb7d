//! Session Management
//!
//! Token-based session state shared by every authenticated component.
//!
//! # Architecture
//!
//! ```text
//! SessionContext ──┬── TokenStore ──► CredentialStorage (file / memory)
//!                  │       │
//!                  │       └── watch::Sender<SessionState>  (save / clear)
//!                  │
//!                  └── Navigator (redirect to /login)
//!
//! SessionGuard ──► reads TokenStore on mount, follows SessionState changes
//! ApiClient    ──► attaches bearer token, invalidates session on 401
//! ```
//!
//! The context is passed explicitly to every component that needs it; the
//! store is the single owner of the credential and the only thing that
//! mutates it.

pub mod guard;
pub mod navigator;
pub mod storage;
pub mod store;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

pub use guard::{GuardState, SessionGuard};
pub use navigator::{LogNavigator, NavigationEvents, Navigator, LOGIN_ROUTE};
pub use storage::{CredentialStorage, FileStorage, MemoryStorage};
pub use store::TokenStore;

/// Profile of the logged-in user, as returned by the login exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub full_name: String,
    /// Any additional fields the backend sends
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    /// Create a profile with just a display name
    pub fn named(full_name: impl Into<String>) -> Self {
        Self {
            id: None,
            email: None,
            full_name: full_name.into(),
            extra: Map::new(),
        }
    }

    /// Human-readable name for display
    pub fn display_name(&self) -> &str {
        if !self.full_name.trim().is_empty() {
            &self.full_name
        } else {
            self.email.as_deref().unwrap_or("unknown user")
        }
    }
}

/// Authentication state derived from the token store
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    Authenticated(UserProfile),
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn user(&self) -> Option<&UserProfile> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            SessionState::Unauthenticated => None,
        }
    }
}

/// Session context injected into the HTTP client, guards and feeds
///
/// Clone is cheap - both halves are reference counted.
#[derive(Clone)]
pub struct SessionContext {
    store: Arc<TokenStore>,
    navigator: Arc<dyn Navigator>,
    /// Generation + 1 of the last rejection that redirected, 0 if none
    redirected: Arc<AtomicU64>,
}

impl SessionContext {
    pub fn new(store: Arc<TokenStore>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            store,
            navigator,
            redirected: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Token store shared by this session
    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    /// Send the user to the login entry point
    pub fn redirect_to_login(&self) {
        self.navigator.redirect(LOGIN_ROUTE);
    }

    /// Handle a 401 for a request sent at credential `generation`.
    ///
    /// The first rejection observed for a generation clears the store (if
    /// the request carried a token) and redirects; later ones, such as
    /// concurrent requests that carried the same token, are no-ops. A
    /// rejection that arrives after a newer login is ignored. Returns true if
    /// this call invalidated the session.
    pub fn reject(&self, generation: u64) -> bool {
        let cleared = match self.store.clear_if_generation(generation) {
            Ok(cleared) => cleared,
            Err(e) => {
                // In-memory state is already cleared; the session is gone either way
                warn!("Failed to persist session clear: {}", e);
                true
            }
        };

        if !cleared && self.store.is_authenticated() {
            return false;
        }

        let mark = generation + 1;
        if self.redirected.fetch_max(mark, Ordering::SeqCst) >= mark {
            return cleared;
        }

        warn!("Session rejected by server, redirecting to {}", LOGIN_ROUTE);
        self.redirect_to_login();
        cleared
    }
}
