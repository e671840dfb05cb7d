//! Session Guard
//!
//! Gates protected content on authentication state:
//!
//! ```text
//!            mount()
//! Loading ──────────┬──► Authenticated(profile)
//!                   └──► Unauthenticated ──► redirect /login (once per mount)
//! ```
//!
//! Nothing protected is rendered while `Loading`, and the profile embedded
//! in the stored credential is authoritative; mounting never touches the
//! network.

use tokio::sync::watch;
use tracing::debug;

use super::{SessionContext, SessionState, UserProfile};
use crate::error::StorageError;

/// Guard lifecycle states
#[derive(Debug, Clone, PartialEq)]
pub enum GuardState {
    /// Not yet mounted; render nothing
    Loading,
    /// Session present; protected content may render
    Authenticated(UserProfile),
    /// No usable session; a redirect to login has been issued
    Unauthenticated,
}

/// Per-view session guard
pub struct SessionGuard {
    session: SessionContext,
    state: GuardState,
    redirected: bool,
}

impl SessionGuard {
    pub fn new(session: SessionContext) -> Self {
        Self {
            session,
            state: GuardState::Loading,
            redirected: false,
        }
    }

    /// Resolve the session from the token store.
    ///
    /// A missing token or an unreadable profile both fail closed.
    pub fn mount(&mut self) -> &GuardState {
        self.redirected = false;

        match self.session.store().session_state() {
            SessionState::Authenticated(user) => {
                debug!("Guard mounted for {}", user.display_name());
                self.state = GuardState::Authenticated(user);
            }
            SessionState::Unauthenticated => {
                debug!("Guard mounted without session");
                self.state = GuardState::Unauthenticated;
                self.redirect_once();
            }
        }

        &self.state
    }

    pub fn state(&self) -> &GuardState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, GuardState::Authenticated(_))
    }

    pub fn user(&self) -> Option<&UserProfile> {
        match &self.state {
            GuardState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    /// Run protected content; returns None unless authenticated
    pub fn render<T>(&self, content: impl FnOnce(&UserProfile) -> T) -> Option<T> {
        match &self.state {
            GuardState::Authenticated(user) => Some(content(user)),
            GuardState::Loading | GuardState::Unauthenticated => None,
        }
    }

    /// Clear the session, drop to Unauthenticated and redirect
    ///
    /// The local state and the redirect happen even if persisting the clear
    /// fails; the storage error is returned afterwards.
    pub fn logout(&mut self) -> Result<(), StorageError> {
        let cleared = self.session.store().clear();
        self.state = GuardState::Unauthenticated;
        self.redirect_once();
        cleared
    }

    /// Apply a session change published by the token store
    pub fn on_session_change(&mut self, session: &SessionState) {
        if self.state == GuardState::Loading {
            return;
        }

        match session {
            SessionState::Authenticated(user) => {
                self.state = GuardState::Authenticated(user.clone());
            }
            SessionState::Unauthenticated => {
                if self.state != GuardState::Unauthenticated {
                    debug!("Session ended while view mounted");
                }
                self.state = GuardState::Unauthenticated;
                self.redirect_once();
            }
        }
    }

    /// Wait for the next published session change and apply it.
    ///
    /// Returns None once the token store is gone.
    pub async fn follow(&mut self, changes: &mut watch::Receiver<SessionState>) -> Option<&GuardState> {
        changes.changed().await.ok()?;
        let session = changes.borrow_and_update().clone();
        self.on_session_change(&session);
        Some(&self.state)
    }

    fn redirect_once(&mut self) {
        if !self.redirected {
            self.redirected = true;
            self.session.redirect_to_login();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::storage::{Entries, MemoryStorage};
    use crate::session::store::{TokenStore, TOKEN_KEY, USER_KEY};
    use crate::session::Navigator;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingNavigator {
        redirects: AtomicUsize,
    }

    impl Navigator for CountingNavigator {
        fn redirect(&self, _route: &str) {
            self.redirects.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn context(store: TokenStore) -> (SessionContext, Arc<CountingNavigator>) {
        let nav = Arc::new(CountingNavigator::default());
        (SessionContext::new(Arc::new(store), nav.clone()), nav)
    }

    #[test]
    fn test_loading_renders_nothing() {
        let store = TokenStore::in_memory();
        store.save("tok1", &UserProfile::named("A B")).unwrap();
        let (session, nav) = context(store);

        let guard = SessionGuard::new(session);
        assert_eq!(guard.state(), &GuardState::Loading);
        assert!(guard.render(|_| "dashboard").is_none());
        assert_eq!(nav.redirects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unauthenticated_mount_redirects_once() {
        let (session, nav) = context(TokenStore::in_memory());
        let mut guard = SessionGuard::new(session.clone());

        assert_eq!(guard.mount(), &GuardState::Unauthenticated);
        assert!(guard.render(|_| "dashboard").is_none());

        // Further session noise during the same mount does not redirect again
        guard.on_session_change(&SessionState::Unauthenticated);
        session.store().clear().unwrap();
        guard.on_session_change(&session.store().session_state());
        assert_eq!(nav.redirects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_authenticated_mount_never_redirects() {
        let store = TokenStore::in_memory();
        store.save("tok1", &UserProfile::named("A B")).unwrap();
        let (session, nav) = context(store);

        let mut guard = SessionGuard::new(session);
        guard.mount();
        assert_eq!(guard.render(|u| u.full_name.clone()).as_deref(), Some("A B"));
        assert_eq!(nav.redirects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_corrupt_profile_fails_closed() {
        let mut entries = Entries::new();
        entries.insert(TOKEN_KEY.into(), "tok1".into());
        entries.insert(USER_KEY.into(), "not json".into());
        let store = TokenStore::open(Box::new(MemoryStorage::with_entries(entries))).unwrap();
        let (session, nav) = context(store);

        let mut guard = SessionGuard::new(session);
        assert_eq!(guard.mount(), &GuardState::Unauthenticated);
        assert_eq!(nav.redirects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_logout_clears_and_redirects() {
        let store = TokenStore::in_memory();
        store.save("tok1", &UserProfile::named("A B")).unwrap();
        let (session, nav) = context(store);

        let mut guard = SessionGuard::new(session.clone());
        guard.mount();
        guard.logout().unwrap();

        assert!(!session.store().is_authenticated());
        assert_eq!(guard.state(), &GuardState::Unauthenticated);
        assert_eq!(nav.redirects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remount_allows_new_redirect() {
        let (session, nav) = context(TokenStore::in_memory());
        let mut guard = SessionGuard::new(session);

        guard.mount();
        guard.mount();
        assert_eq!(nav.redirects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_follow_reacts_to_external_clear() {
        let store = TokenStore::in_memory();
        store.save("tok1", &UserProfile::named("A B")).unwrap();
        let (session, nav) = context(store);

        let mut changes = session.store().subscribe();
        let mut guard = SessionGuard::new(session.clone());
        guard.mount();
        assert!(guard.is_authenticated());

        // e.g. an HTTP 401 elsewhere
        let generation = session.store().generation();
        assert!(session.reject(generation));

        let state = guard.follow(&mut changes).await.cloned();
        assert_eq!(state, Some(GuardState::Unauthenticated));
        // reject() redirects globally; the guard issues its own once-per-mount redirect
        assert_eq!(nav.redirects.load(Ordering::SeqCst), 2);
    }
}
