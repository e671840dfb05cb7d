//! Token Store
//!
//! Owns the bearer token and the user profile that came with it. Both are
//! persisted through a [`CredentialStorage`] backend and mirrored in memory;
//! every change is published on a `watch` channel so guards and views can
//! react without polling.

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::storage::{CredentialStorage, Entries, FileStorage, MemoryStorage};
use super::{SessionState, UserProfile};
use crate::config::ClientConfig;
use crate::error::StorageError;

/// Storage key for the bearer token
pub const TOKEN_KEY: &str = "access_token";

/// Storage key for the serialized user profile
pub const USER_KEY: &str = "user";

#[derive(Debug, Default)]
struct Credential {
    token: Option<String>,
    /// Raw JSON; parsed on read so corrupt data degrades to "no user"
    user: Option<String>,
    /// Bumped on every save, identifies which credential a request carried
    generation: u64,
}

impl Credential {
    fn from_entries(entries: &Entries) -> Self {
        Self {
            token: entries.get(TOKEN_KEY).filter(|t| !t.is_empty()).cloned(),
            user: entries.get(USER_KEY).cloned(),
            generation: 0,
        }
    }

    fn to_entries(&self) -> Entries {
        let mut entries = Entries::new();
        if let Some(token) = &self.token {
            entries.insert(TOKEN_KEY.to_string(), token.clone());
        }
        if let Some(user) = &self.user {
            entries.insert(USER_KEY.to_string(), user.clone());
        }
        entries
    }

    fn parse_user(&self) -> Option<UserProfile> {
        self.token.as_ref()?;
        let raw = self.user.as_ref()?;
        match serde_json::from_str(raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!("Stored user profile is corrupt, treating as absent: {}", e);
                None
            }
        }
    }

    fn state(&self) -> SessionState {
        match self.parse_user() {
            Some(user) => SessionState::Authenticated(user),
            None => SessionState::Unauthenticated,
        }
    }
}

/// Process-wide credential store
pub struct TokenStore {
    storage: Box<dyn CredentialStorage>,
    credential: RwLock<Credential>,
    state_tx: watch::Sender<SessionState>,
}

impl TokenStore {
    /// Open a store, loading any persisted credential
    pub fn open(storage: Box<dyn CredentialStorage>) -> Result<Self, StorageError> {
        let credential = Credential::from_entries(&storage.load()?);
        let (state_tx, _) = watch::channel(credential.state());

        if credential.token.is_some() {
            debug!("Restored persisted session");
        }

        Ok(Self {
            storage,
            credential: RwLock::new(credential),
            state_tx,
        })
    }

    /// Open the file-backed store configured for this client
    pub fn from_config(config: &ClientConfig) -> Result<Self, StorageError> {
        Self::open(Box::new(FileStorage::new(config.session_path.clone())))
    }

    /// Non-durable store
    pub fn in_memory() -> Self {
        let (state_tx, _) = watch::channel(SessionState::Unauthenticated);
        Self {
            storage: Box::new(MemoryStorage::new()),
            credential: RwLock::new(Credential::default()),
            state_tx,
        }
    }

    /// Persist a new credential. `is_authenticated()` is true once this returns Ok.
    ///
    /// An empty token is rejected; it would not survive a reload.
    pub fn save(&self, token: &str, user: &UserProfile) -> Result<(), StorageError> {
        if token.is_empty() {
            return Err(StorageError::EmptyToken);
        }
        let user_json = serde_json::to_string(user)?;

        let mut credential = self.credential.write();
        let next = Credential {
            token: Some(token.to_string()),
            user: Some(user_json),
            generation: credential.generation + 1,
        };
        self.storage.persist(&next.to_entries())?;
        *credential = next;

        // Published under the lock so a racing clear cannot be reordered
        self.state_tx
            .send_replace(SessionState::Authenticated(user.clone()));
        drop(credential);

        info!("Session saved for {}", user.display_name());
        Ok(())
    }

    /// Remove the credential. Idempotent.
    pub fn clear(&self) -> Result<(), StorageError> {
        let mut credential = self.credential.write();
        let had_credential = credential.token.is_some() || credential.user.is_some();
        self.clear_locked(&mut credential, had_credential)
    }

    /// Clear the credential only if it is still the one identified by
    /// `generation`. Returns true if this call removed it.
    pub fn clear_if_generation(&self, generation: u64) -> Result<bool, StorageError> {
        let mut credential = self.credential.write();
        if credential.token.is_none() || credential.generation != generation {
            return Ok(false);
        }
        self.clear_locked(&mut credential, true).map(|_| true)
    }

    fn clear_locked(&self, credential: &mut Credential, had_credential: bool) -> Result<(), StorageError> {
        credential.token = None;
        credential.user = None;

        self.state_tx.send_if_modified(|state| {
            if state.is_authenticated() {
                *state = SessionState::Unauthenticated;
                true
            } else {
                false
            }
        });

        if had_credential {
            info!("Session cleared");
            self.storage.persist(&Entries::new())?;
        }
        Ok(())
    }

    /// True iff a token is present
    pub fn is_authenticated(&self) -> bool {
        self.credential.read().token.is_some()
    }

    /// Last saved profile, or None if absent or unparsable
    pub fn current_user(&self) -> Option<UserProfile> {
        self.credential.read().parse_user()
    }

    /// Copy of the bearer token
    pub fn token(&self) -> Option<String> {
        self.credential.read().token.clone()
    }

    /// Token together with the generation it belongs to, read atomically
    pub fn token_with_generation(&self) -> (Option<String>, u64) {
        let credential = self.credential.read();
        (credential.token.clone(), credential.generation)
    }

    pub fn generation(&self) -> u64 {
        self.credential.read().generation
    }

    /// Current derived session state
    pub fn session_state(&self) -> SessionState {
        self.credential.read().state()
    }

    /// Subscribe to session changes (published on every save/clear)
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn user(name: &str) -> UserProfile {
        UserProfile {
            id: Some("u1".into()),
            email: Some("a@b.com".into()),
            full_name: name.into(),
            extra: Default::default(),
        }
    }

    #[test]
    fn test_save_then_read() {
        let store = TokenStore::in_memory();
        assert!(!store.is_authenticated());

        store.save("tok1", &user("A B")).unwrap();
        assert!(store.is_authenticated());
        assert_eq!(store.current_user(), Some(user("A B")));
        assert_eq!(store.token().as_deref(), Some("tok1"));
    }

    #[test]
    fn test_empty_token_is_rejected() {
        let store = TokenStore::in_memory();
        store.save("tok1", &user("A B")).unwrap();

        let result = store.save("", &user("C D"));
        assert!(matches!(result, Err(StorageError::EmptyToken)));
        assert_eq!(store.token().as_deref(), Some("tok1"));
        assert_eq!(store.current_user(), Some(user("A B")));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = TokenStore::in_memory();
        store.save("tok1", &user("A B")).unwrap();

        store.clear().unwrap();
        assert!(!store.is_authenticated());
        assert!(store.current_user().is_none());

        store.clear().unwrap();
        assert!(!store.is_authenticated());
        assert!(store.current_user().is_none());
        assert_eq!(store.session_state(), SessionState::Unauthenticated);
    }

    #[test]
    fn test_corrupt_profile_is_absent() {
        let mut entries = Entries::new();
        entries.insert(TOKEN_KEY.into(), "tok1".into());
        entries.insert(USER_KEY.into(), "{\"full_na".into());

        let store = TokenStore::open(Box::new(MemoryStorage::with_entries(entries))).unwrap();
        assert!(store.is_authenticated());
        assert!(store.current_user().is_none());
        assert_eq!(store.session_state(), SessionState::Unauthenticated);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");

        {
            let store = TokenStore::open(Box::new(FileStorage::new(path.clone()))).unwrap();
            store.save("tok1", &user("A B")).unwrap();
        }

        {
            let store = TokenStore::open(Box::new(FileStorage::new(path.clone()))).unwrap();
            assert_eq!(store.token().as_deref(), Some("tok1"));
            assert_eq!(store.current_user().map(|u| u.full_name), Some("A B".to_string()));
            store.clear().unwrap();
        }

        let store = TokenStore::open(Box::new(FileStorage::new(path))).unwrap();
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_clear_if_generation_only_once() {
        let store = TokenStore::in_memory();
        store.save("tok1", &user("A B")).unwrap();
        let generation = store.generation();

        assert!(store.clear_if_generation(generation).unwrap());
        assert!(!store.clear_if_generation(generation).unwrap());
    }

    #[test]
    fn test_stale_generation_does_not_clear_new_session() {
        let store = TokenStore::in_memory();
        store.save("tok1", &user("A B")).unwrap();
        let stale = store.generation();

        store.save("tok2", &user("A B")).unwrap();
        assert!(!store.clear_if_generation(stale).unwrap());
        assert_eq!(store.token().as_deref(), Some("tok2"));
    }

    #[tokio::test]
    async fn test_subscribers_see_save_and_clear() {
        let store = TokenStore::in_memory();
        let mut rx = store.subscribe();
        assert_eq!(*rx.borrow(), SessionState::Unauthenticated);

        store.save("tok1", &user("A B")).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), SessionState::Authenticated(user("A B")));

        store.clear().unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), SessionState::Unauthenticated);

        // Second clear changes nothing, so nothing is published
        store.clear().unwrap();
        assert!(!rx.has_changed().unwrap());
    }
}
