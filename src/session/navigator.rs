//! Navigation side effects
//!
//! The dashboard performed a hard navigation to `/login` whenever a session
//! ended. Here that side effect is a trait so the front end decides what
//! "go to login" means (print a prompt, switch screens, exit).

use tokio::sync::broadcast;
use tracing::info;

/// Route of the login entry point
pub const LOGIN_ROUTE: &str = "/login";

/// Receives redirect requests from the session layer
pub trait Navigator: Send + Sync {
    fn redirect(&self, route: &str);
}

/// Navigator that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn redirect(&self, route: &str) {
        info!("Redirect requested: {}", route);
    }
}

/// Navigator that publishes redirects on a broadcast channel
#[derive(Debug, Clone)]
pub struct NavigationEvents {
    tx: broadcast::Sender<String>,
}

impl NavigationEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

impl Default for NavigationEvents {
    fn default() -> Self {
        Self::new(16)
    }
}

impl Navigator for NavigationEvents {
    fn redirect(&self, route: &str) {
        info!("Redirecting to {}", route);
        // No subscribers is fine: nobody is rendering
        let _ = self.tx.send(route.to_string());
    }
}
