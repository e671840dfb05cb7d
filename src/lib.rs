//! Cloud Shield Session Client
//!
//! Authenticated live-session client for the Cloud Shield security
//! monitoring backend.
//!
//! # Features
//!
//! - **Token Store**: durable bearer token + user profile, change notifications
//! - **REST Client**: bearer auth on every call, global 401 invalidation
//! - **Session Guard**: gates protected views, redirects to login once per mount
//! - **Live Feed**: WebSocket monitoring stream as typed events or callbacks
//! - **Resource Services**: logs, alerts, ML, Suricata, monitoring, auth
//!
//! # Architecture
//!
//! ```text
//! View ──► SessionGuard ──► TokenStore ◄── ApiClient (401 → clear + /login)
//!   │                           │              ▲
//!   │                           └── token      │
//!   │                                 │        │
//!   ├──► LiveFeedClient ◄─────────────┘        │
//!   │      (ws /monitoring/ws?token=)          │
//!   └──► Services (logs, alerts, ml, ...) ─────┘
//! ```

pub mod config;
pub mod console;
pub mod error;
pub mod feed;
pub mod http;
pub mod services;
pub mod session;

pub use config::ClientConfig;
pub use console::ActivityBoard;
pub use error::{ClientError, HttpError, StorageError};
pub use feed::{FeedCallbacks, FeedError, FeedEvent, FeedHandle, FeedMessage, FeedSubscription, LiveEvent, LiveFeedClient};
pub use http::ApiClient;
pub use session::{
    GuardState, LogNavigator, Navigator, SessionContext, SessionGuard, SessionState, TokenStore,
    UserProfile, LOGIN_ROUTE,
};
