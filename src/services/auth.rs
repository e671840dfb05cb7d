//! Authentication service: register, login, logout, profile lookup

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ClientError, StorageError};
use crate::http::ApiClient;
use crate::session::UserProfile;

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Registration payload
///
/// The key fields carry the client-side encryption metadata the backend
/// stores alongside the account.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_salt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_master_key: Option<String>,
}

impl RegisterRequest {
    pub fn new(email: &str, password: &str, full_name: &str) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
            full_name: full_name.to_string(),
            key_salt: None,
            encrypted_master_key: None,
        }
    }
}

/// Response of `POST /auth/login`
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub user: UserProfile,
}

pub struct AuthService<'a> {
    api: &'a ApiClient,
}

impl<'a> AuthService<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, request: &RegisterRequest) -> Result<UserProfile, ClientError> {
        let user: UserProfile = self.api.post("/auth/register", request).await?;
        info!("Registered {}", user.display_name());
        Ok(user)
    }

    /// Exchange credentials for a token and store the session
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response: LoginResponse = self.api.post("/auth/login", &request).await?;

        if response.access_token.is_empty() {
            warn!("Login response carried no access token, session not stored");
        } else {
            self.api
                .session()
                .store()
                .save(&response.access_token, &response.user)?;
        }

        Ok(response)
    }

    /// Drop the local session. No network call.
    pub fn logout(&self) -> Result<(), StorageError> {
        self.api.session().store().clear()
    }

    /// Fetch the profile from the server
    pub async fn current_user(&self) -> Result<UserProfile, ClientError> {
        self.api.get("/auth/me").await
    }

    pub fn is_authenticated(&self) -> bool {
        self.api.session().store().is_authenticated()
    }

    /// Profile saved with the current session
    pub fn stored_user(&self) -> Option<UserProfile> {
        self.api.session().store().current_user()
    }
}
