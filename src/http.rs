//! Cloud Shield REST Client
//!
//! Authenticated JSON client for the backend API. Every request carries the
//! stored bearer token when one exists. A 401 from the server is handled
//! globally: the session is cleared and the navigator is sent to the login
//! route before the error is returned to the caller.

use reqwest::multipart::Form;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, HttpError};
use crate::session::SessionContext;

/// REST API client
///
/// Clone is cheap - reqwest clients share the underlying connection pool.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: SessionContext,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, session: SessionContext) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!("cloudshield-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            session,
        })
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue a request and decode the JSON response
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `path` - API path, e.g. `/alerts`
    /// * `body` - Optional JSON body
    /// * `query` - Query pairs, appended in order
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let mut request = self.client.request(method.clone(), self.url(path));
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        self.execute(method, path, request).await
    }

    /// POST a multipart form
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        form: Form,
    ) -> Result<T, ClientError> {
        let mut request = self.client.post(self.url(path));
        if !query.is_empty() {
            request = request.query(query);
        }
        let request = request.multipart(form);
        self.execute(Method::POST, path, request).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Attach the bearer token, send, and apply the response policy
    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let (token, generation) = self.session.store().token_with_generation();
        let request = match &token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        debug!("{} {} (authenticated={})", method, path, token.is_some());

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            warn!("{} {} rejected with 401", method, path);
            self.session.reject(generation);
            return Err(ClientError::AuthRejected);
        }

        let text = response.text().await?;

        if !status.is_success() {
            let detail = extract_detail(&text, status);
            debug!("{} {} failed: {} {}", method, path, status, detail);
            return Err(HttpError { status, detail }.into());
        }

        if text.trim().is_empty() {
            return Ok(serde_json::from_value(Value::Null)?);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// GET without query
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request(Method::GET, path, None, &[]).await
    }

    /// GET with query pairs
    pub async fn get_with<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        self.request(Method::GET, path, None, query).await
    }

    /// POST a JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, path, Some(&body), &[]).await
    }

    /// POST without a body
    pub async fn post_empty<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        self.request(Method::POST, path, None, query).await
    }

    /// PATCH a JSON body
    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let body = serde_json::to_value(body)?;
        self.request(Method::PATCH, path, Some(&body), &[]).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request(Method::DELETE, path, None, &[]).await
    }
}

/// Pull a human-readable message out of an error body.
///
/// The backend answers `{"detail": "..."}`; validation errors carry a list
/// under `detail`, which is rendered as compact JSON.
fn extract_detail(text: &str, status: StatusCode) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        match value.get("detail") {
            Some(Value::String(detail)) => return detail.clone(),
            Some(detail) => return detail.to_string(),
            None => {}
        }
    }

    let trimmed = text.trim();
    if trimmed.is_empty() {
        status.canonical_reason().unwrap_or("Error").to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_detail_string() {
        let detail = extract_detail(r#"{"detail":"Alert not found"}"#, StatusCode::NOT_FOUND);
        assert_eq!(detail, "Alert not found");
    }

    #[test]
    fn test_extract_detail_validation_list() {
        let body = r#"{"detail":[{"loc":["body","email"],"msg":"field required"}]}"#;
        let detail = extract_detail(body, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(detail.contains("field required"));
    }

    #[test]
    fn test_extract_detail_plain_text_and_empty() {
        assert_eq!(extract_detail("upstream down", StatusCode::BAD_GATEWAY), "upstream down");
        assert_eq!(extract_detail("", StatusCode::SERVICE_UNAVAILABLE), "Service Unavailable");
    }
}
