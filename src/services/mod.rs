//! Resource Services
//!
//! Thin typed facades over [`ApiClient`], one per backend router. They build
//! paths and query strings and nothing else; auth handling is inherited from
//! the HTTP wrapper.

pub mod alerts;
pub mod auth;
pub mod logs;
pub mod ml;
pub mod monitoring;
pub mod suricata;

use std::fmt::Display;

use reqwest::Url;

use crate::error::ClientError;
use crate::http::ApiClient;

pub use alerts::{
    AlertCreate, AlertFilter, AlertSeverity, AlertStatsFilter, AlertStatus, AlertUpdate,
    AlertsService,
};
pub use auth::{AuthService, LoginRequest, LoginResponse, RegisterRequest};
pub use logs::{LogCreate, LogFilter, LogStatsFilter, LogsService};
pub use ml::{
    DetectionFilter, InferenceOptions, InferenceRequest, InferenceResult, MlService, ModelList,
    ModelUpload,
};
pub use monitoring::{MonitoringService, DEFAULT_RECENT_LIMIT};
pub use suricata::{ConfigCreate, RuleCreate, RuleUpdate, SuricataEventFilter, SuricataService};

impl ApiClient {
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(self)
    }

    pub fn logs(&self) -> LogsService<'_> {
        LogsService::new(self)
    }

    pub fn alerts(&self) -> AlertsService<'_> {
        AlertsService::new(self)
    }

    pub fn ml(&self) -> MlService<'_> {
        MlService::new(self)
    }

    pub fn suricata(&self) -> SuricataService<'_> {
        SuricataService::new(self)
    }

    pub fn monitoring(&self) -> MonitoringService<'_> {
        MonitoringService::new(self)
    }
}

/// Ordered query pairs
///
/// Empty strings and zero numbers are skipped, matching how the dashboard
/// treats falsy filter values.
#[derive(Debug, Default)]
pub(crate) struct Query {
    pairs: Vec<(&'static str, String)>,
}

impl Query {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn text(mut self, key: &'static str, value: Option<&str>) -> Self {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.pairs.push((key, value.to_string()));
        }
        self
    }

    pub(crate) fn number<N>(mut self, key: &'static str, value: Option<N>) -> Self
    where
        N: Display + PartialEq + Default,
    {
        if let Some(value) = value.filter(|v| *v != N::default()) {
            self.pairs.push((key, value.to_string()));
        }
        self
    }

    /// Set only when true
    pub(crate) fn flag(mut self, key: &'static str, value: bool) -> Self {
        if value {
            self.pairs.push((key, "true".to_string()));
        }
        self
    }

    /// Always set, as `true` / `false`
    pub(crate) fn boolean(mut self, key: &'static str, value: Option<bool>) -> Self {
        if let Some(value) = value {
            self.pairs.push((key, value.to_string()));
        }
        self
    }

    pub(crate) fn pairs(&self) -> &[(&'static str, String)] {
        &self.pairs
    }
}

/// Origin used only to borrow `Url`'s path segment encoding
const PATH_ORIGIN: &str = "http://api.invalid/";

/// Join a route and caller-supplied ids into an API path, each id encoded as
/// exactly one segment
pub(crate) fn path(route: &str, ids: &[&str]) -> Result<String, ClientError> {
    let mut url = Url::parse(PATH_ORIGIN).map_err(|e| ClientError::Config(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| ClientError::Config(format!("cannot build path for {}", route)))?
        .extend(route.split('/').filter(|s| !s.is_empty()))
        .extend(ids);
    Ok(url.path().to_string())
}
