//! ML detection service

use std::path::Path;

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{path, Query};
use crate::error::ClientError;
use crate::http::ApiClient;

#[derive(Debug, Clone, Default)]
pub struct InferenceOptions {
    pub model_name: Option<String>,
    pub auto_create_alert: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InferenceRequest {
    pub data: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    pub auto_create_alert: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InferenceResult {
    pub prediction: String,
    pub confidence: f64,
    pub detection_type: String,
    pub model_name: String,
    #[serde(default)]
    pub features: Map<String, Value>,
    #[serde(default)]
    pub detection_id: Option<String>,
    #[serde(default)]
    pub alert_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub models: Vec<Value>,
    #[serde(default)]
    pub default_model: Option<String>,
}

/// Result of a model upload
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelUpload {
    pub status: String,
    #[serde(default)]
    pub message: String,
    pub model_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct DetectionFilter {
    pub limit: Option<u32>,
    pub skip: Option<u32>,
    pub detection_type: Option<String>,
    pub model_name: Option<String>,
    /// 0.0 ..= 1.0
    pub min_confidence: Option<f64>,
}

impl DetectionFilter {
    fn query(&self) -> Query {
        Query::new()
            .number("limit", self.limit)
            .number("skip", self.skip)
            .text("detection_type", self.detection_type.as_deref())
            .text("model_name", self.model_name.as_deref())
            .number("min_confidence", self.min_confidence)
    }
}

pub struct MlService<'a> {
    api: &'a ApiClient,
}

impl<'a> MlService<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    pub async fn run_inference(
        &self,
        data: Map<String, Value>,
        options: &InferenceOptions,
    ) -> Result<InferenceResult, ClientError> {
        let request = InferenceRequest {
            data,
            model_name: options.model_name.clone(),
            auto_create_alert: options.auto_create_alert,
        };
        self.api.post("/ml/inference", &request).await
    }

    /// Run inference on a stored log entry
    pub async fn run_inference_on_log(
        &self,
        log_id: &str,
        options: &InferenceOptions,
    ) -> Result<InferenceResult, ClientError> {
        let query = Query::new()
            .text("model_name", options.model_name.as_deref())
            .flag("auto_create_alert", options.auto_create_alert);

        self.api
            .post_empty(
                &path("/ml/inference/from-log", &[log_id])?,
                query.pairs(),
            )
            .await
    }

    pub async fn get_detections(&self, filter: &DetectionFilter) -> Result<Vec<Value>, ClientError> {
        self.api.get_with("/ml/detections", filter.query().pairs()).await
    }

    pub async fn get_detection(&self, detection_id: &str) -> Result<Value, ClientError> {
        self.api
            .get(&path("/ml/detections", &[detection_id])?)
            .await
    }

    pub async fn list_models(&self) -> Result<ModelList, ClientError> {
        self.api.get("/ml/models").await
    }

    /// Upload a `.joblib` / `.pkl` model file. Without `model_name` the
    /// backend names the model after the file.
    pub async fn upload_model(
        &self,
        file: &Path,
        model_name: Option<&str>,
    ) -> Result<ModelUpload, ClientError> {
        let file_name = file
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ClientError::Config(format!("Not a model file: {}", file.display())))?
            .to_string();
        let bytes = tokio::fs::read(file).await?;

        self.upload_model_bytes(&file_name, bytes, model_name).await
    }

    /// Upload model content already in memory
    pub async fn upload_model_bytes(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        model_name: Option<&str>,
    ) -> Result<ModelUpload, ClientError> {
        let model_name = model_name.filter(|name| !name.is_empty());

        let mut form = Form::new().part("file", Part::bytes(bytes).file_name(file_name.to_string()));
        if let Some(name) = model_name {
            form = form.text("model_name", name.to_string());
        }

        // The router reads model_name from the query; the form field mirrors the dashboard
        let query = Query::new().text("model_name", model_name);
        self.api
            .post_multipart("/ml/models/upload", query.pairs(), form)
            .await
    }
}
