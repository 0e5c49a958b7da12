// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{extract::State, response::Html, Json};
use serde::{Deserialize, Serialize};

use super::http_server::AppState;
use crate::version;
use crate::vision::{PipelineMode, VisionModelInfo};

const INDEX_HTML: &str = include_str!("index.html");

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    /// Version, build tag, date and feature list
    pub version: serde_json::Value,
    pub mode: PipelineMode,
    pub models: Vec<ModelStatus>,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatus {
    pub name: String,
    pub model_type: String,
    pub available: bool,
}

impl From<&VisionModelInfo> for ModelStatus {
    fn from(info: &VisionModelInfo) -> Self {
        Self {
            name: info.name.clone(),
            model_type: info.model_type.clone(),
            available: info.available,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassesResponse {
    pub classes: Vec<String>,
    pub mode: PipelineMode,
}

/// GET / - Browser upload form posting to `/predict`
pub async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: version::get_version_info(),
        mode: state.pipeline.mode(),
        models: state.models.iter().map(ModelStatus::from).collect(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

/// GET /v1/classes - Labels in model output order
pub async fn classes_handler(State(state): State<AppState>) -> Json<ClassesResponse> {
    Json(ClassesResponse {
        classes: state.labels.as_ref().clone(),
        mode: state.pipeline.mode(),
    })
}
