// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod errors;
pub mod handlers;
pub mod http_server;
pub mod predict;

pub use errors::{ApiError, ErrorResponse};
pub use handlers::{ClassesResponse, HealthResponse, ModelStatus};
pub use http_server::{create_router, ApiConfig, ApiServer, AppState};
pub use predict::{predict_handler, predict_json_handler, PredictRequest, PredictResponse};
