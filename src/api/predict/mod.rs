// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prediction API endpoint module
//!
//! Provides POST /predict (multipart upload) and POST /v1/predict (base64 JSON).

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{predict_handler, predict_json_handler};
pub use request::PredictRequest;
pub use response::PredictResponse;
