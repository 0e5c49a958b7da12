// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prediction endpoint handlers

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::{multipart::MultipartError, Multipart};
use std::sync::Arc;
use tracing::debug;

use super::request::{PredictRequest, IMAGE_FIELD};
use super::response::PredictResponse;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::vision::{LeafPipeline, PipelineError, Prediction};

/// POST /predict - Classify an uploaded leaf image
///
/// # Request
/// `multipart/form-data` with the image in the `image` file field.
///
/// # Response
/// - `class`: Predicted label
/// - `confidence`: Score of the predicted label
/// - `detection`: Classified region (detect mode only)
/// - `processingTimeMs`: Time spent decoding and running models
///
/// # Errors
/// - 400 Bad Request: No `image` file part, empty filename, malformed body
/// - 413 Payload Too Large: Body exceeds the upload limit
/// - 422 Unprocessable Entity: No leaf detected (detect mode)
/// - 500 Internal Server Error: Decoding or inference failed
pub async fn predict_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<PredictResponse>, ApiError> {
    let upload = read_image_field(&mut multipart).await?;
    debug!("Prediction upload received: {} bytes", upload.len());

    let prediction = run_blocking(state.pipeline.clone(), move |pipeline| {
        pipeline.predict_bytes(&upload)
    })
    .await?;

    Ok(Json(PredictResponse::from(prediction)))
}

/// POST /v1/predict - Classify a base64-encoded leaf image
///
/// Same semantics as `/predict`, with a JSON body `{"image": "<base64>"}`.
/// Data URLs are accepted.
pub async fn predict_json_handler(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge(rejection.body_text()),
        _ => ApiError::InvalidRequest(rejection.body_text()),
    })?;

    let encoded = request
        .validate(max_encoded_len(state.max_upload_bytes))?
        .to_string();

    let prediction = run_blocking(state.pipeline.clone(), move |pipeline| {
        pipeline.predict_base64(&encoded)
    })
    .await?;

    Ok(Json(PredictResponse::from(prediction)))
}

/// Base64 text length that decodes to at most `max_bytes`
pub fn max_encoded_len(max_bytes: usize) -> usize {
    max_bytes.div_ceil(3) * 4
}

/// Pull the bytes of the `image` file part out of the form
///
/// A part named `image` without a filename is a plain form value, not an
/// upload, and is skipped.
async fn read_image_field(multipart: &mut Multipart) -> Result<Bytes, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        match field.file_name() {
            None => continue,
            Some("") => return Err(ApiError::NoFileSelected),
            Some(name) => debug!("Reading upload '{}'", name),
        }
        return field.bytes().await.map_err(multipart_error);
    }

    Err(ApiError::NoImageUploaded)
}

fn multipart_error(err: MultipartError) -> ApiError {
    match err.status() {
        StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge(err.body_text()),
        _ => ApiError::InvalidRequest(err.body_text()),
    }
}

/// Run ONNX work off the async runtime
async fn run_blocking<F>(pipeline: Arc<LeafPipeline>, f: F) -> Result<Prediction, ApiError>
where
    F: FnOnce(&LeafPipeline) -> Result<Prediction, PipelineError> + Send + 'static,
{
    let prediction = tokio::task::spawn_blocking(move || f(&pipeline))
        .await
        .map_err(|e| ApiError::InternalError(format!("Prediction task failed: {}", e)))??;
    Ok(prediction)
}
