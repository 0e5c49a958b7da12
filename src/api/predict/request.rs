// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prediction request types and validation

use serde::{Deserialize, Serialize};

use crate::api::errors::ApiError;

/// Multipart field carrying the uploaded image
pub const IMAGE_FIELD: &str = "image";

/// JSON body for `POST /v1/predict`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictRequest {
    /// Base64-encoded image data, optionally as a data URL
    #[serde(default)]
    pub image: Option<String>,
}

impl PredictRequest {
    /// Validate the request and return the encoded image
    ///
    /// `max_encoded_len` bounds the base64 text, not the decoded bytes.
    pub fn validate(&self, max_encoded_len: usize) -> Result<&str, ApiError> {
        let image = match self.image.as_deref().map(str::trim) {
            Some(image) if !image.is_empty() => image,
            _ => {
                return Err(ApiError::ValidationError {
                    field: IMAGE_FIELD.to_string(),
                    message: "image is required".to_string(),
                })
            }
        };

        if image.len() > max_encoded_len {
            return Err(ApiError::ValidationError {
                field: IMAGE_FIELD.to_string(),
                message: format!("image exceeds maximum size of {} bytes", max_encoded_len),
            });
        }

        Ok(image)
    }
}
