// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prediction response types

use serde::{Deserialize, Serialize};

use crate::vision::Prediction;

/// Bounding box of the leaf that was classified
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Detected region reported alongside a detect-mode prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedLeaf {
    pub bounding_box: BoundingBox,
    /// Detector confidence (0.0-1.0)
    pub confidence: f32,
}

/// Successful prediction
///
/// `class` and `confidence` are always present; the rest is extra context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictResponse {
    #[serde(rename = "class")]
    pub label: String,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection: Option<DetectedLeaf>,
    pub processing_time_ms: u64,
}

impl From<Prediction> for PredictResponse {
    fn from(prediction: Prediction) -> Self {
        let detection = prediction.detection.map(|d| DetectedLeaf {
            bounding_box: BoundingBox {
                x: d.x.round() as u32,
                y: d.y.round() as u32,
                width: d.width.round() as u32,
                height: d.height.round() as u32,
            },
            confidence: d.confidence,
        });

        Self {
            label: prediction.classification.label,
            confidence: prediction.classification.confidence,
            detection,
            processing_time_ms: prediction.processing_time_ms,
        }
    }
}
