// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Decode → (detect → crop) → classify

use clap::ValueEnum;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::classifier::{Classification, Classify};
use super::detector::{crop_to_detection, Detect, Detection};
use super::image_utils::{
    decode_base64_image_with_limit, decode_image_bytes_with_limit, ImageError, ImageInfo,
    MAX_IMAGE_SIZE,
};

/// How an upload is turned into a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PipelineMode {
    /// Classify the whole upload
    #[default]
    Direct,
    /// Crop to the best leaf detection first
    Detect,
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineMode::Direct => write!(f, "direct"),
            PipelineMode::Detect => write!(f, "detect"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Image(#[from] ImageError),

    #[error("No leaf detected in image")]
    NoLeafDetected,

    #[error("Leaf detection failed: {0}")]
    Detection(anyhow::Error),

    #[error("Classification failed: {0}")]
    Inference(anyhow::Error),
}

/// Full result for one upload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub classification: Classification,
    /// Region that was classified, when the detector ran and found a leaf
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection: Option<Detection>,
    pub image: ImageInfo,
    pub processing_time_ms: u64,
}

/// Prediction pipeline shared by all request handlers
#[derive(Clone)]
pub struct LeafPipeline {
    mode: PipelineMode,
    classifier: Arc<dyn Classify>,
    detector: Option<Arc<dyn Detect>>,
    fallback_to_full_image: bool,
    max_image_bytes: usize,
}

impl fmt::Debug for LeafPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeafPipeline")
            .field("mode", &self.mode)
            .field("has_detector", &self.detector.is_some())
            .field("fallback_to_full_image", &self.fallback_to_full_image)
            .field("max_image_bytes", &self.max_image_bytes)
            .finish()
    }
}

impl LeafPipeline {
    /// Classify uploads as-is
    pub fn direct(classifier: Arc<dyn Classify>) -> Self {
        Self {
            mode: PipelineMode::Direct,
            classifier,
            detector: None,
            fallback_to_full_image: false,
            max_image_bytes: MAX_IMAGE_SIZE,
        }
    }

    /// Detect a leaf, crop to it, then classify the crop
    pub fn detect_then_classify(classifier: Arc<dyn Classify>, detector: Arc<dyn Detect>) -> Self {
        Self {
            mode: PipelineMode::Detect,
            classifier,
            detector: Some(detector),
            fallback_to_full_image: false,
            max_image_bytes: MAX_IMAGE_SIZE,
        }
    }

    /// Classify the full image instead of failing when nothing is detected
    pub fn with_fallback_to_full_image(mut self, enabled: bool) -> Self {
        self.fallback_to_full_image = enabled;
        self
    }

    pub fn with_max_image_bytes(mut self, max: usize) -> Self {
        self.max_image_bytes = max;
        self
    }

    pub fn mode(&self) -> PipelineMode {
        self.mode
    }

    pub fn has_detector(&self) -> bool {
        self.detector.is_some()
    }

    /// Predict from raw upload bytes
    pub fn predict_bytes(&self, bytes: &[u8]) -> Result<Prediction, PipelineError> {
        let start = Instant::now();
        let (image, info) = decode_image_bytes_with_limit(bytes, self.max_image_bytes)?;
        self.run(image, info, start)
    }

    /// Predict from a base64 string (optionally a data URL)
    pub fn predict_base64(&self, encoded: &str) -> Result<Prediction, PipelineError> {
        let start = Instant::now();
        let (image, info) = decode_base64_image_with_limit(encoded, self.max_image_bytes)?;
        self.run(image, info, start)
    }

    /// Predict from an already decoded RGB image
    pub fn predict_image(
        &self,
        image: DynamicImage,
        info: ImageInfo,
    ) -> Result<Prediction, PipelineError> {
        self.run(image, info, Instant::now())
    }

    fn run(
        &self,
        image: DynamicImage,
        info: ImageInfo,
        start: Instant,
    ) -> Result<Prediction, PipelineError> {
        debug!(
            "Decoded image: {}x{}, {} bytes",
            info.width, info.height, info.size_bytes
        );

        let (target, detection) = match &self.detector {
            Some(detector) => self.locate_leaf(detector.as_ref(), image)?,
            None => (image, None),
        };

        let classification = self
            .classifier
            .classify(&target)
            .map_err(PipelineError::Inference)?;

        let processing_time_ms = start.elapsed().as_millis() as u64;

        info!(
            "Prediction complete: {} ({:.4}), mode {}, {}ms",
            classification.label, classification.confidence, self.mode, processing_time_ms
        );

        Ok(Prediction {
            classification,
            detection,
            image: info,
            processing_time_ms,
        })
    }

    fn locate_leaf(
        &self,
        detector: &dyn Detect,
        image: DynamicImage,
    ) -> Result<(DynamicImage, Option<Detection>), PipelineError> {
        let detections = detector.detect(&image).map_err(PipelineError::Detection)?;

        let first = detections
            .into_iter()
            .find_map(|d| crop_to_detection(&image, &d).map(|crop| (crop, d)));

        match first {
            Some((crop, detection)) => {
                debug!(
                    "Cropped to leaf at ({:.0}, {:.0}) {:.0}x{:.0}, confidence {:.3}",
                    detection.x, detection.y, detection.width, detection.height, detection.confidence
                );
                Ok((crop, Some(detection)))
            }
            None if self.fallback_to_full_image => {
                warn!("No leaf detected, classifying full image");
                Ok((image, None))
            }
            None => Err(PipelineError::NoLeafDetected),
        }
    }
}
