// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision model manager for loading the leaf detector and classifier

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;

use super::classifier::{ClassifierConfig, LeafClassifier};
use super::detector::{DetectorConfig, LeafDetector};
use super::image_utils::MAX_IMAGE_SIZE;
use super::pipeline::{LeafPipeline, PipelineMode};

/// Configuration for loading vision models
#[derive(Debug, Clone)]
pub struct VisionModelConfig {
    pub mode: PipelineMode,
    pub classifier: ClassifierConfig,
    /// Only loaded in [`PipelineMode::Detect`]
    pub detector: DetectorConfig,
    pub fallback_to_full_image: bool,
    pub max_image_bytes: usize,
}

impl Default for VisionModelConfig {
    fn default() -> Self {
        Self {
            mode: PipelineMode::Direct,
            classifier: ClassifierConfig::default(),
            detector: DetectorConfig::default(),
            fallback_to_full_image: false,
            max_image_bytes: MAX_IMAGE_SIZE,
        }
    }
}

/// Information about a loaded vision model
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionModelInfo {
    /// Model name
    pub name: String,
    /// Model type (classifier, detector)
    pub model_type: String,
    /// Whether the model is available
    pub available: bool,
}

/// Owns the loaded models and the pipeline built from them
///
/// Unlike optional side models, the classifier is required: a node that
/// cannot classify refuses to start. The detector is required in detect mode.
pub struct VisionModelManager {
    classifier: Arc<LeafClassifier>,
    detector: Option<Arc<LeafDetector>>,
    pipeline: Arc<LeafPipeline>,
}

impl VisionModelManager {
    /// Load models for the configured mode
    ///
    /// ONNX session creation is blocking, so it runs off the async runtime.
    pub async fn new(config: VisionModelConfig) -> Result<Self> {
        tokio::task::spawn_blocking(move || Self::load(config))
            .await
            .context("Model loading task panicked")?
    }

    /// Blocking variant of [`VisionModelManager::new`]
    pub fn load(config: VisionModelConfig) -> Result<Self> {
        let classifier = Arc::new(
            LeafClassifier::new(config.classifier.clone()).context("Failed to load classifier")?,
        );
        tracing::info!("✅ Leaf classifier loaded from {}", config.classifier.model_path.display());

        let detector = match config.mode {
            PipelineMode::Direct => None,
            PipelineMode::Detect => {
                let detector = LeafDetector::new(config.detector.clone())
                    .context("Failed to load leaf detector")?;
                tracing::info!("✅ Leaf detector loaded from {}", config.detector.model_path.display());
                Some(Arc::new(detector))
            }
        };

        let pipeline = match &detector {
            Some(d) => LeafPipeline::detect_then_classify(classifier.clone(), d.clone()),
            None => LeafPipeline::direct(classifier.clone()),
        }
        .with_fallback_to_full_image(config.fallback_to_full_image)
        .with_max_image_bytes(config.max_image_bytes);

        Ok(Self {
            classifier,
            detector,
            pipeline: Arc::new(pipeline),
        })
    }

    pub fn pipeline(&self) -> Arc<LeafPipeline> {
        self.pipeline.clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.classifier.labels().to_vec()
    }

    /// Check if the detector is loaded
    pub fn has_detector(&self) -> bool {
        self.detector.is_some()
    }

    /// List all vision models
    pub fn list_models(&self) -> Vec<VisionModelInfo> {
        vec![
            VisionModelInfo {
                name: "leaf-classifier".to_string(),
                model_type: "classifier".to_string(),
                available: true,
            },
            VisionModelInfo {
                name: "leaf-detector".to_string(),
                model_type: "detector".to_string(),
                available: self.detector.is_some(),
            },
        ]
    }
}
