// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Vision model manager tests
//!
//! Verifies that the VisionModelManager:
//! - Refuses to start without a classifier
//! - Loads the detector only in detect mode
//! - Reports model availability
//!
//! Tests marked `#[ignore]` need real ONNX files under /workspace/models.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use leaf_classifier_node::vision::{
    PipelineMode, VisionModelConfig, VisionModelManager,
};
use std::io::Cursor;
use std::path::PathBuf;

const CLASSIFIER_MODEL: &str = "/workspace/models/leaf_classifier.onnx";
const DETECTOR_MODEL: &str = "/workspace/models/leaf_detector.onnx";

fn config_with_models(mode: PipelineMode) -> VisionModelConfig {
    let mut config = VisionModelConfig {
        mode,
        ..Default::default()
    };
    config.classifier.model_path = PathBuf::from(CLASSIFIER_MODEL);
    config.detector.model_path = PathBuf::from(DETECTOR_MODEL);
    config
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, 140, (y % 256) as u8])
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

#[cfg(test)]
mod model_manager_tests {
    use super::*;

    #[test]
    fn test_default_config_paths() {
        let config = VisionModelConfig::default();

        assert_eq!(config.mode, PipelineMode::Direct);
        assert!(config
            .classifier
            .model_path
            .to_string_lossy()
            .contains("leaf_classifier"));
        assert!(config
            .detector
            .model_path
            .to_string_lossy()
            .contains("leaf_detector"));
    }

    #[tokio::test]
    async fn test_missing_classifier_fails_in_direct_mode() {
        let mut config = VisionModelConfig::default();
        config.classifier.model_path = PathBuf::from("/nonexistent/leaf.onnx");

        let result = VisionModelManager::new(config).await;

        let err = result.err().expect("manager must not start without a classifier");
        assert!(format!("{:#}", err).contains("not found"));
    }

    #[tokio::test]
    async fn test_missing_classifier_fails_in_detect_mode() {
        let mut config = VisionModelConfig {
            mode: PipelineMode::Detect,
            ..Default::default()
        };
        config.classifier.model_path = PathBuf::from("/nonexistent/leaf.onnx");

        assert!(VisionModelManager::new(config).await.is_err());
    }

    #[tokio::test]
    #[ignore] // Requires model files
    async fn test_direct_mode_skips_detector() {
        let mut config = config_with_models(PipelineMode::Direct);
        config.detector.model_path = PathBuf::from("/nonexistent/detector.onnx");

        let manager = VisionModelManager::new(config)
            .await
            .expect("classifier should load");

        assert!(!manager.has_detector());
        assert_eq!(manager.labels().len(), 6);
        let models = manager.list_models();
        assert!(models.iter().any(|m| m.model_type == "classifier" && m.available));
        assert!(models.iter().any(|m| m.model_type == "detector" && !m.available));
    }

    #[tokio::test]
    #[ignore] // Requires model files
    async fn test_detect_mode_requires_detector() {
        let mut config = config_with_models(PipelineMode::Detect);
        config.detector.model_path = PathBuf::from("/nonexistent/detector.onnx");

        let err = VisionModelManager::new(config).await.err().unwrap();
        assert!(format!("{:#}", err).contains("Failed to load leaf detector"));
    }

    #[tokio::test]
    #[ignore] // Requires model files
    async fn test_real_prediction_uses_known_label() {
        let manager = VisionModelManager::new(config_with_models(PipelineMode::Direct))
            .await
            .expect("classifier should load");

        let prediction = manager.pipeline().predict_bytes(&png_bytes(300, 200)).unwrap();

        assert!(manager.labels().contains(&prediction.classification.label));
        assert!(prediction.classification.confidence.is_finite());
        assert_eq!(prediction.image.width, 300);
    }

    #[tokio::test]
    #[ignore] // Requires model files
    async fn test_real_detect_mode_loads_both() {
        let mut config = config_with_models(PipelineMode::Detect);
        config.fallback_to_full_image = true;

        let manager = VisionModelManager::new(config)
            .await
            .expect("both models should load");

        assert!(manager.has_detector());
        assert_eq!(manager.pipeline().mode(), PipelineMode::Detect);
        let prediction = manager.pipeline().predict_bytes(&png_bytes(640, 480));
        assert!(prediction.is_ok(), "prediction failed: {:?}", prediction.err());
    }
}
