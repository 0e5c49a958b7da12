// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Leaf image analysis
//!
//! This module provides:
//! - Upload decoding and preprocessing
//! - Leaf detection (YOLO-style ONNX graph)
//! - Disease classification (ONNX graph, argmax over labelled scores)
//! - The pipeline tying them together

pub mod classifier;
pub mod detector;
pub mod image_utils;
pub mod labels;
pub mod model_manager;
pub mod pipeline;
pub mod postprocess;
pub mod preprocessing;
pub mod session;

pub use classifier::{Classification, ClassifierConfig, Classify, LeafClassifier};
pub use detector::{Detect, Detection, DetectorConfig, LeafDetector};
pub use image_utils::{
    decode_base64_image, decode_image_bytes, detect_format, ImageError, ImageInfo, MAX_IMAGE_SIZE,
};
pub use model_manager::{VisionModelConfig, VisionModelInfo, VisionModelManager};
pub use pipeline::{LeafPipeline, PipelineError, PipelineMode, Prediction};
pub use postprocess::ScoreActivation;
pub use preprocessing::InputLayout;
pub use session::ExecutionTarget;
