// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use clap::Parser;
use std::path::PathBuf;

use crate::vision::{ExecutionTarget, InputLayout, PipelineMode, ScoreActivation};

/// Leaf disease classification node
///
/// Every flag can also be set through the environment (or a `.env` file).
#[derive(Parser, Debug, Clone)]
#[command(name = "leaf-classifier-node")]
#[command(version)]
#[command(about = "HTTP service classifying potato and tomato leaf diseases", long_about = None)]
pub struct Cli {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Classify the whole upload, or detect and crop a leaf first
    #[arg(long, env = "PIPELINE_MODE", value_enum, default_value_t = PipelineMode::Direct)]
    pub mode: PipelineMode,

    #[arg(long, env = "CLASSIFIER_MODEL_PATH", default_value = "./models/leaf_classifier.onnx")]
    pub classifier_model: PathBuf,

    /// One label per line, in model output order
    #[arg(long, env = "LABELS_PATH")]
    pub labels_file: Option<PathBuf>,

    /// Square side length the classifier expects
    #[arg(long, env = "CLASSIFIER_INPUT_SIZE", default_value_t = 224)]
    pub input_size: u32,

    #[arg(long, env = "CLASSIFIER_INPUT_LAYOUT", value_enum, default_value_t = InputLayout::Sequence)]
    pub input_layout: InputLayout,

    /// Activation applied to raw classifier outputs
    #[arg(long, env = "SCORE_ACTIVATION", value_enum, default_value_t = ScoreActivation::None)]
    pub score_activation: ScoreActivation,

    #[arg(long, env = "DETECTOR_MODEL_PATH", default_value = "./models/leaf_detector.onnx")]
    pub detector_model: PathBuf,

    #[arg(long, env = "DETECTOR_INPUT_SIZE", default_value_t = 640)]
    pub detector_input_size: u32,

    /// Minimum detector confidence for a box to count as a leaf
    #[arg(long, env = "DETECTION_THRESHOLD", default_value_t = 0.5)]
    pub detection_threshold: f32,

    #[arg(long, env = "IOU_THRESHOLD", default_value_t = 0.45)]
    pub iou_threshold: f32,

    /// Classify the full image when no leaf is detected
    #[arg(long, env = "FALLBACK_TO_FULL_IMAGE", default_value_t = false)]
    pub fallback_to_full_image: bool,

    #[arg(long, env = "EXECUTION_PROVIDER", value_enum, default_value_t = ExecutionTarget::Cpu)]
    pub execution_provider: ExecutionTarget,

    #[arg(long, env = "ORT_INTRA_THREADS", default_value_t = 4)]
    pub intra_threads: usize,

    /// Largest accepted image in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 10 * 1024 * 1024)]
    pub max_upload_bytes: usize,
}
