// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Runtime configuration assembled from the command line and environment

use anyhow::{bail, Result};

use crate::api::ApiConfig;
use crate::cli::Cli;
use crate::vision::{
    labels::{default_labels, load_labels},
    ClassifierConfig, DetectorConfig, VisionModelConfig,
};

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub api: ApiConfig,
    pub vision: VisionModelConfig,
}

impl NodeConfig {
    /// Resolve labels and validate numeric settings
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        if cli.input_size == 0 || cli.detector_input_size == 0 {
            bail!("Model input sizes must be positive");
        }
        if !(0.0..=1.0).contains(&cli.detection_threshold) {
            bail!(
                "Detection threshold must be within 0.0-1.0, got {}",
                cli.detection_threshold
            );
        }
        if !(0.0..=1.0).contains(&cli.iou_threshold) {
            bail!("IoU threshold must be within 0.0-1.0, got {}", cli.iou_threshold);
        }
        if cli.max_upload_bytes == 0 {
            bail!("Maximum upload size must be positive");
        }

        let labels = match &cli.labels_file {
            Some(path) => load_labels(path)?,
            None => default_labels(),
        };

        let classifier = ClassifierConfig {
            model_path: cli.classifier_model.clone(),
            labels,
            input_size: cli.input_size,
            layout: cli.input_layout,
            activation: cli.score_activation,
            execution_target: cli.execution_provider,
            intra_threads: cli.intra_threads,
        };

        let detector = DetectorConfig {
            model_path: cli.detector_model.clone(),
            input_size: cli.detector_input_size,
            confidence_threshold: cli.detection_threshold,
            iou_threshold: cli.iou_threshold,
            execution_target: cli.execution_provider,
            intra_threads: cli.intra_threads,
        };

        Ok(Self {
            api: ApiConfig {
                listen_addr: format!("{}:{}", cli.host, cli.port),
                max_upload_bytes: cli.max_upload_bytes,
            },
            vision: VisionModelConfig {
                mode: cli.mode,
                classifier,
                detector,
                fallback_to_full_image: cli.fallback_to_full_image,
                max_image_bytes: cli.max_upload_bytes,
            },
        })
    }
}
