// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX Runtime session construction shared by the detector and classifier

use anyhow::{Context, Result};
use clap::ValueEnum;
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Where inference runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionTarget {
    #[default]
    Cpu,
    /// CUDA, falling back to CPU when the provider cannot be initialised
    Cuda,
}

/// Load an ONNX graph into a session
///
/// # Errors
/// Returns error if:
/// - Model file not found
/// - ONNX Runtime initialization fails
pub fn load_session(model_path: &Path, target: ExecutionTarget, intra_threads: usize) -> Result<Session> {
    if !model_path.exists() {
        anyhow::bail!("ONNX model file not found: {}", model_path.display());
    }

    if target == ExecutionTarget::Cuda {
        info!("   Attempting CUDA execution provider...");
        let cuda_result = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CUDAExecutionProvider::default().build()])
            .context("Failed to set CUDA execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(intra_threads)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path);

        match cuda_result {
            Ok(session) => {
                info!("✅ CUDA execution provider initialized for {}", model_path.display());
                return Ok(session);
            }
            Err(e) => {
                warn!("⚠️  CUDA execution provider failed: {}", e);
                warn!("   Falling back to CPU execution provider");
            }
        }
    }

    Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .context("Failed to set CPU execution provider")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(intra_threads)
        .context("Failed to set intra threads")?
        .commit_from_file(model_path)
        .context(format!(
            "Failed to load ONNX model from {}",
            model_path.display()
        ))
}

/// First input and output names of a session, with fallbacks
pub fn io_names(session: &Session, default_input: &str, default_output: &str) -> (String, String) {
    let input_name = session
        .inputs
        .first()
        .map(|input| input.name.clone())
        .unwrap_or_else(|| default_input.to_string());

    let output_name = session
        .outputs
        .first()
        .map(|output| output.name.clone())
        .unwrap_or_else(|| default_output.to_string());

    (input_name, output_name)
}
