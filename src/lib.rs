// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod version;
pub mod vision;

pub use api::{create_router, ApiConfig, ApiServer, AppState};
pub use config::NodeConfig;
pub use vision::{LeafPipeline, PipelineMode, Prediction, VisionModelConfig, VisionModelManager};
