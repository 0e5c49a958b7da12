// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Parser;
use leaf_classifier_node::{
    api::{ApiServer, AppState},
    cli::Cli,
    config::NodeConfig,
    version,
    vision::{PipelineMode, VisionModelManager},
};
use std::env;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    println!("🚀 Starting Leaf Classifier Node...\n");
    println!("📦 {}", version::get_version_string());
    println!("📦 BUILD VERSION: {}", version::VERSION);
    println!();

    let config = NodeConfig::from_cli(&cli)?;

    println!("🧠 Loading vision models (mode: {})...", config.vision.mode);
    println!(
        "   Classifier: {} ({} classes, {:?} layout)",
        config.vision.classifier.model_path.display(),
        config.vision.classifier.labels.len(),
        config.vision.classifier.layout
    );
    if config.vision.mode == PipelineMode::Detect {
        println!(
            "   Detector:   {} (threshold {})",
            config.vision.detector.model_path.display(),
            config.vision.detector.confidence_threshold
        );
    }

    let manager = VisionModelManager::new(config.vision.clone())
        .await
        .context("Failed to load vision models")?;
    for model in manager.list_models().iter().filter(|m| m.available) {
        println!("✅ {} ({}) ready", model.name, model.model_type);
    }

    let state = AppState::from_manager(&manager, config.api.max_upload_bytes);
    let server = ApiServer::start(config.api.clone(), state).await?;
    println!("✅ API server listening on http://{}", server.local_addr());
    println!("\n🎉 Leaf classifier is running! Press Ctrl+C to stop.\n");

    // Wait for shutdown signal
    signal::ctrl_c().await?;

    println!("\n⏹️  Shutting down...");
    server.shutdown().await;

    println!("👋 Goodbye!");
    Ok(())
}
