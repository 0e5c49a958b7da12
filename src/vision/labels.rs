// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Class labels in classifier output order

use anyhow::{Context, Result};
use std::path::Path;

/// Labels of the bundled potato/tomato leaf classifier
pub const DEFAULT_LABELS: [&str; 6] = [
    "KentangEarlyBlight",
    "KentangLateBlight",
    "KentangSehat",
    "TomatSehat",
    "TomatSpiderMite",
    "TomatWhiteFly",
];

pub fn default_labels() -> Vec<String> {
    DEFAULT_LABELS.iter().map(|s| s.to_string()).collect()
}

/// Parse a label list: one label per line, blank lines and `#` comments ignored
pub fn parse_labels(contents: &str) -> Result<Vec<String>> {
    let labels: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();

    if labels.is_empty() {
        anyhow::bail!("label list is empty");
    }

    Ok(labels)
}

/// Load labels from a file
pub fn load_labels(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read labels from {}", path.display()))?;
    parse_labels(&contents).with_context(|| format!("Invalid labels file {}", path.display()))
}
