// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Score and box post-processing

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::detector::Detection;

/// Activation applied to raw classifier output before argmax
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScoreActivation {
    /// Graph already ends in softmax; use scores as-is
    #[default]
    None,
    /// Graph emits logits
    Softmax,
}

impl ScoreActivation {
    pub fn apply(&self, scores: Vec<f32>) -> Vec<f32> {
        match self {
            ScoreActivation::None => scores,
            ScoreActivation::Softmax => softmax(&scores),
        }
    }
}

/// Index and value of the highest score
///
/// NaN entries are skipped and the first index wins on ties.
/// Returns `None` for an empty slice or one containing only NaN.
pub fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best, (idx, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((idx, v)),
        })
}

/// Numerically stable softmax
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }

    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();

    if sum == 0.0 || !sum.is_finite() {
        return vec![1.0 / scores.len() as f32; scores.len()];
    }

    exps.into_iter().map(|e| e / sum).collect()
}

/// Intersection over union of two boxes
pub fn iou(a: &Detection, b: &Detection) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.area() + b.area() - inter;

    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Greedy non-maximum suppression
///
/// Output is sorted by descending confidence; a box is dropped when it
/// overlaps an already kept box of the same class above `iou_threshold`.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == candidate.class_id && iou(k, &candidate) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}
