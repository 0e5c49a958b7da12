// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Leaf detection model
//!
//! Runs a YOLO-style ONNX detector to locate leaves. The graph output is
//! `[1, 4 + classes, N]` (or its transpose `[1, N, 4 + classes]`), each
//! candidate being a center/size box followed by per-class scores.

use anyhow::{anyhow, Context, Result};
use image::DynamicImage;
use ndarray::{ArrayViewD, Ix3};
use ort::session::Session;
use ort::value::Value;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::postprocess::non_max_suppression;
use super::preprocessing::{preprocess_for_detection, LetterboxInfo, DETECTOR_INPUT_SIZE};
use super::session::{io_names, load_session, ExecutionTarget};

/// Default minimum confidence for a detection to count as a leaf
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Default IoU above which overlapping boxes are merged
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

/// A detected leaf in original image pixel coordinates
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    /// X coordinate of top-left corner
    pub x: f32,
    /// Y coordinate of top-left corner
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Detection confidence score (0.0-1.0)
    pub confidence: f32,
    pub class_id: usize,
}

impl Detection {
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Whether the box covers at least one pixel
    pub fn is_valid(&self) -> bool {
        self.width >= 1.0 && self.height >= 1.0 && self.confidence > 0.0
    }
}

/// Anything that can locate leaves in an RGB image
///
/// Implementations return detections sorted by descending confidence.
#[cfg_attr(test, mockall::automock)]
pub trait Detect: Send + Sync {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>>;
}

/// Settings for loading the detector
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub model_path: PathBuf,
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub execution_target: ExecutionTarget,
    pub intra_threads: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("./models/leaf_detector.onnx"),
            input_size: DETECTOR_INPUT_SIZE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            execution_target: ExecutionTarget::default(),
            intra_threads: 4,
        }
    }
}

/// Decode raw detector output into boxes in original image space
///
/// Candidates below `confidence_threshold` are dropped, the rest are clamped
/// to the image bounds. NMS is not applied here.
pub fn parse_detections(
    output: ArrayViewD<f32>,
    confidence_threshold: f32,
    letterbox: &LetterboxInfo,
) -> Result<Vec<Detection>> {
    let output = output
        .into_dimensionality::<Ix3>()
        .map_err(|_| anyhow!("Unexpected detector output rank, expected [1, A, N]"))?;

    let (batch, dim1, dim2) = output.dim();
    if batch != 1 {
        anyhow::bail!("Detector expected batch=1 but received {}", batch);
    }

    // Attributes run along the shorter axis: YOLOv8 emits [1, 4 + nc, 8400].
    let attributes_first = dim1 <= dim2;
    let (num_attrs, num_candidates) = if attributes_first {
        (dim1, dim2)
    } else {
        (dim2, dim1)
    };
    if num_attrs < 5 {
        anyhow::bail!(
            "Detector output needs at least 5 attributes (x, y, w, h, score), got {}",
            num_attrs
        );
    }

    let attr = |candidate: usize, a: usize| -> f32 {
        if attributes_first {
            output[[0, a, candidate]]
        } else {
            output[[0, candidate, a]]
        }
    };

    let max_x = letterbox.original_width as f32;
    let max_y = letterbox.original_height as f32;
    let mut detections = Vec::new();

    for candidate in 0..num_candidates {
        let (class_id, confidence) = (4..num_attrs)
            .map(|a| (a - 4, attr(candidate, a)))
            .fold((0usize, f32::MIN), |best, cur| {
                if cur.1 > best.1 {
                    cur
                } else {
                    best
                }
            });

        if confidence.is_nan() || confidence < confidence_threshold {
            continue;
        }

        let cx = attr(candidate, 0);
        let cy = attr(candidate, 1);
        let w = attr(candidate, 2);
        let h = attr(candidate, 3);

        let (x1, y1) = letterbox.map_to_original(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.map_to_original(cx + w / 2.0, cy + h / 2.0);

        let x1 = x1.clamp(0.0, max_x);
        let y1 = y1.clamp(0.0, max_y);
        let x2 = x2.clamp(0.0, max_x);
        let y2 = y2.clamp(0.0, max_y);

        let detection = Detection {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence,
            class_id,
        };

        if detection.is_valid() {
            detections.push(detection);
        }
    }

    Ok(detections)
}

/// Crop an image to a detection box
///
/// Returns `None` when the box rounds to an empty region.
pub fn crop_to_detection(image: &DynamicImage, detection: &Detection) -> Option<DynamicImage> {
    let x = detection.x.max(0.0).floor() as u32;
    let y = detection.y.max(0.0).floor() as u32;
    let x2 = ((detection.x + detection.width).ceil() as u32).min(image.width());
    let y2 = ((detection.y + detection.height).ceil() as u32).min(image.height());

    if x2 <= x || y2 <= y {
        return None;
    }

    Some(image.crop_imm(x, y, x2 - x, y2 - y))
}

/// ONNX-backed leaf detector
#[derive(Clone)]
pub struct LeafDetector {
    /// ONNX Runtime session (thread-safe)
    session: Arc<Mutex<Session>>,
    input_name: String,
    output_name: String,
    input_size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl std::fmt::Debug for LeafDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeafDetector")
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("input_size", &self.input_size)
            .field("confidence_threshold", &self.confidence_threshold)
            .finish_non_exhaustive()
    }
}

impl LeafDetector {
    /// Load the detection model
    ///
    /// # Errors
    /// Returns error if the model file is missing or ONNX Runtime rejects it
    pub fn new(config: DetectorConfig) -> Result<Self> {
        if config.input_size == 0 {
            anyhow::bail!("Detector input size must be greater than 0");
        }

        info!("Loading leaf detector from {}", config.model_path.display());

        let session = load_session(
            &config.model_path,
            config.execution_target,
            config.intra_threads,
        )?;
        let (input_name, output_name) = io_names(&session, "images", "output0");

        info!(
            "✅ Leaf detector ready (input: {}, output: {}, threshold {:.2})",
            input_name, output_name, config.confidence_threshold
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            output_name,
            input_size: config.input_size,
            confidence_threshold: config.confidence_threshold.clamp(0.0, 1.0),
            iou_threshold: config.iou_threshold.clamp(0.0, 1.0),
        })
    }
}

impl Detect for LeafDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>> {
        let (input, letterbox) = preprocess_for_detection(image, self.input_size);
        let input_value = Value::from_array(input).context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("Detector session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context("Detection inference failed")?;

        let output_tensor = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| anyhow!("Detector has no output named {}", self.output_name))?
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;

        debug!("Detection output shape: {:?}", output_tensor.shape());

        let candidates =
            parse_detections(output_tensor.view(), self.confidence_threshold, &letterbox)?;
        let detections = non_max_suppression(candidates, self.iou_threshold);

        debug!("Detected {} leaf regions", detections.len());

        Ok(detections)
    }
}
