// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Leaf disease classifier
//!
//! Wraps an ONNX classification graph whose output is one score per label.
//! The predicted class is the argmax of the (optionally softmaxed) scores.

use anyhow::{anyhow, Context, Result};
use image::DynamicImage;
use ndarray::{ArrayD, IxDyn};
use ort::session::Session;
use ort::value::Value;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::postprocess::{argmax, ScoreActivation};
use super::preprocessing::{preprocess_for_classification, InputLayout, CLASSIFIER_INPUT_SIZE};
use super::session::{io_names, load_session, ExecutionTarget};

/// Outcome of classifying one image
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    /// Predicted class label
    pub label: String,
    /// Position of the label in the model output
    pub class_index: usize,
    /// Score of the predicted class
    pub confidence: f32,
}

/// Anything that can turn an RGB image into a class prediction
#[cfg_attr(test, mockall::automock)]
pub trait Classify: Send + Sync {
    fn classify(&self, image: &DynamicImage) -> Result<Classification>;
}

/// Settings for loading the classifier
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub model_path: PathBuf,
    /// Labels in model output order
    pub labels: Vec<String>,
    pub input_size: u32,
    pub layout: InputLayout,
    pub activation: ScoreActivation,
    pub execution_target: ExecutionTarget,
    pub intra_threads: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("./models/leaf_classifier.onnx"),
            labels: super::labels::default_labels(),
            input_size: CLASSIFIER_INPUT_SIZE,
            layout: InputLayout::default(),
            activation: ScoreActivation::default(),
            execution_target: ExecutionTarget::default(),
            intra_threads: 4,
        }
    }
}

/// Map raw model output to a [`Classification`]
pub fn classification_from_scores(
    scores: Vec<f32>,
    labels: &[String],
    activation: ScoreActivation,
) -> Result<Classification> {
    if scores.len() != labels.len() {
        anyhow::bail!(
            "Classifier produced {} scores but {} labels are configured",
            scores.len(),
            labels.len()
        );
    }

    let scores = activation.apply(scores);
    let (class_index, confidence) =
        argmax(&scores).ok_or_else(|| anyhow!("Classifier produced no usable scores"))?;

    Ok(Classification {
        label: labels[class_index].clone(),
        class_index,
        confidence,
    })
}

/// ONNX-backed leaf classifier
#[derive(Clone)]
pub struct LeafClassifier {
    /// ONNX Runtime session (thread-safe)
    session: Arc<Mutex<Session>>,
    input_name: String,
    output_name: String,
    labels: Arc<Vec<String>>,
    input_size: u32,
    layout: InputLayout,
    activation: ScoreActivation,
}

impl std::fmt::Debug for LeafClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeafClassifier")
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("labels", &self.labels)
            .field("input_size", &self.input_size)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl LeafClassifier {
    /// Load the classifier and check that its output width matches the labels
    ///
    /// # Errors
    /// Returns error if:
    /// - Model file not found or invalid
    /// - No labels configured
    /// - A probe inference fails or yields a different number of scores than labels
    pub fn new(config: ClassifierConfig) -> Result<Self> {
        if config.labels.is_empty() {
            anyhow::bail!("Classifier needs at least one label");
        }
        if config.input_size == 0 {
            anyhow::bail!("Classifier input size must be greater than 0");
        }

        info!(
            "Loading leaf classifier from {}",
            config.model_path.display()
        );

        let mut session = load_session(
            &config.model_path,
            config.execution_target,
            config.intra_threads,
        )?;
        let (input_name, output_name) = io_names(&session, "input", "output");

        debug!(
            "Classifier loaded - input: {}, output: {}",
            input_name, output_name
        );

        // Probe with a blank image so a label/model mismatch fails at startup
        {
            let probe = ArrayD::<f32>::zeros(IxDyn(&config.layout.shape(config.input_size)));
            let outputs = session
                .run(ort::inputs![&input_name => Value::from_array(probe)?])
                .context("Classifier probe inference failed")?;
            let output_tensor = outputs
                .get(output_name.as_str())
                .ok_or_else(|| anyhow!("Classifier has no output named {}", output_name))?
                .try_extract_array::<f32>()
                .context("Failed to extract classifier output")?;
            let width = output_tensor.len();
            if width != config.labels.len() {
                anyhow::bail!(
                    "Classifier outputs {} scores (shape {:?}) but {} labels are configured",
                    width,
                    output_tensor.shape(),
                    config.labels.len()
                );
            }
        }

        info!(
            "✅ Leaf classifier ready ({} classes, {}x{} {:?})",
            config.labels.len(),
            config.input_size,
            config.input_size,
            config.layout
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            output_name,
            labels: Arc::new(config.labels),
            input_size: config.input_size,
            layout: config.layout,
            activation: config.activation,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Raw per-class scores for an image
    pub fn scores(&self, image: &DynamicImage) -> Result<Vec<f32>> {
        let input = preprocess_for_classification(image, self.input_size, self.layout)
            .context("Failed to build classifier input")?;
        let input_value = Value::from_array(input).context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("Classifier session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context("Classification inference failed")?;

        let output_tensor = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| anyhow!("Classifier has no output named {}", self.output_name))?
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;

        let scores: Vec<f32> = output_tensor.iter().copied().collect();
        Ok(scores)
    }
}

impl Classify for LeafClassifier {
    fn classify(&self, image: &DynamicImage) -> Result<Classification> {
        let scores = self.scores(image)?;
        let classification = classification_from_scores(scores, &self.labels, self.activation)?;
        debug!(
            "Classified as {} ({:.4})",
            classification.label, classification.confidence
        );
        Ok(classification)
    }
}
