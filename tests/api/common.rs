// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Shared fixtures for API tests: stub models, encoded images, multipart bodies

use anyhow::{anyhow, Result};
use axum::{
    body::Body,
    http::{header, Method, Request},
    Router,
};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use leaf_classifier_node::{
    api::http_server::{create_router, AppState},
    vision::{Classification, Classify, Detect, Detection, LeafPipeline, VisionModelInfo},
};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

pub const BOUNDARY: &str = "leaf-test-boundary";

/// Classifier returning a fixed label and recording the size of what it saw
pub struct StubClassifier {
    pub label: &'static str,
    pub confidence: f32,
    pub fail: bool,
    pub seen: Mutex<Vec<(u32, u32)>>,
}

impl StubClassifier {
    pub fn new(label: &'static str, confidence: f32) -> Self {
        Self {
            label,
            confidence,
            fail: false,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("unused", 0.0)
        }
    }
}

impl Classify for StubClassifier {
    fn classify(&self, image: &DynamicImage) -> Result<Classification> {
        self.seen.lock().unwrap().push(image.dimensions());
        if self.fail {
            return Err(anyhow!("session run failed"));
        }
        Ok(Classification {
            label: self.label.to_string(),
            class_index: 0,
            confidence: self.confidence,
        })
    }
}

/// Detector returning a fixed set of boxes
pub struct StubDetector {
    pub detections: Vec<Detection>,
}

impl Detect for StubDetector {
    fn detect(&self, _image: &DynamicImage) -> Result<Vec<Detection>> {
        Ok(self.detections.clone())
    }
}

pub fn leaf_box(x: f32, y: f32, width: f32, height: f32, confidence: f32) -> Detection {
    Detection {
        x,
        y,
        width,
        height,
        confidence,
        class_id: 0,
    }
}

pub fn labels() -> Vec<String> {
    leaf_classifier_node::vision::labels::default_labels()
}

pub fn direct_state(classifier: Arc<StubClassifier>) -> AppState {
    let pipeline = LeafPipeline::direct(classifier);
    AppState::new(Arc::new(pipeline), labels(), models(false), 1024 * 1024)
}

pub fn detect_state(
    classifier: Arc<StubClassifier>,
    detections: Vec<Detection>,
    fallback: bool,
) -> AppState {
    let detector = Arc::new(StubDetector { detections });
    let pipeline =
        LeafPipeline::detect_then_classify(classifier, detector).with_fallback_to_full_image(fallback);
    AppState::new(Arc::new(pipeline), labels(), models(true), 1024 * 1024)
}

fn models(with_detector: bool) -> Vec<VisionModelInfo> {
    vec![
        VisionModelInfo {
            name: "leaf-classifier".to_string(),
            model_type: "classifier".to_string(),
            available: true,
        },
        VisionModelInfo {
            name: "leaf-detector".to_string(),
            model_type: "detector".to_string(),
            available: with_detector,
        },
    ]
}

pub fn app(state: AppState) -> Router {
    create_router(state)
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([30, 140, 50]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// One form part: field name, optional filename, content
pub struct Part<'a> {
    pub name: &'a str,
    pub filename: Option<&'a str>,
    pub data: &'a [u8],
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part.filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n",
                    part.name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name)
                    .as_bytes(),
            ),
        }
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn upload_request(data: &[u8]) -> Request<Body> {
    multipart_request(
        "/predict",
        multipart_body(&[Part {
            name: "image",
            filename: Some("leaf.png"),
            data,
        }]),
    )
}

pub fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
