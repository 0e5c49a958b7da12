// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Prediction endpoint tests for POST /predict and POST /v1/predict
//!
//! Models are stubbed so these run without ONNX files; the router, multipart
//! parsing, decoding, and error mapping are the real thing.

use axum::http::StatusCode;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;
use tower::util::ServiceExt;

use super::common::*;

#[cfg(test)]
mod multipart_tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_returns_class_and_confidence() {
        let classifier = Arc::new(StubClassifier::new("TomatSehat", 0.93));
        let app = app(direct_state(classifier.clone()));

        let response = app.oneshot(upload_request(&png_bytes(32, 24))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["class"], "TomatSehat");
        assert!((json["confidence"].as_f64().unwrap() - 0.93).abs() < 1e-6);
        assert!(json.get("detection").is_none());
        assert_eq!(classifier.seen.lock().unwrap().as_slice(), &[(32, 24)]);
    }

    #[tokio::test]
    async fn test_missing_image_field() {
        let app = app(direct_state(Arc::new(StubClassifier::new("x", 1.0))));
        let body = multipart_body(&[Part {
            name: "photo",
            filename: Some("leaf.png"),
            data: &png_bytes(4, 4),
        }]);

        let response = app.oneshot(multipart_request("/predict", body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "No image uploaded");
    }

    #[tokio::test]
    async fn test_empty_form() {
        let app = app(direct_state(Arc::new(StubClassifier::new("x", 1.0))));

        let response = app
            .oneshot(multipart_request("/predict", multipart_body(&[])))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "No image uploaded");
    }

    #[tokio::test]
    async fn test_image_text_field_is_not_an_upload() {
        let app = app(direct_state(Arc::new(StubClassifier::new("x", 1.0))));
        let body = multipart_body(&[Part {
            name: "image",
            filename: None,
            data: b"not a file",
        }]);

        let response = app.oneshot(multipart_request("/predict", body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "No image uploaded");
    }

    #[tokio::test]
    async fn test_empty_filename() {
        let app = app(direct_state(Arc::new(StubClassifier::new("x", 1.0))));
        let body = multipart_body(&[Part {
            name: "image",
            filename: Some(""),
            data: b"",
        }]);

        let response = app.oneshot(multipart_request("/predict", body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "No file selected");
    }

    #[tokio::test]
    async fn test_other_fields_ignored() {
        let app = app(direct_state(Arc::new(StubClassifier::new("KentangSehat", 0.7))));
        let png = png_bytes(8, 8);
        let body = multipart_body(&[
            Part {
                name: "note",
                filename: None,
                data: b"from the field",
            },
            Part {
                name: "image",
                filename: Some("leaf.png"),
                data: &png,
            },
        ]);

        let response = app.oneshot(multipart_request("/predict", body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["class"], "KentangSehat");
    }

    #[tokio::test]
    async fn test_undecodable_upload_is_500() {
        let classifier = Arc::new(StubClassifier::new("x", 1.0));
        let app = app(direct_state(classifier.clone()));

        let response = app
            .oneshot(upload_request(b"definitely not an image"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert!(!json["error"].as_str().unwrap().is_empty());
        assert!(classifier.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_upload_is_500() {
        let app = app(direct_state(Arc::new(StubClassifier::new("x", 1.0))));

        let response = app.oneshot(upload_request(b"")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_inference_failure_is_500() {
        let app = app(direct_state(Arc::new(StubClassifier::failing())));

        let response = app.oneshot(upload_request(&png_bytes(8, 8))).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("session run failed"));
    }

    #[tokio::test]
    async fn test_malformed_multipart_is_400() {
        let app = app(direct_state(Arc::new(StubClassifier::new("x", 1.0))));

        let response = app
            .oneshot(multipart_request("/predict", b"garbage without boundaries".to_vec()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected() {
        let app = app(direct_state(Arc::new(StubClassifier::new("x", 1.0))));
        let huge = vec![0u8; 2 * 1024 * 1024];

        let response = app.oneshot(upload_request(&huge)).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}

#[cfg(test)]
mod detect_mode_tests {
    use super::*;

    #[tokio::test]
    async fn test_classifies_first_detection_crop() {
        let classifier = Arc::new(StubClassifier::new("TomatSpiderMite", 0.81));
        let detections = vec![
            leaf_box(10.0, 5.0, 20.0, 15.0, 0.9),
            leaf_box(0.0, 0.0, 60.0, 40.0, 0.6),
        ];
        let app = app(detect_state(classifier.clone(), detections, false));

        let response = app.oneshot(upload_request(&png_bytes(64, 48))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["class"], "TomatSpiderMite");
        assert_eq!(json["detection"]["boundingBox"]["x"], 10);
        assert_eq!(json["detection"]["boundingBox"]["width"], 20);
        assert_eq!(classifier.seen.lock().unwrap().as_slice(), &[(20, 15)]);
    }

    #[tokio::test]
    async fn test_no_detection_is_422() {
        let classifier = Arc::new(StubClassifier::new("x", 1.0));
        let app = app(detect_state(classifier.clone(), vec![], false));

        let response = app.oneshot(upload_request(&png_bytes(16, 16))).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["error"], "No leaf detected in image");
        assert!(classifier.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_detection_falls_back_to_full_image() {
        let classifier = Arc::new(StubClassifier::new("KentangLateBlight", 0.66));
        let app = app(detect_state(classifier.clone(), vec![], true));

        let response = app.oneshot(upload_request(&png_bytes(16, 12))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["class"], "KentangLateBlight");
        assert!(json.get("detection").is_none());
        assert_eq!(classifier.seen.lock().unwrap().as_slice(), &[(16, 12)]);
    }
}

#[cfg(test)]
mod json_tests {
    use super::*;

    #[tokio::test]
    async fn test_base64_prediction() {
        let app = app(direct_state(Arc::new(StubClassifier::new("TomatWhiteFly", 0.55))));
        let encoded = STANDARD.encode(png_bytes(10, 10));

        let response = app
            .oneshot(json_request(
                "/v1/predict",
                serde_json::json!({ "image": encoded }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["class"], "TomatWhiteFly");
    }

    #[tokio::test]
    async fn test_data_url_accepted() {
        let app = app(direct_state(Arc::new(StubClassifier::new("TomatSehat", 0.9))));
        let encoded = format!("data:image/png;base64,{}", STANDARD.encode(png_bytes(6, 6)));

        let response = app
            .oneshot(json_request(
                "/v1/predict",
                serde_json::json!({ "image": encoded }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_image_is_validation_error() {
        let app = app(direct_state(Arc::new(StubClassifier::new("x", 1.0))));

        let response = app
            .oneshot(json_request("/v1/predict", serde_json::json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["field"], "image");
        assert_eq!(json["errorType"], "validation_error");
    }

    #[tokio::test]
    async fn test_invalid_base64_is_500() {
        let app = app(direct_state(Arc::new(StubClassifier::new("x", 1.0))));

        let response = app
            .oneshot(json_request(
                "/v1/predict",
                serde_json::json!({ "image": "!!!not-base64!!!" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let app = app(direct_state(Arc::new(StubClassifier::new("x", 1.0))));
        let request = axum::http::Request::builder()
            .method(axum::http::Method::POST)
            .uri("/v1/predict")
            .header(axum::http::header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from("{\"image\": "))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["errorType"], "invalid_request");
    }
}
