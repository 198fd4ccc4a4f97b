use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use ndarray::{Array2, ArrayView4};
use pneumoscan::inference::InferenceService;
use pneumoscan::model::{Classifier, ClassifierAdapter, InferenceError};
use pneumoscan::routes::{configure_routes, cors, UploadLimit};
use pneumoscan::storage::staging::Stager;
use serde_json::json;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const BOUNDARY: &str = "----pneumoscan-test-boundary";
const LIMIT: usize = 1024 * 1024;

struct Fixed {
    score: f32,
    calls: AtomicUsize,
}

impl Fixed {
    fn new(score: f32) -> Arc<Self> {
        Arc::new(Self {
            score,
            calls: AtomicUsize::new(0),
        })
    }
}

impl Classifier for Fixed {
    fn predict(&self, _batch: ArrayView4<'_, f32>) -> Result<Array2<f32>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Array2::from_elem((1, 1), self.score))
    }
}

struct Failing;

impl Classifier for Failing {
    fn predict(&self, _batch: ArrayView4<'_, f32>) -> Result<Array2<f32>, InferenceError> {
        Err(InferenceError::Backend("model weights unavailable".to_string()))
    }
}

/// Echoes the top-left pixel back as the score.
struct Echo;

impl Classifier for Echo {
    fn predict(&self, batch: ArrayView4<'_, f32>) -> Result<Array2<f32>, InferenceError> {
        Ok(Array2::from_elem((1, 1), batch[[0, 0, 0, 0]]))
    }
}

fn service(classifier: Arc<dyn Classifier>, staging: &Path) -> InferenceService {
    InferenceService::new(
        ClassifierAdapter::new(classifier),
        Stager::new(staging).unwrap(),
    )
}

macro_rules! init_app {
    ($service:expr) => {
        init_app!($service, LIMIT, None::<PathBuf>)
    };
    ($service:expr, $limit:expr, $frontend:expr) => {{
        let frontend: Option<PathBuf> = $frontend;
        test::init_service(
            App::new()
                .wrap(cors())
                .app_data(web::Data::new($service))
                .app_data(web::Data::new(UploadLimit($limit)))
                .configure(move |cfg| configure_routes(cfg, frontend)),
        )
        .await
    }};
}

fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), format).unwrap();
    buffer
}

fn xray_jpeg() -> Vec<u8> {
    let img = GrayImage::from_fn(224, 224, |x, y| Luma([((x + y) % 256) as u8]));
    encode(DynamicImage::ImageLuma8(img), ImageFormat::Jpeg)
}

fn flat_png(value: u8) -> Vec<u8> {
    let img = GrayImage::from_pixel(32, 32, Luma([value]));
    encode(DynamicImage::ImageLuma8(img), ImageFormat::Png)
}

fn multipart(field: &str, filename: &str, bytes: &[u8]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

fn upload_request(uri: &str, field: &str, bytes: &[u8]) -> test::TestRequest {
    let (content_type, body) = multipart(field, "chest.jpeg", bytes);
    test::TestRequest::post()
        .uri(uri)
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
}

fn staged_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[actix_web::test]
async fn test_pneumonia_prediction_for_valid_jpeg() {
    let staging = tempfile::tempdir().unwrap();
    let classifier = Fixed::new(0.83);
    let app = init_app!(service(classifier.clone(), staging.path()));

    let req = upload_request("/predict/", "file", &xray_jpeg()).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({"prediction": "Pneumonia Detected", "confidence": 0.83})
    );
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    assert_eq!(staged_files(staging.path()), 0);
}

#[actix_web::test]
async fn test_score_at_threshold_is_normal() {
    let staging = tempfile::tempdir().unwrap();
    let app = init_app!(service(Fixed::new(0.5), staging.path()));

    let req = upload_request("/predict/", "file", &xray_jpeg()).to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body, json!({"prediction": "Normal Lung", "confidence": 0.5}));
}

#[actix_web::test]
async fn test_normal_label_still_reports_pneumonia_probability() {
    let staging = tempfile::tempdir().unwrap();
    let app = init_app!(service(Fixed::new(0.125), staging.path()));

    let req = upload_request("/predict", "file", &xray_jpeg()).to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body, json!({"prediction": "Normal Lung", "confidence": 0.125}));
}

#[actix_web::test]
async fn test_non_image_upload_is_rejected_without_inference() {
    let staging = tempfile::tempdir().unwrap();
    let classifier = Fixed::new(0.9);
    let app = init_app!(service(classifier.clone(), staging.path()));

    let req = upload_request("/predict/", "file", b"0123456789").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "Invalid image format"}));
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    assert_eq!(staged_files(staging.path()), 0);
}

#[actix_web::test]
async fn test_classifier_failure_returns_message() {
    let staging = tempfile::tempdir().unwrap();
    let app = init_app!(service(Arc::new(Failing), staging.path()));

    let req = upload_request("/predict/", "file", &xray_jpeg()).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "model weights unavailable"}));
    assert_eq!(staged_files(staging.path()), 0);
}

#[actix_web::test]
async fn test_missing_file_field() {
    let staging = tempfile::tempdir().unwrap();
    let app = init_app!(service(Fixed::new(0.9), staging.path()));

    let req = upload_request("/predict/", "image", &xray_jpeg()).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "No file uploaded"}));
}

#[actix_web::test]
async fn test_non_multipart_body_keeps_error_envelope() {
    let staging = tempfile::tempdir().unwrap();
    let app = init_app!(service(Fixed::new(0.9), staging.path()));

    let req = test::TestRequest::post()
        .uri("/predict/")
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload(r#"{"image": "abc"}"#)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("Malformed multipart upload"), "{message}");
}

#[actix_web::test]
async fn test_oversized_upload_is_refused_before_staging() {
    let staging = tempfile::tempdir().unwrap();
    let classifier = Fixed::new(0.9);
    let app = init_app!(service(classifier.clone(), staging.path()), 1024, None);

    let req = upload_request("/predict/", "file", &vec![0u8; 4096]).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "Upload exceeds the 1024 byte limit"}));
    assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    assert_eq!(staged_files(staging.path()), 0);
}

#[actix_web::test]
async fn test_concurrent_uploads_get_their_own_answers() {
    let staging = tempfile::tempdir().unwrap();
    let app = init_app!(service(Arc::new(Echo), staging.path()));

    let values: [u8; 6] = [0, 51, 102, 153, 204, 255];
    let requests = values.iter().map(|&v| {
        let req = upload_request("/predict/", "file", &flat_png(v)).to_request();
        test::call_and_read_body_json::<_, _, serde_json::Value>(&app, req)
    });
    let bodies = futures::future::join_all(requests).await;

    for (value, body) in values.iter().zip(bodies) {
        let expected = f64::from(f32::from(*value) / 255.0);
        let got = body["confidence"].as_f64().unwrap();
        assert!((got - expected).abs() < 1e-6, "{value}: {got} vs {expected}");
    }
    assert_eq!(staged_files(staging.path()), 0);
}

#[actix_web::test]
async fn test_health() {
    let staging = tempfile::tempdir().unwrap();
    let app = init_app!(service(Fixed::new(0.1), staging.path()));

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"status": "ok"}));
}

#[actix_web::test]
async fn test_any_origin_is_allowed() {
    let staging = tempfile::tempdir().unwrap();
    let app = init_app!(service(Fixed::new(0.1), staging.path()));

    let req = test::TestRequest::get()
        .uri("/health")
        .insert_header((header::ORIGIN, "http://localhost:3000"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[actix_web::test]
async fn test_frontend_is_served_when_configured() {
    let staging = tempfile::tempdir().unwrap();
    let frontend = tempfile::tempdir().unwrap();
    std::fs::write(frontend.path().join("index.html"), "<h1>Upload an X-ray</h1>").unwrap();

    let app = init_app!(
        service(Fixed::new(0.1), staging.path()),
        LIMIT,
        Some(frontend.path().to_path_buf())
    );

    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"<h1>Upload an X-ray</h1>");

    // API routes still win over the static files.
    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
