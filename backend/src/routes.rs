use actix_cors::Cors;
use actix_files::Files;
use actix_multipart::{Multipart, MultipartError};
use actix_web::{http::header, web, HttpRequest, HttpResponse};
use futures::TryStreamExt;
use shared::{HealthResponse, PredictionResponse};
use std::path::PathBuf;

use crate::error::ServeError;
use crate::inference::{InferenceService, UploadedImage};

/// Multipart field that carries the image.
pub const UPLOAD_FIELD: &str = "file";

/// Largest accepted upload, in bytes.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimit(pub usize);

pub fn configure_routes(cfg: &mut web::ServiceConfig, frontend_dir: Option<PathBuf>) {
    cfg.service(web::resource("/predict/").route(web::post().to(predict)))
        .service(web::resource("/predict").route(web::post().to(predict)))
        .service(web::resource("/health").route(web::get().to(health)));

    if let Some(dir) = frontend_dir {
        cfg.service(Files::new("/", dir).index_file("index.html"));
    }
}

/// Any origin may call the API; the browser frontend is often served from
/// somewhere else.
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
        .max_age(3600)
}

async fn predict(
    service: web::Data<InferenceService>,
    limit: web::Data<UploadLimit>,
    req: HttpRequest,
    payload: web::Payload,
) -> Result<HttpResponse, ServeError> {
    let mut multipart = Multipart::new(req.headers(), payload);
    let upload = read_upload(&mut multipart, limit.0).await.map_err(|e| {
        log::warn!("Rejected upload: {}", e);
        e
    })?;

    let result = service.handle(upload).await?;
    Ok(HttpResponse::Ok().json(PredictionResponse::from(result)))
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Pulls the `file` field out of the form. Other fields are skipped. The
/// body is buffered in memory and cut off as soon as it passes `limit`.
async fn read_upload(multipart: &mut Multipart, limit: usize) -> Result<UploadedImage, ServeError> {
    while let Some(mut field) = multipart.try_next().await.map_err(malformed)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_owned);

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(malformed)? {
            if bytes.len() + chunk.len() > limit {
                return Err(ServeError::PayloadTooLarge { limit });
            }
            bytes.extend_from_slice(&chunk);
        }

        return Ok(UploadedImage { bytes, filename });
    }

    Err(ServeError::ClientInput("No file uploaded".to_string()))
}

fn malformed(err: MultipartError) -> ServeError {
    ServeError::ClientInput(format!("Malformed multipart upload: {}", err))
}
