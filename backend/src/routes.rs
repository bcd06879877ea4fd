use actix_multipart::{Multipart, MultipartError};
use actix_web::{web, HttpResponse};
use futures::{StreamExt, TryStreamExt};
use log::error;
use serde_json::json;
use shared::{PredictionResponse, ServiceInfo};

use crate::inference::model::InferenceError;
use crate::prediction::error::PredictionError;
use crate::prediction::models::UploadedFile;
use crate::prediction::prediction_service::PredictionService;

const FILE_FIELD: &str = "file";

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(index)))
        .service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/labels").route(web::get().to(labels)))
        .service(web::resource("/predict").route(web::post().to(handle_predict)));
}

async fn index(service: web::Data<PredictionService>) -> HttpResponse {
    HttpResponse::Ok().json(ServiceInfo {
        status: "ok".into(),
        message: "Image prediction service is running".into(),
        classes: service.classifier().labels().len(),
    })
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

async fn labels(service: web::Data<PredictionService>) -> HttpResponse {
    HttpResponse::Ok().json(service.classifier().labels().labels())
}

/// Pulls the `file` part out of the multipart body.
///
/// Parts without a `filename` parameter are plain form fields and are skipped,
/// so a text field called `file` still counts as a missing upload. A request
/// that is not multipart at all, or fails before its first part, has no file
/// either.
async fn read_upload(
    payload: &mut Multipart,
    max_bytes: usize,
) -> Result<Option<UploadedFile>, PredictionError> {
    let mut upload: Option<UploadedFile> = None;
    let mut seen_parts = false;

    loop {
        let next = payload.try_next().await;
        let mut field = match next {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(multipart_error(e, seen_parts)),
        };
        seen_parts = true;

        let filename = field
            .content_disposition()
            .filter(|cd| cd.get_name() == Some(FILE_FIELD))
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        let Some(filename) = filename.filter(|_| upload.is_none()) else {
            while let Some(chunk) = field.next().await {
                chunk.map_err(|e| PredictionError::InvalidUpload(e.to_string()))?;
            }
            continue;
        };
        if filename.is_empty() {
            return Err(PredictionError::EmptyFilename);
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| PredictionError::InvalidUpload(e.to_string()))?;
            if bytes.len() + data.len() > max_bytes {
                return Err(PredictionError::UploadTooLarge { limit: max_bytes });
            }
            bytes.extend_from_slice(&data);
        }
        upload = Some(UploadedFile::new(filename, bytes));
    }

    Ok(upload)
}

fn multipart_error(err: MultipartError, seen_parts: bool) -> PredictionError {
    match err {
        MultipartError::ContentTypeMissing | MultipartError::ContentTypeIncompatible => {
            PredictionError::MissingFile
        }
        e if !seen_parts => {
            log::debug!("Request body has no multipart parts: {}", e);
            PredictionError::MissingFile
        }
        e => PredictionError::InvalidUpload(e.to_string()),
    }
}

async fn handle_predict(
    service: web::Data<PredictionService>,
    mut payload: Multipart,
) -> Result<HttpResponse, PredictionError> {
    let upload = read_upload(&mut payload, service.max_upload_bytes()).await?;
    service.validate(upload.as_ref())?;

    let service = service.into_inner();
    let result = web::block(move || service.predict(upload))
        .await
        .map_err(|e| {
            error!("Prediction task did not complete: {}", e);
            PredictionError::Inference(InferenceError::Backend(e.to_string()))
        })??;

    Ok(HttpResponse::Ok().json(PredictionResponse::from(result)))
}
