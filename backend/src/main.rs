mod config;
mod inference;
mod prediction;
mod routes;
mod storage;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use config::{AppConfig, ConfigError};
use prediction::prediction_service::PredictionService;
use routes::configure_routes;
use std::env;
use std::sync::Arc;

fn startup_error(e: ConfigError) -> std::io::Error {
    log::error!("Startup failed: {}", e);
    std::io::Error::other(e.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::load().map_err(startup_error)?;

    storage::scratch::ensure_scratch_dir(&config.scratch_dir)
        .map_err(|e| startup_error(ConfigError::ScratchDir(e)))?;

    let classifier = inference::load_classifier(&config).map_err(startup_error)?;
    let service = PredictionService::new(
        Arc::new(classifier),
        config.scratch_dir.clone(),
        config.max_upload_bytes,
    );
    let service = web::Data::new(service);

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(service.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
