pub mod error;
pub mod models;
pub mod prediction_service;
