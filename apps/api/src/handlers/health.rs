use actix_web::{get, HttpResponse};

use crate::models::HealthResponse;

pub const SERVICE_NAME: &str = "perfume-recommendation-api";

#[get("/health")]
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
