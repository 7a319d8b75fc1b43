use actix_web::{middleware::DefaultHeaders, web, HttpResponse};

use crate::{
    error::{ApiError, ErrorResponse},
    handlers::{health_check, recommendations_config, similar_config},
};

/// Maximum accepted JSON body, in bytes.
const JSON_LIMIT: usize = 64 * 1024;

/// Configure all routes for the API
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(health_check)
        .configure(recommendations_config)
        .configure(similar_config);
}

/// JSON extractor settings; unparseable bodies become validation errors.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_LIMIT)
        .error_handler(|err, _req| {
            ApiError::InvalidInput(format!("Invalid JSON input: {}", err)).into()
        })
}

/// Headers added to every response.
pub fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-Frame-Options", "DENY"))
        .add(("X-XSS-Protection", "1; mode=block"))
}

/// Fallback for unknown paths.
pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse::new("Endpoint not found"))
}
