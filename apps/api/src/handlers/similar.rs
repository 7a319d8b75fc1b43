use actix_web::{
    web::{self, Json},
    HttpResponse,
};

use super::log_failure;
use crate::{
    error::ApiError,
    models::{SimilarRequest, DEFAULT_SIMILAR_LIMIT},
    services::RecommendationService,
};

pub fn similar_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/similar").route(web::post().to(similar_perfumes)));
}

/// Perfumes whose notes resemble a named catalog perfume.
pub async fn similar_perfumes(
    body: Json<SimilarRequest>,
    recommendation_service: web::Data<RecommendationService>,
) -> Result<HttpResponse, ApiError> {
    let limit = body.limit.unwrap_or(DEFAULT_SIMILAR_LIMIT);
    let response = recommendation_service
        .similar(&body.perfume, limit)
        .map_err(log_failure)?;

    Ok(HttpResponse::Ok().json(response))
}

#[cfg(test)]
mod tests {
    use crate::{
        error::ErrorResponse,
        models::SimilarResponse,
        test_support::{service, test_app, StubExtractor},
    };
    use actix_web::{http::StatusCode, test};
    use serde_json::json;

    #[actix_web::test]
    async fn test_similar_success() {
        let app = test_app!(service(StubExtractor::citrus()));
        let req = test::TestRequest::post()
            .uri("/similar")
            .set_json(json!({ "perfume": "citrus dawn" }))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: SimilarResponse = test::read_body_json(resp).await;
        assert_eq!(body.input_perfume, "citrus dawn");
        assert_eq!(body.total_found, body.recommendations.len());
        assert_eq!(body.recommendations[0].id, "P8");
    }

    #[actix_web::test]
    async fn test_similar_unknown_perfume_is_404() {
        let app = test_app!(service(StubExtractor::citrus()));
        let req = test::TestRequest::post()
            .uri("/similar")
            .set_json(json!({ "perfume": "Nope", "limit": 3 }))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: ErrorResponse = test::read_body_json(resp).await;
        assert!(body.error.contains("Nope"));
    }

    #[actix_web::test]
    async fn test_similar_missing_name_is_400() {
        let app = test_app!(service(StubExtractor::citrus()));
        let req = test::TestRequest::post()
            .uri("/similar")
            .set_json(json!({}))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
