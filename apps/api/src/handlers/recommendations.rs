use actix_web::{
    web::{self, Json},
    HttpResponse,
};
use tracing::info;

use super::log_failure;
use crate::{
    error::ApiError,
    models::{RawRecommendationRequest, RecommendationRequest},
    services::RecommendationService,
};

pub fn recommendations_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/recommend").route(web::post().to(recommend)));
}

/// Recommends catalog perfumes for a free-text description, a price band and
/// the categorical preferences.
pub async fn recommend(
    body: Json<RawRecommendationRequest>,
    recommendation_service: web::Data<RecommendationService>,
) -> Result<HttpResponse, ApiError> {
    let request = RecommendationRequest::try_from(body.into_inner()).map_err(log_failure)?;

    info!(
        gender = request.gender(),
        situation = request.situation(),
        concentrate = request.concentrate(),
        min_price = request.min_price(),
        max_price = request.max_price(),
        top_k = request.top_k(),
        "Recommendation request"
    );

    let result = recommendation_service
        .recommend(&request)
        .await
        .map_err(log_failure)?;

    Ok(HttpResponse::Ok().json(result))
}
