use std::{net::TcpListener, sync::Arc};

use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use log::info;

use crate::{
    config::Config,
    error::{ApiError, Result},
    routes::{configure, not_found, security_headers},
    services::{GeminiNoteExtractor, RecommendationService},
};

const CORS_MAX_AGE_SECS: usize = 3600;

/// CORS policy restricted to the configured origins.
pub fn cors(origins: &[String]) -> Cors {
    origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
        .max_age(CORS_MAX_AGE_SECS)
}

pub struct Application {
    port: u16,
    host: String,
    config: Config,
}

impl Application {
    /// Create a new application instance
    pub fn new(config: &Config) -> Self {
        Self {
            port: config.port,
            host: config.host.clone(),
            config: config.clone(),
        }
    }

    /// Loads every model, then binds and serves.
    pub async fn run(&self) -> Result<()> {
        let service = self.load_service().await?;

        let bind_address = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&bind_address)?;
        info!("Starting server at http://{}", bind_address);

        self.run_with_listener(listener, service).await
    }

    /// Builds the recommendation service from the configured artifacts.
    pub async fn load_service(&self) -> Result<web::Data<RecommendationService>> {
        let extractor = GeminiNoteExtractor::from_config(&self.config)?;
        let paths = self.config.artifact_paths();

        // Model loading is blocking file IO and matrix work
        let service = web::block(move || {
            RecommendationService::from_artifacts(&paths, Arc::new(extractor))
        })
        .await
        .map_err(|e| ApiError::InternalError(format!("Startup task failed: {}", e)))??;

        Ok(web::Data::new(service))
    }

    /// Serves an already-built service on `listener`.
    /// Tests pass a listener bound to a random port.
    pub async fn run_with_listener(
        &self,
        listener: TcpListener,
        recommendation_service: web::Data<RecommendationService>,
    ) -> Result<()> {
        let origins = self.config.cors_origins();
        info!("CORS origins: {:?}", origins);

        let mut server = HttpServer::new(move || {
            App::new()
                .wrap(security_headers())
                .wrap(cors(&origins))
                .wrap(Logger::default())
                .app_data(recommendation_service.clone())
                .configure(configure)
                .default_service(web::route().to(not_found))
        });
        if let Some(workers) = self.config.workers {
            server = server.workers(workers);
        }

        server.listen(listener)?.run().await?;

        Ok(())
    }
}
