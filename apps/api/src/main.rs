use log::info;
use perfume_recommendation_api::{app::Application, config::Config, error::Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Setup logging
    let default_filter = if config.debug {
        "perfume_recommendation_api=debug,actix_web=debug"
    } else {
        "perfume_recommendation_api=info,actix_web=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Configuration loaded: model_dir={}, dataset={}, gemini_model={}",
        config.model_dir.display(),
        config.dataset_file,
        config.gemini_model
    );

    let application = Application::new(&config);
    application.run().await
}
