pub mod health;
pub mod recommendations;
pub mod similar;

use tracing::{error, warn};

use crate::error::ApiError;

pub use health::health_check;
pub use recommendations::recommendations_config;
pub use similar::similar_config;

/// Logs a request failure at the level its kind deserves and hands it back.
fn log_failure(err: ApiError) -> ApiError {
    match &err {
        ApiError::InvalidInput(_) | ApiError::NotFound(_) => warn!("Request rejected: {}", err),
        _ => error!("Request failed: {}", err),
    }
    err
}
