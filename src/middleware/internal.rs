use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::ApiError;

pub const INTERNAL_KEY_HEADER: &str = "x-internal-key";

/// Guards service-to-service routes. Open when no key is configured.
pub async fn internal_key_middleware(
    State(config): State<Arc<AppConfig>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = &config.security.internal_api_key {
        let presented = request
            .headers()
            .get(INTERNAL_KEY_HEADER)
            .and_then(|v| v.to_str().ok());

        if presented != Some(expected.as_str()) {
            tracing::warn!("Rejected internal call to {}", request.uri().path());
            return Err(ApiError::unauthorized("Invalid internal API key"));
        }
    }

    Ok(next.run(request).await)
}
