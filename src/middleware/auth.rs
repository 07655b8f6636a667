use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::AppError;

/// Bearer-token check for `/api` routes. The browser upload form, downloads
/// and health probes stay open, and with no keys configured nothing is checked.
pub async fn auth_middleware(headers: HeaderMap, request: Request, next: Next) -> Result<Response, AppError> {
    let path = request.uri().path();
    let method = request.method();

    if !path.starts_with("/api/") || !Config::auth_enabled() {
        return Ok(next.run(request).await);
    }

    debug!("Authenticating request: {} {}", method, path);

    let auth_header = match headers.get("authorization") {
        Some(header) => match header.to_str() {
            Ok(value) => value,
            Err(_) => {
                warn!("Invalid Authorization header format for {} {}", method, path);
                return Err(AppError::InvalidApiKey);
            }
        },
        None => {
            warn!("Missing Authorization header for {} {}", method, path);
            return Err(AppError::InvalidApiKey);
        }
    };

    let token = match auth_header.strip_prefix("Bearer ") {
        Some(token) if !token.is_empty() => token,
        _ => {
            warn!("Authorization header is not a non-empty Bearer token for {} {}", method, path);
            return Err(AppError::InvalidApiKey);
        }
    };

    if !Config::validate_api_key(token) {
        let prefix: String = token.chars().take(8).collect();
        warn!("Invalid API key attempted for {} {}: {}", method, path, prefix);
        return Err(AppError::InvalidApiKey);
    }

    debug!("Valid API key authenticated for {} {}", method, path);
    Ok(next.run(request).await)
}
