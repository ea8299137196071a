//! Rate limiting middleware backed by the Redis result backend.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use crate::api::AppState;

/// Rate limit error response
#[derive(Debug)]
pub struct RateLimitError {
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&self.retry_after.to_string()) {
            headers.insert("Retry-After", value);
        }
        headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));

        (
            StatusCode::TOO_MANY_REQUESTS,
            headers,
            "Too many requests. Please try again later.",
        )
            .into_response()
    }
}

/// Extract client identifier for rate limiting.
/// Uses X-Forwarded-For header if behind proxy, otherwise uses connection IP.
fn get_client_identifier(request: &Request) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
    {
        // First IP in the chain is the original client
        if let Some(ip) = forwarded.split(',').next() {
            return ip.trim().to_string();
        }
    }

    if let Some(real_ip) = request
        .headers()
        .get("X-Real-IP")
        .and_then(|h| h.to_str().ok())
    {
        return real_ip.to_string();
    }

    if let Some(connect_info) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return connect_info.0.ip().to_string();
    }

    "unknown".to_string()
}

/// Long-poll rate limiting middleware.
///
/// Counts requests per client against the configured window. Fails closed:
/// when the backend is unreachable the request is denied rather than let
/// through uncounted.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    let client_id = get_client_identifier(&request);
    let key = format!("long_poll:{}", client_id);
    let max_requests = state.settings.rate_limit_requests;
    let window_secs = state.settings.rate_limit_window_secs;

    let (count, allowed) = match state
        .limiter
        .check_rate_limit(&key, max_requests, window_secs)
        .await
    {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "Rate limit check failed - denying request");
            return Err(RateLimitError {
                retry_after: window_secs,
            });
        }
    };

    if !allowed {
        tracing::warn!(client = %client_id, count, "Rate limit exceeded");
        return Err(RateLimitError {
            retry_after: window_secs,
        });
    }

    let mut response = next.run(request).await;

    let remaining = max_requests.saturating_sub(count);
    if let Ok(value) = HeaderValue::from_str(&max_requests.to_string()) {
        response.headers_mut().insert("X-RateLimit-Limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&remaining.to_string()) {
        response
            .headers_mut()
            .insert("X-RateLimit-Remaining", value);
    }

    Ok(response)
}
