//! Long polling handlers.

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::HeaderMap,
    response::Json,
    routing::post,
    Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::api::AppState;
use crate::errors::{AppError, AppResult};
use crate::services::PollResponse;

/// Long poll query parameters
#[derive(Debug, Deserialize, IntoParams)]
pub struct PollQuery {
    /// Poll budget in seconds; defaults to the configured timeout
    pub timeout: Option<u64>,
}

/// Create long polling routes
pub fn polling_routes() -> Router<AppState> {
    Router::new().route("/:job_id", post(long_poll))
}

/// Identify the caller for connection accounting.
///
/// Proxy headers win over the socket address so per-client limits apply to
/// the original client, not the proxy.
fn client_identifier(headers: &HeaderMap, addr: Option<&ConnectInfo<SocketAddr>>) -> String {
    if let Some(forwarded) = headers.get("X-Forwarded-For").and_then(|h| h.to_str().ok()) {
        if let Some(ip) = forwarded.split(',').next() {
            let ip = ip.trim();
            if !ip.is_empty() {
                return ip.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("X-Real-IP").and_then(|h| h.to_str().ok()) {
        return real_ip.to_string();
    }

    addr.map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Wait for a job to finish
#[utoipa::path(
    post,
    path = "/api/long-poll/{job_id}",
    tag = "Polling",
    params(
        ("job_id" = Uuid, Path, description = "Job id to wait on"),
        PollQuery,
    ),
    responses(
        (status = 200, description = "Terminal job state, or {\"status\": \"timeout\"}"),
        (status = 400, description = "Invalid timeout"),
        (status = 404, description = "Job not found"),
        (status = 429, description = "Connection or rate limit exceeded")
    )
)]
pub async fn long_poll(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Query(query): Query<PollQuery>,
    headers: HeaderMap,
    addr: Option<ConnectInfo<SocketAddr>>,
) -> AppResult<Json<PollResponse>> {
    let timeout = match query.timeout {
        Some(0) => {
            return Err(AppError::validation("timeout must be at least 1 second"));
        }
        Some(secs) => Duration::from_secs(secs),
        None => state.settings.default_poll_timeout,
    };

    let client = client_identifier(&headers, addr.as_ref());
    let response = state.polling.poll_for_results(job_id, timeout, &client).await?;

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_header_wins_over_socket_address() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Forwarded-For",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        let addr = ConnectInfo("127.0.0.1:9999".parse::<SocketAddr>().unwrap());

        assert_eq!(client_identifier(&headers, Some(&addr)), "203.0.113.7");
    }

    #[test]
    fn real_ip_header_is_second_choice() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Real-IP", HeaderValue::from_static("198.51.100.2"));

        assert_eq!(client_identifier(&headers, None), "198.51.100.2");
    }

    #[test]
    fn unknown_when_nothing_identifies_the_client() {
        assert_eq!(client_identifier(&HeaderMap::new(), None), "unknown");
    }
}
