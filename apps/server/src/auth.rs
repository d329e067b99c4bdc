//! Admin authentication and request metadata.
//!
//! Admin routes require `Authorization: Bearer <server.admin_token>`.
//! Without a configured token they answer 503.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// Rejects admin requests without the configured bearer token.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.config.server.admin_token.as_deref() else {
        return Err(ApiError::Unavailable(
            "Admin access is not configured".to_string(),
        ));
    };

    let provided = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    match provided {
        Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => {
            Ok(next.run(req).await)
        }
        _ => {
            warn!(
                path = %req.uri().path(),
                ip = ?extract_client_ip(req.headers().get("x-forwarded-for").and_then(|v| v.to_str().ok())),
                "Rejected admin request"
            );
            Err(ApiError::Unauthorized("Unauthorized".to_string()))
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// First address of an `X-Forwarded-For` chain.
///
/// Spoofable; only stored with click events, never used for access control.
pub fn extract_client_ip(forwarded_for: Option<&str>) -> Option<String> {
    forwarded_for
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Visitor details recorded with a click.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

impl ClientInfo {
    fn from_headers(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        let text = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .filter(|v| !v.is_empty())
        };

        ClientInfo {
            ip: extract_client_ip(headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()))
                .or_else(|| peer.map(|addr| addr.ip().to_string())),
            user_agent: text(header::USER_AGENT.as_str()),
            referrer: text(header::REFERER.as_str()),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientInfo::from_headers(&parts.headers, peer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_client_ip() {
        assert_eq!(
            extract_client_ip(Some("203.0.113.50, 70.41.3.18")),
            Some("203.0.113.50".to_string())
        );
        assert_eq!(extract_client_ip(Some("  10.0.0.1 ")), Some("10.0.0.1".to_string()));
        assert_eq!(extract_client_ip(Some("")), None);
        assert_eq!(extract_client_ip(None), None);
    }

    #[test]
    fn test_client_info_falls_back_to_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));
        let peer: SocketAddr = "192.0.2.7:50123".parse().unwrap();

        let info = ClientInfo::from_headers(&headers, Some(peer));
        assert_eq!(info.ip.as_deref(), Some("192.0.2.7"));
        assert_eq!(info.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert!(info.referrer.is_none());

        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.1"));
        let info = ClientInfo::from_headers(&headers, Some(peer));
        assert_eq!(info.ip.as_deref(), Some("198.51.100.1"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret-token", b"secret-token"));
        assert!(!constant_time_eq(b"secret-token", b"secret-tokeX"));
        assert!(!constant_time_eq(b"short", b"longer"));
    }
}
