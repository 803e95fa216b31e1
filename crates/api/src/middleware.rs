use std::time::Instant;

use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{info, warn};

use storeops_core::UserId;

use crate::app::errors::json_error;
use crate::context::ActorContext;

pub const ACTOR_HEADER: &str = "x-actor-id";

/// Require an `X-Actor-Id` UUID and expose it as [`ActorContext`].
pub async fn actor_middleware(mut req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let actor_id = match extract_actor(req.headers()) {
        Ok(id) => id,
        Err(message) => return json_error(StatusCode::UNAUTHORIZED, "unauthorized", message),
    };

    req.extensions_mut().insert(ActorContext::new(actor_id));
    next.run(req).await
}

/// One log line per request.
pub async fn request_log(req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if response.status().is_server_error() {
        warn!(%method, path, status, elapsed_ms, "request handled");
    } else {
        info!(%method, path, status, elapsed_ms, "request handled");
    }
    response
}

fn extract_actor(headers: &HeaderMap) -> Result<UserId, &'static str> {
    let header = headers.get(ACTOR_HEADER).ok_or("missing X-Actor-Id header")?;
    let value = header.to_str().map_err(|_| "X-Actor-Id is not valid text")?;
    value
        .trim()
        .parse::<UserId>()
        .map_err(|_| "X-Actor-Id must be a UUID")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn actor_header_must_be_a_uuid() {
        let mut headers = HeaderMap::new();
        assert!(extract_actor(&headers).is_err());

        headers.insert(ACTOR_HEADER, HeaderValue::from_static("cashier-7"));
        assert!(extract_actor(&headers).is_err());

        let id = UserId::new();
        headers.insert(ACTOR_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        assert_eq!(extract_actor(&headers), Ok(id));
    }
}
