//! Middleware for handling IP injection

use std::net::SocketAddr;

use axum::{
    extract::ConnectInfo,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::debug;

// Normalize the effective client IP into X-Forwarded-For so rate limiting
// keys on it uniformly: CF-Connecting-IP and an existing X-Forwarded-For
// take precedence, otherwise the socket address is injected.
pub async fn inject_client_ip(mut req: Request<axum::body::Body>, next: Next) -> Response {
    let xff_name: HeaderName = HeaderName::from_static("x-forwarded-for");

    let already_attributed =
        req.headers().contains_key("cf-connecting-ip") || req.headers().contains_key(&xff_name);

    if !already_attributed {
        if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>().copied()
        {
            if let Ok(value) = HeaderValue::from_str(&addr.ip().to_string()) {
                req.headers_mut().insert(xff_name, value);
            }
            debug!("client_ip_source=socket ip={}", addr.ip());
        } else {
            debug!("client_ip_source=unavailable");
        }
    }

    next.run(req).await
}
