//! Client IP extraction.

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Request};

/// Extract the client IP address.
///
/// With `ip_header` set (running behind a proxy), the first address in that
/// header is used and a missing or unparsable header yields `None`; the
/// socket address is NOT used as a fallback. Without it, the socket address
/// from `ConnectInfo` is used.
pub fn extract_client_ip(request: &Request, ip_header: Option<&str>) -> Option<String> {
    match ip_header {
        Some(name) => {
            let value = request.headers().get(name)?.to_str().ok()?;
            let first = value.split(',').next()?.trim();
            first.parse::<IpAddr>().ok().map(|ip| ip.to_string())
        }
        None => request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string()),
    }
}
