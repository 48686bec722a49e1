// src/utils/evidence.rs

use std::{convert::Infallible, net::SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRef, FromRequestParts, OriginalUri},
    http::{HeaderMap, header, request::Parts},
};

use crate::config::{
    CONFIG_KEY_HASH_HEADER, Config, REQUEST_HASH_HEADER, SESSION_COOKIE, SESSION_HEADER,
};

/// What the request itself tells the access checks about the client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestEvidence {
    pub user_agent: String,
    /// Hash of (url, browser key) sent by the locked browser.
    pub request_hash: Option<String>,
    /// Hash of (url, config key) sent by the locked browser.
    pub config_key_hash: Option<String>,
    /// Exact full URL of the request, as the client addressed it.
    pub url: String,
    pub ip: String,
    /// Exam session capability, from the header or the cookie.
    pub session_token: Option<String>,
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn session_from_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

fn client_ip(parts: &Parts) -> String {
    if let Some(forwarded) = header_str(&parts.headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return first.to_string();
        }
    }
    if let Some(real) = header_str(&parts.headers, "x-real-ip") {
        return real;
    }
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn full_url(parts: &Parts, public_base_url: Option<&str>) -> String {
    // Nested routers strip their prefix from `parts.uri`.
    let uri = parts
        .extensions
        .get::<OriginalUri>()
        .map(|OriginalUri(uri)| uri)
        .unwrap_or(&parts.uri);
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");

    if let Some(base) = public_base_url {
        return format!("{}{}", base.trim_end_matches('/'), path);
    }

    let scheme = header_str(&parts.headers, "x-forwarded-proto")
        .or_else(|| uri.scheme_str().map(str::to_string))
        .unwrap_or_else(|| "http".to_string());
    let host = header_str(&parts.headers, header::HOST.as_str())
        .or_else(|| uri.authority().map(|a| a.to_string()))
        .unwrap_or_default();

    format!("{}://{}{}", scheme, host, path)
}

impl RequestEvidence {
    pub fn from_parts(parts: &Parts, public_base_url: Option<&str>) -> Self {
        let session_token = header_str(&parts.headers, SESSION_HEADER)
            .filter(|t| !t.is_empty())
            .or_else(|| session_from_cookie(&parts.headers))
            .filter(|t| !t.is_empty());

        Self {
            user_agent: header_str(&parts.headers, header::USER_AGENT.as_str()).unwrap_or_default(),
            request_hash: header_str(&parts.headers, REQUEST_HASH_HEADER),
            config_key_hash: header_str(&parts.headers, CONFIG_KEY_HASH_HEADER),
            url: full_url(parts, public_base_url),
            ip: client_ip(parts),
            session_token,
        }
    }
}

impl<S> FromRequestParts<S> for RequestEvidence
where
    Config: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = Config::from_ref(state);
        Ok(Self::from_parts(parts, config.public_base_url.as_deref()))
    }
}
