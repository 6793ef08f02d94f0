//! Requester identification for queue fairness.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use analytics_core::scheduling::{Requester, RequesterClass};

use crate::state::AppState;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// The requester behind an intake request.
///
/// A bearer token listed in `ELEVATED_TOKENS` identifies an elevated
/// requester. Everyone else is identified by client address: the first
/// `X-Forwarded-For` entry when `TRUST_FORWARDED_FOR` is set, otherwise the
/// peer address of the connection. Never rejects.
#[derive(Debug, Clone)]
pub struct RequesterIdentity(pub Requester);

impl FromRequestParts<AppState> for RequesterIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self(identify(
            &parts.headers,
            peer,
            &state.config.elevated_tokens,
            state.config.trust_forwarded_for,
        )))
    }
}

/// Derive the requester from request headers and the connection's peer.
///
/// Unrecognised bearer tokens carry no identity, so a client cannot shed its
/// queue history by sending a fresh token with each submission.
pub fn identify(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    elevated_tokens: &[String],
    trust_forwarded_for: bool,
) -> Requester {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    if let Some(token) = token.filter(|t| elevated_tokens.iter().any(|e| e.as_str() == *t)) {
        return Requester {
            id: format!("token:{token}"),
            class: RequesterClass::Elevated,
        };
    }

    let forwarded = headers
        .get(FORWARDED_FOR)
        .filter(|_| trust_forwarded_for)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(str::to_string);

    match forwarded.or_else(|| peer.map(|addr| addr.ip().to_string())) {
        Some(addr) => Requester {
            id: format!("addr:{addr}"),
            class: RequesterClass::Default,
        },
        None => Requester::anonymous(),
    }
}
