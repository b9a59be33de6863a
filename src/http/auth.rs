//! Request authentication extractors.
//!
//! End users are authenticated upstream. The fronting layer forwards the
//! account id in `x-user-id` and must present the shared secret in
//! `x-internal-token` alongside it, so a bare `x-user-id` from the outside
//! is rejected. Service-to-service calls present the same secret.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sha2::{Digest, Sha256};

use super::ApiState;
use crate::AppError;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the internal service token.
pub const INTERNAL_TOKEN_HEADER: &str = "x-internal-token";

/// The signed-in user making the request, as vouched for by an
/// [`InternalCaller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub i64);

impl FromRequestParts<Arc<ApiState>> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ApiState>,
    ) -> Result<Self, Self::Rejection> {
        InternalCaller::from_request_parts(parts, state).await?;

        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok())
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("missing or invalid user identity".into()))
    }
}

/// A caller holding the internal service token.
#[derive(Debug, Clone, Copy)]
pub struct InternalCaller;

impl FromRequestParts<Arc<ApiState>> for InternalCaller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ApiState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.internal_token.as_deref() else {
            return Err(AppError::ConfigurationMissing(
                "internal token is not configured".into(),
            ));
        };

        let presented = parts
            .headers
            .get(INTERNAL_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing internal token".into()))?;

        // Compare digests so the comparison length does not depend on input.
        if Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes()) {
            Ok(Self)
        } else {
            Err(AppError::Unauthorized("invalid internal token".into()))
        }
    }
}
