// src/server/auth.rs

//! Bearer-token guard for internal endpoints.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::server::AppState;

/// The configured internal API key, kept only as a SHA-256 digest.
#[derive(Debug, Clone)]
pub struct InternalKey {
    digest: Option<[u8; 32]>,
}

impl InternalKey {
    pub fn new(key: Option<&str>) -> Self {
        Self {
            digest: key
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(|key| Sha256::digest(key.as_bytes()).into()),
        }
    }

    /// Short hex prefix of the digest, safe to log.
    pub fn fingerprint(&self) -> Option<String> {
        self.digest.map(|d| hex::encode(&d[..4]))
    }

    /// Check the `Authorization: Bearer <key>` header.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), AppError> {
        let Some(expected) = self.digest else {
            return Err(AppError::Forbidden(
                "internal endpoints are disabled: INTERNAL_API_KEY is not set".to_string(),
            ));
        };

        let header = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

        let token = header
            .split_once(' ')
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
            .map(|(_, token)| token.trim())
            .ok_or_else(|| AppError::Unauthorized("expected a Bearer token".to_string()))?;

        // Comparing digests keeps the comparison length-independent.
        let presented: [u8; 32] = Sha256::digest(token.as_bytes()).into();
        if presented != expected {
            return Err(AppError::Unauthorized("invalid bearer token".to_string()));
        }
        Ok(())
    }
}

/// Route layer rejecting requests without the internal key, before any handler runs.
pub async fn require_internal_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    state.internal_key.authorize(request.headers())?;
    Ok(next.run(request).await)
}
