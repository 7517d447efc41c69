//! Custom extractors for API parameters.

use alloy::primitives::U256;
use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;

use super::middleware::error::ApiError;
use crate::codec::parse_token_id;

/// A token id taken from the `{token_id}` path segment.
///
/// Accepts decimal (`"7804"`) or `0x`-prefixed hex (`"0x1e7c"`). Anything
/// else is rejected with a 400.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenId(pub U256);

impl TokenId {
    /// Decimal form, as stored in the database.
    pub fn to_decimal(&self) -> String {
        self.0.to_string()
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for TokenId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;

        parse_token_id(&raw)
            .map(Self)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid token id: {raw}")))
    }
}
