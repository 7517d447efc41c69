//! Transfer history endpoint.

use axum::{extract::State, Json};
use tracing::{debug, instrument};

use crate::api::extractors::TokenId;
use crate::api::middleware::error::ApiError;
use crate::api::models::{ErrorResponse, TransferEventResponse};
use crate::app_state::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/transfer-history/{token_id}",
    params(
        ("token_id" = String, Path, description = "Token id, decimal or 0x hex")
    ),
    responses(
        (status = 200, description = "All stored transfers of the token, oldest first", body = [TransferEventResponse]),
        (status = 400, description = "Malformed token id", body = ErrorResponse)
    ),
    tag = "Transfers"
)]
/// Lists every stored transfer of one token.
///
/// An unknown token yields an empty list rather than a 404.
#[instrument(skip(state, token_id), fields(token_id = %token_id.to_decimal()))]
pub async fn get_transfer_history(
    State(state): State<AppState>,
    token_id: TokenId,
) -> Result<Json<Vec<TransferEventResponse>>, ApiError> {
    let rows = state
        .repository
        .get_transfers_by_token(&token_id.to_decimal())
        .await?;

    debug!(count = rows.len(), "Transfer history loaded");

    Ok(Json(rows.into_iter().map(TransferEventResponse::from).collect()))
}
