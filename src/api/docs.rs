//! OpenAPI documentation for the REST API.

use utoipa::OpenApi;

use crate::api::handlers;

/// OpenAPI documentation for the REST API.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::transfers::get_transfer_history,
    ),
    components(schemas(
        crate::api::models::HealthResponse,
        crate::api::models::HealthStatus,
        crate::api::models::TransferEventResponse,
        crate::api::models::ErrorResponse,
    )),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Transfers", description = "Per-token transfer history"),
    ),
    info(
        title = "BAYC Transfer Indexer API",
        version = "1.0.0",
        description = "Read API over ingested NFT Transfer events",
    )
)]
pub struct ApiDoc;
