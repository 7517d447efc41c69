//! Axum server setup and routing.

use axum::http::HeaderValue;
use axum::{middleware, routing::get, Router};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{docs::ApiDoc, handlers, middleware as api_middleware};
use crate::app_state::AppState;
use crate::error::BoxedSource;

/// Builds the full application router.
///
/// Besides `/api/v1`, the history endpoint is also served at
/// `/transfer-history/{token_id}/` for clients of the older URL scheme.
pub fn build_router(state: AppState, rate_limit_rpm: u32, cors_origins: Vec<String>) -> Router {
    let limiter = api_middleware::rate_limit::create_rate_limiter(rate_limit_rpm);

    let api_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/transfer-history/:token_id",
            get(handlers::transfers::get_transfer_history),
        );

    let legacy_routes = Router::new()
        .route(
            "/transfer-history/:token_id",
            get(handlers::transfers::get_transfer_history),
        )
        .route(
            "/transfer-history/:token_id/",
            get(handlers::transfers::get_transfer_history),
        );

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(cors_origins))
        .layer(middleware::from_fn(api_middleware::logging::log_requests))
        .layer(middleware::from_fn(move |req, next| {
            api_middleware::rate_limit::rate_limit(limiter.clone(), req, next)
        }));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api/v1", api_routes)
        .merge(legacy_routes)
        .layer(middleware_stack)
        .with_state(state)
}

/// Run the Axum API server until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error if the port cannot be bound or the server fails.
pub async fn run_server(
    state: AppState,
    port: u16,
    rate_limit_rpm: u32,
    cors_origins: Vec<String>,
    shutdown: CancellationToken,
) -> Result<(), BoxedSource> {
    let app = build_router(state, rate_limit_rpm, cors_origins);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(addr = %addr, rate_limit_rpm, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("API server stopped");
    Ok(())
}

fn build_cors_layer(origins: Vec<String>) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::new().allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    CorsLayer::new().allow_origin(AllowOrigin::list(allowed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, models::TransferRecord, repository::Repository};
    use alloy::primitives::U256;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use std::sync::{atomic::AtomicBool, Arc};
    use tower::ServiceExt;

    const ALICE: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
    const BOB: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";

    fn record(tx_byte: char, token_id: u64, block_number: u64) -> TransferRecord {
        TransferRecord {
            token_id: U256::from(token_id),
            from_address: ALICE.to_string(),
            to_address: BOB.to_string(),
            tx_hash: format!("0x{}", tx_byte.to_string().repeat(64)),
            block_number,
        }
    }

    async fn seeded_state(streaming: bool) -> AppState {
        let repo = Repository::new(create_pool("sqlite::memory:").await.unwrap());
        repo.insert_transfer(&record('2', 7804, 200)).await.unwrap();
        repo.insert_transfer(&record('1', 7804, 100)).await.unwrap();
        repo.insert_transfer(&record('3', 1, 150)).await.unwrap();
        AppState::with_streaming_flag(repo, Arc::new(AtomicBool::new(streaming)))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_history_ordered_by_block() {
        let app = build_router(seeded_state(true).await, 600, vec![]);

        let (status, body) = get(app, "/api/v1/transfer-history/7804").await;
        assert_eq!(status, StatusCode::OK);

        let items = body.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["block_number"], 100);
        assert_eq!(items[1]["block_number"], 200);
        assert_eq!(items[0]["token_id"], "7804");
        assert_eq!(items[0]["to_address"], BOB);
    }

    #[tokio::test]
    async fn test_hex_and_legacy_routes_match_decimal() {
        let app = build_router(seeded_state(true).await, 600, vec![]);

        let (_, decimal) = get(app.clone(), "/api/v1/transfer-history/7804").await;
        let (_, hex) = get(app.clone(), "/api/v1/transfer-history/0x1e7c").await;
        let (status, legacy) = get(app, "/transfer-history/7804/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(decimal, hex);
        assert_eq!(decimal, legacy);
    }

    #[tokio::test]
    async fn test_unknown_token_is_empty_list() {
        let app = build_router(seeded_state(true).await, 600, vec![]);

        let (status, body) = get(app, "/api/v1/transfer-history/999").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_malformed_token_is_bad_request() {
        let app = build_router(seeded_state(true).await, 600, vec![]);

        let (status, body) = get(app, "/api/v1/transfer-history/abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_health_reports_store_and_ingester() {
        let app = build_router(seeded_state(false).await, 600, vec![]);

        let (status, body) = get(app, "/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["database_status"], "healthy");
        assert_eq!(body["ingester_streaming"], false);
        assert_eq!(body["total_transfers"], 3);
        assert_eq!(body["latest_block"], 200);

        let app = build_router(seeded_state(true).await, 600, vec![]);
        let (_, body) = get(app, "/api/v1/health").await;
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_excess_requests() {
        let app = build_router(seeded_state(true).await, 1, vec![]);

        let (first, _) = get(app.clone(), "/api/v1/health").await;
        let (second, body) = get(app, "/api/v1/health").await;

        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "rate_limit_exceeded");
    }

    #[test]
    fn test_cors_layer_accepts_origin_list() {
        let _ = build_cors_layer(vec!["http://localhost:3000".to_string()]);
        let _ = build_cors_layer(vec!["*".to_string()]);
    }
}
