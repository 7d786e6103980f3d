use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde::Serialize;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::metrics;
use crate::services::AppState;

#[derive(Serialize)]
struct DependencyHealth {
    status: &'static str,
    detail: String,
}

impl DependencyHealth {
    fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// GET /health - Liveness plus dependency probes. Any unhealthy
/// dependency degrades the response to 503.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mongo = probe("MongoDB", Duration::from_secs(1), async {
        state
            .mongo
            .run_command(mongodb::bson::doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    })
    .await;

    let redis = probe("Redis", Duration::from_millis(500), async {
        let mut conn = state.redis.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    })
    .await;

    let all_healthy = mongo.is_healthy() && redis.is_healthy();
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(json!({
            "status": if all_healthy { "healthy" } else { "degraded" },
            "service": "firetrain-api",
            "version": env!("CARGO_PKG_VERSION"),
            "dependencies": {
                "mongodb": mongo,
                "redis": redis,
            }
        })),
    )
}

async fn probe<F>(name: &str, limit: Duration, check: F) -> DependencyHealth
where
    F: Future<Output = Result<(), String>>,
{
    match tokio::time::timeout(limit, check).await {
        Ok(Ok(())) => DependencyHealth {
            status: "healthy",
            detail: format!("{} connection successful", name),
        },
        Ok(Err(e)) => DependencyHealth {
            status: "unhealthy",
            detail: format!("{} error: {}", name, e),
        },
        Err(_) => DependencyHealth {
            status: "unhealthy",
            detail: format!("{} timeout after {:?}", name, limit),
        },
    }
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// Basic-auth gate for /metrics. Credentials come from METRICS_AUTH
/// ("user:password"), compared verbatim.
pub async fn metrics_auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .and_then(|encoded| general_purpose::STANDARD.decode(encoded).ok())
        .and_then(|decoded| String::from_utf8(decoded).ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let expected = std::env::var("METRICS_AUTH").unwrap_or_else(|_| "admin:changeme".to_string());
    if presented != expected {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

pub mod admin;
pub mod auth;
pub mod generation;
pub mod modules;
