//! HTTP API surface
//!
//! REST endpoints mirroring the aggregator: /estimate for the best
//! conversion, /getRates for the per-source table, plus /health and a
//! static demo page.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::aggregator::RateAggregator;
use crate::types::Symbol;

/// Create the API router with all endpoints
pub fn create_router(aggregator: Arc<RateAggregator>, static_dir: &str) -> Router {
    Router::new()
        .route("/estimate", post(estimate))
        .route("/getRates", post(get_rates))
        .route("/health", get(health))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(aggregator)
        // CORS for the demo page
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

// ─────────────────────────────────────────────────────────────────
// Request/response shapes
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EstimateRequest {
    input_amount: f64,
    input_currency: String,
    output_currency: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EstimateResponse {
    exchange_name: String,
    output_amount: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetRatesRequest {
    base_currency: String,
    quote_currency: String,
}

/// One row of the /getRates table: a rate, or an inline error marker when
/// the source had no data. The call as a whole never fails.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RateEntry {
    Rate {
        #[serde(rename = "exchangeName")]
        exchange_name: String,
        rate: f64,
    },
    NoData {
        #[serde(rename = "exchangeName")]
        exchange_name: String,
        error: String,
    },
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

fn error_response(status: StatusCode, detail: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            detail: detail.to_string(),
        }),
    )
        .into_response()
}

// ─────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────

/// POST /estimate - best venue and output amount for a conversion
async fn estimate(
    State(aggregator): State<Arc<RateAggregator>>,
    Json(request): Json<EstimateRequest>,
) -> Response {
    if !request.input_amount.is_finite() || request.input_amount <= 0.0 {
        return error_response(StatusCode::BAD_REQUEST, "inputAmount must be positive");
    }

    let input = Symbol::new(&request.input_currency);
    let output = Symbol::new(&request.output_currency);

    match aggregator
        .estimate_best(request.input_amount, &input, &output)
        .await
    {
        Some(best) => Json(EstimateResponse {
            exchange_name: best.source,
            output_amount: best.output_amount,
        })
        .into_response(),
        // Every source came back empty: service-level unavailability.
        None => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "no exchange returned data for this pair",
        ),
    }
}

/// POST /getRates - per-source rate table for a pair
async fn get_rates(
    State(aggregator): State<Arc<RateAggregator>>,
    Json(request): Json<GetRatesRequest>,
) -> Json<Vec<RateEntry>> {
    let base = Symbol::new(&request.base_currency);
    let quote = Symbol::new(&request.quote_currency);

    let table = aggregator.collect_quotes(&base, &quote).await;
    let entries = table
        .into_iter()
        .map(|entry| match entry.rate {
            Some(rate) => RateEntry::Rate {
                exchange_name: entry.source,
                rate,
            },
            None => RateEntry::NoData {
                exchange_name: entry.source,
                error: "no data".to_string(),
            },
        })
        .collect();

    Json(entries)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    service: &'static str,
    version: &'static str,
    now: String,
}

/// GET /health - liveness probe
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        service: "ratescout",
        version: env!("CARGO_PKG_VERSION"),
        now: chrono::Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{PriceSource, StaticStubSource};
    use crate::types::Pair;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let sources: Vec<Arc<dyn PriceSource>> = vec![
            Arc::new(StaticStubSource::new(
                "uniswap",
                vec![(Pair::new("BTC", "USDT"), 10_500.0)],
            )),
            Arc::new(StaticStubSource::new(
                "raydium",
                vec![(Pair::new("BTC", "USDT"), 10_700.0)],
            )),
            Arc::new(StaticStubSource::new("gate", vec![])),
        ];
        let aggregator = RateAggregator::new(sources, Duration::from_millis(200));
        create_router(Arc::new(aggregator), "./static")
    }

    async fn post_json(router: Router, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap();
        (status, value)
    }

    #[tokio::test]
    async fn estimate_returns_best_exchange() {
        let (status, body) = post_json(
            test_router(),
            "/estimate",
            r#"{"inputAmount":1.0,"inputCurrency":"BTC","outputCurrency":"USDT"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["exchangeName"], "raydium");
        assert!((body["outputAmount"].as_f64().unwrap() - 10_700.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn estimate_rejects_non_positive_amount() {
        let (status, _) = post_json(
            test_router(),
            "/estimate",
            r#"{"inputAmount":-3.0,"inputCurrency":"BTC","outputCurrency":"USDT"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn estimate_is_unavailable_when_all_sources_are_empty() {
        let (status, _) = post_json(
            test_router(),
            "/estimate",
            r#"{"inputAmount":1.0,"inputCurrency":"DOGE","outputCurrency":"PEPE"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn get_rates_reports_every_source_inline() {
        let (status, body) = post_json(
            test_router(),
            "/getRates",
            r#"{"baseCurrency":"BTC","quoteCurrency":"USDT"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["exchangeName"], "uniswap");
        assert_eq!(rows[0]["rate"].as_f64().unwrap(), 10_500.0);
        assert_eq!(rows[1]["exchangeName"], "raydium");
        assert_eq!(rows[2]["exchangeName"], "gate");
        assert_eq!(rows[2]["error"], "no data");
    }
}
