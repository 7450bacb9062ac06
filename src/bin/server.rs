use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use cutplan::analysis::PlanSummary;
use cutplan::solver::{Optimizer, PlanOutcome};
use cutplan::types::{CutError, SegmentType, StockItem, deserialize_u32_from_number};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Deserialize, Serialize)]
struct OptimizeRequest {
    stock: Vec<StockItem>,
    cuts: Vec<SegmentType>,
    #[serde(default, deserialize_with = "deserialize_u32_from_number")]
    kerf: u32,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    60_000
}

#[derive(Serialize)]
struct OptimizeResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<PlanSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    patterns: Vec<PatternResponse>,
}

#[derive(Serialize)]
struct PatternResponse {
    stock_length: u32,
    stock_cost: f64,
    count: u32,
    cuts: BTreeMap<String, u32>,
    used: u32,
    kerf: u32,
    waste: u32,
}

async fn optimize(
    Json(req): Json<OptimizeRequest>,
) -> Result<Json<OptimizeResponse>, (StatusCode, String)> {
    tracing::info!(
        body = serde_json::to_string(&req).unwrap_or_default(),
        "POST /optimize"
    );

    if req.stock.is_empty() || req.cuts.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "at least one stock item and one cut are required".to_string(),
        ));
    }
    for stock in &req.stock {
        if stock.length == 0 {
            return Err((
                StatusCode::BAD_REQUEST,
                "stock length must be non-zero".to_string(),
            ));
        }
    }
    for cut in &req.cuts {
        if cut.length == 0 {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("cut '{}' length must be non-zero", cut.name),
            ));
        }
    }

    let optimizer = Optimizer::new(req.stock, req.cuts, req.kerf)
        .with_timeout(Duration::from_millis(req.timeout_ms));

    let outcome = optimizer.solve().map_err(|e| match e {
        CutError::InvalidDefect { .. } => (StatusCode::BAD_REQUEST, e.to_string()),
        CutError::Solver(_) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    })?;

    let response = match outcome {
        PlanOutcome::Optimal(plan) => OptimizeResponse {
            status: "optimal",
            patterns: plan
                .active()
                .map(|(p, count)| PatternResponse {
                    stock_length: p.stock_length,
                    stock_cost: p.stock_cost,
                    count,
                    cuts: p.cuts(optimizer.segments()),
                    used: p.used,
                    kerf: p.kerf,
                    waste: p.waste,
                })
                .collect(),
            summary: Some(plan.summary),
        },
        PlanOutcome::Infeasible => OptimizeResponse {
            status: "infeasible",
            summary: None,
            patterns: vec![],
        },
        PlanOutcome::Timeout => OptimizeResponse {
            status: "timeout",
            summary: None,
            patterns: vec![],
        },
        PlanOutcome::Cancelled => OptimizeResponse {
            status: "cancelled",
            summary: None,
            patterns: vec![],
        },
    };

    Ok(Json(response))
}

#[tokio::main]
async fn main() {
    let _sentry = std::env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("development.log")
        .expect("failed to open development.log");

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");

    let app = Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/optimize", post(optimize))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    eprintln!("Listening on {addr}");
    axum::serve(listener, app).await.unwrap();
}
