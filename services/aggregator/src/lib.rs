//! HTTP surface for the fedtrust aggregation coordinator.
//!
//! Thin axum layer over `fedtrust_core::RoundTracker`; all round semantics
//! live in the core crate. Response message strings are part of the wire
//! contract consumed by the client agents.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use fedtrust_core::{AggregationResult, ClientUpdate, RoundTracker, SubmitError, SubmitOutcome};
use serde_json::json;
use std::sync::Arc;

pub type SharedTracker = Arc<RoundTracker>;

pub fn router(tracker: SharedTracker) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/get_global_model", get(get_global_model))
        .route("/submit_update", post(submit_update))
        .route("/aggregate", post(aggregate))
        .route("/trust_history", get(trust_history))
        .with_state(tracker)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Aggregator server is running" }))
}

async fn get_global_model(State(tracker): State<SharedTracker>) -> Json<serde_json::Value> {
    let (round, weights) = tracker.current_round();
    Json(json!({ "round": round, "weights": weights }))
}

async fn submit_update(
    State(tracker): State<SharedTracker>,
    Json(update): Json<ClientUpdate>,
) -> Response {
    match tracker.submit(update).await {
        Ok(outcome) => submit_response(outcome),
        Err(err @ SubmitError::DimensionMismatch { .. }) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        // Ledger failures are surfaced verbatim, never swallowed.
        Err(SubmitError::Ledger(err)) => {
            (StatusCode::BAD_GATEWAY, Json(json!({ "error": err.to_string() }))).into_response()
        }
    }
}

fn submit_response(outcome: SubmitOutcome) -> Response {
    match outcome {
        SubmitOutcome::AlreadySubmitted => {
            Json(json!({ "message": "Already submitted for this round" })).into_response()
        }
        SubmitOutcome::Penalized { new_trust } => Json(json!({
            "message": "Client penalized for malicious update",
            "new_trust": new_trust,
        }))
        .into_response(),
        SubmitOutcome::RejectedLowTrust { trust } => Json(json!({
            "message": "Client rejected due to low trust",
            "trust": trust,
        }))
        .into_response(),
        SubmitOutcome::Accepted { trust, round } => Json(json!({
            "message": "Update accepted",
            "trust": trust,
            "current_round": round,
        }))
        .into_response(),
        SubmitOutcome::StaleRound => (
            StatusCode::CONFLICT,
            Json(json!({ "message": "Round advanced during submission" })),
        )
            .into_response(),
    }
}

async fn aggregate(State(tracker): State<SharedTracker>) -> Json<serde_json::Value> {
    match tracker.aggregate().await {
        AggregationResult::Empty => Json(json!({ "message": "No valid updates to aggregate" })),
        AggregationResult::Complete { new_global_model, next_round, trust_snapshot } => {
            Json(json!({
                "message": "Aggregation complete",
                "new_global_model": new_global_model,
                "next_round": next_round,
                "trust_snapshot": trust_snapshot,
            }))
        }
    }
}

async fn trust_history(State(tracker): State<SharedTracker>) -> Json<serde_json::Value> {
    Json(json!(tracker.trust_history()))
}
