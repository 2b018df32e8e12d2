use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::query::SearchOutcome;
use crate::server::error::ApiError;
use crate::state::AppState;

pub const SEARCH_ERROR: &str = "Failed to process search request";
pub const INIT_ERROR: &str = "Failed to initialize RAG system";
pub const INVALID_BODY_ERROR: &str = "Request body must be a JSON object with a \"query\" string";

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
}

/// 500 body for `/search`: the error plus a complete, empty result.
#[derive(Debug, Serialize)]
struct SearchErrorBody {
    error: String,
    #[serde(flatten)]
    outcome: SearchOutcome,
}

pub async fn init(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let products = state.catalog.products();
    tracing::info!(products = products.len(), "Initializing RAG system");

    let count = state.index().initialize(products).await.map_err(|e| {
        tracing::error!(error = %e, "RAG initialization failed");
        ApiError::Internal(INIT_ERROR.to_string())
    })?;

    tracing::info!(documents = count, "RAG system ready");
    Ok(Json(json!({
        "message": format!("RAG system initialized with {} products", count)
    })))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!(rejection = %rejection.body_text(), "Rejected search request body");
            return ApiError::BadRequest(INVALID_BODY_ERROR.to_string()).into_response();
        }
    };

    match state.queries.handle_search(&request.query).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(failure) => {
            let body = SearchErrorBody {
                error: SEARCH_ERROR.to_string(),
                outcome: failure.outcome,
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let index = state.index();
    Json(json!({
        "status": "ok",
        "ragReady": index.is_ready().await,
        "documents": index.document_count().await,
        "products": state.catalog.len(),
        "embedder": index.embedder_name(),
    }))
}
