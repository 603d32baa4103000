//! Log surface (§6 `/api/log`). The terminal batches its own diagnostic
//! log lines here; notification channels and log shipping are out of scope
//! (§1) — this just authenticates and forwards to structured logging.

use crate::domain::errors::AppError;
use crate::infrastructure::http::auth::authenticate;
use crate::infrastructure::http::response::ApiResponse;
use crate::infrastructure::http::state::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use tracing::{error, info, warn};

#[derive(Deserialize)]
pub struct LogEntry {
    pub level: String,
    pub message: String,
}

#[derive(Deserialize)]
pub struct LogRequest {
    pub account: i64,
    pub api_key: Option<String>,
    pub logs: Vec<LogEntry>,
}

pub async fn log(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<LogRequest>) -> Result<ApiResponse, AppError> {
    authenticate(&state, &headers, req.api_key.as_deref(), req.account).await?;

    for entry in &req.logs {
        match entry.level.to_ascii_uppercase().as_str() {
            "ERROR" | "CRITICAL" => error!(account = req.account, "[terminal] {}", entry.message),
            "WARN" | "WARNING" => warn!(account = req.account, "[terminal] {}", entry.message),
            _ => info!(account = req.account, "[terminal] {}", entry.message),
        }
    }

    Ok(ApiResponse::ok_empty())
}
