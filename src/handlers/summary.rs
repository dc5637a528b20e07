use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::auth::middleware::AuthUser;
use crate::error::AppResult;
use crate::services::log_gateway::DEFAULT_RECENT_COUNT;
use crate::services::summary::{Summary, MAX_LOGS_FOR_SUMMARY};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    /// How many of the most recent logs to analyze. Default 7, max 14.
    pub days: Option<i64>,
}

pub async fn create_summary(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<SummaryQuery>,
) -> AppResult<Json<Summary>> {
    let days = query
        .days
        .unwrap_or(DEFAULT_RECENT_COUNT)
        .clamp(0, MAX_LOGS_FOR_SUMMARY as i64);

    // Most recent first from the store; the composer wants oldest first.
    let mut logs = state.logs.get_recent(&auth_user.id, days).await?;
    logs.reverse();

    let summary = state.summaries.summarize(&logs).await;
    tracing::info!(
        user_id = %auth_user.id,
        source = ?summary.source,
        log_count = summary.log_count,
        "Summary generated"
    );

    Ok(Json(summary))
}
