use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use validator::ValidationErrors;

use crate::auth::middleware::AuthUser;
use crate::error::AppResult;
use crate::models::energy_log::{
    parse_log_date, undecodable_body, EnergyLogRecord, LogSubmission,
};
use crate::services::log_gateway::{SaveOutcome, DEFAULT_RECENT_COUNT};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RecentLogsQuery {
    pub count: Option<i64>,
}

/// Reports a body serde could not decode under the field it failed on.
/// Data errors read "...target type: <field>: <reason>".
fn rejected_body(rejection: JsonRejection) -> ValidationErrors {
    let text = rejection.body_text();
    let detail = text
        .split_once("target type: ")
        .map_or(text.as_str(), |(_, detail)| detail);

    let field_and_reason = match rejection {
        JsonRejection::JsonDataError(_) => detail
            .split_once(": ")
            .filter(|(path, _)| path.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')),
        _ => None,
    };

    match field_and_reason {
        Some((field, reason)) => undecodable_body(Some(field), reason.to_string()),
        None => undecodable_body(None, detail.to_string()),
    }
}

pub async fn save_log(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(date): Path<String>,
    body: Result<Json<LogSubmission>, JsonRejection>,
) -> AppResult<(StatusCode, Json<SaveOutcome>)> {
    let log_date = parse_log_date(&date, Utc::now().date_naive())?;
    let Json(body) = body.map_err(rejected_body)?;

    let outcome = state.logs.save(&auth_user.id, log_date, body).await?;
    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    Ok((status, Json(outcome)))
}

pub async fn get_log(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(date): Path<String>,
) -> AppResult<Json<Option<EnergyLogRecord>>> {
    let log_date = parse_log_date(&date, Utc::now().date_naive())?;
    let log = state.logs.get_by_date(&auth_user.id, log_date).await?;
    Ok(Json(log))
}

pub async fn list_recent_logs(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<RecentLogsQuery>,
) -> AppResult<Json<Vec<EnergyLogRecord>>> {
    let count = query.count.unwrap_or(DEFAULT_RECENT_COUNT);
    let logs = state.logs.get_recent(&auth_user.id, count).await?;
    Ok(Json(logs))
}
