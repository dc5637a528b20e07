use axum::{
    extract::{Query, State},
    Extension, Json,
};

use crate::auth::middleware::AuthUser;
use crate::error::AppResult;
use crate::handlers::logs::RecentLogsQuery;
use crate::services::log_gateway::DEFAULT_RECENT_COUNT;
use crate::services::trends::{trend_points, TrendPoint};
use crate::AppState;

pub async fn get_trends(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<RecentLogsQuery>,
) -> AppResult<Json<Vec<TrendPoint>>> {
    let count = query.count.unwrap_or(DEFAULT_RECENT_COUNT);
    let logs = state.logs.get_recent(&auth_user.id, count).await?;
    Ok(Json(trend_points(&logs)))
}
