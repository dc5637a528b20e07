use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod auth;
mod config;
mod db;
mod error;
mod handlers;
mod models;
mod services;

use auth::rate_limit::RateLimitState;
use config::Config;
use db::memory::InMemoryLogStore;
use db::postgres::PgLogStore;
use db::LogStore;
use services::cache::LogCache;
use services::claude::ClaudeClient;
use services::log_gateway::LogGateway;
use services::summary::{SummaryComposer, TextGenerator};

const CLEANUP_INTERVAL_SECS: u64 = 300;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub logs: LogGateway,
    pub summaries: SummaryComposer,
    pub rate_limiter: RateLimitState,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn LogStore>,
        generator: Option<Arc<dyn TextGenerator>>,
    ) -> Self {
        let cache = LogCache::new(Duration::from_secs(config.cache_ttl_secs));
        Self {
            logs: LogGateway::new(store, cache),
            summaries: SummaryComposer::new(generator),
            rate_limiter: RateLimitState::for_summaries(config.summary_max_per_hour),
            config,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let summary_routes = Router::new()
        .route("/api/summary", post(handlers::summary::create_summary))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::rate_limit::rate_limit_summary,
        ));

    let protected_routes = Router::new()
        .route("/api/logs", get(handlers::logs::list_recent_logs))
        .route(
            "/api/logs/:date",
            get(handlers::logs::get_log).put(handlers::logs::save_log),
        )
        .route("/api/trends", get(handlers::trends::get_trends))
        .merge(summary_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/readyz", get(handlers::health::readyz));

    let mut allowed_origins: Vec<axum::http::HeaderValue> = Vec::new();
    let extra = std::env::var("CORS_EXTRA_ORIGINS").unwrap_or_default();
    for origin in std::iter::once(state.config.frontend_url.as_str()).chain(extra.split(',')) {
        let origin = origin.trim();
        if origin.is_empty() {
            continue;
        }
        match origin.parse::<axum::http::HeaderValue>() {
            Ok(hv) => allowed_origins.push(hv),
            Err(_) => tracing::warn!(origin = %origin, "Ignoring invalid CORS origin"),
        }
    }
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ])
        .allow_credentials(true);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Periodically prunes expired cache buckets and rate-limit windows.
fn spawn_cleanup_worker(cache: LogCache, rate_limiter: RateLimitState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(CLEANUP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            let cache_purged = cache.cleanup().await;
            let limits_purged = rate_limiter.cleanup().await;
            if cache_purged > 0 || limits_purged > 0 {
                tracing::debug!(cache_purged, limits_purged, "Cleanup worker pruned entries");
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vibevault_api=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    let config = Arc::new(Config::from_env()?);

    let store: Arc<dyn LogStore> = match &config.database_url {
        Some(url) => {
            let db = db::pool::create_pool(url)
                .await
                .context("Failed to create database pool")?;
            sqlx::migrate!("./migrations")
                .run(&db)
                .await
                .context("Failed to run database migrations")?;
            tracing::info!("Database migrations applied");
            Arc::new(PgLogStore::new(db))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, logs are kept in memory only");
            Arc::new(InMemoryLogStore::new())
        }
    };

    let generator: Option<Arc<dyn TextGenerator>> = if config.claude_api_key.is_empty() {
        tracing::warn!("CLAUDE_API_KEY not set, summaries will use the fallback message");
        None
    } else {
        Some(Arc::new(ClaudeClient::new(&config)?))
    };

    let state = AppState::new(config.clone(), store, generator);
    spawn_cleanup_worker(state.logs.cache().clone(), state.rate_limiter.clone());

    let app = build_router(state);

    let addr = config.listen_addr();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::jwt::create_access_token;
    use crate::services::summary::tests::ScriptedGenerator;
    use crate::services::summary::{FALLBACK_MESSAGE, NEED_MORE_DATA_MESSAGE};

    fn test_app(generator: Option<Arc<dyn TextGenerator>>) -> (Router, Arc<Config>) {
        let config = Arc::new(Config::for_tests());
        let state = AppState::new(config.clone(), Arc::new(InMemoryLogStore::new()), generator);
        (build_router(state), config)
    }

    async fn send(
        app: &Router,
        config: &Config,
        user: Option<&str>,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(
                header::AUTHORIZATION,
                format!("Bearer {}", create_access_token(user, config)),
            );
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn minimal_body(energy: i32) -> Value {
        json!({
            "energy_level": energy,
            "hydration_liters": 1.5,
            "activity_intensity": "Low",
        })
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let (app, config) = test_app(None);
        let (status, body) = send(&app, &config, None, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = send(&app, &config, None, Method::GET, "/readyz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["storage"], "ok");
    }

    #[tokio::test]
    async fn test_logs_require_a_token() {
        let (app, config) = test_app(None);
        let (status, body) = send(&app, &config, None, Method::GET, "/api/logs", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], 401);
    }

    #[tokio::test]
    async fn test_save_then_fetch_round_trip() {
        let (app, config) = test_app(None);
        let body = json!({
            "energy_level": 8,
            "note": "Good day",
            "sleep_hours": 7.5,
            "sleep_quality": 4,
            "bedtime": "23:15",
            "wake_up_time": "06:45",
            "hydration_liters": 2.0,
            "activity_type": "Rest Day",
            "activity_intensity": "None",
            "activity_duration_minutes": 0,
            "emotion_tag": "Calm",
            "stress_level": 1,
            "weather_type": "Foggy",
            "social_interactions": "None",
            "workload": "Low",
            "menstrual_cycle_phase": "Unknown",
            "energy_goal": 7,
        });

        let (status, saved) = send(
            &app, &config, Some("user_001"), Method::PUT, "/api/logs/2024-06-03", Some(body.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["success"], true);

        let (status, log) =
            send(&app, &config, Some("user_001"), Method::GET, "/api/logs/2024-06-03", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(log["log_date"], "2024-06-03");
        assert_eq!(log["user_identifier"], "user_001");
        for (field, value) in body.as_object().unwrap() {
            assert_eq!(&log[field], value, "field {field} changed");
        }
        assert!(log["sleep_hours"].is_f64());
        assert!(log["sleep_notes"].is_null());
        assert_eq!(log["log_streak_count"], 1);
    }

    #[tokio::test]
    async fn test_missing_log_is_null_not_error() {
        let (app, config) = test_app(None);
        let (status, body) =
            send(&app, &config, Some("user_001"), Method::GET, "/api/logs/2024-06-03", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_null());
    }

    #[tokio::test]
    async fn test_validation_errors_name_fields() {
        let (app, config) = test_app(None);
        let body = json!({
            "energy_level": 12,
            "hydration_liters": -1.0,
            "activity_intensity": "Extreme",
            "bedtime": "25:00",
        });

        let (status, error) = send(
            &app, &config, Some("user_001"), Method::PUT, "/api/logs/2024-06-03", Some(body),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let fields = error["error"]["fields"].as_object().unwrap();
        let mut names: Vec<_> = fields.keys().cloned().collect();
        names.sort();
        assert_eq!(
            names,
            vec!["activity_intensity", "bedtime", "energy_level", "hydration_liters"]
        );

        let (_, logs) =
            send(&app, &config, Some("user_001"), Method::GET, "/api/logs", None).await;
        assert_eq!(logs, json!([]));
    }

    #[tokio::test]
    async fn test_mistyped_field_is_named_in_error_envelope() {
        let (app, config) = test_app(None);
        let cases = [
            ("energy_level", json!(7.5)),
            ("sleep_quality", json!("high")),
        ];

        for (field, value) in cases {
            let mut body = minimal_body(5);
            body[field] = value;
            let (status, error) = send(
                &app, &config, Some("user_001"), Method::PUT, "/api/logs/2024-06-03", Some(body),
            )
            .await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
            assert_eq!(error["error"]["code"], 422);
            let fields = error["error"]["fields"].as_object().unwrap();
            assert_eq!(fields.keys().map(String::as_str).collect::<Vec<_>>(), vec![field]);
        }

        let (_, log) =
            send(&app, &config, Some("user_001"), Method::GET, "/api/logs/2024-06-03", None).await;
        assert!(log.is_null());
    }

    #[tokio::test]
    async fn test_bad_date_is_rejected() {
        let (app, config) = test_app(None);
        let (status, error) = send(
            &app, &config, Some("user_001"), Method::PUT, "/api/logs/03-06-2024", Some(minimal_body(5)),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(error["error"]["fields"]["log_date"].is_array());
    }

    #[tokio::test]
    async fn test_logs_are_scoped_per_user_and_ordered() {
        let (app, config) = test_app(None);
        for day in ["2024-06-01", "2024-06-05", "2024-06-03"] {
            let uri = format!("/api/logs/{day}");
            send(&app, &config, Some("alice"), Method::PUT, &uri, Some(minimal_body(6))).await;
        }
        send(&app, &config, Some("bob"), Method::PUT, "/api/logs/2024-06-04", Some(minimal_body(2))).await;

        let (_, logs) =
            send(&app, &config, Some("alice"), Method::GET, "/api/logs?count=2", None).await;
        let dates: Vec<_> = logs
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["log_date"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(dates, vec!["2024-06-05", "2024-06-03"]);

        let (_, trends) =
            send(&app, &config, Some("alice"), Method::GET, "/api/trends", None).await;
        let labels: Vec<_> = trends
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["date"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(labels, vec!["Jun 1", "Jun 3", "Jun 5"]);
    }

    #[tokio::test]
    async fn test_summary_flow() {
        let generator = Arc::new(ScriptedGenerator::replying(r#"{"analysis":"Nice rhythm."}"#));
        let (app, config) = test_app(Some(generator.clone() as Arc<dyn TextGenerator>));

        send(&app, &config, Some("alice"), Method::PUT, "/api/logs/2024-06-01", Some(minimal_body(4))).await;
        let (_, summary) =
            send(&app, &config, Some("alice"), Method::POST, "/api/summary", None).await;
        assert_eq!(summary["analysis"], NEED_MORE_DATA_MESSAGE);
        assert_eq!(summary["source"], "insufficient_data");

        send(&app, &config, Some("alice"), Method::PUT, "/api/logs/2024-06-02", Some(minimal_body(7))).await;
        let (status, summary) =
            send(&app, &config, Some("alice"), Method::POST, "/api/summary?days=14", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["analysis"], "Nice rhythm.");
        assert_eq!(summary["source"], "model");
        assert_eq!(summary["log_count"], 2);

        // Chronological order in the prompt.
        let prompts = generator.prompts.lock().await;
        let first = prompts[0].find("**Jun 1**").unwrap();
        let second = prompts[0].find("**Jun 2**").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn test_summary_without_generator_falls_back() {
        let (app, config) = test_app(None);
        for day in ["2024-06-01", "2024-06-02"] {
            let uri = format!("/api/logs/{day}");
            send(&app, &config, Some("alice"), Method::PUT, &uri, Some(minimal_body(5))).await;
        }
        let (status, summary) =
            send(&app, &config, Some("alice"), Method::POST, "/api/summary", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["analysis"], FALLBACK_MESSAGE);
    }

    #[tokio::test]
    async fn test_summary_is_rate_limited_per_user() {
        let (app, config) = test_app(None);
        for _ in 0..config.summary_max_per_hour {
            let (status, _) =
                send(&app, &config, Some("alice"), Method::POST, "/api/summary", None).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, _) =
            send(&app, &config, Some("alice"), Method::POST, "/api/summary", None).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

        let (status, _) =
            send(&app, &config, Some("bob"), Method::POST, "/api/summary", None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
