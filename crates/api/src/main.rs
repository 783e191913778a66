use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mri_core::domain::{Momentum, RiskIndexRecord};
use mri_core::history::alerts::Alert;
use mri_core::history::{self, HistoryRow, MonthGroup, SimilarDate};
use mri_core::storage::Archive;

const DEFAULT_HISTORY_LIMIT: usize = 30;
const MAX_HISTORY_LIMIT: usize = 365;
const SIMILAR_DATES: usize = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = mri_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let archive = match Archive::open_existing(&settings.archive_dir) {
        Ok(archive) => Some(archive),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "archive unavailable; starting API in degraded mode");
            None
        }
    };

    let app = router(AppState { archive });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, archive_dir = %settings.archive_dir.display(), "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/risk/latest", get(get_latest))
        .route("/risk/history", get(get_history))
        .route("/risk/months", get(get_months))
        .route("/risk/alerts", get(get_alerts))
        .route("/risk/:date", get(get_by_date))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    archive: Option<Archive>,
}

impl AppState {
    fn archive(&self) -> Result<&Archive, StatusCode> {
        self.archive.as_ref().ok_or(StatusCode::SERVICE_UNAVAILABLE)
    }
}

fn internal(e: anyhow::Error) -> StatusCode {
    sentry_anyhow::capture_anyhow(&e);
    tracing::error!(error = %format!("{e:#}"), "archive read failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn get_latest(State(state): State<AppState>) -> Result<Json<RiskIndexRecord>, StatusCode> {
    let record = state
        .archive()?
        .latest()
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(record))
}

async fn get_by_date(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<RiskIndexRecord>, StatusCode> {
    let archive = state.archive()?;
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|_| StatusCode::BAD_REQUEST)?;

    let record = archive
        .get(date)
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    /// Newest first.
    items: Vec<HistoryRow>,
    momentum: Momentum,
    similar_dates: Vec<SimilarDate>,
}

async fn get_history(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, StatusCode> {
    let archive = state.archive()?;
    let limit = q
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let mut records = archive.history(limit).map_err(internal)?;
    records.reverse();

    let scores: Vec<u32> = records.iter().map(|r| r.score).collect();
    let similar_dates = match records.last() {
        Some(latest) => history::similar_dates(&records, latest.score, latest.date, SIMILAR_DATES),
        None => Vec::new(),
    };
    let mut items = history::history_rows(&records);
    items.reverse();

    Ok(Json(HistoryResponse {
        items,
        momentum: history::momentum(&scores),
        similar_dates,
    }))
}

async fn get_months(State(state): State<AppState>) -> Result<Json<Vec<MonthGroup>>, StatusCode> {
    let dates = state.archive()?.dates().map_err(internal)?;
    Ok(Json(history::monthly_index(&dates)))
}

async fn get_alerts(State(state): State<AppState>) -> Result<Json<Vec<Alert>>, StatusCode> {
    Ok(Json(state.archive()?.alert_history()))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &mri_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seeded(days: &[(&str, u32)]) -> (tempfile::TempDir, AppState) {
        let tmp = tempfile::tempdir().unwrap();
        for (date, score) in days {
            let doc = json!({ "date": date, "riskIndex": { "score": score } });
            std::fs::write(tmp.path().join(format!("{date}.json")), doc.to_string()).unwrap();
        }
        let archive = Archive::open_existing(tmp.path()).unwrap();
        (
            tmp,
            AppState {
                archive: Some(archive),
            },
        )
    }

    #[tokio::test]
    async fn by_date_status_codes() {
        let (_tmp, state) = seeded(&[("2026-03-02", 40)]);

        let bad = get_by_date(State(state.clone()), Path("03/02/2026".into())).await;
        assert_eq!(bad.unwrap_err(), StatusCode::BAD_REQUEST);

        let missing = get_by_date(State(state.clone()), Path("2026-03-03".into())).await;
        assert_eq!(missing.unwrap_err(), StatusCode::NOT_FOUND);

        let Json(found) = get_by_date(State(state), Path("2026-03-02".into())).await.unwrap();
        assert_eq!(found.score, 40);
    }

    #[tokio::test]
    async fn corrupt_record_is_a_server_error() {
        let (tmp, state) = seeded(&[]);
        std::fs::write(tmp.path().join("2026-03-02.json"), "{nope").unwrap();
        let res = get_by_date(State(state), Path("2026-03-02".into())).await;
        assert_eq!(res.unwrap_err(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn degraded_mode_is_unavailable() {
        let state = AppState { archive: None };
        assert_eq!(
            get_latest(State(state)).await.unwrap_err(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn history_is_newest_first_and_clamped() {
        let (_tmp, state) = seeded(&[("2026-03-02", 40), ("2026-03-03", 50), ("2026-03-04", 45)]);

        let Json(h) = get_history(State(state.clone()), Query(HistoryQuery { limit: None }))
            .await
            .unwrap();
        let dates: Vec<String> = h.items.iter().map(|r| r.date.to_string()).collect();
        assert_eq!(dates, vec!["2026-03-04", "2026-03-03", "2026-03-02"]);
        assert_eq!(h.items[0].delta, -5);
        // 40 and 50 are equally close to 45; archive order breaks the tie
        assert_eq!(h.similar_dates[0].date.to_string(), "2026-03-02");

        let Json(one) = get_history(State(state), Query(HistoryQuery { limit: Some(0) }))
            .await
            .unwrap();
        assert_eq!(one.items.len(), 1);
    }

    #[tokio::test]
    async fn months_and_latest() {
        let (_tmp, state) = seeded(&[("2026-02-27", 40), ("2026-03-02", 70)]);
        let Json(months) = get_months(State(state.clone())).await.unwrap();
        assert_eq!(months[0].month, "2026-03");
        let Json(latest) = get_latest(State(state)).await.unwrap();
        assert_eq!(latest.score, 70);
    }
}
