//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks DB connectivity and scratch-dir I/O

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;
use tokio::fs;
use uuid::Uuid;

/// `GET /healthz`
///
/// Very small liveness probe — always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Runs a lightweight query against SQLite (`SELECT 1`).
/// 2. Performs a best-effort write/read/delete in the scratch directory,
///    since every upload needs working scratch storage before anything else.
///
/// Returns JSON describing each check. HTTP 200 when all checks pass,
/// HTTP 503 when any check fails.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let db_check = match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&*state.db)
        .await
    {
        Ok(1) => CheckStatus {
            ok: true,
            error: None,
        },
        Ok(other) => CheckStatus {
            ok: false,
            error: Some(format!("unexpected result: {other}")),
        },
        Err(err) => CheckStatus {
            ok: false,
            error: Some(format!("error: {err}")),
        },
    };

    let scratch_check = scratch_round_trip(&state).await;

    let overall_ok = db_check.ok && scratch_check.ok;
    let mut checks = HashMap::new();
    checks.insert("db", db_check);
    checks.insert("scratch", scratch_check);

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };
    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

/// Write, read back, and remove a probe file under the scratch directory.
async fn scratch_round_trip(state: &AppState) -> CheckStatus {
    let probe_path = state
        .scratch_dir
        .join(format!(".readyz-{}", Uuid::new_v4()));

    if let Err(err) = fs::write(&probe_path, b"readyz").await {
        return CheckStatus {
            ok: false,
            error: Some(format!("could not write probe file: {err}")),
        };
    }

    let read_back = fs::read(&probe_path).await;
    let removal = fs::remove_file(&probe_path).await;

    match read_back {
        Ok(bytes) if bytes == b"readyz" => CheckStatus {
            ok: true,
            error: removal
                .err()
                .map(|err| format!("could not remove probe file: {err}")),
        },
        Ok(_) => CheckStatus {
            ok: false,
            error: Some("probe file content mismatch".into()),
        },
        Err(err) => CheckStatus {
            ok: false,
            error: Some(format!("could not read probe file: {err}")),
        },
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
