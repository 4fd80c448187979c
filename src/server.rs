use crate::config::{ChartsConfig, Credentials};
use crate::fetch::Transport;
use crate::model::ChartResult;
use crate::pipeline::{ChartResolver, PhaseReport, ResolveError, ResolveOptions};
use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub struct AppState {
    pub config: ChartsConfig,
    pub credentials: Option<Credentials>,
    pub transport: Arc<dyn Transport>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    phases: Vec<PhaseReport>,
}

#[derive(Debug)]
pub enum ApiError {
    BadRegion(String),
    Exhausted(ResolveError),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRegion(region) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: format!("invalid region: {region}"),
                    phases: Vec::new(),
                },
            ),
            ApiError::Exhausted(err) => (
                StatusCode::BAD_GATEWAY,
                ErrorBody {
                    error: err.to_string(),
                    phases: err.phases().to_vec(),
                },
            ),
            ApiError::Internal(err) => {
                let detail = format!("{err:#}");
                error!(error = %detail, "chart request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: "internal error".to_string(),
                        phases: Vec::new(),
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/charts/{region}", get(chart))
        .route("/api/charts/{region}", get(chart))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn chart(
    State(state): State<Arc<AppState>>,
    Path(region): Path<String>,
) -> Result<Json<ChartResult>, ApiError> {
    let Some(resolved) = state.config.region(&region) else {
        return Err(ApiError::BadRegion(region));
    };

    let worker_state = state.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let resolver = ChartResolver::for_region(
            &worker_state.config,
            worker_state.credentials.as_ref(),
            &resolved,
            &ResolveOptions::default(),
        )?;
        Ok::<_, anyhow::Error>(resolver.resolve(worker_state.transport.as_ref()))
    })
    .await
    .context("chart worker panicked")
    .map_err(ApiError::Internal)?
    .map_err(ApiError::Internal)?;

    match outcome {
        Ok(result) => Ok(Json(result)),
        Err(err) => Err(ApiError::Exhausted(err)),
    }
}

pub async fn serve(state: Arc<AppState>, bind: &str) -> Result<()> {
    let credentials = if state.credentials.is_some() {
        "present"
    } else {
        "missing"
    };
    info!(catalog_credentials = credentials, "starting chart proxy");

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind to {bind}"))?;
    info!(addr = %bind, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
