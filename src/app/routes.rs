use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::AppState;
use crate::context::Context;
use crate::features::FeatureRecord;
use crate::middleware::{
    LoggerMiddleware, MetricsMiddleware, Pipeline, TimeoutMiddleware, from_middleware,
};
use crate::security::{AuthError, Identity};
use crate::{Response, Router, StatusCode};

/// Body of `POST /login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Body of a successful `POST /login`.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Wires every endpoint to `state` and wraps the router in the global
/// logging and timeout layers.
///
/// `POST /predict` sits behind the [`AuthGate`](crate::security::AuthGate);
/// `GET /health`, `GET /metrics` and `POST /login` are open.
pub fn build_pipeline(state: Arc<AppState>) -> Pipeline {
    let mut router = Router::new();

    router.get("/health", |_ctx: Context| async { health() });

    let metrics_state = Arc::clone(&state);
    router.get("/metrics", move |_ctx: Context| {
        let state = Arc::clone(&metrics_state);
        async move { metrics(&state) }
    });

    let login_state = Arc::clone(&state);
    router.post("/login", move |ctx: Context| {
        let state = Arc::clone(&login_state);
        async move { login(&state, &ctx) }
    });

    let predict_state = Arc::clone(&state);
    router.post_with(
        "/predict",
        vec![from_middleware(Arc::clone(&state.gate))],
        move |ctx: Context| {
            let state = Arc::clone(&predict_state);
            async move { predict(&state, &ctx).await }
        },
    );

    Pipeline::new(router)
        .layer(LoggerMiddleware)
        .layer(MetricsMiddleware::new(state.recorder()))
        .layer(TimeoutMiddleware::new(state.settings.request_timeout))
}

fn health() -> Response {
    Response::json(StatusCode::Ok, &serde_json::json!({ "status": "ok" }))
}

fn metrics(state: &AppState) -> Response {
    Response::new(StatusCode::Ok)
        .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
        .body(state.metrics.render())
}

fn login(state: &AppState, ctx: &Context) -> Response {
    let body: LoginRequest = match ctx.json() {
        Ok(body) => body,
        Err(e) => return malformed(e),
    };

    match state.issuer.login(&body.username, &body.password) {
        Ok(access_token) => Response::json(
            StatusCode::Ok,
            &LoginResponse {
                access_token,
                token_type: "bearer".into(),
            },
        ),
        Err(e @ AuthError::BadLogin) => {
            warn!("login rejected");
            Response::detail(StatusCode::Unauthorized, e.to_string())
                .header("WWW-Authenticate", "Bearer")
        }
        Err(e) => {
            error!(error = %e, "failed to issue token");
            Response::detail(StatusCode::InternalServerError, "failed to issue token")
        }
    }
}

async fn predict(state: &AppState, ctx: &Context) -> Response {
    // The gate inserts the identity; its absence means the route was wired
    // without it.
    if ctx.extensions().get::<Identity>().is_none() {
        return Response::detail(StatusCode::Unauthorized, "not authenticated");
    }

    let record: FeatureRecord = match ctx.json() {
        Ok(record) => record,
        Err(e) => return malformed(e),
    };

    match state.prediction.predict(&record).await {
        Ok(raw) => Response::json(StatusCode::Ok, &state.converter.quote(raw)),
        Err(e) => {
            error!(error = %e, "prediction failed");
            Response::detail(StatusCode::InternalServerError, "prediction failed")
        }
    }
}

fn malformed(e: serde_json::Error) -> Response {
    Response::detail(
        StatusCode::UnprocessableEntity,
        format!("invalid request body: {e}"),
    )
}
