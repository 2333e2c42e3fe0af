//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and the shared [`services::AppServices`]
//! - `routes/`: handlers, one file per area
//! - `errors.rs`: error classification to status and JSON body

use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{get, post},
};

use crate::gate::{GateMode, GateState, gate_middleware};

pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<AppServices>) -> Router {
    // Session routes act on the caller's own tokens: authenticated, not enforced.
    let session = Router::new()
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/logout-all", post(routes::auth::logout_all))
        .route("/whoami", get(routes::system::whoami))
        .layer(axum::middleware::from_fn_with_state(
            GateState::new(services.clone(), GateMode::Authenticate),
            gate_middleware,
        ));

    let protected = routes::rbac::router().layer(axum::middleware::from_fn_with_state(
        GateState::new(services.clone(), GateMode::Enforce),
        gate_middleware,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/auth/refresh", post(routes::auth::refresh))
        .merge(session)
        .merge(protected)
        .layer(Extension(services))
}
