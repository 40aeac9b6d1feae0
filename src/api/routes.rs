//! All routes for the HTTP API.

pub mod email_verification;
pub mod password_reset;
pub mod sessions;
pub mod users;

use axum::{
    routing::{get, post},
    Router,
};

use crate::{api, AppState};

/// Builds the API router over the shared application state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/create", post(users::create))
        .route("/verify-email", post(email_verification::verify))
        .route("/re-verify-email", post(email_verification::resend))
        .route("/forget-password", post(password_reset::request))
        .route("/verify-pass-reset-token", post(password_reset::grant_valid))
        .route("/update-password", post(password_reset::update_password))
        .route("/sign-in", post(sessions::sign_in))
        .route("/is-auth", get(users::profile))
        .route("/log-out", post(sessions::log_out))
        .route("/update-profile2", post(users::update_profile))
        .fallback(|| async { api::Error::RouteNotFound })
        .with_state(state)
}
