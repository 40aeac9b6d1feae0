//! Resono's backend web server: user accounts, sign-in sessions and audio-track metadata.

pub mod api;
pub mod audio;
pub(crate) mod crypto;
pub mod db;
pub(crate) mod email;
pub mod id;
pub(crate) mod media;

use std::sync::LazyLock;

use sqlx::PgPool;

/// The base URL of the password reset page. The reset token and user ID are appended to it as
/// query parameters in password reset emails.
pub static PASSWORD_RESET_LINK: LazyLock<String> = LazyLock::new(|| {
    dotenvy::var("PASSWORD_RESET_LINK")
        .expect("environment variable `PASSWORD_RESET_LINK` should be set")
});

/// State shared by all request handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// The SQLx database pool.
    pub db_pool: PgPool,
}
