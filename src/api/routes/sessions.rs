//! The set of users' sign-in sessions.

use axum::{extract::State, http::StatusCode};
use axum_macros::debug_handler;
use serde::{Deserialize, Serialize};

use crate::{
    api::{
        self,
        auth::{Profile, Session},
        validation::{UserEmail, UserPassword},
        Json, Query, Response,
    },
    crypto::{hash_without_salt, verify_hash},
    id::{Id, SessionToken},
    AppState,
};

/// A `POST /sign-in` request body.
#[derive(Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SignInRequest {
    /// The email address of the user signing in.
    pub email: UserEmail,

    /// The user's password in plain text.
    pub password: UserPassword,
}

/// The user columns consulted at sign-in.
#[derive(sqlx::FromRow, Debug)]
struct SignInRow {
    /// The user's raw ID bytes.
    id: Vec<u8>,

    /// The user's display name.
    name: String,

    /// Whether the user has verified their email address.
    verified: bool,

    /// The URL of the user's avatar, if they have one.
    avatar: Option<String>,

    /// The user's Argon2 password hash.
    password_hash: String,

    /// How many users follow this user.
    followers: i64,

    /// How many users this user follows.
    followings: i64,
}

/// Signs a user in, issuing a new session token and adding it to the user's set of active
/// sessions. Other devices' sessions are unaffected.
///
/// # Errors
///
/// See [`crate::api::Error`].
#[debug_handler]
pub async fn sign_in(
    State(state): State<AppState>,
    Json(body): Json<SignInRequest>,
) -> Response<SignInResponse> {
    let Some(user) = sqlx::query_as::<_, SignInRow>(
        "SELECT id, name, verified, avatar_url AS avatar, password_hash,
            (SELECT count(*) FROM follows WHERE followed_id = users.id) AS followers,
            (SELECT count(*) FROM follows WHERE follower_id = users.id) AS followings
            FROM users WHERE email = $1",
    )
    .bind(body.email.as_str())
    .fetch_optional(&state.db_pool)
    .await?
    .filter(|user| verify_hash(&body.password, &user.password_hash)) else {
        // To prevent user enumeration, send this same error response whether or not the email
        // is correct.
        return Err(api::Error::CredentialsWrong);
    };

    let mut token = SessionToken::generate();

    loop {
        let token_hash = hash_without_salt(&token);

        match sqlx::query(
            "INSERT INTO sessions (token_hash, user_id)
                VALUES ($1, $2)",
        )
        .bind(token_hash.as_ref().to_vec())
        .bind(user.id.clone())
        .execute(&state.db_pool)
        .await
        {
            Err(sqlx::Error::Database(error)) if error.constraint() == Some("sessions_pkey") => {
                token.reroll();
            }
            result => {
                result?;
                break;
            }
        }
    }

    Ok((
        StatusCode::OK,
        Json(SignInResponse {
            profile: Profile {
                id: Id::from(user.id).to_string(),
                name: user.name,
                email: body.email.to_string(),
                verified: user.verified,
                avatar: user.avatar,
                followers: user.followers,
                followings: user.followings,
            },
            token: token.to_string(),
        }),
    ))
}

/// A `POST /sign-in` response body.
#[derive(Serialize, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    /// The signed-in user's sanitized profile.
    pub profile: Profile,

    /// The newly issued session token.
    pub token: String,
}

/// A `POST /log-out` request query.
#[derive(Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LogOutQuery {
    /// When set to `yes`, revokes every session of the user instead of just the presented one.
    #[serde(default)]
    pub from_all: Option<String>,
}

/// Signs a user out, revoking the presented session token, or all of the user's session tokens if
/// `fromAll=yes` was requested.
///
/// # Errors
///
/// See [`crate::api::Error`].
#[debug_handler]
pub async fn log_out(
    State(state): State<AppState>,
    Query(query): Query<LogOutQuery>,
    session: Session,
) -> Response<LogOutResponse> {
    if query.from_all.as_deref() == Some("yes") {
        sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(session.user_id.clone())
            .execute(&state.db_pool)
            .await?;
    } else {
        let token_hash = hash_without_salt(&session.token);

        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash.as_ref().to_vec())
            .execute(&state.db_pool)
            .await?;
    }

    Ok((StatusCode::OK, Json(LogOutResponse { success: true })))
}

/// A `POST /log-out` response body.
#[derive(Serialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LogOutResponse {
    /// Whether the sign-out succeeded. Always true; failures respond with an error instead.
    pub success: bool,
}
