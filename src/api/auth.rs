//! Session authentication and password reset authorization.

use axum::{async_trait, http::header::AUTHORIZATION, http::request::Parts};
use axum::extract::FromRequestParts;
use serde::Serialize;
use sqlx::PgPool;

use crate::{
    api::Error,
    crypto::{hash_without_salt, verify_hash},
    id::{Id, SessionToken, UserId},
    AppState,
};

/// A user's sanitized public profile. Never includes the password hash or the session token list.
#[derive(Serialize, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// The user's ID.
    pub id: String,

    /// The user's display name.
    pub name: String,

    /// The user's email address.
    pub email: String,

    /// Whether the user has verified their email address.
    pub verified: bool,

    /// The URL of the user's avatar, if they have one.
    pub avatar: Option<String>,

    /// How many users follow this user.
    pub followers: i64,

    /// How many users this user follows.
    pub followings: i64,
}

/// The user columns a [`Profile`] is built from.
#[derive(sqlx::FromRow, Debug)]
struct SessionRow {
    /// The user's raw ID bytes.
    id: Vec<u8>,

    /// The user's display name.
    name: String,

    /// The user's email address.
    email: String,

    /// Whether the user has verified their email address.
    verified: bool,

    /// The URL of the user's avatar, if they have one.
    avatar: Option<String>,

    /// How many users follow this user.
    followers: i64,

    /// How many users this user follows.
    followings: i64,
}

/// An authenticated sign-in session, extracted from the `Authorization: Bearer` header.
///
/// Extraction short-circuits with 401 when the header is missing or malformed, or when no stored
/// session matches the presented token. On success the handler receives the sanitized profile and
/// the raw token as an explicit value rather than request-global state.
#[derive(Debug)]
pub struct Session {
    /// The sanitized profile of the signed-in user.
    pub(crate) user: Profile,

    /// The raw ID bytes of the signed-in user.
    pub(crate) user_id: Vec<u8>,

    /// The token this request presented.
    pub(crate) token: SessionToken,
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Error> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|header| header.to_str().ok())
            .and_then(|header| header.strip_prefix("Bearer "))
            .and_then(|token| token.parse::<SessionToken>().ok())
            .ok_or(Error::AuthRequired)?;

        let token_hash = hash_without_salt(&token);

        let Some(row) = sqlx::query_as::<_, SessionRow>(
            "SELECT users.id, users.name, users.email, users.verified,
                users.avatar_url AS avatar,
                (SELECT count(*) FROM follows WHERE followed_id = users.id) AS followers,
                (SELECT count(*) FROM follows WHERE follower_id = users.id) AS followings
                FROM sessions JOIN users ON users.id = sessions.user_id
                WHERE sessions.token_hash = $1",
        )
        .bind(token_hash.as_ref().to_vec())
        .fetch_optional(&state.db_pool)
        .await?
        else {
            return Err(Error::AuthRequired);
        };

        Ok(Self {
            user: Profile {
                id: Id::from(row.id.clone()).to_string(),
                name: row.name,
                email: row.email,
                verified: row.verified,
                avatar: row.avatar,
                followers: row.followers,
                followings: row.followings,
            },
            user_id: row.id,
            token,
        })
    }
}

/// Authorizes a password reset request: the presented token must match the stored reset record for
/// the given user.
///
/// A missing record and a mismatched token are indistinguishable to the caller; both respond
/// 403 `Invalid token!`.
///
/// # Errors
///
/// Returns [`Error::InvalidToken`] on any mismatch, or a database error.
pub(crate) async fn check_reset_token(
    db_pool: &PgPool,
    user_id: &UserId,
    token: &str,
) -> Result<(), Error> {
    let Some(token_hash) = sqlx::query_scalar::<_, String>(
        "SELECT token_hash FROM password_resets WHERE user_id = $1",
    )
    .bind(user_id.to_vec())
    .fetch_optional(db_pool)
    .await?
    else {
        return Err(Error::InvalidToken);
    };

    if !verify_hash(&token, &token_hash) {
        return Err(Error::InvalidToken);
    }

    Ok(())
}
