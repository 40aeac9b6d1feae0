//! The set of user accounts and the signed-in user's profile.

use axum::{extract::State, http::StatusCode};
use axum_macros::debug_handler;
use lettre::message::Mailbox;
use serde::{Deserialize, Serialize};

use crate::{
    api::{
        self,
        auth::{Profile, Session},
        validation::{NewUserPassword, UserEmail, UserName},
        FormData, Json, Response,
    },
    crypto::{generate_verification_code, hash_with_salt},
    db::{self, TxError, TxResult},
    email::{MessageTemplate, SendMessage, VerificationMessage},
    id::UserId,
    media, AppState,
};

/// A `POST /create` request body.
#[derive(Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateRequest {
    /// The user's display name.
    pub name: UserName,

    /// The user's email address.
    pub email: UserEmail,

    /// The user's password in plain text.
    pub password: NewUserPassword,
}

/// Creates a new unverified user, stores a hashed verification code for them, and emails them the
/// code in plain text.
///
/// # Errors
///
/// See [`crate::api::Error`].
#[debug_handler]
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateRequest>,
) -> Response<CreateResponse> {
    let mut user_id = UserId::generate();

    let password_hash = hash_with_salt(&body.password);

    let code = generate_verification_code();
    let code_hash = hash_with_salt(&code);

    db::transaction!(state.db_pool, async |tx| -> TxResult<_, api::Error> {
        // A failed `INSERT` aborts the whole transaction, so an ID collision can't retry in
        // place; reroll and rerun the transaction from the top instead.
        match sqlx::query(
            "INSERT INTO users (id, email, name, password_hash)
                VALUES ($1, $2, $3, $4)",
        )
        .bind(user_id.to_vec())
        .bind(body.email.as_str())
        .bind(&*body.name)
        .bind(&password_hash)
        .execute(tx.as_mut())
        .await
        {
            Err(sqlx::Error::Database(error)) => match error.constraint() {
                Some("users_pkey") => {
                    user_id.reroll();
                    return Err(TxError::Retry);
                }
                Some("users_email_key") => return Err(TxError::Abort(api::Error::EmailTaken)),
                _ => return Err(sqlx::Error::Database(error).into()),
            },
            result => {
                result?;
            }
        }

        sqlx::query(
            "INSERT INTO email_verifications (user_id, code_hash)
                VALUES ($1, $2)",
        )
        .bind(user_id.to_vec())
        .bind(&code_hash)
        .execute(tx.as_mut())
        .await?;

        Ok(())
    })
    .await?;

    VerificationMessage {
        name: &body.name,
        code: &code,
    }
    .to(Mailbox::new(
        Some(body.name.to_string()),
        body.email.clone().into_inner(),
    ))
    .send();

    Ok((
        StatusCode::CREATED,
        Json(CreateResponse {
            user: CreatedUser {
                id: user_id.to_string(),
                name: body.name,
                email: body.email,
            },
        }),
    ))
}

/// A `POST /create` response body.
#[derive(Serialize, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateResponse {
    /// The created user's partial profile.
    pub user: CreatedUser,
}

/// The partial profile of a just-created user.
#[derive(Serialize, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreatedUser {
    /// The user's ID.
    pub id: String,

    /// The user's display name.
    pub name: UserName,

    /// The user's email address.
    pub email: UserEmail,
}

/// Returns the signed-in user's sanitized profile.
///
/// # Errors
///
/// See [`crate::api::Error`].
#[debug_handler(state = AppState)]
pub async fn profile(session: Session) -> Response<ProfileResponse> {
    Ok((
        StatusCode::OK,
        Json(ProfileResponse {
            profile: session.user,
        }),
    ))
}

/// A profile response body, shared by `GET /is-auth` and `POST /update-profile2`.
#[derive(Serialize, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    /// The user's sanitized profile.
    pub profile: Profile,
}

/// The avatar columns consulted before replacing a user's avatar.
#[derive(sqlx::FromRow, Debug)]
struct AvatarRow {
    /// The media host's asset ID for the current avatar, if any.
    avatar_asset_id: Option<String>,
}

/// Updates the signed-in user's display name and, if an `avatar` file was submitted, replaces
/// their avatar on the media host.
///
/// The name is validated before any avatar operation runs, so an invalid name never touches the
/// media host.
///
/// # Errors
///
/// See [`crate::api::Error`].
#[debug_handler]
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    form: FormData,
) -> Response<ProfileResponse> {
    let Some(name) = form
        .fields
        .get("name")
        .map(|name| name.trim())
        .filter(|name| name.chars().count() >= 3)
    else {
        return Err(api::Error::InvalidName);
    };

    let mut profile = session.user;
    profile.name = name.to_owned();

    let avatar = form.files.get("avatar").and_then(|files| files.first());

    if let Some(file) = avatar {
        let Some(row) = sqlx::query_as::<_, AvatarRow>(
            "SELECT avatar_asset_id FROM users WHERE id = $1",
        )
        .bind(session.user_id.clone())
        .fetch_optional(&state.db_pool)
        .await?
        else {
            return Err(api::Error::UserGone);
        };

        if let Some(old_asset_id) = row.avatar_asset_id {
            media::destroy(&old_asset_id).await?;
        }

        let asset = media::upload_avatar(file.file_name.clone(), file.bytes.clone()).await?;

        sqlx::query(
            "UPDATE users
                SET name = $1, avatar_url = $2, avatar_asset_id = $3
                WHERE id = $4",
        )
        .bind(name)
        .bind(&asset.url)
        .bind(&asset.asset_id)
        .bind(session.user_id.clone())
        .execute(&state.db_pool)
        .await?;

        profile.avatar = Some(asset.url);
    } else {
        let result = sqlx::query("UPDATE users SET name = $1 WHERE id = $2")
            .bind(name)
            .bind(session.user_id.clone())
            .execute(&state.db_pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(api::Error::UserGone);
        }
    }

    Ok((StatusCode::OK, Json(ProfileResponse { profile })))
}
