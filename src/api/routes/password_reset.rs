//! The set of password reset requests.

use axum::{extract::State, http::StatusCode};
use axum_macros::debug_handler;
use lettre::{message::Mailbox, Address};
use serde::{Deserialize, Serialize};

use crate::{
    api::{
        self, auth,
        routes::email_verification::MessageResponse,
        validation::{NewUserPassword, ResetToken, UserEmail},
        Json, Response,
    },
    crypto::{generate_reset_token, hash_with_salt, verify_hash},
    db::{self, TxResult},
    email::{ForgotPasswordMessage, MessageTemplate, PasswordResetSuccessMessage, SendMessage},
    id::{Id, UserId},
    AppState, PASSWORD_RESET_LINK,
};

/// A `POST /forget-password` request body.
#[derive(Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RequestBody {
    /// The email address of the account to reset the password for.
    pub email: UserEmail,
}

/// The user columns needed to issue a password reset.
#[derive(sqlx::FromRow, Debug)]
struct ResetUserRow {
    /// The user's raw ID bytes.
    id: Vec<u8>,

    /// The user's display name.
    name: String,
}

/// Replaces any existing password reset record for the account with a fresh token and emails the
/// user a link embedding the token and their user ID.
///
/// Unknown accounts respond 404. This mirrors the upstream behavior; it does allow account
/// enumeration through this route.
///
/// # Errors
///
/// See [`crate::api::Error`].
#[debug_handler]
pub async fn request(
    State(state): State<AppState>,
    Json(body): Json<RequestBody>,
) -> Response<MessageResponse> {
    let Some(user) = sqlx::query_as::<_, ResetUserRow>("SELECT id, name FROM users WHERE email = $1")
        .bind(body.email.as_str())
        .fetch_optional(&state.db_pool)
        .await?
    else {
        return Err(api::Error::AccountNotFound);
    };

    let token = generate_reset_token();
    let token_hash = hash_with_salt(&token);

    db::transaction!(state.db_pool, async |tx| -> TxResult<_, api::Error> {
        sqlx::query("DELETE FROM password_resets WHERE user_id = $1")
            .bind(user.id.clone())
            .execute(tx.as_mut())
            .await?;

        sqlx::query(
            "INSERT INTO password_resets (user_id, token_hash)
                VALUES ($1, $2)",
        )
        .bind(user.id.clone())
        .bind(&token_hash)
        .execute(tx.as_mut())
        .await?;

        Ok(())
    })
    .await?;

    let reset_link = format!(
        "{}?token={}&userId={}",
        *PASSWORD_RESET_LINK,
        token,
        Id::from(user.id.clone())
    );

    ForgotPasswordMessage {
        name: &user.name,
        reset_link: &reset_link,
    }
    .to(Mailbox::new(Some(user.name.clone()), body.email.into_inner()))
    .send();

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Check your registered mail.".into(),
        }),
    ))
}

/// A request body carrying a password reset token and the ID of the user it was issued to. Used
/// by `POST /verify-pass-reset-token`.
#[derive(Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TokenAndIdRequest {
    /// The password reset token from the emailed link.
    pub token: ResetToken,

    /// The ID of the user the token was issued to.
    pub user_id: UserId,
}

/// Confirms that a password reset token is (still) valid without consuming it, so a reset page
/// can check the link before showing a password form.
///
/// # Errors
///
/// See [`crate::api::Error`].
#[debug_handler]
pub async fn grant_valid(
    State(state): State<AppState>,
    Json(body): Json<TokenAndIdRequest>,
) -> Response<GrantValidResponse> {
    auth::check_reset_token(&state.db_pool, &body.user_id, &body.token).await?;

    Ok((StatusCode::OK, Json(GrantValidResponse { valid: true })))
}

/// A `POST /verify-pass-reset-token` response body.
#[derive(Serialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GrantValidResponse {
    /// Whether the token is valid. Always true; invalid tokens respond with an error instead.
    pub valid: bool,
}

/// A `POST /update-password` request body.
#[derive(Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdatePasswordRequest {
    /// The password reset token from the emailed link.
    pub token: ResetToken,

    /// The ID of the user the token was issued to.
    pub user_id: UserId,

    /// The user's new password in plain text.
    pub password: NewUserPassword,
}

/// The user columns consulted when fulfilling a password reset.
#[derive(sqlx::FromRow, Debug)]
struct PasswordRow {
    /// The user's display name.
    name: String,

    /// The user's email address.
    email: String,

    /// The user's current Argon2 password hash.
    password_hash: String,
}

/// Sets a new password to fulfill a password reset request, consuming the reset record and
/// sending a confirmation email.
///
/// The new password must differ from the current one; reuse responds 422 and leaves the reset
/// record in place so the user can try again.
///
/// # Errors
///
/// See [`crate::api::Error`].
#[debug_handler]
pub async fn update_password(
    State(state): State<AppState>,
    Json(body): Json<UpdatePasswordRequest>,
) -> Response<MessageResponse> {
    auth::check_reset_token(&state.db_pool, &body.user_id, &body.token).await?;

    let Some(user) = sqlx::query_as::<_, PasswordRow>(
        "SELECT name, email, password_hash FROM users WHERE id = $1",
    )
    .bind(body.user_id.to_vec())
    .fetch_optional(&state.db_pool)
    .await?
    else {
        return Err(api::Error::Unauthorized);
    };

    if verify_hash(&body.password, &user.password_hash) {
        return Err(api::Error::SamePassword);
    }

    let password_hash = hash_with_salt(&body.password);

    db::transaction!(state.db_pool, async |tx| -> TxResult<_, api::Error> {
        sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(&password_hash)
            .bind(body.user_id.to_vec())
            .execute(tx.as_mut())
            .await?;

        sqlx::query("DELETE FROM password_resets WHERE user_id = $1")
            .bind(body.user_id.to_vec())
            .execute(tx.as_mut())
            .await?;

        Ok(())
    })
    .await?;

    PasswordResetSuccessMessage { name: &user.name }
        .to(Mailbox::new(
            Some(user.name.clone()),
            user.email.parse::<Address>()?,
        ))
        .send();

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Password resets successfully.".into(),
        }),
    ))
}
