//! The set of email verification requests for new users.

use axum::{extract::State, http::StatusCode};
use axum_macros::debug_handler;
use lettre::{message::Mailbox, Address};
use serde::{Deserialize, Serialize};

use crate::{
    api::{
        self,
        validation::VerificationCode,
        Json, Response,
    },
    crypto::{generate_verification_code, hash_with_salt, verify_hash},
    db::{self, TxError, TxResult},
    email::{MessageTemplate, SendMessage, VerificationMessage},
    id::UserId,
    AppState,
};

/// A `POST /verify-email` request body.
#[derive(Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VerifyRequest {
    /// The verification code emailed to the user.
    pub token: VerificationCode,

    /// The ID of the user being verified.
    pub user_id: UserId,
}

/// Marks a user's email as verified if the submitted code matches their stored verification
/// record, consuming the record.
///
/// # Errors
///
/// See [`crate::api::Error`].
#[debug_handler]
pub async fn verify(
    State(state): State<AppState>,
    Json(body): Json<VerifyRequest>,
) -> Response<MessageResponse> {
    db::transaction!(state.db_pool, async |tx| -> TxResult<_, api::Error> {
        let Some(code_hash) = sqlx::query_scalar::<_, String>(
            "SELECT code_hash FROM email_verifications
                WHERE user_id = $1 AND created_at > now() - interval '1 hour'",
        )
        .bind(body.user_id.to_vec())
        .fetch_optional(tx.as_mut())
        .await?
        else {
            return Err(TxError::Abort(api::Error::InvalidToken));
        };

        if !verify_hash(&body.token, &code_hash) {
            return Err(TxError::Abort(api::Error::InvalidToken));
        }

        sqlx::query("UPDATE users SET verified = TRUE WHERE id = $1")
            .bind(body.user_id.to_vec())
            .execute(tx.as_mut())
            .await?;

        sqlx::query("DELETE FROM email_verifications WHERE user_id = $1")
            .bind(body.user_id.to_vec())
            .execute(tx.as_mut())
            .await?;

        Ok(())
    })
    .await?;

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Your email is verified!".into(),
        }),
    ))
}

/// A `POST /re-verify-email` request body.
#[derive(Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResendRequest {
    /// The ID of the user to send a new verification code to.
    pub user_id: UserId,
}

/// The user columns needed to address a verification email.
#[derive(sqlx::FromRow, Debug)]
struct ContactRow {
    /// The user's display name.
    name: String,

    /// The user's email address.
    email: String,
}

/// Replaces a user's verification record with a fresh code and emails it to them. Any previously
/// issued code stops working.
///
/// # Errors
///
/// See [`crate::api::Error`].
#[debug_handler]
pub async fn resend(
    State(state): State<AppState>,
    Json(body): Json<ResendRequest>,
) -> Response<MessageResponse> {
    let Some(user) =
        sqlx::query_as::<_, ContactRow>("SELECT name, email FROM users WHERE id = $1")
            .bind(body.user_id.to_vec())
            .fetch_optional(&state.db_pool)
            .await?
    else {
        return Err(api::Error::InvalidRequest);
    };

    let code = generate_verification_code();
    let code_hash = hash_with_salt(&code);

    db::transaction!(state.db_pool, async |tx| -> TxResult<_, api::Error> {
        sqlx::query("DELETE FROM email_verifications WHERE user_id = $1")
            .bind(body.user_id.to_vec())
            .execute(tx.as_mut())
            .await?;

        sqlx::query(
            "INSERT INTO email_verifications (user_id, code_hash)
                VALUES ($1, $2)",
        )
        .bind(body.user_id.to_vec())
        .bind(&code_hash)
        .execute(tx.as_mut())
        .await?;

        Ok(())
    })
    .await?;

    VerificationMessage {
        name: &user.name,
        code: &code,
    }
    .to(Mailbox::new(
        Some(user.name.clone()),
        user.email.parse::<Address>()?,
    ))
    .send();

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Please check your mail.".into(),
        }),
    ))
}

/// A plain message response body, shared by several routes in this module and its siblings.
#[derive(Serialize, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    /// A human-readable description of the outcome.
    pub message: String,
}
