//! The HTTP API: its error taxonomy, typed extractors and route table.

pub mod auth;
pub mod routes;
pub mod validation;

use std::collections::HashMap;

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Multipart, Request},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// The response type of every API handler.
pub type Response<T> = Result<(StatusCode, Json<T>), Error>;

/// An error responding to an API request.
///
/// Every variant maps to a status code and a JSON body of the form `{"error": "..."}`. Server
/// errors are reported with a generic message so internals never leak to clients.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The request body was empty. Reported before any field validation runs.
    #[error("Empty body is not expected!")]
    EmptyBody,

    /// A request field failed validation. Carries the message for the first failing field.
    #[error("{0}")]
    Validation(String),

    /// A `multipart/form-data` route received some other content type.
    #[error("Only accepts form-data!")]
    OnlyFormData,

    /// A profile update's name was missing or shorter than 3 characters after trimming.
    #[error("Invalid name!")]
    InvalidName,

    /// A password reset tried to reuse the account's current password.
    #[error("The new password must be different!")]
    SamePassword,

    /// An account with the requested email already exists.
    #[error("Email is already in use!")]
    EmailTaken,

    /// The `Authorization` header was missing, malformed or matched no session.
    #[error("Unauthorized request!")]
    AuthRequired,

    /// A verification code or password reset token didn't match the stored record, or no record
    /// exists. One message for both cases, so callers can't probe which check failed.
    #[error("Invalid token!")]
    InvalidToken,

    /// A verification resend was requested for a user that doesn't exist.
    #[error("Invalid request!")]
    InvalidRequest,

    /// A password update's user record disappeared between token check and password change.
    #[error("Unauthorized access!")]
    Unauthorized,

    /// Sign-in failed. Deliberately identical whether the email or the password was wrong, to
    /// prevent account enumeration.
    #[error("Email/Password mismatch!")]
    CredentialsWrong,

    /// No account exists for the requested email.
    #[error("Account not found!")]
    AccountNotFound,

    /// The requested route doesn't exist.
    #[error("Route not found!")]
    RouteNotFound,

    /// A user record referenced by a live session is missing. Internal consistency failure, not a
    /// client error.
    #[error("user record missing for an authenticated session")]
    UserGone,

    /// A database operation failed.
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// A media host request failed.
    #[error(transparent)]
    MediaHost(#[from] reqwest::Error),

    /// A stored email address couldn't be parsed back into a mailbox.
    #[error(transparent)]
    EmailAddress(#[from] lettre::address::AddressError),
}

impl Error {
    /// Gets the HTTP status code this error responds with.
    fn status(&self) -> StatusCode {
        match self {
            Self::EmptyBody
            | Self::Validation(_)
            | Self::OnlyFormData
            | Self::InvalidName
            | Self::SamePassword
            | Self::EmailTaken => StatusCode::UNPROCESSABLE_ENTITY,
            Self::AuthRequired => StatusCode::UNAUTHORIZED,
            Self::InvalidToken
            | Self::InvalidRequest
            | Self::Unauthorized
            | Self::CredentialsWrong => StatusCode::FORBIDDEN,
            Self::AccountNotFound | Self::RouteNotFound => StatusCode::NOT_FOUND,
            Self::UserGone | Self::Database(_) | Self::MediaHost(_) | Self::EmailAddress(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();

        let message = if status.is_server_error() {
            tracing::error!(error = %self, "internal error while handling request");
            "Something went wrong!".to_owned()
        } else {
            self.to_string()
        };

        (status, axum::Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// A JSON request or response body.
///
/// As an extractor, buffers the body and deserializes it through the route's request type. An
/// empty body is rejected with its own message before any field validation runs; a failing field
/// is rejected with that field's validation message.
#[derive(Clone, Copy, Default, Debug)]
pub struct Json<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(request, state)
            .await
            .map_err(|rejection| Error::Validation(rejection.body_text()))?;

        if bytes.is_empty() {
            return Err(Error::EmptyBody);
        }

        serde_json::from_slice(&bytes)
            .map(Self)
            .map_err(|error| Error::Validation(error.to_string()))
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> axum::response::Response {
        axum::Json(self.0).into_response()
    }
}

/// A typed request query string whose rejections respond in the API's error format.
#[derive(Clone, Copy, Default, Debug)]
pub struct Query<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for Query<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        axum::extract::Query::from_request_parts(parts, state)
            .await
            .map(|axum::extract::Query(query)| Self(query))
            .map_err(|rejection| Error::Validation(rejection.body_text()))
    }
}

/// A parsed `multipart/form-data` request body.
///
/// Text fields are reduced to their first provided value; file fields keep every uploaded file,
/// buffered in memory. Any other content type is rejected up front, and multipart decode failures
/// respond as validation errors rather than propagating as server errors.
#[derive(Default, Debug)]
pub struct FormData {
    /// Each text field's first value, by field name.
    pub(crate) fields: HashMap<String, String>,

    /// Each file field's uploaded files, by field name.
    pub(crate) files: HashMap<String, Vec<FormFile>>,
}

/// A file uploaded through a [`FormData`] request.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FormFile {
    /// The file name the client supplied, if any.
    pub(crate) file_name: Option<String>,

    /// The file's contents.
    pub(crate) bytes: Vec<u8>,
}

#[async_trait]
impl<S: Send + Sync> FromRequest<S> for FormData {
    type Rejection = Error;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(request, state)
            .await
            .map_err(|_| Error::OnlyFormData)?;

        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|error| Error::Validation(error.to_string()))?
        {
            let Some(name) = field.name().map(ToOwned::to_owned) else {
                continue;
            };

            if field.file_name().is_some() {
                let file_name = field.file_name().map(ToOwned::to_owned);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|error| Error::Validation(error.to_string()))?
                    .to_vec();

                form.files
                    .entry(name)
                    .or_default()
                    .push(FormFile { file_name, bytes });
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|error| Error::Validation(error.to_string()))?;

                form.fields.entry(name).or_insert(text);
            }
        }

        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_keep_their_message() {
        let response = Error::InvalidToken.into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn server_errors_map_to_500() {
        assert_eq!(
            Error::UserGone.status(),
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal consistency failures should respond 500"
        );
        assert_eq!(
            Error::Database(sqlx::Error::PoolClosed).status(),
            StatusCode::INTERNAL_SERVER_ERROR,
            "database failures should respond 500"
        );
    }

    #[test]
    fn statuses_match_the_error_taxonomy() {
        assert_eq!(Error::EmptyBody.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(Error::AuthRequired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::CredentialsWrong.status(), StatusCode::FORBIDDEN);
        assert_eq!(Error::AccountNotFound.status(), StatusCode::NOT_FOUND);
    }
}
