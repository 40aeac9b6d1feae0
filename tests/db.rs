//! Database-backed tests for the account lifecycle.
//!
//! These run the real router against a throwaway PostgreSQL container, covering the properties
//! the stateless router tests can't: token-record replacement, session bookkeeping and the
//! verification and password reset flows end to end.

mod common;

use std::env;

use anyhow::Context;
use argon2::{password_hash::SaltString, Argon2, PasswordHasher};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use resono_backend::{api, db, AppState};
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceExt;

/// A verification code whose hash the tests plant directly in the database, standing in for the
/// one a real user would read out of their email.
const KNOWN_CODE: &str = "123456";

/// A reset token whose hash the tests plant directly in the database.
const KNOWN_RESET_TOKEN: &str = "0123456789abcdef0123456789abcdef01234567";

/// Salts and hashes a secret the same way the server stores it.
fn hash(secret: &str) -> String {
    let salt = SaltString::encode_b64(b"lifecycle-tests!").expect("salt should be valid");

    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .expect("password hashing should be infallible")
        .to_string()
}

/// Builds a JSON `POST` request, optionally with a bearer token.
fn post_json(uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    builder
        .body(Body::from(body.to_string()))
        .expect("request should be valid")
}

/// Builds a `multipart/form-data` `POST` request carrying a single `name` field.
fn post_name_form(uri: &str, token: &str, name: &str) -> Request<Body> {
    let boundary = "lifecycle-boundary";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\n{name}\r\n--{boundary}--\r\n"
    );

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("request should be valid")
}

/// Reads a response body as JSON.
async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();

    serde_json::from_slice(&bytes).expect("body should be JSON")
}

/// Counts the rows a user owns in the given table.
async fn count_for_user(db_pool: &PgPool, table: &str, user_id: &[u8]) -> anyhow::Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(&format!(
        "SELECT count(*) FROM {table} WHERE user_id = $1"
    ))
    .bind(user_id.to_vec())
    .fetch_one(db_pool)
    .await?;

    Ok(count)
}

#[tokio::test]
async fn account_lifecycle() -> anyhow::Result<()> {
    // The handlers resolve these lazily; none of them need a live SMTP server, since delivery
    // failures are only logged.
    env::set_var("SMTP_HOSTNAME", "localhost");
    env::set_var("SMTP_USERNAME", "resono");
    env::set_var("SMTP_PASSWORD", "resono");
    env::set_var("FROM_MAILBOX", "Resono <no-reply@resono.test>");
    env::set_var("PASSWORD_RESET_LINK", "https://resono.test/reset-password");

    let _container = common::create_database().await?;
    let db_pool = db::initialize(&env::var("DATABASE_URL")?).await?;

    let app = api::routes::router(AppState {
        db_pool: db_pool.clone(),
    });

    let call = |request| {
        let app: Router = app.clone();
        async move { app.oneshot(request).await.expect("router should respond") }
    };

    // Registration: 201, the user starts unverified, and exactly one verification record exists.
    let body = json!({ "name": "Ann", "email": "ann@example.com", "password": "Abc12345!" });
    let response = call(post_json("/create", None, &body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let created = body_json(response).await;
    let user_id_str = created["user"]["id"]
        .as_str()
        .context("created user should have an ID")?
        .to_owned();
    assert_eq!(created["user"]["name"], "Ann");
    assert_eq!(created["user"]["email"], "ann@example.com");

    let user_id =
        sqlx::query_scalar::<_, Vec<u8>>("SELECT id FROM users WHERE email = $1")
            .bind("ann@example.com")
            .fetch_one(&db_pool)
            .await?;
    let verified = sqlx::query_scalar::<_, bool>("SELECT verified FROM users WHERE id = $1")
        .bind(user_id.clone())
        .fetch_one(&db_pool)
        .await?;
    assert!(!verified, "a new user should start unverified");
    assert_eq!(
        count_for_user(&db_pool, "email_verifications", &user_id).await?,
        1
    );

    // A resend replaces the verification record instead of accumulating a second one.
    let response = call(post_json(
        "/re-verify-email",
        None,
        &json!({ "userId": user_id_str }),
    ))
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        count_for_user(&db_pool, "email_verifications", &user_id).await?,
        1
    );

    // Plant a known code so the test can play the part of the email's recipient.
    sqlx::query("UPDATE email_verifications SET code_hash = $1 WHERE user_id = $2")
        .bind(hash(KNOWN_CODE))
        .bind(user_id.clone())
        .execute(&db_pool)
        .await?;

    // A wrong code is rejected and the user stays unverified.
    let response = call(post_json(
        "/verify-email",
        None,
        &json!({ "token": "654321", "userId": user_id_str }),
    ))
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "Invalid token!" })
    );

    // The right code verifies the user and consumes the record.
    let response = call(post_json(
        "/verify-email",
        None,
        &json!({ "token": KNOWN_CODE, "userId": user_id_str }),
    ))
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let verified = sqlx::query_scalar::<_, bool>("SELECT verified FROM users WHERE id = $1")
        .bind(user_id.clone())
        .fetch_one(&db_pool)
        .await?;
    assert!(verified, "verification should flip the flag");
    assert_eq!(
        count_for_user(&db_pool, "email_verifications", &user_id).await?,
        0
    );

    // Sign-in issues exactly one session per call.
    let credentials = json!({ "email": "ann@example.com", "password": "Abc12345!" });
    let response = call(post_json("/sign-in", None, &credentials)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let signed_in = body_json(response).await;
    let token = signed_in["token"]
        .as_str()
        .context("sign-in should issue a token")?
        .to_owned();
    assert_eq!(signed_in["profile"]["verified"], true);
    assert_eq!(count_for_user(&db_pool, "sessions", &user_id).await?, 1);

    let response = call(post_json("/sign-in", None, &credentials)).await;
    let second_token = body_json(response).await["token"]
        .as_str()
        .context("sign-in should issue a token")?
        .to_owned();
    assert_eq!(count_for_user(&db_pool, "sessions", &user_id).await?, 2);

    // An invalid name responds 422 before anything is written.
    let response = call(post_name_form("/update-profile2", &token, "Ñé")).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "Invalid name!" })
    );

    // A valid name update is persisted.
    let response = call(post_name_form("/update-profile2", &token, "Annabel")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["profile"]["name"], "Annabel");

    let name = sqlx::query_scalar::<_, String>("SELECT name FROM users WHERE id = $1")
        .bind(user_id.clone())
        .fetch_one(&db_pool)
        .await?;
    assert_eq!(name, "Annabel");

    // Signing out revokes exactly the presented session.
    let response = call(post_json("/log-out", Some(&second_token), &json!({}))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(count_for_user(&db_pool, "sessions", &user_id).await?, 1);

    let response = call(
        Request::builder()
            .method(Method::GET)
            .uri("/is-auth")
            .header(header::AUTHORIZATION, format!("Bearer {second_token}"))
            .body(Body::empty())
            .expect("request should be valid"),
    )
    .await;
    assert_eq!(
        response.status(),
        StatusCode::UNAUTHORIZED,
        "a revoked token shouldn't authenticate"
    );

    // `fromAll=yes` revokes every session.
    let response = call(post_json("/log-out?fromAll=yes", Some(&token), &json!({}))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(count_for_user(&db_pool, "sessions", &user_id).await?, 0);

    // A password reset request stores one record, and a repeat replaces it.
    let forget = json!({ "email": "ann@example.com" });
    let response = call(post_json("/forget-password", None, &forget)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        count_for_user(&db_pool, "password_resets", &user_id).await?,
        1
    );

    let response = call(post_json("/forget-password", None, &forget)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        count_for_user(&db_pool, "password_resets", &user_id).await?,
        1
    );

    // Plant a known reset token, as with the verification code.
    sqlx::query("UPDATE password_resets SET token_hash = $1 WHERE user_id = $2")
        .bind(hash(KNOWN_RESET_TOKEN))
        .bind(user_id.clone())
        .execute(&db_pool)
        .await?;

    let response = call(post_json(
        "/verify-pass-reset-token",
        None,
        &json!({ "token": KNOWN_RESET_TOKEN, "userId": user_id_str }),
    ))
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "valid": true }));

    // Reusing the current password is rejected and leaves the reset record in place.
    let response = call(post_json(
        "/update-password",
        None,
        &json!({
            "token": KNOWN_RESET_TOKEN,
            "userId": user_id_str,
            "password": "Abc12345!",
        }),
    ))
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "The new password must be different!" })
    );
    assert_eq!(
        count_for_user(&db_pool, "password_resets", &user_id).await?,
        1
    );

    // A fresh password goes through and consumes the reset record.
    let response = call(post_json(
        "/update-password",
        None,
        &json!({
            "token": KNOWN_RESET_TOKEN,
            "userId": user_id_str,
            "password": "Xyz98765!",
        }),
    ))
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        count_for_user(&db_pool, "password_resets", &user_id).await?,
        0
    );

    // The old password stops working and the new one signs in.
    let response = call(post_json("/sign-in", None, &credentials)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "Email/Password mismatch!" })
    );

    let response = call(post_json(
        "/sign-in",
        None,
        &json!({ "email": "ann@example.com", "password": "Xyz98765!" }),
    ))
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}
