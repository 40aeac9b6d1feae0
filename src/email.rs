//! Utilities for sending emails.

use std::sync::LazyLock;

use askama::Template;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

/// An email template giving a new user their email verification code.
#[derive(Template)]
#[template(path = "email/verification.html")]
pub(crate) struct VerificationMessage<'a> {
    /// The name of the user being verified.
    pub(crate) name: &'a str,

    /// The one-time numeric code the user must submit to verify their email.
    pub(crate) code: &'a str,
}

impl MessageTemplate for VerificationMessage<'_> {
    fn subject(&self) -> String {
        "Verify your email - Resono".into()
    }
}

/// An email template linking a user to their password reset page.
#[derive(Template)]
#[template(path = "email/forgot_password.html")]
pub(crate) struct ForgotPasswordMessage<'a> {
    /// The name of the user who requested the reset.
    pub(crate) name: &'a str,

    /// The URL the user must visit to set a new password.
    pub(crate) reset_link: &'a str,
}

impl MessageTemplate for ForgotPasswordMessage<'_> {
    fn subject(&self) -> String {
        "Reset your password - Resono".into()
    }
}

/// An email template confirming that a user's password was changed.
#[derive(Template)]
#[template(path = "email/password_reset_success.html")]
pub(crate) struct PasswordResetSuccessMessage<'a> {
    /// The name of the user whose password changed.
    pub(crate) name: &'a str,
}

impl MessageTemplate for PasswordResetSuccessMessage<'_> {
    fn subject(&self) -> String {
        "Your password was changed - Resono".into()
    }
}

/// The SMTP transport used to send automated emails.
static MAILER: LazyLock<AsyncSmtpTransport<Tokio1Executor>> = LazyLock::new(|| {
    let hostname =
        dotenvy::var("SMTP_HOSTNAME").expect("environment variable `SMTP_HOSTNAME` should be set");
    let username =
        dotenvy::var("SMTP_USERNAME").expect("environment variable `SMTP_USERNAME` should be set");
    let password =
        dotenvy::var("SMTP_PASSWORD").expect("environment variable `SMTP_PASSWORD` should be set");

    AsyncSmtpTransport::<Tokio1Executor>::relay(&hostname)
        .expect("SMTP relay couldn't be initialized")
        .credentials(Credentials::new(username, password))
        .build()
});

/// The mailbox automated emails are sent from.
static FROM_MAILBOX: LazyLock<Mailbox> = LazyLock::new(|| {
    dotenvy::var("FROM_MAILBOX")
        .expect("environment variable `FROM_MAILBOX` should be set")
        .parse()
        .expect("environment variable `FROM_MAILBOX` should be a valid mailbox")
});

/// An HTML [`Template`] for an email message.
pub(crate) trait MessageTemplate: Template {
    /// Gets the message's subject line.
    fn subject(&self) -> String;

    /// Generates a multipart HTML and plain text body for the email message template.
    fn to(&self, mailbox: Mailbox) -> Message {
        let html = self.to_string();
        let plain = html2text::from_read(html.as_bytes(), usize::MAX);

        Message::builder()
            .from(FROM_MAILBOX.clone())
            .to(mailbox)
            .subject(self.subject())
            .multipart(MultiPart::alternative_plain_html(plain, html))
            .expect("message should be valid")
    }
}

/// An email [`Message`] that can be sent in the background.
pub(crate) trait SendMessage {
    /// Sends the message on a spawned task, without waiting for or reporting the outcome. Delivery
    /// failures are only logged; no handler retries or surfaces them.
    fn send(self);
}

impl SendMessage for Message {
    fn send(self) {
        tokio::spawn(async move {
            if let Err(error) = MAILER.send(self).await {
                tracing::error!(%error, "failed to send email");
            }
        });
    }
}
