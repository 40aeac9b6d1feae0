//! A client for the third-party media host that stores uploaded files.

use std::sync::LazyLock;

use reqwest::multipart;
use serde::Deserialize;

/// The URI origin of the media host's HTTP API.
static MEDIA_API_ORIGIN: LazyLock<String> = LazyLock::new(|| {
    dotenvy::var("MEDIA_API_ORIGIN")
        .expect("environment variable `MEDIA_API_ORIGIN` should be set")
});

/// The API key authorizing requests to the media host.
static MEDIA_API_KEY: LazyLock<String> = LazyLock::new(|| {
    dotenvy::var("MEDIA_API_KEY").expect("environment variable `MEDIA_API_KEY` should be set")
});

/// The HTTP client used for all media host requests.
static CLIENT: LazyLock<reqwest::Client> = LazyLock::new(reqwest::Client::new);

/// A file stored by the media host.
#[derive(Deserialize, Clone, PartialEq, Eq, Debug)]
pub(crate) struct MediaAsset {
    /// The URL the file is publicly served from.
    #[serde(rename = "secure_url")]
    pub(crate) url: String,

    /// The host's identifier for the file, needed to destroy it later.
    #[serde(rename = "public_id")]
    pub(crate) asset_id: String,
}

/// Uploads an avatar image, asking the host to crop it to a 300x300 face-centered thumbnail.
///
/// # Errors
///
/// Returns an error if the upload request fails or its response cannot be processed.
pub(crate) async fn upload_avatar(
    file_name: Option<String>,
    bytes: Vec<u8>,
) -> Result<MediaAsset, reqwest::Error> {
    let mut file = multipart::Part::bytes(bytes);

    if let Some(file_name) = file_name {
        file = file.file_name(file_name);
    }

    let form = multipart::Form::new()
        .part("file", file)
        .text("width", "300")
        .text("height", "300")
        .text("crop", "thumb")
        .text("gravity", "face");

    CLIENT
        .post(format!("{}/image/upload", *MEDIA_API_ORIGIN))
        .bearer_auth(&*MEDIA_API_KEY)
        .multipart(form)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
}

/// Destroys a previously uploaded file by its asset ID.
///
/// # Errors
///
/// Returns an error if the destroy request fails.
pub(crate) async fn destroy(asset_id: &str) -> Result<(), reqwest::Error> {
    CLIENT
        .post(format!("{}/image/destroy", *MEDIA_API_ORIGIN))
        .bearer_auth(&*MEDIA_API_KEY)
        .json(&serde_json::json!({ "public_id": asset_id }))
        .send()
        .await?
        .error_for_status()?;

    Ok(())
}
