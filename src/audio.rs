//! Audio track metadata types.
//!
//! Track upload, editing and deletion are handled by separate services; this backend only owns the
//! schema these records are stored under.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// The category an audio track is filed under.
#[derive(
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
)]
pub enum Category {
    /// Arts and culture.
    Arts,

    /// Business and finance.
    Business,

    /// Educational content.
    Education,

    /// General entertainment.
    Entertainment,

    /// Content for children and families.
    #[serde(rename = "Kids & Family")]
    #[strum(serialize = "Kids & Family")]
    KidsAndFamily,

    /// Music and musical performance.
    Music,

    /// Science and research.
    Science,

    /// Technology.
    Tech,

    /// The catch-all category tracks default to.
    #[default]
    Others,
}

impl TryFrom<String> for Category {
    type Error = strum::ParseError;

    fn try_from(string: String) -> Result<Self, Self::Error> {
        string.parse()
    }
}

/// A stored audio track.
#[derive(sqlx::FromRow, Clone, PartialEq, Eq, Debug)]
pub struct Audio {
    /// The track's ID.
    pub id: Vec<u8>,

    /// The track's title.
    pub title: String,

    /// A description of the track.
    pub about: String,

    /// The ID of the user who owns the track.
    pub owner_id: Vec<u8>,

    /// The URL the audio file is served from.
    pub file_url: String,

    /// The media host's asset ID for the audio file.
    pub file_asset_id: String,

    /// The URL of the track's poster image, if one was uploaded.
    pub poster_url: Option<String>,

    /// The media host's asset ID for the poster image, if one was uploaded.
    pub poster_asset_id: Option<String>,

    /// The category the track is filed under.
    #[sqlx(try_from = "String")]
    pub category: Category,
}

#[cfg(test)]
#[expect(clippy::missing_errors_doc, reason = "see rust-lang/rust-clippy#13391")]
mod tests {
    use super::*;

    #[test]
    fn category_defaults_to_others() {
        assert_eq!(Category::default(), Category::Others);
    }

    #[test]
    fn category_round_trips_through_its_display_form() -> anyhow::Result<()> {
        for category in [
            Category::Arts,
            Category::KidsAndFamily,
            Category::Tech,
            Category::Others,
        ] {
            assert_eq!(category, category.to_string().parse()?);
        }

        Ok(())
    }

    #[test]
    fn category_serializes_to_its_display_name() -> anyhow::Result<()> {
        assert_eq!(
            serde_json::to_string(&Category::KidsAndFamily)?,
            r#""Kids & Family""#
        );
        assert_eq!(serde_json::to_string(&Category::Others)?, r#""Others""#);

        Ok(())
    }

    #[test]
    fn unknown_category_is_rejected() {
        Category::try_from("Podcasts".to_owned())
            .expect_err("unknown category shouldn't parse");
    }
}
