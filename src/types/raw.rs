//! Raw upstream JSON shapes.
//!
//! Deliberately lenient: every field the normalization step does not read is
//! ignored, and anything the upstream is known to omit or mistype is an
//! `Option` or an untagged enum. Schema drift shows up as `None`, not as a
//! deserialization failure.

use serde::Deserialize;

/// The upstream serves `image` either as the four-variant object or, on some
/// endpoints, as a bare URL string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawImage {
    Url(String),
    Sizes(RawImageSizes),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawImageSizes {
    pub original: Option<String>,
    pub preview: Option<String>,
    pub x96: Option<String>,
    pub x48: Option<String>,
}

impl RawImage {
    /// Flatten the string/object duality into the four size slots; a bare
    /// string counts for every slot.
    pub fn sizes(&self) -> RawImageSizes {
        match self {
            Self::Url(url) => RawImageSizes {
                original: Some(url.clone()),
                preview: Some(url.clone()),
                x96: Some(url.clone()),
                x48: Some(url.clone()),
            },
            Self::Sizes(sizes) => sizes.clone(),
        }
    }
}

/// Scores arrive as strings ("8.21", "0") but have been observed as numbers
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawScore {
    Text(String),
    Number(f64),
}

impl RawScore {
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawGenre {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub russian: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawStudio {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawScreenshot {
    #[serde(default)]
    pub original: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
}

/// One record from `/animes`, `/animes/{id}` or `/animes/{id}/similar`
#[derive(Debug, Clone, Deserialize)]
pub struct RawAnime {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub russian: Option<String>,
    #[serde(default)]
    pub english: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub image: Option<RawImage>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub episodes: Option<u32>,
    #[serde(default)]
    pub episodes_aired: Option<u32>,
    #[serde(default)]
    pub aired_on: Option<String>,
    #[serde(default)]
    pub score: Option<RawScore>,
    #[serde(default)]
    pub description_html: Option<String>,
    #[serde(default)]
    pub genres: Option<Vec<RawGenre>>,
    #[serde(default)]
    pub studios: Option<Vec<RawStudio>>,
    #[serde(default)]
    pub screenshots: Option<Vec<RawScreenshot>>,
}

/// `/animes/{id}/franchise` response; only the nodes matter here
#[derive(Debug, Clone, Deserialize)]
pub struct RawFranchise {
    #[serde(default)]
    pub nodes: Option<Vec<RawFranchiseNode>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawFranchiseNode {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    /// Epoch seconds, used when `year` is absent
    #[serde(default)]
    pub date: Option<i64>,
}
