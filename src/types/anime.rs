use serde::{Deserialize, Serialize};

/// Classification of a catalog title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnimeKind {
    #[default]
    Unknown,
    #[serde(rename = "tv")]
    TvSeries,
    Movie,
    Ova,
    Ona,
    Special,
    Music,
}

impl AnimeKind {
    /// Parse the upstream wire name, tolerating refinements like `tv_13`
    pub fn from_wire(kind: &str) -> Self {
        match kind {
            k if k.starts_with("tv") => Self::TvSeries,
            "movie" => Self::Movie,
            "ova" => Self::Ova,
            "ona" => Self::Ona,
            "special" => Self::Special,
            "music" | "pv" => Self::Music,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for AnimeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::TvSeries => write!(f, "tv"),
            Self::Movie => write!(f, "movie"),
            Self::Ova => write!(f, "ova"),
            Self::Ona => write!(f, "ona"),
            Self::Special => write!(f, "special"),
            Self::Music => write!(f, "music"),
        }
    }
}

/// Lifecycle status of a catalog title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnimeStatus {
    /// Announced but not yet airing (upstream: "anons")
    Announced,
    /// Currently airing (upstream: "ongoing")
    Airing,
    /// Finished airing (upstream: "released")
    #[default]
    Finished,
}

impl AnimeStatus {
    pub fn from_wire(status: &str) -> Self {
        match status {
            "anons" => Self::Announced,
            "ongoing" => Self::Airing,
            _ => Self::Finished,
        }
    }

    /// The upstream's wire name, used in list query filters
    pub fn wire(&self) -> &'static str {
        match self {
            Self::Announced => "anons",
            Self::Airing => "ongoing",
            Self::Finished => "released",
        }
    }
}

/// The four-resolution poster record used throughout the UI layer.
///
/// Every slot holds an absolute, non-placeholder URL; a partially-populated
/// set is never constructed. Immutable once built by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSet {
    /// Full-size poster
    pub full: String,
    /// Preview size
    pub preview: String,
    /// Medium thumbnail (upstream: x96)
    pub medium: String,
    /// Small thumbnail (upstream: x48)
    pub small: String,
}

impl ImageSet {
    /// Build a set where every slot carries the same URL, used for sources
    /// that only ever produce one resolution (franchise nodes, the
    /// alternative-search chain).
    pub fn from_single(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            full: url.clone(),
            preview: url.clone(),
            medium: url.clone(),
            small: url,
        }
    }
}

/// Genre reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
    /// Localized display name, falls back to `name` upstream-side
    #[serde(default)]
    pub localized_name: String,
}

/// Studio reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Studio {
    pub id: i64,
    pub name: String,
}

/// A screenshot pair (full + preview), URLs absolute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screenshot {
    pub original: String,
    pub preview: String,
}

/// A normalized catalog record.
///
/// `image` is either a fully-populated [`ImageSet`] or `None` — a
/// placeholder URL never reaches callers. `score` of `None` means the
/// upstream had no real rating (its `"0"` sentinel or garbage), and must be
/// rendered as "no score", not as 0.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Upstream-assigned identifier
    pub id: i64,
    /// Original title (may be empty)
    pub title: String,
    /// Localized title (may be empty)
    pub localized_title: String,
    /// Alternate/English titles, used by the video-source fallback
    pub alt_titles: Vec<String>,
    /// Resolved poster, or `None` when no valid poster exists anywhere
    pub image: Option<ImageSet>,
    pub kind: AnimeKind,
    pub status: AnimeStatus,
    /// Episodes aired so far
    pub episodes_aired: u32,
    /// Total episode count, `None` when not yet known
    pub episodes: Option<u32>,
    /// First air date, `YYYY-MM-DD`
    pub aired_on: Option<String>,
    /// Rating on a 0-10 scale; `None` means no score
    pub score: Option<f64>,
    /// Synopsis as served upstream, may contain HTML
    pub synopsis: Option<String>,
    pub genres: Vec<Genre>,
    pub studios: Vec<Studio>,
    pub screenshots: Vec<Screenshot>,
}

impl CatalogEntry {
    /// Synopsis with HTML tags stripped, for plain-text contexts
    pub fn synopsis_text(&self) -> Option<String> {
        let synopsis = self.synopsis.as_ref()?;
        let re = regex::Regex::new(r"<[^>]+>").expect("Invalid regex");
        Some(re.replace_all(synopsis, "").to_string())
    }
}

/// Parse the upstream's string-encoded score. `"0"` is the upstream's "no
/// score" sentinel; unparseable input counts the same.
pub(crate) fn parse_score(raw: &str) -> Option<f64> {
    match raw.trim().parse::<f64>() {
        Ok(score) if score > 0.0 => Some(score),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_wire() {
        assert_eq!(AnimeKind::from_wire("tv"), AnimeKind::TvSeries);
        assert_eq!(AnimeKind::from_wire("tv_13"), AnimeKind::TvSeries);
        assert_eq!(AnimeKind::from_wire("music"), AnimeKind::Music);
        assert_eq!(AnimeKind::from_wire("doujin"), AnimeKind::Unknown);
    }

    #[test]
    fn test_status_from_wire() {
        assert_eq!(AnimeStatus::from_wire("anons"), AnimeStatus::Announced);
        assert_eq!(AnimeStatus::from_wire("ongoing"), AnimeStatus::Airing);
        assert_eq!(AnimeStatus::from_wire("released"), AnimeStatus::Finished);
    }

    #[test]
    fn test_score_sentinel() {
        assert_eq!(parse_score("8.21"), Some(8.21));
        assert_eq!(parse_score("0"), None);
        assert_eq!(parse_score("0.0"), None);
        assert_eq!(parse_score("n/a"), None);
        assert_eq!(parse_score(""), None);
    }

    #[test]
    fn test_single_url_image_set() {
        let set = ImageSet::from_single("https://cdn.example.com/p.jpg");
        assert_eq!(set.full, set.small);
        assert_eq!(set.preview, set.medium);
    }

    #[test]
    fn test_synopsis_text_strips_tags() {
        let entry = CatalogEntry {
            id: 1,
            title: "T".into(),
            localized_title: String::new(),
            alt_titles: Vec::new(),
            image: None,
            kind: AnimeKind::TvSeries,
            status: AnimeStatus::Finished,
            episodes_aired: 12,
            episodes: Some(12),
            aired_on: None,
            score: None,
            synopsis: Some("A <b>bold</b> story.<br/>".into()),
            genres: Vec::new(),
            studios: Vec::new(),
            screenshots: Vec::new(),
        };
        assert_eq!(entry.synopsis_text().unwrap(), "A bold story.");
    }
}
