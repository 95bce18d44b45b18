use crate::types::ImageSet;
use crate::types::raw::RawImageSizes;
use crate::urls::absolutize;

/// Which upstream endpoint supplied an image URL. Endpoints disagree on
/// freshness for the same entity; the list/batch endpoint has been observed
/// to serve newer posters than the detail endpoint, hence its higher rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ImageOrigin {
    List,
    Detail,
    Franchise,
    Alternative,
}

/// Size variant of an image URL, best quality first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ImageSize {
    Full,
    Preview,
    Medium,
    Small,
}

impl ImageSize {
    const ALL: [Self; 4] = [Self::Full, Self::Preview, Self::Medium, Self::Small];
}

/// One (origin, size, url) triple considered during poster resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSourceCandidate {
    pub origin: ImageOrigin,
    pub size: ImageSize,
    pub url: String,
}

impl ImageSourceCandidate {
    pub fn new(origin: ImageOrigin, size: ImageSize, url: impl Into<String>) -> Self {
        Self {
            origin,
            size,
            url: url.into(),
        }
    }

    /// Expand a raw upstream image object into candidates for each size
    /// slot it actually carries.
    pub(crate) fn from_sizes(origin: ImageOrigin, sizes: &RawImageSizes) -> Vec<Self> {
        [
            (ImageSize::Full, &sizes.original),
            (ImageSize::Preview, &sizes.preview),
            (ImageSize::Medium, &sizes.x96),
            (ImageSize::Small, &sizes.x48),
        ]
        .into_iter()
        .filter_map(|(size, url)| {
            url.as_ref()
                .filter(|u| !u.is_empty())
                .map(|u| Self::new(origin, size, u.clone()))
        })
        .collect()
    }
}

/// Configurable predicate for upstream "no image available" assets.
///
/// Matching is a case-insensitive substring check, so the list can grow
/// without touching resolver logic. An empty or absent URL always counts as
/// a placeholder.
#[derive(Debug, Clone)]
pub struct PlaceholderPatterns {
    patterns: Vec<String>,
}

impl PlaceholderPatterns {
    pub fn new(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.into().to_lowercase())
                .collect(),
        }
    }

    pub fn is_placeholder(&self, url: &str) -> bool {
        if url.is_empty() {
            return true;
        }
        let lower = url.to_lowercase();
        self.patterns.iter().any(|p| lower.contains(p.as_str()))
    }
}

impl Default for PlaceholderPatterns {
    fn default() -> Self {
        Self::new([
            "/assets/globals/missing",
            "404",
            "not_found",
            "placeholder",
            "no_image",
        ])
    }
}

/// Outcome of a resolution pass. `image: None` is the normal "no poster
/// anywhere" result, not an error.
#[derive(Debug, Clone)]
pub struct PosterSelection {
    pub image: Option<ImageSet>,
    pub chosen: Option<ImageSourceCandidate>,
}

impl PosterSelection {
    fn placeholder() -> Self {
        Self {
            image: None,
            chosen: None,
        }
    }
}

/// Decides the single best poster from candidates supplied by different
/// upstream endpoints.
#[derive(Debug, Clone)]
pub struct PosterResolver {
    base_url: String,
    patterns: PlaceholderPatterns,
}

impl PosterResolver {
    pub fn new(base_url: impl Into<String>, patterns: PlaceholderPatterns) -> Self {
        Self {
            base_url: base_url.into(),
            patterns,
        }
    }

    fn valid_url(&self, candidate: &ImageSourceCandidate) -> Option<String> {
        let url = absolutize(&self.base_url, &candidate.url);
        (!self.patterns.is_placeholder(&url)).then_some(url)
    }

    /// Pick the winning source and assemble the full [`ImageSet`].
    ///
    /// Candidates are ranked size-major (full, preview, medium, small) and
    /// origin-minor (list endpoint before detail, etc.); the first candidate
    /// that survives placeholder rejection wins. Each of the four slots is
    /// then filled independently with the best valid URL across all origins
    /// at that size, and any still-empty slot is backfilled from the
    /// next-larger resolved slot.
    pub fn resolve(&self, candidates: &[ImageSourceCandidate]) -> PosterSelection {
        let mut ranked: Vec<&ImageSourceCandidate> = candidates.iter().collect();
        ranked.sort_by_key(|c| (c.size, c.origin));

        let Some(chosen) = ranked.iter().find(|c| self.valid_url(c).is_some()) else {
            return PosterSelection::placeholder();
        };

        let best_at = |size: ImageSize| -> Option<String> {
            ranked
                .iter()
                .filter(|c| c.size == size)
                .find_map(|c| self.valid_url(c))
        };
        let [full, preview, medium, small] = ImageSize::ALL.map(best_at);

        // The chosen candidate guarantees at least one slot resolved
        let fallback = full
            .clone()
            .or_else(|| preview.clone())
            .or_else(|| medium.clone())
            .or_else(|| small.clone())
            .unwrap_or_default();

        let full = full.unwrap_or(fallback);
        let preview = preview.unwrap_or_else(|| full.clone());
        let medium = medium.unwrap_or_else(|| preview.clone());
        let small = small.unwrap_or_else(|| medium.clone());

        PosterSelection {
            image: Some(ImageSet {
                full,
                preview,
                medium,
                small,
            }),
            chosen: Some((*chosen).clone()),
        }
    }
}
