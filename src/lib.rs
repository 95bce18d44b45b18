mod cache;
mod catalog;
mod config;
mod fallback;
mod http;
mod poster;
mod throttle;
mod types;
mod urls;
mod video;

pub use cache::{CacheStats, PersistentCache};
pub use catalog::{CatalogDataService, ListParams, Order};
pub use config::{CatalogConfig, RetryPolicy, TtlConfig, VideoConfig};
pub use fallback::{
    AniListPosterSource, DirectUrlPosterSource, GraphqlPosterSource, KitsuPosterSource,
    PosterFallbackChain, PosterSource, default_poster_sources,
};
pub use http::UpstreamClient;
pub use poster::{
    ImageOrigin, ImageSize, ImageSourceCandidate, PlaceholderPatterns, PosterResolver,
    PosterSelection,
};
pub use throttle::RequestThrottler;
pub use types::{
    AnimeKind, AnimeStatus, CatalogEntry, Genre, ImageSet, Screenshot, Studio,
};
pub use video::{SourceDescriptor, Translation, VideoSourceResolver};

/// Catalog result type
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Catalog error types
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Upstream unavailable: {url}: {source}")]
    UpstreamUnavailable {
        url: String,
        #[source]
        source: Box<CatalogError>,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
