use std::path::PathBuf;
use std::time::Duration;

/// Retry behavior for flaky upstream calls.
///
/// The delay before attempt `n` (1-based, after the first failure) is
/// `base_delay * 2^n`, so the defaults give 1s, 2s, 4s between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first
    pub max_attempts: u32,
    /// Base delay for the exponential backoff
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay after the given attempt (1-based)
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Per-operation cache lifetimes
#[derive(Debug, Clone, Copy)]
pub struct TtlConfig {
    /// Filtered/paginated lists; filters change ranking frequently
    pub list: Duration,
    /// Detail pages are read-heavy and change slowly
    pub detail: Duration,
    /// Batch lookups hit the same entities as detail
    pub batch: Duration,
    /// Search results should feel fresh
    pub search: Duration,
    /// Genre taxonomy is near-static
    pub genres: Duration,
    /// Derived relation, stable
    pub similar: Duration,
    /// Derived relation, stable
    pub franchise: Duration,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            list: Duration::from_secs(15 * 60),
            detail: Duration::from_secs(60 * 60),
            batch: Duration::from_secs(60 * 60),
            search: Duration::from_secs(5 * 60),
            genres: Duration::from_secs(24 * 60 * 60),
            similar: Duration::from_secs(60 * 60),
            franchise: Duration::from_secs(60 * 60),
        }
    }
}

/// Catalog service configuration
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Upstream catalog API root (no trailing slash)
    pub base_url: String,
    /// Identifying header attached to every request
    pub user_agent: String,
    /// Directory backing the persistent cache
    pub cache_dir: PathBuf,
    /// Minimum interval between consecutive upstream calls
    pub min_interval: Duration,
    /// Retry/backoff behavior
    pub retry: RetryPolicy,
    /// Per-operation cache TTLs
    pub ttl: TtlConfig,
    /// Substrings identifying upstream placeholder images
    pub placeholder_patterns: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://shikimori.one".to_string(),
            user_agent: "Volnitsa/0.1.0 (https://github.com/volnitsa/volnitsa)".to_string(),
            cache_dir: dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("volnitsa"),
            min_interval: Duration::from_millis(500),
            retry: RetryPolicy::default(),
            ttl: TtlConfig::default(),
            placeholder_patterns: vec![
                "/assets/globals/missing".to_string(),
                "404".to_string(),
                "not_found".to_string(),
                "placeholder".to_string(),
                "no_image".to_string(),
            ],
        }
    }
}

impl CatalogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }
}

/// Video source search configuration
#[derive(Debug, Clone)]
pub struct VideoConfig {
    /// Video-hosting search API root
    pub base_url: String,
    /// API access token
    pub token: String,
    /// Identifying header attached to every request
    pub user_agent: String,
    /// Minimum interval between consecutive search calls
    pub min_interval: Duration,
    /// Retry/backoff behavior
    pub retry: RetryPolicy,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            base_url: "https://kodikapi.com".to_string(),
            token: String::new(),
            user_agent: "Volnitsa/0.1.0 (https://github.com/volnitsa/volnitsa)".to_string(),
            min_interval: Duration::from_millis(500),
            retry: RetryPolicy::default(),
        }
    }
}

impl VideoConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule() {
        let retry = RetryPolicy::default();

        assert_eq!(retry.delay_after(1), Duration::from_millis(1000));
        assert_eq!(retry.delay_after(2), Duration::from_millis(2000));
        assert_eq!(retry.delay_after(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_default_ttls() {
        let ttl = TtlConfig::default();

        assert_eq!(ttl.list, Duration::from_secs(900));
        assert_eq!(ttl.genres, Duration::from_secs(86400));
        assert!(ttl.search < ttl.list);
    }
}
