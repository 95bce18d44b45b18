//! Alternative poster sources, consulted when every primary endpoint served
//! a placeholder. The chain is ordered and replaceable; availability of any
//! specific third party is not load-bearing, a dead source just gets skipped.

use crate::config::CatalogConfig;
use crate::http::UpstreamClient;
use crate::poster::PlaceholderPatterns;
use crate::throttle::RequestThrottler;
use crate::urls::absolutize;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// A single alternative source of poster URLs
#[async_trait]
pub trait PosterSource: Send + Sync {
    /// Source identifier for logging
    fn id(&self) -> &'static str;

    /// Try to find a poster for the given catalog id/title. `Ok(None)` is a
    /// normal miss; errors are swallowed by the chain.
    async fn find_poster(&self, anime_id: i64, title: &str) -> Result<Option<String>>;
}

/// Probes the upstream CDN's conventional poster paths directly. Sometimes
/// the asset exists even when the API serves a placeholder.
pub struct DirectUrlPosterSource {
    client: reqwest::Client,
    hosts: Vec<String>,
}

impl DirectUrlPosterSource {
    pub fn new(user_agent: &str, hosts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(3))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            hosts: hosts.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl PosterSource for DirectUrlPosterSource {
    fn id(&self) -> &'static str {
        "direct-url"
    }

    async fn find_poster(&self, anime_id: i64, _title: &str) -> Result<Option<String>> {
        for host in &self.hosts {
            for ext in ["jpg", "png"] {
                let url = format!("{host}/system/animes/original/{anime_id}.{ext}");
                match self.client.head(&url).send().await {
                    Ok(response) if response.status().is_success() => {
                        return Ok(Some(url));
                    }
                    Ok(_) => {}
                    Err(e) => debug!("Direct probe {url} failed: {e}"),
                }
            }
        }
        Ok(None)
    }
}

/// The catalog's own GraphQL endpoint, which exposes posters the REST API
/// sometimes lacks.
pub struct GraphqlPosterSource {
    client: UpstreamClient,
}

impl GraphqlPosterSource {
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PosterSource for GraphqlPosterSource {
    fn id(&self) -> &'static str {
        "catalog-graphql"
    }

    async fn find_poster(&self, anime_id: i64, _title: &str) -> Result<Option<String>> {
        let body = serde_json::json!({
            "query": format!(
                "query {{ animes(ids: \"{anime_id}\", limit: 1) {{ id poster {{ originalUrl mainUrl }} }} }}"
            ),
        });

        let response: Value = self.client.post_json("/api/graphql", &body).await?;
        let poster = response
            .pointer("/data/animes/0/poster/originalUrl")
            .or_else(|| response.pointer("/data/animes/0/poster/mainUrl"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(poster)
    }
}

/// AniList's public GraphQL API, searched by title
pub struct AniListPosterSource {
    client: UpstreamClient,
}

impl AniListPosterSource {
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PosterSource for AniListPosterSource {
    fn id(&self) -> &'static str {
        "anilist"
    }

    async fn find_poster(&self, _anime_id: i64, title: &str) -> Result<Option<String>> {
        let body = serde_json::json!({
            "query": r"
                query ($name: String) {
                    Media(search: $name, type: ANIME) {
                        coverImage { extraLarge large }
                    }
                }
            ",
            "variables": { "name": title }
        });

        let response: Value = self.client.post_json("", &body).await?;
        let cover = response
            .pointer("/data/Media/coverImage/extraLarge")
            .or_else(|| response.pointer("/data/Media/coverImage/large"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(cover)
    }
}

/// Kitsu's REST API, searched by title
pub struct KitsuPosterSource {
    client: UpstreamClient,
}

impl KitsuPosterSource {
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PosterSource for KitsuPosterSource {
    fn id(&self) -> &'static str {
        "kitsu"
    }

    async fn find_poster(&self, _anime_id: i64, title: &str) -> Result<Option<String>> {
        let response: Value = self
            .client
            .get_json_with_params(
                "/api/edge/anime",
                &[("filter[text]", title), ("page[limit]", "1")],
            )
            .await?;

        let poster = response
            .pointer("/data/0/attributes/posterImage/original")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(poster)
    }
}

/// The default four-step chain: direct CDN probe, catalog GraphQL, AniList,
/// Kitsu.
pub fn default_poster_sources(config: &CatalogConfig) -> Vec<Arc<dyn PosterSource>> {
    let base = config.base_url.trim_end_matches('/').to_string();
    let mirrors = [
        base.clone(),
        base.replacen("https://", "https://desu.", 1),
        base.replacen("https://", "https://moe.", 1),
    ];

    vec![
        Arc::new(DirectUrlPosterSource::new(&config.user_agent, mirrors)),
        Arc::new(GraphqlPosterSource::new(UpstreamClient::new(
            base,
            &config.user_agent,
            config.retry,
        ))),
        Arc::new(AniListPosterSource::new(UpstreamClient::new(
            "https://graphql.anilist.co",
            &config.user_agent,
            config.retry,
        ))),
        Arc::new(KitsuPosterSource::new(UpstreamClient::new(
            "https://kitsu.io",
            &config.user_agent,
            config.retry,
        ))),
    ]
}

/// Runs the alternative sources in order, throttled like any other upstream
/// traffic, and returns the first non-placeholder hit.
pub struct PosterFallbackChain {
    sources: Vec<Arc<dyn PosterSource>>,
    throttler: Arc<RequestThrottler>,
    patterns: PlaceholderPatterns,
    base_url: String,
}

impl PosterFallbackChain {
    pub fn new(
        sources: Vec<Arc<dyn PosterSource>>,
        throttler: Arc<RequestThrottler>,
        patterns: PlaceholderPatterns,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            sources,
            throttler,
            patterns,
            base_url: base_url.into(),
        }
    }

    /// First valid poster URL from the chain, or `None` when every source
    /// misses. Source errors are logged and skipped.
    pub async fn find(&self, anime_id: i64, title: &str) -> Option<String> {
        for source in &self.sources {
            let attempt = self
                .throttler
                .schedule(source.find_poster(anime_id, title))
                .await;

            match attempt {
                Ok(Some(url)) => {
                    let url = absolutize(&self.base_url, &url);
                    if self.patterns.is_placeholder(&url) {
                        debug!("Source {} returned a placeholder for {anime_id}", source.id());
                        continue;
                    }
                    info!("Found poster for {anime_id} via {}", source.id());
                    return Some(url);
                }
                Ok(None) => debug!("No poster for {anime_id} via {}", source.id()),
                Err(e) => debug!("Poster source {} failed for {anime_id}: {e}", source.id()),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource(Option<&'static str>);

    #[async_trait]
    impl PosterSource for FixedSource {
        fn id(&self) -> &'static str {
            "fixed"
        }

        async fn find_poster(&self, _id: i64, _title: &str) -> Result<Option<String>> {
            Ok(self.0.map(str::to_string))
        }
    }

    struct FailingSource;

    #[async_trait]
    impl PosterSource for FailingSource {
        fn id(&self) -> &'static str {
            "failing"
        }

        async fn find_poster(&self, _id: i64, _title: &str) -> Result<Option<String>> {
            Err(crate::CatalogError::Parse("boom".to_string()))
        }
    }

    fn chain(sources: Vec<Arc<dyn PosterSource>>) -> PosterFallbackChain {
        PosterFallbackChain::new(
            sources,
            Arc::new(RequestThrottler::new(Duration::from_millis(0))),
            PlaceholderPatterns::default(),
            "https://shikimori.one",
        )
    }

    #[tokio::test]
    async fn test_first_hit_wins() {
        let chain = chain(vec![
            Arc::new(FixedSource(None)),
            Arc::new(FixedSource(Some("/system/animes/original/7.jpg"))),
            Arc::new(FixedSource(Some("https://other.example.com/late.jpg"))),
        ]);

        assert_eq!(
            chain.find(7, "Title").await.as_deref(),
            Some("https://shikimori.one/system/animes/original/7.jpg")
        );
    }

    #[tokio::test]
    async fn test_errors_and_placeholders_skipped() {
        let chain = chain(vec![
            Arc::new(FailingSource),
            Arc::new(FixedSource(Some("https://cdn.example.com/404.jpg"))),
            Arc::new(FixedSource(Some("https://cdn.example.com/real.jpg"))),
        ]);

        assert_eq!(
            chain.find(1, "Title").await.as_deref(),
            Some("https://cdn.example.com/real.jpg")
        );
    }

    #[tokio::test]
    async fn test_exhausted_chain_is_none() {
        let chain = chain(vec![Arc::new(FixedSource(None)), Arc::new(FailingSource)]);
        assert_eq!(chain.find(1, "Title").await, None);
    }
}
