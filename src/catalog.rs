use crate::cache::PersistentCache;
use crate::config::CatalogConfig;
use crate::fallback::{PosterFallbackChain, PosterSource, default_poster_sources};
use crate::http::UpstreamClient;
use crate::poster::{ImageOrigin, ImageSourceCandidate, PlaceholderPatterns, PosterResolver};
use crate::throttle::RequestThrottler;
use crate::types::raw::{RawAnime, RawFranchise, RawFranchiseNode, RawGenre};
use crate::types::{
    AnimeKind, AnimeStatus, CatalogEntry, Genre, ImageSet, Screenshot, Studio, parse_score,
};
use crate::urls::absolutize;
use crate::Result;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// List ordering accepted by the upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Rank,
    Popularity,
    ReleaseDate,
    Alphabetical,
}

impl Order {
    fn wire(self) -> &'static str {
        match self {
            Self::Rank => "ranked",
            Self::Popularity => "popularity",
            Self::ReleaseDate => "aired_on",
            Self::Alphabetical => "name",
        }
    }
}

/// Filters for the paginated list operation. Page and limit are always part
/// of the cache key; this layer never aggregates across pages.
#[derive(Debug, Clone)]
pub struct ListParams {
    pub page: u32,
    pub limit: u32,
    pub order: Option<Order>,
    pub kind: Option<AnimeKind>,
    pub status: Option<AnimeStatus>,
    /// Season filter: a year (`"2024"`) or `year_season` (`"2024_winter"`)
    pub season: Option<String>,
    /// Minimum score filter
    pub score: Option<u8>,
    /// Genre id filter, comma-joined on the wire
    pub genre_ids: Vec<i64>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            order: None,
            kind: None,
            status: None,
            season: None,
            score: None,
            genre_ids: Vec::new(),
        }
    }
}

impl ListParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_kind(mut self, kind: AnimeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_status(mut self, status: AnimeStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_season(mut self, season: impl Into<String>) -> Self {
        self.season = Some(season.into());
        self
    }

    pub fn with_score(mut self, score: u8) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_genres(mut self, genre_ids: impl IntoIterator<Item = i64>) -> Self {
        self.genre_ids = genre_ids.into_iter().collect();
        self
    }

    fn to_query(&self) -> Vec<(String, String)> {
        let mut query = vec![
            ("page".to_string(), self.page.to_string()),
            ("limit".to_string(), self.limit.to_string()),
        ];
        if let Some(order) = self.order {
            query.push(("order".to_string(), order.wire().to_string()));
        }
        if let Some(kind) = self.kind {
            query.push(("kind".to_string(), kind.to_string()));
        }
        if let Some(status) = self.status {
            query.push(("status".to_string(), status.wire().to_string()));
        }
        if let Some(ref season) = self.season {
            query.push(("season".to_string(), season.clone()));
        }
        if let Some(score) = self.score {
            query.push(("score".to_string(), score.to_string()));
        }
        if !self.genre_ids.is_empty() {
            let joined = self
                .genre_ids
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            query.push(("genre".to_string(), joined));
        }
        query
    }
}

/// Canonical cache key: endpoint path plus the sorted query string, so that
/// parameter order at the call site never splits the cache.
fn cache_key(path: &str, query: &[(String, String)]) -> String {
    if query.is_empty() {
        return path.to_string();
    }
    let mut pairs: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
    pairs.sort();
    format!("{path}?{}", pairs.join("&"))
}

/// The catalog data layer: fetch, normalize, cache.
///
/// Every operation follows the same template: canonical cache key ->
/// [`PersistentCache`] lookup -> on miss a throttled [`UpstreamClient`] call
/// -> poster resolution -> cache write with the operation's TTL. Upstream
/// failures after retries reject the operation; data-shape gaps (missing
/// posters, missing scores) come back as `None` fields, never as errors.
pub struct CatalogDataService {
    config: CatalogConfig,
    client: UpstreamClient,
    throttler: Arc<RequestThrottler>,
    cache: Arc<PersistentCache>,
    resolver: PosterResolver,
    fallback: PosterFallbackChain,
}

impl CatalogDataService {
    /// Build a service with the default alternative-poster chain and a cache
    /// rooted at the configured directory.
    pub fn new(config: CatalogConfig) -> Self {
        let cache = Arc::new(PersistentCache::open(&config.cache_dir));
        let sources = default_poster_sources(&config);
        Self::with_parts(config, cache, sources)
    }

    /// Dependency-injecting constructor: share a cache between services or
    /// swap the alternative poster sources.
    pub fn with_parts(
        config: CatalogConfig,
        cache: Arc<PersistentCache>,
        sources: Vec<Arc<dyn PosterSource>>,
    ) -> Self {
        let patterns = PlaceholderPatterns::new(config.placeholder_patterns.clone());
        let base = config.base_url.trim_end_matches('/').to_string();
        let throttler = Arc::new(RequestThrottler::new(config.min_interval));

        Self {
            client: UpstreamClient::new(
                format!("{base}/api"),
                &config.user_agent,
                config.retry,
            ),
            resolver: PosterResolver::new(base.clone(), patterns.clone()),
            fallback: PosterFallbackChain::new(sources, Arc::clone(&throttler), patterns, base),
            throttler,
            cache,
            config,
        }
    }

    /// Shared cache handle, e.g. for a startup `clear_expired` sweep
    pub fn cache(&self) -> &Arc<PersistentCache> {
        &self.cache
    }

    /// Fetch a filtered, paginated list
    pub async fn anime_list(&self, params: &ListParams) -> Result<Vec<CatalogEntry>> {
        let query = params.to_query();
        let key = cache_key("/animes", &query);

        if let Some(hit) = self.cache.get::<Vec<CatalogEntry>>(&key) {
            debug!("Cache hit for {key}");
            return Ok(hit);
        }

        let raw = self.fetch_list("/animes", &query).await?;
        let entries = self.normalize_list(raw);

        self.cache.set(&key, &entries, Some(self.config.ttl.list));
        Ok(entries)
    }

    /// Fetch one title by id, with the alternative-poster chain as a last
    /// resort when every primary endpoint served a placeholder.
    pub async fn anime_by_id(&self, id: i64) -> Result<CatalogEntry> {
        let key = format!("/animes/{id}");

        if let Some(hit) = self.cache.get::<CatalogEntry>(&key) {
            debug!("Cache hit for {key}");
            return Ok(hit);
        }

        let raw: RawAnime = {
            let call = self.client.get_json(&key);
            self.throttler.schedule(call).await?
        };
        let mut entry = self.normalize(raw, ImageOrigin::Detail);

        if entry.image.is_none() {
            let title = if entry.title.is_empty() {
                entry.localized_title.clone()
            } else {
                entry.title.clone()
            };
            if let Some(url) = self.fallback.find(entry.id, &title).await {
                entry.image = Some(ImageSet::from_single(url));
            }
        }

        self.cache.set(&key, &entry, Some(self.config.ttl.detail));
        Ok(entry)
    }

    /// Batch lookup with poster enrichment.
    ///
    /// The cheap batched call comes first; entries it returns without a
    /// resolved poster are re-fetched individually through the detail path,
    /// in parallel but still behind the shared throttle. A failed detail
    /// fetch keeps the batch record instead of failing the whole batch.
    pub async fn anime_by_ids(&self, ids: &[i64]) -> Result<Vec<CatalogEntry>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let joined = ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let query = vec![
            ("ids".to_string(), joined),
            ("limit".to_string(), ids.len().to_string()),
        ];
        let key = cache_key("/animes", &query);

        let batch = match self.cache.get::<Vec<CatalogEntry>>(&key) {
            Some(hit) => {
                debug!("Cache hit for {key}");
                hit
            }
            None => {
                let raw = self.fetch_list("/animes", &query).await?;
                let entries = self.normalize_list(raw);
                self.cache.set(&key, &entries, Some(self.config.ttl.batch));
                entries
            }
        };

        let to_enrich: Vec<i64> = batch
            .iter()
            .filter(|e| e.image.is_none())
            .map(|e| e.id)
            .collect();
        if to_enrich.is_empty() {
            return Ok(batch);
        }

        info!("{} of {} batch entries lack posters, fetching details", to_enrich.len(), batch.len());

        let details = join_all(to_enrich.iter().map(|&id| self.anime_by_id(id))).await;
        let mut enriched: HashMap<i64, CatalogEntry> = HashMap::new();
        for (id, result) in to_enrich.into_iter().zip(details) {
            match result {
                Ok(entry) => {
                    enriched.insert(id, entry);
                }
                Err(e) => warn!("Failed to enrich anime {id}: {e}"),
            }
        }

        Ok(batch
            .into_iter()
            .map(|entry| enriched.remove(&entry.id).unwrap_or(entry))
            .collect())
    }

    /// Free-text search
    pub async fn search(&self, term: &str) -> Result<Vec<CatalogEntry>> {
        let query = vec![
            ("search".to_string(), term.to_string()),
            ("limit".to_string(), "30".to_string()),
        ];
        let key = cache_key("/animes", &query);

        if let Some(hit) = self.cache.get::<Vec<CatalogEntry>>(&key) {
            debug!("Cache hit for {key}");
            return Ok(hit);
        }

        let raw = self.fetch_list("/animes", &query).await?;
        let entries = self.normalize_list(raw);

        self.cache.set(&key, &entries, Some(self.config.ttl.search));
        Ok(entries)
    }

    /// The genre taxonomy
    pub async fn genres(&self) -> Result<Vec<Genre>> {
        let key = "/genres".to_string();

        if let Some(hit) = self.cache.get::<Vec<Genre>>(&key) {
            debug!("Cache hit for {key}");
            return Ok(hit);
        }

        let raw: Vec<RawGenre> = {
            let call = self.client.get_json("/genres");
            self.throttler.schedule(call).await?
        };
        let genres: Vec<Genre> = raw
            .into_iter()
            .map(|g| Genre {
                id: g.id,
                localized_name: g.russian.unwrap_or_else(|| g.name.clone()),
                name: g.name,
            })
            .collect();

        self.cache.set(&key, &genres, Some(self.config.ttl.genres));
        Ok(genres)
    }

    /// Titles similar to the given one
    pub async fn similar(&self, id: i64) -> Result<Vec<CatalogEntry>> {
        let key = format!("/animes/{id}/similar");

        if let Some(hit) = self.cache.get::<Vec<CatalogEntry>>(&key) {
            debug!("Cache hit for {key}");
            return Ok(hit);
        }

        let raw: Vec<RawAnime> = {
            let call = self.client.get_json(&key);
            self.throttler.schedule(call).await?
        };
        let entries = self.normalize_list(raw);

        self.cache.set(&key, &entries, Some(self.config.ttl.similar));
        Ok(entries)
    }

    /// The franchise graph (sequels/prequels/spin-offs), flattened to
    /// partial entries carrying enough for display.
    pub async fn franchise(&self, id: i64) -> Result<Vec<CatalogEntry>> {
        let key = format!("/animes/{id}/franchise");

        if let Some(hit) = self.cache.get::<Vec<CatalogEntry>>(&key) {
            debug!("Cache hit for {key}");
            return Ok(hit);
        }

        let raw: RawFranchise = {
            let call = self.client.get_json(&key);
            self.throttler.schedule(call).await?
        };
        let entries: Vec<CatalogEntry> = raw
            .nodes
            .unwrap_or_default()
            .into_iter()
            .map(|node| self.franchise_node_to_entry(node))
            .collect();

        self.cache
            .set(&key, &entries, Some(self.config.ttl.franchise));
        Ok(entries)
    }

    async fn fetch_list(&self, path: &str, query: &[(String, String)]) -> Result<Vec<RawAnime>> {
        let params: Vec<(&str, &str)> = query
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let call = self.client.get_json_with_params(path, &params);
        self.throttler.schedule(call).await
    }

    fn normalize_list(&self, raw: Vec<RawAnime>) -> Vec<CatalogEntry> {
        raw.into_iter()
            .map(|r| self.normalize(r, ImageOrigin::List))
            .collect()
    }

    fn normalize(&self, raw: RawAnime, origin: ImageOrigin) -> CatalogEntry {
        let candidates = raw
            .image
            .as_ref()
            .map(|i| ImageSourceCandidate::from_sizes(origin, &i.sizes()))
            .unwrap_or_default();
        let selection = self.resolver.resolve(&candidates);

        let base = self.config.base_url.trim_end_matches('/');
        let screenshots = raw
            .screenshots
            .unwrap_or_default()
            .into_iter()
            .filter_map(|s| match (s.original, s.preview) {
                (Some(original), Some(preview)) => Some(Screenshot {
                    original: absolutize(base, &original),
                    preview: absolutize(base, &preview),
                }),
                _ => None,
            })
            .collect();

        CatalogEntry {
            id: raw.id,
            title: raw.name.unwrap_or_default(),
            localized_title: raw.russian.unwrap_or_default(),
            alt_titles: raw
                .english
                .unwrap_or_default()
                .into_iter()
                .flatten()
                .filter(|t| !t.is_empty())
                .collect(),
            image: selection.image,
            kind: raw.kind.as_deref().map(AnimeKind::from_wire).unwrap_or_default(),
            status: raw
                .status
                .as_deref()
                .map(AnimeStatus::from_wire)
                .unwrap_or_default(),
            episodes_aired: raw.episodes_aired.unwrap_or(0),
            // Upstream reports 0 while the total is still unknown
            episodes: raw.episodes.filter(|&e| e > 0),
            aired_on: raw.aired_on,
            score: raw.score.and_then(|s| parse_score(&s.as_text())),
            synopsis: raw.description_html,
            genres: raw
                .genres
                .unwrap_or_default()
                .into_iter()
                .map(|g| Genre {
                    id: g.id,
                    localized_name: g.russian.unwrap_or_else(|| g.name.clone()),
                    name: g.name,
                })
                .collect(),
            studios: raw
                .studios
                .unwrap_or_default()
                .into_iter()
                .map(|s| Studio {
                    id: s.id,
                    name: s.name,
                })
                .collect(),
            screenshots,
        }
    }

    fn franchise_node_to_entry(&self, node: RawFranchiseNode) -> CatalogEntry {
        let candidates: Vec<ImageSourceCandidate> = node
            .image_url
            .iter()
            .map(|url| {
                ImageSourceCandidate::new(
                    ImageOrigin::Franchise,
                    crate::poster::ImageSize::Full,
                    url.clone(),
                )
            })
            .collect();
        let selection = self.resolver.resolve(&candidates);

        let aired_on = node
            .year
            .map(|y| format!("{y}-01-01"))
            .or_else(|| {
                node.date
                    .and_then(|d| chrono::DateTime::from_timestamp(d, 0))
                    .map(|d| d.format("%Y-%m-%d").to_string())
            });

        CatalogEntry {
            id: node.id,
            localized_title: node.name.clone(),
            title: node.name,
            alt_titles: Vec::new(),
            image: selection.image,
            kind: node.kind.as_deref().map(AnimeKind::from_wire).unwrap_or_default(),
            status: AnimeStatus::Finished,
            episodes_aired: 0,
            episodes: None,
            aired_on,
            score: None,
            synopsis: None,
            genres: Vec::new(),
            studios: Vec::new(),
            screenshots: Vec::new(),
        }
    }
}
