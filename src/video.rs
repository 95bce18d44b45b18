use crate::config::VideoConfig;
use crate::http::UpstreamClient;
use crate::throttle::RequestThrottler;
use crate::types::CatalogEntry;
use crate::urls::absolutize;
use crate::Result;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

/// An audio-track/translation option offered by a playable source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub id: i64,
    pub title: String,
    pub episode_count: u32,
}

/// A playable source resolved from the video-hosting search API.
///
/// `player_url` is always absolute https; consumers build the final
/// embeddable URL with [`SourceDescriptor::embed_url`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub player_url: String,
    pub translations: Vec<Translation>,
    pub episode_count: u32,
}

impl SourceDescriptor {
    /// Embeddable player URL for one episode and, optionally, one
    /// translation.
    pub fn embed_url(&self, episode: u32, translation_id: Option<i64>) -> String {
        let sep = if self.player_url.contains('?') { '&' } else { '?' };
        let mut url = format!("{}{sep}episode={episode}", self.player_url);
        if let Some(id) = translation_id {
            url.push_str(&format!("&translation_id={id}"));
        }
        url
    }
}

#[derive(Debug, Deserialize)]
struct RawSearchResponse {
    #[serde(default)]
    results: Vec<RawSearchResult>,
}

#[derive(Debug, Deserialize)]
struct RawSearchResult {
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    episodes_count: Option<u32>,
    #[serde(default)]
    translation: Option<RawTranslation>,
}

#[derive(Debug, Deserialize)]
struct RawTranslation {
    id: i64,
    #[serde(default)]
    title: String,
}

/// Finds a playable video source for a catalog entry.
///
/// Lookup parameters are tried in priority order — the entry's catalog id,
/// then its localized title, then the original title, then each alternate
/// title — stopping at the first attempt that yields a result with a player
/// link. "Not found" is a normal outcome (`Ok(None)`), never an error; an
/// attempt that fails upstream is logged and counts as a miss for that
/// attempt only.
pub struct VideoSourceResolver {
    config: VideoConfig,
    client: UpstreamClient,
    throttler: Arc<RequestThrottler>,
}

impl VideoSourceResolver {
    pub fn new(config: VideoConfig) -> Self {
        Self {
            client: UpstreamClient::new(config.base_url.clone(), &config.user_agent, config.retry),
            throttler: Arc::new(RequestThrottler::new(config.min_interval)),
            config,
        }
    }

    pub async fn find_playable_source(
        &self,
        entry: &CatalogEntry,
    ) -> Result<Option<SourceDescriptor>> {
        if let Some(source) = self.attempt("external id", &[("shikimori_id", &entry.id.to_string())]).await {
            return Ok(Some(source));
        }

        let titles = std::iter::once(entry.localized_title.as_str())
            .chain(std::iter::once(entry.title.as_str()))
            .chain(entry.alt_titles.iter().map(String::as_str))
            .filter(|t| !t.is_empty());
        for title in titles {
            debug!("Searching playable source by title: {title}");
            if let Some(source) = self.attempt("title", &[("title", title)]).await {
                return Ok(Some(source));
            }
        }

        info!("No playable source found for anime {}", entry.id);
        Ok(None)
    }

    /// One throttled search attempt; upstream errors count as a miss
    async fn attempt(&self, what: &str, params: &[(&str, &str)]) -> Option<SourceDescriptor> {
        let mut query: Vec<(&str, &str)> = vec![
            ("token", self.config.token.as_str()),
            ("with_episodes", "true"),
            ("with_material_data", "true"),
        ];
        query.extend_from_slice(params);

        let call = self.client.get_json_with_params::<RawSearchResponse>("/search", &query);
        match self.throttler.schedule(call).await {
            Ok(response) => self.descriptor_from(response),
            Err(e) => {
                debug!("Video search by {what} failed: {e}");
                None
            }
        }
    }

    fn descriptor_from(&self, response: RawSearchResponse) -> Option<SourceDescriptor> {
        let player_url = response
            .results
            .iter()
            .find_map(|r| r.link.as_deref())
            .map(|link| absolutize(&self.config.base_url, link))?;

        let mut translations: Vec<Translation> = Vec::new();
        let mut episode_count = 0;
        for result in &response.results {
            episode_count = episode_count.max(result.episodes_count.unwrap_or(0));
            if let Some(ref t) = result.translation {
                if translations.iter().all(|known| known.id != t.id) {
                    translations.push(Translation {
                        id: t.id,
                        title: t.title.clone(),
                        episode_count: result.episodes_count.unwrap_or(0),
                    });
                }
            }
        }

        Some(SourceDescriptor {
            player_url,
            translations,
            episode_count,
        })
    }
}
