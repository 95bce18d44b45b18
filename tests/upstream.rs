//! End-to-end scenarios against a simulated upstream.

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use volnitsa::{
    AnimeKind, CatalogConfig, CatalogDataService, CatalogError, ListParams, Order,
    PersistentCache, RetryPolicy, UpstreamClient, VideoConfig, VideoSourceResolver,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 4,
        base_delay: Duration::from_millis(1),
    }
}

fn service_for(server: &MockServer, dir: &TempDir) -> CatalogDataService {
    let mut config = CatalogConfig::default()
        .with_base_url(server.uri())
        .with_cache_dir(dir.path())
        .with_min_interval(Duration::ZERO)
        .with_retry(fast_retry());
    // The mock server's random port may contain "404"; keep only the
    // unambiguous placeholder pattern here
    config.placeholder_patterns = vec!["/assets/globals/missing".to_string()];
    let cache = Arc::new(PersistentCache::open(dir.path()));
    // No alternative poster sources: tests drive only the simulated upstream
    CatalogDataService::with_parts(config, cache, Vec::new())
}

#[tokio::test]
async fn perpetual_429_exhausts_exactly_four_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/animes"))
        .respond_with(ResponseTemplate::new(429))
        .expect(4)
        .mount(&server)
        .await;

    let client = UpstreamClient::new(server.uri(), "test-agent", fast_retry());
    let result: volnitsa::Result<serde_json::Value> = client.get_json("/animes").await;

    match result {
        Err(CatalogError::UpstreamUnavailable { .. }) => {}
        other => panic!("expected UpstreamUnavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn non_retryable_status_fails_on_first_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/animes"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let client = UpstreamClient::new(server.uri(), "test-agent", fast_retry());
    let result: volnitsa::Result<serde_json::Value> = client.get_json("/animes").await;

    match result {
        Err(CatalogError::Api { status: 500, message }) => assert_eq!(message, "boom"),
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn list_round_trip_hits_upstream_once() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/api/animes"))
        .and(query_param("order", "popularity"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "id": 1,
                "name": "Cowboy Bebop",
                "russian": "Ковбой Бибоп",
                "kind": "tv",
                "status": "released",
                "score": "8.75",
                "episodes": 26,
                "episodes_aired": 26,
                "image": {
                    "original": "/system/animes/original/1.jpg",
                    "preview": "/system/animes/preview/1.jpg"
                }
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server, &dir);
    let params = ListParams::new()
        .with_order(Order::Popularity)
        .with_limit(10)
        .with_page(1);

    let first = service.anime_list(&params).await.unwrap();
    let second = service.anime_list(&params).await.unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(first[0].id, second[0].id);
    assert_eq!(first[0].score, Some(8.75));
    assert_eq!(first[0].kind, AnimeKind::TvSeries);

    let image = first[0].image.as_ref().unwrap();
    assert_eq!(image.full, format!("{}/system/animes/original/1.jpg", server.uri()));
    // Missing x96/x48 backfill from larger slots
    assert_eq!(image.medium, image.preview);
    assert_eq!(second[0].image, first[0].image);
}

#[tokio::test]
async fn batch_enrichment_refetches_only_missing_posters() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/api/animes"))
        .and(query_param("ids", "1,2,3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": 1, "name": "One", "image": {"original": "/posters/1.jpg"}},
            {"id": 2, "name": "Two", "image": {"original": "/assets/globals/missing_original.jpg"}},
            {"id": 3, "name": "Three", "image": {"original": "/posters/3.jpg"}}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/animes/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!(
            {"id": 2, "name": "Two", "image": {"original": "/posters/2-detail.jpg"}}
        )))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server, &dir);
    let entries = service.anime_by_ids(&[1, 2, 3]).await.unwrap();

    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].image.as_ref().unwrap().full, format!("{}/posters/1.jpg", server.uri()));
    assert_eq!(
        entries[1].image.as_ref().unwrap().full,
        format!("{}/posters/2-detail.jpg", server.uri())
    );
    assert_eq!(entries[2].image.as_ref().unwrap().full, format!("{}/posters/3.jpg", server.uri()));
}

#[tokio::test]
async fn failed_enrichment_keeps_batch_record() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/api/animes"))
        .and(query_param("ids", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": 7, "name": "Orphan"}
        ])))
        .mount(&server)
        .await;

    // Detail endpoint is down; the batch must still come back
    Mock::given(method("GET"))
        .and(path("/api/animes/7"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let service = service_for(&server, &dir);
    let entries = service.anime_by_ids(&[7]).await.unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, 7);
    assert!(entries[0].image.is_none());
}

#[tokio::test]
async fn genres_are_cached_and_localized() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/api/genres"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": 1, "name": "Action", "russian": "Экшен"},
            {"id": 2, "name": "Drama"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server, &dir);
    let first = service.genres().await.unwrap();
    let second = service.genres().await.unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(first[0].localized_name, "Экшен");
    assert_eq!(first[1].localized_name, "Drama");
    assert_eq!(second.len(), first.len());
}

#[tokio::test]
async fn video_fallback_stops_at_first_title_hit() {
    let server = MockServer::start().await;

    // Nothing under the external id
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("shikimori_id", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": []})))
        .expect(1)
        .mount(&server)
        .await;

    // Localized title matches
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("title", "Локализованное"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{
                "link": "//kodik.info/serial/42/abc/720p",
                "episodes_count": 12,
                "translation": {"id": 610, "title": "Dub"}
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    // The original title must never be tried once a hit is found
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("title", "Original"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": []})))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = VideoConfig::new("token").with_base_url(server.uri());
    config.min_interval = Duration::ZERO;
    config.retry = fast_retry();
    let resolver = VideoSourceResolver::new(config);

    let entry = sample_entry(42, "Original", "Локализованное");
    let source = resolver.find_playable_source(&entry).await.unwrap().unwrap();

    assert_eq!(source.player_url, "https://kodik.info/serial/42/abc/720p");
    assert_eq!(source.embed_url(2, Some(610)),
        "https://kodik.info/serial/42/abc/720p?episode=2&translation_id=610");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn video_miss_everywhere_is_ok_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": []})))
        .mount(&server)
        .await;

    let mut config = VideoConfig::new("token").with_base_url(server.uri());
    config.min_interval = Duration::ZERO;
    config.retry = fast_retry();
    let resolver = VideoSourceResolver::new(config);

    let entry = sample_entry(9, "Name", "Имя");
    assert!(resolver.find_playable_source(&entry).await.unwrap().is_none());
}

fn sample_entry(id: i64, title: &str, localized: &str) -> volnitsa::CatalogEntry {
    volnitsa::CatalogEntry {
        id,
        title: title.to_string(),
        localized_title: localized.to_string(),
        alt_titles: Vec::new(),
        image: None,
        kind: volnitsa::AnimeKind::TvSeries,
        status: volnitsa::AnimeStatus::Finished,
        episodes_aired: 12,
        episodes: Some(12),
        aired_on: None,
        score: None,
        synopsis: None,
        genres: Vec::new(),
        studios: Vec::new(),
        screenshots: Vec::new(),
    }
}
