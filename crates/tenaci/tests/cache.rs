//! Response caching through the public client.

use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use http::{HeaderValue, StatusCode};
use tenaci::{Cache, CacheError, Client, InMemoryCache, Request, Response, ZeroBackoff};

mod common;
use common::{Reply, ScriptedTransport};

fn cached_client(transport: ScriptedTransport) -> Client<ScriptedTransport> {
    Client::builder(transport).cache_enabled(true).backoff(ZeroBackoff).build()
}

#[tokio::test(start_paused = true)]
async fn test_max_age_hit_skips_transport() {
    let transport = ScriptedTransport::new([Reply::ok("catalog").header("cache-control", "max-age=60")]);
    let client = cached_client(transport);

    let first = client.get("http://svc.test/catalog").send().await.unwrap();
    assert_eq!(first.text().await.unwrap(), "catalog");

    let second = client.get("http://svc.test/catalog").send().await.unwrap();
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.header("cache-control"), Some("max-age=60"));
    assert_eq!(second.text().await.unwrap(), "catalog");

    assert_eq!(client.transport().calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cached_replies_are_independent_copies() {
    let transport = ScriptedTransport::new([Reply::ok("payload").header("x-version", "1")]);
    let client = cached_client(transport);
    client.get("http://svc.test/doc").send().await.unwrap();

    let mut tampered = client.get("http://svc.test/doc").send().await.unwrap();
    tampered.headers.insert("x-version", HeaderValue::from_static("2"));
    assert_eq!(tampered.bytes().await.unwrap(), Bytes::from_static(b"payload"));

    for _ in 0..3 {
        let replay = client.get("http://svc.test/doc").send().await.unwrap();
        assert_eq!(replay.status, StatusCode::OK);
        assert_eq!(replay.header("x-version"), Some("1"));
        assert_eq!(replay.bytes().await.unwrap(), Bytes::from_static(b"payload"));
    }
    assert_eq!(client.transport().calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_default_ttl_expiry_boundary() {
    let transport = ScriptedTransport::new([Reply::ok("v1"), Reply::ok("v2")]);
    let client = Client::builder(transport)
        .cache_enabled(true)
        .cache_ttl(Duration::from_secs(10))
        .build();

    client.get("http://svc.test/ttl").send().await.unwrap();

    tokio::time::advance(Duration::from_millis(9_999)).await;
    let hit = client.get("http://svc.test/ttl").send().await.unwrap();
    assert_eq!(hit.text().await.unwrap(), "v1");
    assert_eq!(client.transport().calls(), 1);

    tokio::time::advance(Duration::from_millis(1)).await;
    let miss = client.get("http://svc.test/ttl").send().await.unwrap();
    assert_eq!(miss.text().await.unwrap(), "v2");
    assert_eq!(client.transport().calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_max_age_overrides_default_ttl() {
    let transport = ScriptedTransport::new([Reply::ok("long").header("cache-control", "public, max-age=60")]);
    let client = Client::builder(transport)
        .cache_enabled(true)
        .cache_ttl(Duration::from_secs(5))
        .build();

    client.get("http://svc.test/long").send().await.unwrap();
    tokio::time::advance(Duration::from_secs(30)).await;
    client.get("http://svc.test/long").send().await.unwrap();

    assert_eq!(client.transport().calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_max_age_uses_default_ttl() {
    let transport = ScriptedTransport::repeating(Reply::ok("x").header("cache-control", "max-age=soon"));
    let client = Client::builder(transport)
        .cache_enabled(true)
        .cache_ttl(Duration::from_secs(5))
        .build();

    client.get("http://svc.test/odd").send().await.unwrap();
    tokio::time::advance(Duration::from_secs(4)).await;
    client.get("http://svc.test/odd").send().await.unwrap();
    assert_eq!(client.transport().calls(), 1);

    tokio::time::advance(Duration::from_secs(1)).await;
    client.get("http://svc.test/odd").send().await.unwrap();
    assert_eq!(client.transport().calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_no_store_is_not_cached() {
    let transport = ScriptedTransport::repeating(Reply::ok("secret").header("cache-control", "no-store"));
    let client = cached_client(transport);

    for _ in 0..2 {
        let response = client.get("http://svc.test/private").send().await.unwrap();
        assert_eq!(response.text().await.unwrap(), "secret");
    }
    assert_eq!(client.transport().calls(), 2);
    assert!(client.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_only_get_is_cached() {
    let transport = ScriptedTransport::repeating(Reply::ok("created").header("cache-control", "max-age=60"));
    let client = cached_client(transport);

    client.post("http://svc.test/items").send().await.unwrap();
    client.post("http://svc.test/items").send().await.unwrap();
    client.head("http://svc.test/items").send().await.unwrap();

    assert_eq!(client.transport().calls(), 3);
    assert!(client.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failures_are_not_cached() {
    let transport = ScriptedTransport::new([Reply::status(503), Reply::ok("recovered")]);
    let client = Client::builder(transport)
        .cache_enabled(true)
        .max_attempts(1)
        .build();

    assert!(client.get("http://svc.test/flaky").send().await.is_err());
    let response = client.get("http://svc.test/flaky").send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "recovered");
    assert_eq!(client.transport().calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cache_key_functions() {
    let transport = ScriptedTransport::new([Reply::ok("by path"), Reply::ok("override")]);
    let client = Client::builder(transport)
        .cache_enabled(true)
        .cache_key(|req: &Request| req.url.path().to_string())
        .build();

    // The client-level key ignores the query string.
    client.get("http://svc.test/a?page=1").send().await.unwrap();
    let hit = client.get("http://svc.test/a?page=2").send().await.unwrap();
    assert_eq!(hit.text().await.unwrap(), "by path");
    assert_eq!(client.transport().calls(), 1);

    // A per-request key takes precedence.
    let fresh = client
        .get("http://svc.test/a")
        .cache_key(|req: &Request| format!("v2:{}", req.url))
        .send()
        .await
        .unwrap();
    assert_eq!(fresh.text().await.unwrap(), "override");
    assert_eq!(client.transport().calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_per_request_cache_switch() {
    let transport = ScriptedTransport::repeating(Reply::ok("body"));
    let client = Client::new(transport);

    client.get("http://svc.test/opt-in").cache(true).send().await.unwrap();
    client.get("http://svc.test/opt-in").cache(true).send().await.unwrap();
    assert_eq!(client.transport().calls(), 1);

    // Caching is off by default at the client level.
    client.get("http://svc.test/opt-in").send().await.unwrap();
    assert_eq!(client.transport().calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shared_cache_between_clients() {
    let cache = InMemoryCache::new();
    let first = Client::builder(ScriptedTransport::new([Reply::ok("shared")]))
        .cache(cache.clone())
        .build();
    let second = Client::builder(ScriptedTransport::new([Reply::ok("unused")]))
        .cache(cache.clone())
        .build();

    first.get("http://svc.test/shared").send().await.unwrap();
    let hit = second.get("http://svc.test/shared").send().await.unwrap();

    assert_eq!(hit.text().await.unwrap(), "shared");
    assert_eq!(second.transport().calls(), 0);
    assert_eq!(cache.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_broken_body_is_returned_unchanged() {
    let transport = ScriptedTransport::new([Reply::ok("partial").broken_body()]);
    let client = cached_client(transport);

    let response = client.get("http://svc.test/broken").send().await.unwrap();
    assert_eq!(response.status, StatusCode::OK);

    let mut stream = response.into_body().into_stream();
    assert_eq!(stream.next().await.unwrap().unwrap(), Bytes::from_static(b"partial"));
    assert!(stream.next().await.unwrap().is_err());
    assert!(client.cache().is_empty());
}

/// A cache whose writes always fail.
struct FailingCache;

impl Cache for FailingCache {
    async fn get(&self, _key: &str) -> Option<Response> { None }

    async fn set_ttl(&self, _key: &str, _response: &mut Response, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("disk full".to_string()))
    }
}

#[tokio::test(start_paused = true)]
async fn test_cache_write_failure_still_returns_response() {
    let logger = std::sync::Arc::new(common::RecordingLogger::default());
    let client = Client::builder(ScriptedTransport::new([Reply::ok("fresh")]))
        .cache(FailingCache)
        .logger(logger.clone())
        .build();

    let response = client.get("http://svc.test/fresh").send().await.unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "fresh");
    assert!(logger.contains("error", "disk full"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_share_one_entry() {
    const BODIES: [&str; 8] = ["r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7"];
    let transport = ScriptedTransport::new(BODIES.map(|body| Reply::ok(body).delayed(Duration::from_millis(20))));
    let client = cached_client(transport);

    let tasks: Vec<_> = (0..BODIES.len())
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.get("http://svc.test/race").send().await?.text().await })
        })
        .collect();

    for task in tasks {
        let body = task.await.unwrap().unwrap();
        assert!(BODIES.contains(&body.as_str()), "unexpected body {body}");
    }

    assert_eq!(client.cache().len(), 1);
    let stored = client.cache().get("http://svc.test/race").await.unwrap();
    let stored = stored.text().await.unwrap();
    assert!(BODIES.contains(&stored.as_str()), "unexpected cached body {stored}");
}
