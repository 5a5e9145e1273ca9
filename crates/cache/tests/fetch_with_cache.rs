use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crm_cache::{build_key, HttpMethod, ManualClock, RequestCache};
use proptest::prelude::*;
use tokio::sync::oneshot;

const TTL_MS: u64 = 30_000;

fn cache() -> (Arc<RequestCache<String>>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    (
        Arc::new(RequestCache::with_clock(TTL_MS, clock.clone())),
        clock,
    )
}

async fn counted_fetch(
    cache: &RequestCache<String>,
    method: Option<HttpMethod>,
    url: &str,
    calls: &AtomicUsize,
    body: &str,
) -> Result<String, String> {
    cache
        .fetch_with_cache(method, url, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(body.to_string())
        })
        .await
}

#[tokio::test]
async fn repeated_get_within_ttl_fetches_once() {
    let (cache, clock) = cache();
    let calls = AtomicUsize::new(0);

    let first = counted_fetch(&cache, Some(HttpMethod::Get), "/api/customers", &calls, "a").await;
    clock.advance(TTL_MS - 1);
    let second = counted_fetch(&cache, None, "/api/customers", &calls, "b").await;

    assert_eq!(first.unwrap(), "a");
    assert_eq!(second.unwrap(), "a");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn expired_entry_is_refetched_and_replaced() {
    let (cache, clock) = cache();
    let calls = AtomicUsize::new(0);

    counted_fetch(&cache, None, "/api/dashboard/stats", &calls, "old").await.unwrap();
    clock.advance(TTL_MS + 1);
    let refreshed = counted_fetch(&cache, None, "/api/dashboard/stats", &calls, "new").await;

    assert_eq!(refreshed.unwrap(), "new");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        cache.get(&build_key(None, "/api/dashboard/stats")).as_deref(),
        Some("new")
    );
}

#[tokio::test]
async fn distinct_urls_do_not_share_entries() {
    let (cache, _) = cache();
    let calls = AtomicUsize::new(0);

    counted_fetch(&cache, None, "/api/orders", &calls, "all").await.unwrap();
    let filtered = counted_fetch(&cache, None, "/api/orders?customerId=7", &calls, "one").await;

    assert_eq!(filtered.unwrap(), "one");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn non_get_methods_always_fetch_and_never_touch_cache() {
    let (cache, _) = cache();
    let url = "/api/segments/preview";
    // A fresh GET entry for the same URL must never be served to other methods.
    cache.put(build_key(None, url), "cached".to_string());

    for method in [
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
    ] {
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let out = counted_fetch(&cache, Some(method), url, &calls, "live").await;
            assert_eq!(out.unwrap(), "live");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3, "{method}");
        assert!(cache.get(&build_key(Some(method), url)).is_none());
    }
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn non_get_methods_ignore_entries_under_their_own_key() {
    let (cache, _) = cache();
    let url = "/api/vendor/send/3";

    for method in [
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
    ] {
        let key = build_key(Some(method), url);
        cache.put(key.clone(), "seeded".to_string());
        let seeded = cache.entry(&key);

        let calls = AtomicUsize::new(0);
        let out = counted_fetch(&cache, Some(method), url, &calls, "live").await;

        assert_eq!(out.unwrap(), "live", "{method}");
        assert_eq!(calls.load(Ordering::SeqCst), 1, "{method}");
        assert_eq!(cache.entry(&key), seeded, "{method}");
    }
    assert_eq!(cache.len(), 4);
}

#[tokio::test]
async fn failed_fetch_is_not_cached() {
    let (cache, _) = cache();
    let url = "/api/campaigns";

    let failed: Result<String, String> = cache
        .fetch_with_cache(None, url, || async { Err("503 upstream".to_string()) })
        .await;
    assert_eq!(failed.unwrap_err(), "503 upstream");
    assert!(cache.get(&build_key(None, url)).is_none());
    assert!(cache.is_empty());
}

#[tokio::test]
async fn failed_refresh_keeps_previous_entry() {
    let (cache, clock) = cache();
    let url = "/api/campaigns";
    let key = build_key(None, url);

    cache.put(key.clone(), "v1".to_string());
    clock.advance(TTL_MS);
    let before = cache.entry(&key);

    let failed: Result<String, &str> = cache
        .fetch_with_cache(None, url, || async { Err("timeout") })
        .await;
    assert!(failed.is_err());
    assert_eq!(cache.entry(&key), before);
    assert!(cache.get(&key).is_none());
}

#[tokio::test]
async fn concurrent_misses_both_fetch_and_last_writer_wins() {
    const URL: &str = "/api/customers";
    let (cache, _) = cache();
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx_first, rx_first) = oneshot::channel::<String>();
    let (tx_second, rx_second) = oneshot::channel::<String>();

    let spawn_fetch = |rx: oneshot::Receiver<String>| {
        let cache = cache.clone();
        let calls = calls.clone();
        tokio::spawn(async move {
            cache
                .fetch_with_cache(None, URL, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    rx.await.map_err(|e| e.to_string())
                })
                .await
        })
    };
    let first = spawn_fetch(rx_first);
    let second = spawn_fetch(rx_second);

    while calls.load(Ordering::SeqCst) < 2 {
        tokio::task::yield_now().await;
    }

    tx_second.send("second".to_string()).unwrap();
    assert_eq!(second.await.unwrap().unwrap(), "second");
    assert_eq!(cache.get(&build_key(None, URL)).as_deref(), Some("second"));

    tx_first.send("first".to_string()).unwrap();
    assert_eq!(first.await.unwrap().unwrap(), "first");
    assert_eq!(cache.get(&build_key(None, URL)).as_deref(), Some("first"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

proptest! {
    #[test]
    fn put_then_get_returns_value(key in ".{0,64}", value in any::<i64>()) {
        let clock = Arc::new(ManualClock::new(0));
        let cache = RequestCache::with_clock(TTL_MS, clock);
        cache.put(key.clone(), value);
        prop_assert_eq!(cache.get(&key), Some(value));
    }

    #[test]
    fn entry_is_absent_past_ttl(start in 0u64..1_000_000_000, extra in 1u64..1_000_000) {
        let clock = Arc::new(ManualClock::new(start));
        let cache = RequestCache::with_clock(TTL_MS, clock.clone());
        cache.put("k", 1u8);
        clock.set(start + TTL_MS + extra);
        prop_assert_eq!(cache.get("k"), None);
    }
}
