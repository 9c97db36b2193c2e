//! Coalescing and lifetime tests for the resource cache

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tether_asset::prelude::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[tokio::test]
async fn concurrent_requests_coalesce_into_one_load() {
    init_logging();
    let cache: ResourceCache<String> = ResourceCache::new();
    let loads = Arc::new(AtomicUsize::new(0));

    // All four requests are issued before any load settles.
    let make = |cache: &ResourceCache<String>, loads: &Arc<AtomicUsize>| {
        let loads = loads.clone();
        cache.fetch_and_cache("objpath", move || async move {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok("parsed geometry".to_string())
        })
    };
    let (a, b, c, d) = futures::join!(
        make(&cache, &loads),
        make(&cache, &loads),
        make(&cache, &loads),
        make(&cache, &loads)
    );

    let a = a.unwrap();
    let b = b.unwrap();
    let c = c.unwrap();
    let d = d.unwrap();

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a, &c));
    assert!(Arc::ptr_eq(&a, &d));
    assert_eq!(cache.ref_count("objpath"), Some(4));
    assert_eq!(cache.pending_loads(), 0);
}

#[tokio::test]
async fn completed_entry_is_reused_without_a_new_load() {
    init_logging();
    let cache: ResourceCache<Vec<u8>> = ResourceCache::new();
    let loads = Arc::new(AtomicUsize::new(0));

    let first = {
        let loads = loads.clone();
        cache
            .fetch_and_cache("objpath", move || async move {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(vec![1, 2, 3])
            })
            .await
            .unwrap()
    };

    let second = {
        let loads = loads.clone();
        cache
            .fetch_and_cache("objpath", move || async move {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(vec![9, 9, 9])
            })
            .await
            .unwrap()
    };

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.ref_count("objpath"), Some(2));
}

#[tokio::test]
async fn full_release_evicts_and_reload_is_distinct() {
    init_logging();
    let cache: ResourceCache<String> = ResourceCache::new();

    let first = cache
        .fetch_and_cache("objpath", || async { Ok("one".to_string()) })
        .await
        .unwrap();
    let second = cache
        .fetch_and_cache("objpath", || async { Ok("unused".to_string()) })
        .await
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    cache.release("objpath");
    assert!(cache.contains("objpath"));
    cache.release("objpath");
    assert!(!cache.contains("objpath"));

    let reloaded = cache
        .fetch_and_cache("objpath", || async { Ok("one".to_string()) })
        .await
        .unwrap();
    assert!(!Arc::ptr_eq(&first, &reloaded));
    assert_eq!(cache.ref_count("objpath"), Some(1));
}

#[tokio::test]
async fn failure_rejects_every_coalesced_caller() {
    init_logging();
    let cache: ResourceCache<String> = ResourceCache::new();

    // The first request drives the (failing) load; the second joins it
    // before it settles, so its own loader never runs.
    let failing = cache.fetch_and_cache("objpath", || async {
        Err(CacheError::Fetch {
            key: "objpath".to_string(),
            message: "connection refused".to_string(),
        })
    });
    let joined = cache.fetch_and_cache("objpath", || async {
        Ok("never produced".to_string())
    });

    let (first, second) = futures::join!(failing, joined);
    assert!(first.is_err());
    assert_eq!(second.unwrap_err(), first.unwrap_err());

    // Nothing was cached, nothing left in flight; a retry works.
    assert!(cache.is_empty());
    assert_eq!(cache.pending_loads(), 0);
    let retried = cache
        .fetch_and_cache("objpath", || async { Ok("recovered".to_string()) })
        .await
        .unwrap();
    assert_eq!(*retried, "recovered");
}
