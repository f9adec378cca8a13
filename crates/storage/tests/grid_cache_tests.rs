//! Grid cache behavior over real GRIB2 fixtures.

use std::sync::Arc;
use std::time::Duration;

use forecast_common::DecodeCause;
use storage::{DiskGridStore, GridCache, GridCacheConfig};
use test_utils::{CountingDecoder, ForecastDir, Grib2Builder};

fn config() -> GridCacheConfig {
    GridCacheConfig {
        max_bytes: 64 * 1024 * 1024,
        decode_workers: 4,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_decode_once() {
    let dir = ForecastDir::new();
    let path = dir.write_grib("t.grib2", &Grib2Builder::new());
    let decoder = Arc::new(CountingDecoder::with_delay(Duration::from_millis(100)));
    let cache = Arc::new(GridCache::new(decoder.clone(), config()));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let cache = cache.clone();
            let path = path.clone();
            tokio::spawn(async move { cache.get(&path).await })
        })
        .collect();

    let mut grids = Vec::new();
    for handle in handles {
        grids.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(decoder.calls(), 1);
    assert!(grids.iter().all(|g| Arc::ptr_eq(g, &grids[0])));
    assert_eq!(cache.stats().misses.load(std::sync::atomic::Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_decode_failure_is_memoized() {
    let dir = ForecastDir::new();
    let path = dir.write_bytes("broken.grib2", b"GRIB but not really");
    let decoder = Arc::new(CountingDecoder::new());
    let cache = GridCache::new(decoder.clone(), config());

    let first = cache.get(&path).await.unwrap_err();
    let second = cache.get(&path).await.unwrap_err();

    assert_eq!(first, second);
    assert_eq!(first.path, path);
    assert_eq!(decoder.calls(), 1);
}

#[tokio::test]
async fn test_missing_file_reports_not_found() {
    let dir = ForecastDir::new();
    let cache = GridCache::new(Arc::new(CountingDecoder::new()), config());

    let err = cache.get(&dir.path().join("gone.grib2")).await.unwrap_err();
    assert_eq!(err.cause, DecodeCause::NotFound);
}

#[tokio::test]
async fn test_clear_picks_up_rewritten_file() {
    let dir = ForecastDir::new();
    let path = dir.write_grib("t.grib2", &Grib2Builder::new().with_constant_value(1.0));
    let decoder = Arc::new(CountingDecoder::new());
    let cache = GridCache::new(decoder.clone(), config());

    assert_eq!(cache.get(&path).await.unwrap().values()[0], 1.0);

    dir.write_grib("t.grib2", &Grib2Builder::new().with_constant_value(2.0));
    assert_eq!(cache.get(&path).await.unwrap().values()[0], 1.0);

    cache.clear().await;
    assert_eq!(cache.get(&path).await.unwrap().values()[0], 2.0);
    assert_eq!(decoder.calls(), 2);
}

#[tokio::test]
async fn test_get_all_preserves_request_order() {
    let dir = ForecastDir::new();
    let a = dir.write_grib("a.grib2", &Grib2Builder::new().with_constant_value(1.0));
    let bad = dir.write_bytes("b.grib2", b"");
    let c = dir.write_grib("c.grib2", &Grib2Builder::new().with_constant_value(3.0));
    let cache = GridCache::new(Arc::new(CountingDecoder::new()), config());

    let results = cache.get_all(&[a, bad, c]).await;

    assert_eq!(results[0].as_ref().unwrap().values()[0], 1.0);
    assert_eq!(results[1].as_ref().unwrap_err().cause, DecodeCause::NoMessages);
    assert_eq!(results[2].as_ref().unwrap().values()[0], 3.0);
}

#[tokio::test]
async fn test_disk_store_serves_a_fresh_cache() {
    let dir = ForecastDir::new();
    let path = dir.write_grib("sn.grib2", &Grib2Builder::new().with_scanning_mode(64));
    let store_dir = tempfile::TempDir::new().unwrap();

    let first_decoder = Arc::new(CountingDecoder::new());
    let first = GridCache::new(first_decoder.clone(), config())
        .with_disk_store(DiskGridStore::open(store_dir.path()).unwrap());
    let expected = first.get(&path).await.unwrap();
    assert_eq!(first_decoder.calls(), 1);

    let second_decoder = Arc::new(CountingDecoder::new());
    let second = GridCache::new(second_decoder.clone(), config())
        .with_disk_store(DiskGridStore::open(store_dir.path()).unwrap());
    let loaded = second.get(&path).await.unwrap();

    assert_eq!(second_decoder.calls(), 0);
    assert!(loaded.is_normalized());
    assert_eq!(loaded.lats(), expected.lats());
    assert_eq!(loaded.values(), expected.values());

    assert_eq!(second.purge_disk().await, 1);
    second.clear().await;
    second.get(&path).await.unwrap();
    assert_eq!(second_decoder.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_abandoned_request_does_not_restart_build() {
    let dir = ForecastDir::new();
    let path = dir.write_grib("t.grib2", &Grib2Builder::new());
    let decoder = Arc::new(CountingDecoder::with_delay(Duration::from_millis(300)));
    let cache = Arc::new(GridCache::new(decoder.clone(), config()));

    let first = {
        let cache = cache.clone();
        let path = path.clone();
        tokio::spawn(async move { cache.get(&path).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    first.abort();
    assert!(first.await.unwrap_err().is_cancelled());

    let grid = cache.get(&path).await.unwrap();

    assert_eq!(grid.len(), 9);
    assert_eq!(decoder.calls(), 1);
    assert_eq!(cache.len().await, 1);
    assert!(cache.size_bytes().await > 0);
}
