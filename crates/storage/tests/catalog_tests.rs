//! Listing TTL behavior of the file catalog.

use std::time::Duration;

use storage::FileCatalog;
use test_utils::{ForecastDir, Grib2Builder};

const TTL: Duration = Duration::from_secs(60);

#[tokio::test(start_paused = true)]
async fn test_new_files_appear_only_after_ttl() {
    let dir = ForecastDir::new();
    dir.write_grib("a.grib2", &Grib2Builder::new());
    let catalog = FileCatalog::new(dir.path(), TTL);

    assert_eq!(catalog.list_files().await.unwrap().len(), 1);

    dir.write_grib("b.grib2", &Grib2Builder::new());
    tokio::time::advance(TTL / 2).await;
    assert_eq!(catalog.list_files().await.unwrap().len(), 1);

    tokio::time::advance(TTL).await;
    let files = catalog.list_files().await.unwrap();
    assert_eq!(files.len(), 2);
    assert!(files[1].ends_with("b.grib2"));
}

#[tokio::test(start_paused = true)]
async fn test_invalidate_forces_rescan() {
    let dir = ForecastDir::new();
    let catalog = FileCatalog::new(dir.path(), TTL);

    assert!(catalog.list_files().await.unwrap().is_empty());

    dir.write_grib("nested/run/t.GRIB2", &Grib2Builder::new());
    assert!(catalog.list_files().await.unwrap().is_empty());

    catalog.invalidate().await;
    assert_eq!(catalog.list_files().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_listing_is_shared_until_expiry() {
    let dir = ForecastDir::new();
    dir.write_grib("a.grib2", &Grib2Builder::new());
    let catalog = FileCatalog::new(dir.path(), TTL);

    let first = catalog.list_files().await.unwrap();
    let second = catalog.list_files().await.unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
}
