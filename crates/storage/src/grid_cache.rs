//! In-memory cache of decoded, normalized grids.
//!
//! Each path owns one slot holding a shared handle to a spawned build, so
//! concurrent requests for the same file wait on a single build and share
//! its result. A caller that stops waiting does not stop the build. Failures
//! are memoized like successes. Completed entries are evicted
//! least-recently-used first once their estimated size exceeds the byte budget.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use forecast_common::{DecodeCause, DecodeError, DecodedGrid};
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use grib_decoder::GridDecoder;
use grid_processor::normalize;
use lru::LruCache;
use metrics::{counter, gauge};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use crate::disk_cache::DiskGridStore;

/// A decoded grid or the memoized reason it could not be built.
pub type GridResult = Result<Arc<DecodedGrid>, DecodeError>;

type Slot = Shared<BoxFuture<'static, GridResult>>;

#[derive(Debug, Clone)]
pub struct GridCacheConfig {
    /// Budget for completed entries, estimated from array lengths.
    pub max_bytes: usize,
    /// Maximum number of files decoded at the same time.
    pub decode_workers: usize,
}

impl Default for GridCacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: 512 * 1024 * 1024,
            decode_workers: 2,
        }
    }
}

/// Counters for the grid cache.
#[derive(Debug, Default)]
pub struct GridCacheStats {
    /// Lookups that found an existing slot (finished or in flight).
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    /// Builds started (disk load or decode).
    pub builds: AtomicU64,
    pub failures: AtomicU64,
    pub evictions: AtomicU64,
    pub clears: AtomicU64,
}

impl GridCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = hits + self.misses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }
}

struct Entry {
    /// Distinguishes this build from later ones for the same path.
    id: u64,
    slot: Slot,
    /// Accounted size; `None` while the build is in flight.
    size: Option<usize>,
}

struct CacheState {
    entries: LruCache<PathBuf, Entry>,
    bytes: usize,
    /// Bumped on every clear so late builds don't account into the new map.
    generation: u64,
    next_id: u64,
}

/// Everything a detached build task needs.
#[derive(Clone)]
struct CacheCore {
    decoder: Arc<dyn GridDecoder>,
    disk: Option<Arc<DiskGridStore>>,
    state: Arc<Mutex<CacheState>>,
    decode_permits: Arc<Semaphore>,
    max_bytes: usize,
    stats: Arc<GridCacheStats>,
}

pub struct GridCache {
    core: CacheCore,
}

impl GridCache {
    pub fn new(decoder: Arc<dyn GridDecoder>, config: GridCacheConfig) -> Self {
        info!(
            max_bytes = config.max_bytes,
            decode_workers = config.decode_workers,
            "Grid cache initialized"
        );

        Self {
            core: CacheCore {
                decoder,
                disk: None,
                state: Arc::new(Mutex::new(CacheState {
                    entries: LruCache::unbounded(),
                    bytes: 0,
                    generation: 0,
                    next_id: 0,
                })),
                decode_permits: Arc::new(Semaphore::new(config.decode_workers.max(1))),
                max_bytes: config.max_bytes,
                stats: Arc::new(GridCacheStats::default()),
            },
        }
    }

    /// Read and write raw grids through `disk` on builds.
    pub fn with_disk_store(mut self, disk: DiskGridStore) -> Self {
        info!(dir = %disk.dir().display(), "Grid disk store enabled");
        self.core.disk = Some(Arc::new(disk));
        self
    }

    pub fn stats(&self) -> &GridCacheStats {
        &self.core.stats
    }

    pub async fn len(&self) -> usize {
        self.core.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Estimated size of the completed entries.
    pub async fn size_bytes(&self) -> usize {
        self.core.state.lock().await.bytes
    }

    /// Get the grid for `path`, building it at most once per cache generation.
    ///
    /// Dropping the returned future only stops this caller from waiting.
    pub async fn get(&self, path: &Path) -> GridResult {
        let slot = {
            let mut state = self.core.state.lock().await;
            match state.entries.get(path).map(|entry| entry.slot.clone()) {
                Some(slot) => {
                    self.core.stats.hits.fetch_add(1, Ordering::Relaxed);
                    counter!("grid_cache_hits_total").increment(1);
                    debug!(path = %path.display(), "Grid cache hit");
                    slot
                }
                None => {
                    self.core.stats.misses.fetch_add(1, Ordering::Relaxed);
                    counter!("grid_cache_misses_total").increment(1);
                    debug!(path = %path.display(), "Grid cache miss");
                    self.core.spawn_build(&mut state, path)
                }
            }
        };

        slot.await
    }

    /// Get several grids, building missing ones concurrently. Results keep
    /// the order of `paths`.
    pub async fn get_all(&self, paths: &[PathBuf]) -> Vec<GridResult> {
        join_all(paths.iter().map(|path| self.get(path))).await
    }

    /// Drop every entry by swapping in an empty map.
    ///
    /// Builds still in flight finish into the old map and are discarded.
    pub async fn clear(&self) -> usize {
        let mut state = self.core.state.lock().await;
        let old = std::mem::replace(&mut state.entries, LruCache::unbounded());
        state.bytes = 0;
        state.generation += 1;
        drop(state);

        self.core.stats.clears.fetch_add(1, Ordering::Relaxed);
        gauge!("grid_cache_bytes").set(0.0);
        gauge!("grid_cache_entries").set(0.0);
        info!(entries = old.len(), "Grid cache cleared");
        old.len()
    }

    /// Remove every entry from the disk store, if one is configured.
    pub async fn purge_disk(&self) -> usize {
        let Some(disk) = self.core.disk.clone() else {
            return 0;
        };

        match tokio::task::spawn_blocking(move || disk.clear()).await {
            Ok(Ok(removed)) => {
                info!(removed, "Grid disk store cleared");
                removed
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to clear grid disk store");
                0
            }
            Err(e) => {
                warn!(error = %e, "Grid disk store clear task failed");
                0
            }
        }
    }
}

impl CacheCore {
    /// Start the build for `path` on its own task and register its slot.
    /// Must be called with the state lock held.
    fn spawn_build(&self, state: &mut CacheState, path: &Path) -> Slot {
        let id = state.next_id;
        state.next_id += 1;
        let generation = state.generation;

        let core = self.clone();
        let owned = path.to_path_buf();
        let task = tokio::spawn(async move {
            let result = core.build(&owned).await;
            core.account(&owned, id, generation, &result).await;
            result
        });

        let task_path = path.to_path_buf();
        let slot = async move {
            task.await.unwrap_or_else(|e| {
                Err(DecodeError::new(&task_path, DecodeCause::Task(e.to_string())))
            })
        }
        .boxed()
        .shared();

        state.entries.put(
            path.to_path_buf(),
            Entry {
                id,
                slot: slot.clone(),
                size: None,
            },
        );
        slot
    }

    async fn build(&self, path: &Path) -> GridResult {
        let _permit = self
            .decode_permits
            .acquire()
            .await
            .map_err(|e| DecodeError::new(path, DecodeCause::Task(e.to_string())))?;

        self.stats.builds.fetch_add(1, Ordering::Relaxed);
        counter!("grid_cache_builds_total").increment(1);

        let decoder = Arc::clone(&self.decoder);
        let disk = self.disk.clone();
        let owned = path.to_path_buf();
        let started = Instant::now();

        let result = tokio::task::spawn_blocking(move || {
            load_or_decode(decoder.as_ref(), disk.as_deref(), &owned)
        })
        .await
        .unwrap_or_else(|e| Err(DecodeError::new(path, DecodeCause::Task(e.to_string()))));

        match &result {
            Ok(grid) => debug!(
                path = %path.display(),
                points = grid.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Grid built"
            ),
            Err(e) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                counter!("grid_cache_decode_failures_total").increment(1);
                warn!(path = %path.display(), error = %e, "Grid build failed");
            }
        }

        result.map(Arc::new)
    }

    /// Record the size of a finished build and evict over budget.
    async fn account(&self, path: &Path, id: u64, generation: u64, result: &GridResult) {
        let size = result.as_ref().map(|grid| grid.size_bytes()).unwrap_or(0);

        let mut state = self.state.lock().await;
        if state.generation != generation {
            return;
        }
        match state.entries.peek_mut(path) {
            Some(entry) if entry.id == id && entry.size.is_none() => {
                entry.size = Some(size);
            }
            _ => return,
        }
        state.bytes += size;

        self.evict_over_budget(&mut state, path);

        gauge!("grid_cache_bytes").set(state.bytes as f64);
        gauge!("grid_cache_entries").set(state.entries.len() as f64);
    }

    /// Evict completed entries, least recently used first, until the
    /// accounted size fits the budget. `keep` is never evicted.
    fn evict_over_budget(&self, state: &mut CacheState, keep: &Path) {
        if state.bytes <= self.max_bytes {
            return;
        }

        let mut victims = Vec::new();
        let mut freed = 0;
        for (key, entry) in state.entries.iter().rev() {
            if state.bytes - freed <= self.max_bytes {
                break;
            }
            if key.as_path() == keep {
                continue;
            }
            if let Some(size) = entry.size {
                freed += size;
                victims.push(key.clone());
            }
        }

        for key in &victims {
            state.entries.pop(key);
            debug!(path = %key.display(), "Grid evicted");
        }
        state.bytes -= freed;

        if !victims.is_empty() {
            self.stats
                .evictions
                .fetch_add(victims.len() as u64, Ordering::Relaxed);
            counter!("grid_cache_evictions_total").increment(victims.len() as u64);
        }
        if state.bytes > self.max_bytes {
            warn!(
                bytes = state.bytes,
                max_bytes = self.max_bytes,
                "Grid cache over budget after eviction"
            );
        }
    }
}

/// Load the raw grid from disk or decode it, then normalize.
fn load_or_decode(
    decoder: &dyn GridDecoder,
    disk: Option<&DiskGridStore>,
    path: &Path,
) -> Result<DecodedGrid, DecodeError> {
    if let Some(disk) = disk {
        match disk.load(path) {
            Ok(Some(raw)) => {
                debug!(path = %path.display(), "Grid loaded from disk store");
                return Ok(normalize(raw));
            }
            Ok(None) => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Ignoring disk store entry"),
        }
    }

    let raw = decoder.decode(path)?;

    if let Some(disk) = disk {
        if let Err(e) = disk.store(path, &raw) {
            warn!(path = %path.display(), error = %e, "Failed to write disk store entry");
        }
    }

    Ok(normalize(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use forecast_common::{GridMetadata, StepUnits};

    /// Returns a fixed-size grid for any path; fails for paths ending in "bad".
    struct FixedDecoder {
        calls: AtomicU64,
    }

    impl GridDecoder for FixedDecoder {
        fn decode(&self, path: &Path) -> Result<DecodedGrid, DecodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if path.ends_with("bad") {
                return Err(DecodeError::new(path, DecodeCause::NoMessages));
            }
            let metadata = GridMetadata {
                short_name: "t".to_string(),
                valid_time_ms: 0,
                step_range: "0".to_string(),
                step_units: StepUnits::Hours,
                step: 0,
                scanning_mode: 0,
            };
            Ok(DecodedGrid::new(metadata, 1, 100, vec![0.0; 100], vec![0.0; 100], vec![-1.0; 100])
                .unwrap())
        }
    }

    fn cache(max_bytes: usize) -> (Arc<FixedDecoder>, GridCache) {
        let decoder = Arc::new(FixedDecoder {
            calls: AtomicU64::new(0),
        });
        let cache = GridCache::new(
            decoder.clone(),
            GridCacheConfig {
                max_bytes,
                decode_workers: 2,
            },
        );
        (decoder, cache)
    }

    #[tokio::test]
    async fn test_grids_are_normalized_and_memoized() {
        let (decoder, cache) = cache(usize::MAX);

        let first = cache.get(Path::new("/f/a.grib2")).await.unwrap();
        let second = cache.get(Path::new("/f/a.grib2")).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.is_normalized());
        assert_eq!(first.lons()[0], 359.0);
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits.load(Ordering::Relaxed), 1);
        assert_eq!(cache.stats().misses.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_failures_are_memoized() {
        let (decoder, cache) = cache(usize::MAX);

        let first = cache.get(Path::new("/f/bad")).await.unwrap_err();
        let second = cache.get(Path::new("/f/bad")).await.unwrap_err();

        assert_eq!(first, second);
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().failures.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_clear_forces_rebuild() {
        let (decoder, cache) = cache(usize::MAX);

        cache.get(Path::new("/f/a.grib2")).await.unwrap();
        assert_eq!(cache.clear().await, 1);
        assert!(cache.is_empty().await);
        assert_eq!(cache.size_bytes().await, 0);

        cache.get(Path::new("/f/a.grib2")).await.unwrap();
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_byte_budget_evicts_least_recently_used() {
        let (_, sizing) = cache(usize::MAX);
        let one = sizing.get(Path::new("/f/x")).await.unwrap().size_bytes();

        // Room for two grids
        let (decoder, cache) = cache(one * 2 + one / 2);
        cache.get(Path::new("/f/a")).await.unwrap();
        cache.get(Path::new("/f/b")).await.unwrap();
        // Touch a so b becomes least recently used
        cache.get(Path::new("/f/a")).await.unwrap();
        cache.get(Path::new("/f/c")).await.unwrap();

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.stats().evictions.load(Ordering::Relaxed), 1);
        assert!(cache.size_bytes().await <= one * 2 + one / 2);

        cache.get(Path::new("/f/a")).await.unwrap();
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 3);
        cache.get(Path::new("/f/b")).await.unwrap();
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_get_all_keeps_order() {
        let (_, cache) = cache(usize::MAX);
        let paths = vec![PathBuf::from("/f/a"), PathBuf::from("/f/bad"), PathBuf::from("/f/c")];

        let results = cache.get_all(&paths).await;

        assert!(results[0].is_ok());
        assert_eq!(results[1].as_ref().unwrap_err().path, PathBuf::from("/f/bad"));
        assert!(results[2].is_ok());
    }
}
