// Copyright 2025 Readygraph (https://github.com/readygraph)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Disk-backed, size-bounded subgraph cache over a remote artifact store.
//!
//! Layered lookup per code: deserialized subgraphs in memory, one artifact
//! file per code on disk, remote fetch on miss. The disk layer enforces a
//! byte budget with least-recently-used eviction; downloads are
//! single-flight per key and globally bounded by a semaphore.
//!
//! ## Locking discipline
//!
//! - one async mutex per code for fetch-and-write (lazily created in a
//!   concurrent map whose shard locks guard creation; the map never
//!   shrinks, its bound is one entry per distinct code ever requested)
//! - a counting semaphore for parallel downloads
//! - a plain mutex serializing eviction decisions
//!
//! Artifact writes go to a `.part` path and become visible only via an
//! atomic rename, so a reader never observes a half-written file under a
//! final name. `.part` remnants from interrupted downloads are swept when
//! the cache is opened.

use crate::config::CacheConfig;
use crate::remote::{HttpRemoteStore, RemoteArtifact, RemoteError, RemoteStore};
use dashmap::DashMap;
use readygraph_core::{ConceptSubgraph, ReadygraphError, Result, RetryPolicy};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tracing::{debug, warn};

/// Eviction estimate when the store does not advertise a transfer size.
const SIZE_ESTIMATE_FALLBACK: u64 = 10 * 1024 * 1024;

const PART_SUFFIX: &str = ".part";

/// Where a successful `get` found the subgraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    Memory,
    Disk,
    Remote,
}

/// Counters for tests and the health endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub remote_fetches: u64,
    pub evictions: u64,
    pub resident_bytes: u64,
    pub resident_entries: u64,
}

#[derive(Debug)]
struct EntryMeta {
    len: u64,
    last_access: AtomicU64,
}

/// Disk-backed LRU cache of concept subgraphs.
pub struct SubgraphCache {
    config: CacheConfig,
    store: Arc<dyn RemoteStore>,
    retry: RetryPolicy,
    memory: moka::sync::Cache<String, Arc<ConceptSubgraph>>,
    index: DashMap<String, EntryMeta>,
    key_locks: DashMap<String, Arc<AsyncMutex<()>>>,
    download_slots: Semaphore,
    evict_lock: parking_lot::Mutex<()>,
    clock: AtomicU64,
    resident: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    remote_fetches: AtomicU64,
    evictions: AtomicU64,
}

impl SubgraphCache {
    /// Open a cache over the given store, creating the cache directory,
    /// sweeping interrupted downloads and rebuilding the LRU index from
    /// what is already on disk.
    pub fn new(config: CacheConfig, store: Arc<dyn RemoteStore>) -> Result<Self> {
        std::fs::create_dir_all(&config.cache_dir)?;
        let retry = config.retry_policy();
        let cache = Self {
            memory: moka::sync::Cache::new(config.memory_entries),
            download_slots: Semaphore::new(config.download_concurrency),
            index: DashMap::new(),
            key_locks: DashMap::new(),
            evict_lock: parking_lot::Mutex::new(()),
            clock: AtomicU64::new(0),
            resident: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            remote_fetches: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            retry,
            store,
            config,
        };
        cache.rebuild_index()?;
        Ok(cache)
    }

    /// Open a cache backed by the configured HTTP store.
    pub fn open(config: CacheConfig) -> Result<Self> {
        let store = HttpRemoteStore::new(
            &config.base_url,
            &config.artifact_ext,
            config.request_timeout(),
        )?;
        Self::new(config, Arc::new(store))
    }

    /// Fetch the subgraph for `code`, from memory, disk or the remote store.
    pub async fn get(&self, code: &str) -> Result<Arc<ConceptSubgraph>> {
        self.get_traced(code).await.map(|(subgraph, _)| subgraph)
    }

    /// Like [`get`](Self::get), also reporting where the subgraph came
    /// from so callers can account download budgets.
    pub async fn get_traced(&self, code: &str) -> Result<(Arc<ConceptSubgraph>, FetchSource)> {
        validate_code(code)?;

        if let Some(subgraph) = self.memory.get(code) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            self.touch(code);
            return Ok((subgraph, FetchSource::Memory));
        }

        let lock = self
            .key_locks
            .entry(code.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another request may have completed the fetch while this one
        // waited for the key lock.
        if let Some(subgraph) = self.memory.get(code) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            self.touch(code);
            return Ok((subgraph, FetchSource::Memory));
        }

        let path = self.artifact_path(code);
        if path.is_file() {
            let subgraph = self.load_resident(code, &path)?;
            self.hits.fetch_add(1, Ordering::Relaxed);
            self.record_access(code, &path);
            self.memory.insert(code.to_string(), subgraph.clone());
            return Ok((subgraph, FetchSource::Disk));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let _permit = self
            .download_slots
            .acquire()
            .await
            .map_err(|_| ReadygraphError::Transient("download limiter closed".to_string()))?;

        let artifact = self.fetch_with_retry(code).await?;
        let subgraph = deserialize(code, &artifact.bytes)?;
        self.publish(code, &path, &artifact).await?;
        self.remote_fetches.fetch_add(1, Ordering::Relaxed);
        self.memory.insert(code.to_string(), subgraph.clone());
        Ok((subgraph, FetchSource::Remote))
    }

    /// True if an artifact for `code` is resident on disk.
    pub fn is_resident(&self, code: &str) -> bool {
        self.index.contains_key(code)
    }

    pub fn resident_bytes(&self) -> u64 {
        self.resident.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            remote_fetches: self.remote_fetches.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            resident_bytes: self.resident.load(Ordering::Relaxed),
            resident_entries: self.index.len() as u64,
        }
    }

    fn artifact_path(&self, code: &str) -> PathBuf {
        self.config
            .cache_dir
            .join(format!("{}.{}", code, self.config.artifact_ext))
    }

    async fn fetch_with_retry(&self, code: &str) -> Result<RemoteArtifact> {
        let mut attempt = 0;
        loop {
            match self.store.fetch(code).await {
                Ok(artifact) => return Ok(artifact),
                Err(RemoteError::NotFound(location)) => {
                    return Err(ReadygraphError::NotFound(format!(
                        "remote subgraph not found: {location}"
                    )));
                }
                Err(RemoteError::Transient(message)) => {
                    attempt += 1;
                    if attempt >= self.retry.max_attempts {
                        return Err(ReadygraphError::Transient(format!(
                            "fetch of {code} failed after {attempt} attempts: {message}"
                        )));
                    }
                    let delay = self.retry.delay_for_attempt(attempt - 1);
                    warn!(
                        code,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %message,
                        "transient fetch failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Make a downloaded artifact visible: evict for the advertised size,
    /// write to a `.part` path, atomically rename, account the true size.
    async fn publish(&self, code: &str, path: &Path, artifact: &RemoteArtifact) -> Result<()> {
        let estimate = artifact.advertised_len.unwrap_or(SIZE_ESTIMATE_FALLBACK);
        self.evict_for(estimate);

        let mut part = path.as_os_str().to_os_string();
        part.push(PART_SUFFIX);
        let part = PathBuf::from(part);

        tokio::fs::write(&part, &artifact.bytes).await?;
        tokio::fs::rename(&part, path).await?;

        let len = artifact.bytes.len() as u64;
        self.index.insert(
            code.to_string(),
            EntryMeta {
                len,
                last_access: AtomicU64::new(self.tick()),
            },
        );
        self.resident.fetch_add(len, Ordering::Relaxed);
        debug!(code, len, "artifact cached");
        Ok(())
    }

    /// Evict least-recently-used artifacts until `incoming` more bytes fit
    /// in the budget or nothing evictable remains. The artifact being
    /// written is not yet indexed and is never a candidate.
    fn evict_for(&self, incoming: u64) {
        let _guard = self.evict_lock.lock();
        let budget = self.config.max_cache_bytes;
        if self.resident.load(Ordering::Relaxed) + incoming <= budget {
            return;
        }

        let mut entries: Vec<(u64, String, u64)> = self
            .index
            .iter()
            .map(|e| {
                (
                    e.value().last_access.load(Ordering::Relaxed),
                    e.key().clone(),
                    e.value().len,
                )
            })
            .collect();
        entries.sort(); // oldest access first

        for (_, code, _) in entries {
            if self.resident.load(Ordering::Relaxed) + incoming <= budget {
                break;
            }
            let _ = std::fs::remove_file(self.artifact_path(&code));
            if let Some((_, meta)) = self.index.remove(&code) {
                self.resident.fetch_sub(meta.len, Ordering::Relaxed);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                self.memory.invalidate(&code);
                debug!(code, "evicted least-recently-used artifact");
            }
        }
    }

    fn load_resident(&self, code: &str, path: &Path) -> Result<Arc<ConceptSubgraph>> {
        let bytes = std::fs::read(path)?;
        match deserialize(code, &bytes) {
            Ok(subgraph) => Ok(subgraph),
            Err(e) => {
                warn!(code, error = %e, "removing unusable cached artifact");
                let _ = std::fs::remove_file(path);
                if let Some((_, meta)) = self.index.remove(code) {
                    self.resident.fetch_sub(meta.len, Ordering::Relaxed);
                }
                self.memory.invalidate(code);
                Err(e)
            }
        }
    }

    /// Refresh the in-memory LRU position and, best-effort, the file
    /// mtime so the ordering survives a restart.
    fn touch(&self, code: &str) {
        self.record_access(code, &self.artifact_path(code));
    }

    fn record_access(&self, code: &str, path: &Path) {
        let now = self.tick();
        match self.index.get(code) {
            Some(entry) => entry.last_access.store(now, Ordering::Relaxed),
            None => {
                // Resident file that predates this index (e.g. re-read
                // after a racing eviction removed the entry but a reader
                // still completed): account it again.
                if let Ok(meta) = std::fs::metadata(path) {
                    self.index.insert(
                        code.to_string(),
                        EntryMeta {
                            len: meta.len(),
                            last_access: AtomicU64::new(now),
                        },
                    );
                    self.resident.fetch_add(meta.len(), Ordering::Relaxed);
                }
            }
        }
        if let Ok(file) = std::fs::File::options().append(true).open(path) {
            let stamp = SystemTime::now();
            let _ = file.set_times(
                std::fs::FileTimes::new()
                    .set_accessed(stamp)
                    .set_modified(stamp),
            );
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Scan the cache directory: drop interrupted `.part` downloads, seed
    /// the LRU index from file mtimes, recompute resident bytes.
    fn rebuild_index(&self) -> Result<()> {
        let ext_suffix = format!(".{}", self.config.artifact_ext);
        let mut found: Vec<(SystemTime, String, u64)> = Vec::new();

        for entry in std::fs::read_dir(&self.config.cache_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(PART_SUFFIX) {
                warn!(file = %name, "sweeping interrupted download");
                let _ = std::fs::remove_file(&path);
                continue;
            }
            let Some(code) = name.strip_suffix(&ext_suffix) else {
                continue;
            };
            let meta = entry.metadata()?;
            let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((mtime, code.to_string(), meta.len()));
        }

        found.sort();
        let mut total = 0u64;
        for (_, code, len) in found {
            self.index.insert(
                code,
                EntryMeta {
                    len,
                    last_access: AtomicU64::new(self.tick()),
                },
            );
            total += len;
        }
        self.resident.store(total, Ordering::Relaxed);
        debug!(
            entries = self.index.len(),
            bytes = total,
            "cache index rebuilt"
        );
        Ok(())
    }
}

fn deserialize(code: &str, bytes: &[u8]) -> Result<Arc<ConceptSubgraph>> {
    let subgraph: ConceptSubgraph = serde_json::from_slice(bytes).map_err(|e| {
        ReadygraphError::Integrity(format!("artifact for {code} failed to deserialize: {e}"))
    })?;
    subgraph.validate()?;
    Ok(Arc::new(subgraph))
}

/// Codes become file names; anything that could escape the cache
/// directory is rejected before it touches the filesystem.
fn validate_code(code: &str) -> Result<()> {
    if code.trim().is_empty() {
        return Err(ReadygraphError::InvalidInput(
            "concept code is empty".to_string(),
        ));
    }
    if code.contains('/') || code.contains('\\') || code.contains("..") {
        return Err(ReadygraphError::InvalidInput(format!(
            "concept code {code:?} contains path separators"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    struct MockStore {
        artifacts: DashMap<String, Vec<u8>>,
        fetches: AtomicUsize,
        transient_failures: DashMap<String, usize>,
    }

    impl MockStore {
        fn new() -> Self {
            Self {
                artifacts: DashMap::new(),
                fetches: AtomicUsize::new(0),
                transient_failures: DashMap::new(),
            }
        }

        fn put(&self, code: &str, padding: usize) {
            let mut subgraph = subgraph_for(code);
            subgraph.descriptions = Some(vec!["x".repeat(padding)]);
            self.artifacts
                .insert(code.to_string(), serde_json::to_vec(&subgraph).unwrap());
        }

        fn fail_transiently(&self, code: &str, times: usize) {
            self.transient_failures.insert(code.to_string(), times);
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RemoteStore for MockStore {
        async fn fetch(&self, code: &str) -> std::result::Result<RemoteArtifact, RemoteError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(mut remaining) = self.transient_failures.get_mut(code) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(RemoteError::Transient("injected failure".to_string()));
                }
            }
            match self.artifacts.get(code) {
                Some(bytes) => Ok(RemoteArtifact {
                    advertised_len: Some(bytes.len() as u64),
                    bytes: bytes.clone(),
                }),
                None => Err(RemoteError::NotFound(code.to_string())),
            }
        }
    }

    fn subgraph_for(code: &str) -> ConceptSubgraph {
        ConceptSubgraph {
            codes: vec![code.to_string()],
            edges: vec![],
            features: vec![vec![1.0, 2.0]],
            grade_levels: None,
            descriptions: None,
            history_scores: None,
        }
    }

    fn test_config(dir: &TempDir) -> CacheConfig {
        CacheConfig {
            cache_dir: dir.path().to_path_buf(),
            retry_initial_delay_ms: 1,
            ..CacheConfig::default()
        }
    }

    fn open(dir: &TempDir, store: &Arc<MockStore>) -> SubgraphCache {
        SubgraphCache::new(test_config(dir), store.clone() as Arc<dyn RemoteStore>).unwrap()
    }

    #[tokio::test]
    async fn second_get_never_touches_the_network() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MockStore::new());
        store.put("3.OA.1", 0);
        let cache = open(&dir, &store);

        let (first, source) = cache.get_traced("3.OA.1").await.unwrap();
        assert_eq!(source, FetchSource::Remote);
        assert_eq!(store.fetch_count(), 1);

        let (second, source) = cache.get_traced("3.OA.1").await.unwrap();
        assert_eq!(source, FetchSource::Memory);
        assert_eq!(store.fetch_count(), 1);
        assert_eq!(first.codes, second.codes);
    }

    #[tokio::test]
    async fn disk_artifact_survives_a_reopen() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MockStore::new());
        store.put("3.OA.1", 0);

        let cache = open(&dir, &store);
        cache.get("3.OA.1").await.unwrap();
        drop(cache);

        let cache = open(&dir, &store);
        let (_, source) = cache.get_traced("3.OA.1").await.unwrap();
        assert_eq!(source, FetchSource::Disk);
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_gets_share_one_fetch() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MockStore::new());
        store.put("4.NBT.2", 0);
        let cache = Arc::new(open(&dir, &store));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(
                async move { cache.get("4.NBT.2").await.unwrap() },
            ));
        }
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(store.fetch_count(), 1);
        assert!(results.windows(2).all(|w| w[0].codes == w[1].codes));
    }

    #[tokio::test]
    async fn eviction_removes_least_recently_used_first() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MockStore::new());
        store.put("A", 4000);
        store.put("B", 4000);
        store.put("C", 4000);

        let a_len = store.artifacts.get("A").unwrap().len() as u64;
        let config = CacheConfig {
            cache_dir: dir.path().to_path_buf(),
            retry_initial_delay_ms: 1,
            // room for two artifacts, not three
            max_cache_bytes: a_len * 2 + a_len / 2,
            ..CacheConfig::default()
        };
        let cache = SubgraphCache::new(config, store.clone() as Arc<dyn RemoteStore>).unwrap();

        cache.get("A").await.unwrap();
        cache.get("B").await.unwrap();
        cache.get("A").await.unwrap(); // B is now the oldest
        cache.get("C").await.unwrap();

        assert!(cache.is_resident("A"));
        assert!(!cache.is_resident("B"), "LRU entry should have been evicted");
        assert!(cache.is_resident("C"));
        assert!(cache.resident_bytes() <= a_len * 2 + a_len / 2);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn not_found_fails_immediately_without_retries() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MockStore::new());
        let cache = open(&dir, &store);

        let err = cache.get("MISSING").await.unwrap_err();
        assert!(matches!(err, ReadygraphError::NotFound(_)));
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn transient_failures_exhaust_the_attempt_budget() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MockStore::new());
        store.put("5.NF.1", 0);
        store.fail_transiently("5.NF.1", 99);
        let cache = open(&dir, &store);

        let err = cache.get("5.NF.1").await.unwrap_err();
        assert!(matches!(err, ReadygraphError::Transient(_)));
        assert_eq!(store.fetch_count(), 3);
    }

    #[tokio::test]
    async fn transient_failure_then_success_recovers() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MockStore::new());
        store.put("5.NF.1", 0);
        store.fail_transiently("5.NF.1", 2);
        let cache = open(&dir, &store);

        let (_, source) = cache.get_traced("5.NF.1").await.unwrap();
        assert_eq!(source, FetchSource::Remote);
        assert_eq!(store.fetch_count(), 3);
    }

    #[tokio::test]
    async fn interrupted_downloads_are_swept_on_open() {
        let dir = TempDir::new().unwrap();
        let part = dir.path().join("3.OA.1.json.part");
        std::fs::write(&part, b"half an artifact").unwrap();

        let store = Arc::new(MockStore::new());
        store.put("3.OA.1", 0);
        let cache = open(&dir, &store);

        assert!(!part.exists());
        // the partial file never satisfies a get; a clean fetch does
        let (_, source) = cache.get_traced("3.OA.1").await.unwrap();
        assert_eq!(source, FetchSource::Remote);
    }

    #[tokio::test]
    async fn corrupt_resident_artifact_is_integrity_and_removed() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("BAD.json"), b"not a subgraph").unwrap();

        let store = Arc::new(MockStore::new());
        store.put("BAD", 0);
        let cache = open(&dir, &store);

        let err = cache.get("BAD").await.unwrap_err();
        assert!(matches!(err, ReadygraphError::Integrity(_)));
        assert!(!dir.path().join("BAD.json").exists());

        // next get falls through to a clean download
        let (_, source) = cache.get_traced("BAD").await.unwrap();
        assert_eq!(source, FetchSource::Remote);
    }

    #[tokio::test]
    async fn path_escaping_codes_are_rejected() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MockStore::new());
        let cache = open(&dir, &store);

        for code in ["", "  ", "../etc/passwd", "a/b", "a\\b"] {
            let err = cache.get(code).await.unwrap_err();
            assert!(matches!(err, ReadygraphError::InvalidInput(_)), "{code:?}");
        }
        assert_eq!(store.fetch_count(), 0);
    }

    #[tokio::test]
    async fn stats_count_hits_misses_and_fetches() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MockStore::new());
        store.put("A", 0);
        let cache = open(&dir, &store);

        cache.get("A").await.unwrap(); // miss + fetch
        cache.get("A").await.unwrap(); // memory hit
        let _ = cache.get("NOPE").await; // miss, fetch fails

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.remote_fetches, 1);
        assert_eq!(stats.resident_entries, 1);
    }
}
