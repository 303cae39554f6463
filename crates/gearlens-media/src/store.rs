//! Disk-backed frame registry with a bounded in-memory cache.
//!
//! The store is the sole owner of extracted frame files. Pipeline stages
//! hold `FrameId`s and ask the store for metadata or a base64 payload; the
//! store materializes payloads lazily through an LRU cache so a run over
//! hundreds of frames keeps only a bounded number resident.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use gearlens_models::{FrameId, FrameMeta, FrameOrigin, PerceptualHash};

use crate::error::{MediaError, MediaResult};

/// A decoded still image extracted from the video.
///
/// Immutable once created. The path is private to the media crate; other
/// components address frames by id through the [`FrameStore`].
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: FrameId,
    pub(crate) path: PathBuf,
    pub timestamp_ms: u64,
    pub width: u32,
    pub height: u32,
    pub phash: PerceptualHash,
    pub origin: FrameOrigin,
}

impl Frame {
    pub fn meta(&self) -> FrameMeta {
        FrameMeta {
            id: self.id.clone(),
            timestamp_ms: self.timestamp_ms,
            width: self.width,
            height: self.height,
            origin: self.origin,
        }
    }
}

/// Default number of base64 payloads kept resident.
pub const DEFAULT_CACHE_CAPACITY: usize = 20;

/// Read a JPEG file and encode it as a `data:image/jpeg;base64,...` URL.
pub async fn read_jpeg_data_url(path: &std::path::Path) -> MediaResult<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|_| MediaError::FileNotFound(path.to_path_buf()))?;
    Ok(format!("data:image/jpeg;base64,{}", BASE64.encode(&bytes)))
}

struct StoreInner {
    frames: HashMap<FrameId, Frame>,
    /// id -> data-URL payload for cached frames.
    cache: HashMap<FrameId, String>,
    /// Recency order, least recently used at the front.
    recency: VecDeque<FrameId>,
    capacity: usize,
}

impl StoreInner {
    fn touch(&mut self, id: &FrameId) {
        if let Some(pos) = self.recency.iter().position(|f| f == id) {
            let id = self.recency.remove(pos).unwrap_or_else(|| id.clone());
            self.recency.push_back(id);
        }
    }

    fn insert_cached(&mut self, id: FrameId, payload: String) {
        if self.cache.len() >= self.capacity {
            if let Some(evicted) = self.recency.pop_front() {
                self.cache.remove(&evicted);
            }
        }
        self.cache.insert(id.clone(), payload);
        self.recency.push_back(id);
    }
}

/// Registry of extracted frames plus a bounded LRU of materialized payloads.
pub struct FrameStore {
    inner: Mutex<StoreInner>,
}

impl FrameStore {
    /// Create a store bounded at `capacity` resident payloads.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                frames: HashMap::new(),
                cache: HashMap::new(),
                recency: VecDeque::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Register extracted frames. Takes ownership; the store owns their
    /// backing files from this point on.
    pub async fn register(&self, frames: Vec<Frame>) {
        let mut inner = self.inner.lock().await;
        for frame in frames {
            inner.frames.insert(frame.id.clone(), frame);
        }
    }

    /// Number of registered frames.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.frames.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Metadata for a frame, if registered.
    pub async fn meta(&self, id: &FrameId) -> Option<FrameMeta> {
        self.inner.lock().await.frames.get(id).map(Frame::meta)
    }

    /// All registered frame ids in timestamp order.
    pub async fn frame_ids(&self) -> Vec<FrameId> {
        let inner = self.inner.lock().await;
        let mut frames: Vec<&Frame> = inner.frames.values().collect();
        frames.sort_by_key(|f| (f.timestamp_ms, f.id.clone()));
        frames.iter().map(|f| f.id.clone()).collect()
    }

    /// Load a frame as a `data:image/jpeg;base64,...` URL, reading from disk
    /// on a cache miss and evicting the least recently used entry when at
    /// capacity. Callers iterating several frames should request them in id
    /// order to avoid thrashing the cache.
    pub async fn load_base64(&self, id: &FrameId) -> MediaResult<String> {
        let path = {
            let mut inner = self.inner.lock().await;
            if let Some(payload) = inner.cache.get(id).cloned() {
                inner.touch(id);
                return Ok(payload);
            }
            inner
                .frames
                .get(id)
                .map(|f| f.path.clone())
                .ok_or_else(|| MediaError::UnknownFrame(id.clone()))?
        };

        let payload = read_jpeg_data_url(&path).await?;

        // A concurrent miss may have filled the slot while the lock was
        // released; inserting again would duplicate the recency entry.
        let mut inner = self.inner.lock().await;
        if inner.cache.contains_key(id) {
            inner.touch(id);
        } else {
            inner.insert_cached(id.clone(), payload.clone());
        }
        Ok(payload)
    }

    /// Delete every registered frame's backing file. Idempotent; safe to
    /// call on every exit path.
    pub async fn cleanup(&self) {
        let mut inner = self.inner.lock().await;
        let mut removed = 0usize;
        for frame in inner.frames.values() {
            match tokio::fs::remove_file(&frame.path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove frame file {}: {}", frame.path.display(), e),
            }
        }
        inner.cache.clear();
        inner.recency.clear();
        if removed > 0 {
            debug!("Frame store cleanup removed {} files", removed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_frame(dir: &TempDir, idx: usize) -> Frame {
        let path = dir.path().join(format!("frame_{:04}.jpg", idx));
        std::fs::write(&path, format!("jpeg-{}", idx)).unwrap();
        Frame {
            id: FrameId::new(format!("frame_{:04}", idx)),
            path,
            timestamp_ms: (idx as u64) * 2000,
            width: 1280,
            height: 720,
            phash: PerceptualHash::ZERO,
            origin: FrameOrigin::Interval,
        }
    }

    #[tokio::test]
    async fn load_returns_data_url() {
        let dir = TempDir::new().unwrap();
        let store = FrameStore::new(4);
        store.register(vec![test_frame(&dir, 0)]).await;

        let payload = store.load_base64(&FrameId::new("frame_0000")).await.unwrap();
        assert!(payload.starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn unknown_frame_is_an_error() {
        let store = FrameStore::new(4);
        let err = store.load_base64(&FrameId::new("missing")).await;
        assert!(matches!(err, Err(MediaError::UnknownFrame(_))));
    }

    #[tokio::test]
    async fn evicts_least_recently_used() {
        let dir = TempDir::new().unwrap();
        let store = FrameStore::new(2);
        store
            .register((0..3).map(|i| test_frame(&dir, i)).collect())
            .await;

        let id0 = FrameId::new("frame_0000");
        let id1 = FrameId::new("frame_0001");
        let id2 = FrameId::new("frame_0002");

        store.load_base64(&id0).await.unwrap();
        store.load_base64(&id1).await.unwrap();
        // Touch id0 so id1 becomes the eviction target.
        store.load_base64(&id0).await.unwrap();
        store.load_base64(&id2).await.unwrap();

        let inner = store.inner.lock().await;
        assert!(inner.cache.contains_key(&id0));
        assert!(!inner.cache.contains_key(&id1));
        assert!(inner.cache.contains_key(&id2));
    }

    #[tokio::test]
    async fn concurrent_misses_cache_once() {
        let dir = TempDir::new().unwrap();
        let store = FrameStore::new(2);
        store.register(vec![test_frame(&dir, 0)]).await;

        let id = FrameId::new("frame_0000");
        let (a, b) = tokio::join!(store.load_base64(&id), store.load_base64(&id));
        assert_eq!(a.unwrap(), b.unwrap());

        let inner = store.inner.lock().await;
        assert_eq!(inner.recency.iter().filter(|f| **f == id).count(), 1);
    }

    #[tokio::test]
    async fn cache_survives_file_deletion() {
        let dir = TempDir::new().unwrap();
        let frame = test_frame(&dir, 0);
        let path = frame.path.clone();
        let store = FrameStore::new(2);
        store.register(vec![frame]).await;

        let id = FrameId::new("frame_0000");
        let first = store.load_base64(&id).await.unwrap();
        std::fs::remove_file(&path).unwrap();
        let second = store.load_base64(&id).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let frames: Vec<Frame> = (0..3).map(|i| test_frame(&dir, i)).collect();
        let paths: Vec<PathBuf> = frames.iter().map(|f| f.path.clone()).collect();

        let store = FrameStore::new(4);
        store.register(frames).await;

        store.cleanup().await;
        for path in &paths {
            assert!(!path.exists());
        }
        // Second call must not error on already-deleted files.
        store.cleanup().await;
    }
}
