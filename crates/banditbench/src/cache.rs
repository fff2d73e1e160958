//! Content-addressed byte caches used to memoize expensive remote fetches.
//!
//! A cache value is a *stream* of line-delimited byte chunks
//! ([`CacheStream`]): readers consume lazily, and a stream can carry a
//! release callback that fires exactly once when the stream is drained or
//! dropped — this is how the concurrent wrapper keeps its read lock alive
//! for exactly as long as the bytes are being consumed.
//!
//! Variants:
//! - [`NullCacher`] — caches nothing; `get_or_put` passes the producer
//!   stream through.
//! - [`MemoryCacher`] — mutex-protected map of materialized line vectors.
//! - [`DiskCacher`] — one gzip file per key under a cache directory;
//!   degrades to null semantics when no directory is configured.
//! - [`ConcurrentCacher`] — wraps any cacher with a per-key
//!   multi-reader/single-writer protocol.
//!
//! Prefer [`Cacher::get_or_put`] for all load paths: between `contains` and
//! `get` another thread may remove the entry, and `get_or_put` narrows (but
//! does not eliminate) that window.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{BenchError, BenchResult};

/// Characters permitted in cache keys: they must be usable as file names.
fn valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '.' || c == '_')
}

// ── CacheStream ──────────────────────────────────────────────────────────────

/// A lazy stream of byte lines with an optional release callback.
///
/// The callback fires exactly once, on exhaustion or on drop, whichever
/// comes first. Iterate to completion or drop promptly — never park a
/// stream indefinitely while other parties wait on its locks.
pub struct CacheStream {
    iter: Box<dyn Iterator<Item = BenchResult<Vec<u8>>> + Send>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl CacheStream {
    /// A stream over already-materialized lines.
    pub fn from_lines(lines: Vec<Vec<u8>>) -> Self {
        CacheStream { iter: Box::new(lines.into_iter().map(Ok)), release: None }
    }

    /// A stream over UTF-8 text lines.
    pub fn from_strings(lines: Vec<String>) -> Self {
        CacheStream::from_lines(lines.into_iter().map(String::into_bytes).collect())
    }

    /// A stream over a lazy line iterator.
    pub fn from_iter(
        iter: impl Iterator<Item = BenchResult<Vec<u8>>> + Send + 'static,
    ) -> Self {
        CacheStream { iter: Box::new(iter), release: None }
    }

    /// Attach (or chain) a release callback.
    pub fn with_release(mut self, release: Box<dyn FnOnce() + Send>) -> Self {
        self.release = Some(match self.release.take() {
            Some(existing) => Box::new(move || {
                existing();
                release();
            }),
            None => release,
        });
        self
    }

    fn fire_release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    /// Drain the stream into a line vector, surfacing the first error.
    pub fn collect_lines(mut self) -> BenchResult<Vec<Vec<u8>>> {
        let mut lines = Vec::new();
        for line in &mut self.iter {
            match line {
                Ok(line) => lines.push(line),
                Err(e) => {
                    self.fire_release();
                    return Err(e);
                }
            }
        }
        self.fire_release();
        Ok(lines)
    }

    /// Drain the stream into text lines (invalid UTF-8 replaced).
    pub fn collect_strings(self) -> BenchResult<Vec<String>> {
        Ok(self
            .collect_lines()?
            .into_iter()
            .map(|line| String::from_utf8_lossy(&line).into_owned())
            .collect())
    }
}

impl Iterator for CacheStream {
    type Item = BenchResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.iter.next() {
            Some(item) => Some(item),
            None => {
                self.fire_release();
                None
            }
        }
    }
}

impl Drop for CacheStream {
    fn drop(&mut self) {
        self.fire_release();
    }
}

// ── Cacher trait ─────────────────────────────────────────────────────────────

/// A producer invoked by [`Cacher::get_or_put`] on a cache miss.
pub type Producer<'a> = Box<dyn FnOnce() -> BenchResult<CacheStream> + Send + 'a>;

/// A key → byte-stream store.
pub trait Cacher: Send + Sync {
    /// Whether `key` currently has an entry.
    fn contains(&self, key: &str) -> bool;

    /// Stream the value under `key`; fails when absent.
    fn get(&self, key: &str) -> BenchResult<CacheStream>;

    /// Store a value under `key`, draining the stream. A key collision
    /// stores nothing (first write wins).
    fn put(&self, key: &str, value: CacheStream) -> BenchResult<()>;

    /// Remove the entry under `key`, if any.
    fn remove(&self, key: &str) -> BenchResult<()>;

    /// Stream the value under `key`, producing and storing it first when
    /// absent.
    fn get_or_put(&self, key: &str, producer: Producer<'_>) -> BenchResult<CacheStream>;
}

// ── NullCacher ───────────────────────────────────────────────────────────────

/// A cacher which caches nothing.
pub struct NullCacher;

impl Cacher for NullCacher {
    fn contains(&self, _key: &str) -> bool {
        false
    }

    fn get(&self, key: &str) -> BenchResult<CacheStream> {
        Err(BenchError::cache(format!("key '{key}' is not in the cache")))
    }

    fn put(&self, _key: &str, _value: CacheStream) -> BenchResult<()> {
        Ok(())
    }

    fn remove(&self, _key: &str) -> BenchResult<()> {
        Ok(())
    }

    fn get_or_put(&self, _key: &str, producer: Producer<'_>) -> BenchResult<CacheStream> {
        producer()
    }
}

// ── MemoryCacher ─────────────────────────────────────────────────────────────

/// A cacher backed by an in-memory map of materialized line vectors.
#[derive(Default)]
pub struct MemoryCacher {
    entries: Mutex<HashMap<String, Vec<Vec<u8>>>>,
}

impl MemoryCacher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cacher for MemoryCacher {
    fn contains(&self, key: &str) -> bool {
        self.entries.lock().expect("MemoryCacher mutex poisoned").contains_key(key)
    }

    fn get(&self, key: &str) -> BenchResult<CacheStream> {
        let entries = self.entries.lock().expect("MemoryCacher mutex poisoned");
        match entries.get(key) {
            Some(lines) => Ok(CacheStream::from_lines(lines.clone())),
            None => Err(BenchError::cache(format!("key '{key}' is not in the cache"))),
        }
    }

    fn put(&self, key: &str, value: CacheStream) -> BenchResult<()> {
        if self.contains(key) {
            return Ok(());
        }
        // Drain outside the map lock; producers may be slow.
        let lines = value.collect_lines()?;
        self.entries
            .lock()
            .expect("MemoryCacher mutex poisoned")
            .entry(key.to_string())
            .or_insert(lines);
        Ok(())
    }

    fn remove(&self, key: &str) -> BenchResult<()> {
        self.entries.lock().expect("MemoryCacher mutex poisoned").remove(key);
        Ok(())
    }

    fn get_or_put(&self, key: &str, producer: Producer<'_>) -> BenchResult<CacheStream> {
        if !self.contains(key) {
            self.put(key, producer()?)?;
        }
        self.get(key)
    }
}

// ── DiskCacher ───────────────────────────────────────────────────────────────

/// A cacher that writes one gzip file per key under a cache directory.
///
/// File layout: `<cache_dir>/<key>.gz`, gzip level 6, lines terminated with
/// `\r\n`. Reads strip trailing CR/LF. A read failure removes the (likely
/// corrupt) entry before surfacing; a write failure removes the partial
/// file before surfacing. With no cache directory configured, the cacher
/// degrades to null semantics.
pub struct DiskCacher {
    cache_dir: Option<PathBuf>,
}

impl DiskCacher {
    /// Create a disk cacher, creating the directory when necessary.
    pub fn new(cache_dir: Option<PathBuf>) -> BenchResult<Self> {
        if let Some(dir) = &cache_dir {
            std::fs::create_dir_all(dir).map_err(|e| {
                BenchError::cache(format!("could not create cache dir {}: {e}", dir.display()))
            })?;
        }
        Ok(DiskCacher { cache_dir })
    }

    /// The directory this cacher writes to, if any.
    pub fn cache_dir(&self) -> Option<&PathBuf> {
        self.cache_dir.as_ref()
    }

    fn path_for(&self, key: &str) -> BenchResult<Option<PathBuf>> {
        let Some(dir) = &self.cache_dir else {
            return Ok(None);
        };
        if !valid_key(key) {
            return Err(BenchError::cache(format!(
                "key '{key}' cannot be made into a cache file name"
            )));
        }
        Ok(Some(dir.join(format!("{key}.gz"))))
    }
}

/// Lazily reads gzip lines; a mid-stream failure removes the entry.
struct GzLineIter {
    reader: BufReader<GzDecoder<std::fs::File>>,
    path: PathBuf,
    done: bool,
}

impl Iterator for GzLineIter {
    type Item = BenchResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut line = Vec::new();
        match self.reader.read_until(b'\n', &mut line) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                while matches!(line.last(), Some(b'\n') | Some(b'\r')) {
                    line.pop();
                }
                Some(Ok(line))
            }
            Err(e) => {
                self.done = true;
                // The entry is presumed corrupt; drop it and surface.
                let _ = std::fs::remove_file(&self.path);
                Some(Err(BenchError::cache(format!(
                    "failed reading cache entry {}: {e}",
                    self.path.display()
                ))))
            }
        }
    }
}

impl Cacher for DiskCacher {
    fn contains(&self, key: &str) -> bool {
        match self.path_for(key) {
            Ok(Some(path)) => path.exists(),
            _ => false,
        }
    }

    fn get(&self, key: &str) -> BenchResult<CacheStream> {
        let Some(path) = self.path_for(key)? else {
            return Err(BenchError::cache(format!("key '{key}' is not in the cache")));
        };
        let file = std::fs::File::open(&path)
            .map_err(|_| BenchError::cache(format!("key '{key}' is not in the cache")))?;
        let reader = BufReader::new(GzDecoder::new(file));
        Ok(CacheStream::from_iter(GzLineIter { reader, path, done: false }))
    }

    fn put(&self, key: &str, value: CacheStream) -> BenchResult<()> {
        let Some(path) = self.path_for(key)? else {
            return Ok(());
        };
        if path.exists() {
            return Ok(());
        }

        let write_all = || -> BenchResult<()> {
            let file = std::fs::File::create(&path).map_err(|e| {
                BenchError::cache(format!("could not create {}: {e}", path.display()))
            })?;
            let mut encoder = GzEncoder::new(file, Compression::new(6));
            for line in value {
                let mut line = line?;
                while matches!(line.last(), Some(b'\n') | Some(b'\r')) {
                    line.pop();
                }
                line.extend_from_slice(b"\r\n");
                encoder.write_all(&line).map_err(|e| {
                    BenchError::cache(format!("failed writing {}: {e}", path.display()))
                })?;
            }
            encoder.finish().map_err(|e| {
                BenchError::cache(format!("failed writing {}: {e}", path.display()))
            })?;
            Ok(())
        };

        match write_all() {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = std::fs::remove_file(&path);
                Err(e)
            }
        }
    }

    fn remove(&self, key: &str) -> BenchResult<()> {
        if let Some(path) = self.path_for(key)? {
            if path.exists() {
                std::fs::remove_file(&path).map_err(|e| {
                    BenchError::cache(format!("could not remove {}: {e}", path.display()))
                })?;
            }
        }
        Ok(())
    }

    fn get_or_put(&self, key: &str, producer: Producer<'_>) -> BenchResult<CacheStream> {
        if self.cache_dir.is_none() {
            return producer();
        }
        if !self.contains(key) {
            self.put(key, producer()?)?;
        }
        self.get(key)
    }
}

// ── ConcurrentCacher ─────────────────────────────────────────────────────────

/// Per-key lock states guarded by one mutex and one condition variable.
///
/// `absent`/`0` = idle, `> 0` = reader count, `-1` = exclusive writer.
struct LockTable {
    states: Mutex<HashMap<String, i64>>,
    cond: Condvar,
}

impl LockTable {
    fn new() -> Self {
        LockTable { states: Mutex::new(HashMap::new()), cond: Condvar::new() }
    }

    fn acquire_read(&self, key: &str) {
        let mut states = self.states.lock().expect("lock table poisoned");
        loop {
            let entry = states.entry(key.to_string()).or_insert(0);
            if *entry >= 0 {
                *entry += 1;
                return;
            }
            // Spurious wakeups are fine; the predicate is re-checked.
            states = self.cond.wait(states).expect("lock table poisoned");
        }
    }

    fn acquire_write(&self, key: &str) {
        let mut states = self.states.lock().expect("lock table poisoned");
        loop {
            let entry = states.entry(key.to_string()).or_insert(0);
            if *entry == 0 {
                *entry = -1;
                return;
            }
            states = self.cond.wait(states).expect("lock table poisoned");
        }
    }

    fn release_read(&self, key: &str) {
        {
            let mut states = self.states.lock().expect("lock table poisoned");
            if let Some(entry) = states.get_mut(key) {
                *entry -= 1;
            }
        }
        self.cond.notify_all();
    }

    fn release_write(&self, key: &str) {
        {
            let mut states = self.states.lock().expect("lock table poisoned");
            states.insert(key.to_string(), 0);
        }
        self.cond.notify_all();
    }

    /// Atomically turn an exclusive write hold into a single read hold, so a
    /// freshly written value can be streamed without racing a removal.
    fn downgrade_write_to_read(&self, key: &str) {
        {
            let mut states = self.states.lock().expect("lock table poisoned");
            states.insert(key.to_string(), 1);
        }
        self.cond.notify_all();
    }

    fn state_of(&self, key: &str) -> Option<i64> {
        self.states.lock().expect("lock table poisoned").get(key).copied()
    }
}

/// Wraps another cacher with a per-key multi-reader/single-writer protocol.
///
/// `get` returns a stream that holds the read lock until the stream is
/// fully drained or dropped. `get_or_put` downgrades its write hold to a
/// read hold after the inner `put`, so the caller can immediately stream
/// the fresh value without a race against a removal.
pub struct ConcurrentCacher {
    inner: Arc<dyn Cacher>,
    locks: Arc<LockTable>,
}

impl ConcurrentCacher {
    pub fn new(inner: Arc<dyn Cacher>) -> Self {
        ConcurrentCacher { inner, locks: Arc::new(LockTable::new()) }
    }

    fn read_release(&self, key: &str) -> Box<dyn FnOnce() + Send> {
        let locks = Arc::clone(&self.locks);
        let key = key.to_string();
        Box::new(move || locks.release_read(&key))
    }

    #[cfg(test)]
    fn lock_state(&self, key: &str) -> Option<i64> {
        self.locks.state_of(key)
    }
}

impl Cacher for ConcurrentCacher {
    fn contains(&self, key: &str) -> bool {
        // Known race: the entry may be removed between this check and a
        // subsequent get. Prefer get_or_put on load paths.
        self.inner.contains(key)
    }

    fn get(&self, key: &str) -> BenchResult<CacheStream> {
        self.locks.acquire_read(key);
        match self.inner.get(key) {
            Ok(stream) => Ok(stream.with_release(self.read_release(key))),
            Err(e) => {
                self.locks.release_read(key);
                Err(e)
            }
        }
    }

    fn put(&self, key: &str, value: CacheStream) -> BenchResult<()> {
        self.locks.acquire_write(key);
        let result = self.inner.put(key, value);
        self.locks.release_write(key);
        result
    }

    fn remove(&self, key: &str) -> BenchResult<()> {
        self.locks.acquire_write(key);
        let result = self.inner.remove(key);
        self.locks.release_write(key);
        result
    }

    fn get_or_put(&self, key: &str, producer: Producer<'_>) -> BenchResult<CacheStream> {
        if self.inner.contains(key) {
            return self.get(key);
        }

        self.locks.acquire_write(key);
        let result = if !self.inner.contains(key) {
            self.inner.get_or_put(key, producer)
        } else {
            self.inner.get(key)
        };
        match result {
            Ok(stream) => {
                self.locks.downgrade_write_to_read(key);
                Ok(stream.with_release(self.read_release(key)))
            }
            Err(e) => {
                self.locks.release_write(key);
                Err(e)
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
