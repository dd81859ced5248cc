// SPDX-License-Identifier: GPL-3.0-only

//! Size-bucketed reusable buffer pool
//!
//! Buffers are handed out by value. A caller that wants the allocation reused
//! gives it back with [`BufferPool::recycle`]; anything else is simply dropped.

use crate::config::BufferPoolConfig;
use crate::constants::format_bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

/// Size class of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferBucket {
    Small,
    Medium,
    Large,
}

impl BufferBucket {
    fn index(self) -> usize {
        match self {
            BufferBucket::Small => 0,
            BufferBucket::Medium => 1,
            BufferBucket::Large => 2,
        }
    }
}

/// Counters describing pool effectiveness
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// `get` calls served from a bucket
    pub hits: u64,
    /// `get` calls that allocated fresh
    pub misses: u64,
    /// Buffers accepted by `recycle`
    pub recycled: u64,
    /// Buffers dropped by `recycle` because the bucket was full
    pub discarded: u64,
    /// Buffers dropped by `clear`
    pub evicted: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    recycled: AtomicU64,
    discarded: AtomicU64,
    evicted: AtomicU64,
}

/// Reusable buffer cache split into small, medium and large buckets
///
/// Each bucket has its own lock, so traffic on one size class never waits
/// on another.
pub struct BufferPool {
    config: BufferPoolConfig,
    buckets: [Mutex<Vec<Vec<u8>>>; 3],
    counters: Counters,
}

impl BufferPool {
    pub fn new(config: BufferPoolConfig) -> Self {
        debug!(
            small_max = %format_bytes(config.small_max_bytes),
            medium_max = %format_bytes(config.medium_max_bytes),
            max_pool_size = config.max_pool_size,
            "Creating buffer pool"
        );

        Self {
            config,
            buckets: Default::default(),
            counters: Counters::default(),
        }
    }

    /// Bucket responsible for a given size
    pub fn bucket_for(&self, size: usize) -> BufferBucket {
        if size <= self.config.small_max_bytes {
            BufferBucket::Small
        } else if size <= self.config.medium_max_bytes {
            BufferBucket::Medium
        } else {
            BufferBucket::Large
        }
    }

    /// Take an empty buffer with capacity of at least `size` bytes
    ///
    /// Reuses the first pooled buffer in the matching bucket that is large
    /// enough, otherwise allocates a new one.
    pub fn get(&self, size: usize) -> Vec<u8> {
        let bucket = self.bucket_for(size);
        let reused = {
            let mut entries = self.lock(bucket);
            entries
                .iter()
                .position(|buf| buf.capacity() >= size)
                .map(|index| entries.remove(index))
        };

        match reused {
            Some(mut buffer) => {
                buffer.clear();
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                trace!(size, ?bucket, capacity = buffer.capacity(), "Reusing pooled buffer");
                buffer
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                trace!(size, ?bucket, "Allocating fresh buffer");
                Vec::with_capacity(size)
            }
        }
    }

    /// Return a buffer to the pool
    ///
    /// The buffer lands in the bucket matching its capacity. If that bucket is
    /// already full the buffer is dropped.
    pub fn recycle(&self, buffer: Vec<u8>) {
        if buffer.capacity() == 0 {
            return;
        }

        let bucket = self.bucket_for(buffer.capacity());
        let mut entries = self.lock(bucket);
        if entries.len() >= self.config.max_pool_size {
            drop(entries);
            self.counters.discarded.fetch_add(1, Ordering::Relaxed);
            trace!(?bucket, capacity = buffer.capacity(), "Bucket full, discarding buffer");
            return;
        }
        entries.push(buffer);
        self.counters.recycled.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop every pooled buffer
    pub fn clear(&self) {
        let mut evicted = 0;
        for bucket in &self.buckets {
            let mut entries = bucket.lock().unwrap_or_else(PoisonError::into_inner);
            evicted += entries.len();
            entries.clear();
            entries.shrink_to_fit();
        }
        self.counters
            .evicted
            .fetch_add(evicted as u64, Ordering::Relaxed);
        if evicted > 0 {
            debug!(evicted, "Buffer pool cleared");
        }
    }

    /// Number of pooled buffers in a bucket
    pub fn len(&self, bucket: BufferBucket) -> usize {
        self.lock(bucket).len()
    }

    /// Total pooled buffers across all buckets
    pub fn total_len(&self) -> usize {
        [BufferBucket::Small, BufferBucket::Medium, BufferBucket::Large]
            .into_iter()
            .map(|bucket| self.len(bucket))
            .sum()
    }

    /// Total pooled bytes across all buckets
    pub fn pooled_bytes(&self) -> usize {
        self.buckets
            .iter()
            .map(|bucket| {
                bucket
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .iter()
                    .map(Vec::capacity)
                    .sum::<usize>()
            })
            .sum()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            recycled: self.counters.recycled.load(Ordering::Relaxed),
            discarded: self.counters.discarded.load(Ordering::Relaxed),
            evicted: self.counters.evicted.load(Ordering::Relaxed),
        }
    }

    fn lock(&self, bucket: BufferBucket) -> MutexGuard<'_, Vec<Vec<u8>>> {
        self.buckets[bucket.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(BufferPoolConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_bucket_boundaries() {
        let pool = BufferPool::default();
        assert_eq!(pool.bucket_for(0), BufferBucket::Small);
        assert_eq!(pool.bucket_for(16 * 1024), BufferBucket::Small);
        assert_eq!(pool.bucket_for(16 * 1024 + 1), BufferBucket::Medium);
        assert_eq!(pool.bucket_for(1024 * 1024), BufferBucket::Medium);
        assert_eq!(pool.bucket_for(1024 * 1024 + 1), BufferBucket::Large);
    }

    #[test]
    fn test_get_recycle_get_reuses_allocation() {
        let pool = BufferPool::default();

        let mut buffer = pool.get(4096);
        buffer.extend_from_slice(&[7u8; 100]);
        let ptr = buffer.as_ptr();
        pool.recycle(buffer);

        let reused = pool.get(4096);
        assert!(reused.capacity() >= 4096);
        assert!(reused.is_empty(), "Reused buffer should be cleared");
        assert_eq!(reused.as_ptr(), ptr);

        let stats = pool.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_get_skips_too_small_entries() {
        let pool = BufferPool::default();
        pool.recycle(Vec::with_capacity(1024));

        let buffer = pool.get(8 * 1024);
        assert!(buffer.capacity() >= 8 * 1024);
        assert_eq!(pool.stats().misses, 1);
        assert_eq!(pool.len(BufferBucket::Small), 1);
    }

    #[test]
    fn test_recycle_respects_max_pool_size() {
        let pool = BufferPool::default();
        for _ in 0..8 {
            pool.recycle(Vec::with_capacity(2048));
        }

        assert_eq!(pool.len(BufferBucket::Small), 5);
        assert_eq!(pool.stats().discarded, 3);
    }

    #[test]
    fn test_clear_evicts_all_buckets() {
        let pool = BufferPool::default();
        pool.recycle(Vec::with_capacity(1024));
        pool.recycle(Vec::with_capacity(64 * 1024));
        pool.recycle(Vec::with_capacity(2 * 1024 * 1024));
        assert_eq!(pool.total_len(), 3);

        pool.clear();

        assert_eq!(pool.total_len(), 0);
        assert_eq!(pool.pooled_bytes(), 0);
        assert_eq!(pool.stats().evicted, 3);
    }

    #[test]
    fn test_concurrent_buckets() {
        let pool = Arc::new(BufferPool::default());
        let handles: Vec<_> = [512usize, 128 * 1024, 4 * 1024 * 1024]
            .into_iter()
            .map(|size| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let buffer = pool.get(size);
                        assert!(buffer.capacity() >= size);
                        pool.recycle(buffer);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(pool.len(BufferBucket::Small), 1);
        assert_eq!(pool.len(BufferBucket::Medium), 1);
        assert_eq!(pool.len(BufferBucket::Large), 1);
    }
}
