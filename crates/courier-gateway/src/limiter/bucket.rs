//! Per-key token buckets
//!
//! Used for the identify ratelimit: one bucket per
//! `shard_id % max_concurrency` with capacity 1 and a 5 second refill.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct Bucket {
    capacity: u32,
    tokens: u32,
    refill: Duration,
    last_refill: Instant,
}

impl Bucket {
    fn new(capacity: u32, refill: Duration) -> Self {
        Self {
            capacity,
            tokens: capacity,
            refill,
            last_refill: Instant::now(),
        }
    }

    /// Take a token if available, otherwise report how long until the next
    /// refill
    fn try_take(&mut self) -> Result<(), Duration> {
        if !self.refill.is_zero() {
            let elapsed = self.last_refill.elapsed();
            let refills = (elapsed.as_nanos() / self.refill.as_nanos()) as u32;
            if refills > 0 {
                self.tokens = (self.tokens + refills).min(self.capacity);
                self.last_refill += self.refill * refills;
            }
        }

        if self.tokens > 0 {
            self.tokens -= 1;
            Ok(())
        } else {
            Err(self.refill.saturating_sub(self.last_refill.elapsed()))
        }
    }
}

/// Store of named token buckets
#[derive(Debug, Default)]
pub struct BucketStore {
    buckets: Mutex<HashMap<String, Arc<Mutex<Bucket>>>>,
}

impl BucketStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the keyed bucket has a token, creating the bucket on
    /// first use
    ///
    /// `capacity` and `refill` only apply when the bucket is created;
    /// subsequent calls with the same key reuse the existing bucket.
    pub async fn wait_for_bucket(&self, key: &str, capacity: u32, refill: Duration) {
        let bucket = {
            let mut buckets = self.buckets.lock().await;
            buckets
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Bucket::new(capacity, refill))))
                .clone()
        };

        loop {
            let wait = {
                let mut bucket = bucket.lock().await;
                match bucket.try_take() {
                    Ok(()) => return,
                    Err(wait) => wait,
                }
            };
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }

    /// Number of buckets created so far
    pub async fn len(&self) -> usize {
        self.buckets.lock().await.len()
    }

    /// Check whether any bucket exists
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_take_is_immediate() {
        let store = BucketStore::new();
        let start = Instant::now();
        store
            .wait_for_bucket("id:0", 1, Duration::from_secs(5))
            .await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_take_waits_for_refill() {
        let store = BucketStore::new();
        store
            .wait_for_bucket("id:0", 1, Duration::from_secs(5))
            .await;

        let start = Instant::now();
        store
            .wait_for_bucket("id:0", 1, Duration::from_secs(5))
            .await;
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let store = BucketStore::new();
        store
            .wait_for_bucket("id:0", 1, Duration::from_secs(5))
            .await;

        // A different key does not wait on the first bucket
        let start = Instant::now();
        store
            .wait_for_bucket("id:1", 1, Duration::from_secs(5))
            .await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_accumulate_up_to_capacity() {
        let store = BucketStore::new();
        store
            .wait_for_bucket("k", 2, Duration::from_secs(1))
            .await;
        store
            .wait_for_bucket("k", 2, Duration::from_secs(1))
            .await;

        // After a long idle period only `capacity` tokens are available
        tokio::time::sleep(Duration::from_secs(60)).await;
        let start = Instant::now();
        store.wait_for_bucket("k", 2, Duration::from_secs(1)).await;
        store.wait_for_bucket("k", 2, Duration::from_secs(1)).await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        let start = Instant::now();
        store.wait_for_bucket("k", 2, Duration::from_secs(1)).await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }
}
