//! # Progress Persistence
//!
//! Checkpoints listening position per (user, book) and restores it when a
//! player opens.
//!
//! Repositories without a native upsert implement it as check-then-act, which
//! can insert twice when two checkpoints for the same pair race (a periodic
//! checkpoint landing together with a seek). [`ProgressStore`] funnels every
//! write for a pair through a per-pair async lock so at most one write is in
//! flight for it at any time.

use bridge_traits::Clock;
use core_library::repositories::ProgressRepository;
use core_library::ListeningProgress;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

type PairKey = (String, String);

/// Serialized access to a [`ProgressRepository`].
pub struct ProgressStore {
    repo: Arc<dyn ProgressRepository>,
    clock: Arc<dyn Clock>,
    writers: Mutex<HashMap<PairKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl ProgressStore {
    pub fn new(repo: Arc<dyn ProgressRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            clock,
            writers: Mutex::new(HashMap::new()),
        }
    }

    /// Look up the saved position. A missing row is `Ok(None)`.
    #[instrument(skip(self), level = "debug")]
    pub async fn load(
        &self,
        user_id: &str,
        book_id: &str,
    ) -> core_library::Result<Option<ListeningProgress>> {
        self.repo.find(user_id, book_id).await
    }

    /// Write a checkpoint, replacing any earlier one for the pair.
    ///
    /// Negative positions are clamped to zero and a non-positive or
    /// non-finite duration is stored as unknown.
    #[instrument(skip(self), level = "debug")]
    pub async fn save(
        &self,
        user_id: &str,
        book_id: &str,
        position: f64,
        duration: Option<f64>,
    ) -> core_library::Result<ListeningProgress> {
        let progress = ListeningProgress::new(
            user_id,
            book_id,
            position.max(0.0),
            duration.filter(|d| d.is_finite() && *d > 0.0),
            self.clock.now(),
        );

        let key = (user_id.to_string(), book_id.to_string());
        let writer = self.writer_for(&key);
        let result = {
            let _guard = writer.lock().await;
            self.repo.upsert(&progress).await
        };
        drop(writer);
        self.release_writer(&key);

        result?;
        debug!(position = progress.current_position, "Checkpoint written");
        Ok(progress)
    }

    fn writer_for(&self, key: &PairKey) -> Arc<tokio::sync::Mutex<()>> {
        self.writers
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drop the pair's lock once no writer holds a handle to it.
    fn release_writer(&self, key: &PairKey) {
        let mut writers = self.writers.lock();
        if writers
            .get(key)
            .is_some_and(|writer| Arc::strong_count(writer) == 1)
        {
            writers.remove(key);
        }
    }

    #[cfg(test)]
    fn tracked_pairs(&self) -> usize {
        self.writers.lock().len()
    }
}

/// Decides when periodic checkpoints fall due.
///
/// Media time is divided into buckets of `interval` seconds; a checkpoint is
/// due whenever playback enters a bucket other than the one last recorded.
/// Sparse or irregular time updates therefore never skip a boundary.
#[derive(Debug, Clone)]
pub struct CheckpointTracker {
    interval: f64,
    last_bucket: u64,
}

impl CheckpointTracker {
    pub fn new(interval_secs: u64) -> Self {
        Self {
            interval: interval_secs.max(1) as f64,
            last_bucket: 0,
        }
    }

    fn bucket(&self, position: f64) -> u64 {
        if position.is_finite() && position > 0.0 {
            (position / self.interval).floor() as u64
        } else {
            0
        }
    }

    /// Record `position` and return `true` if a checkpoint is now due.
    pub fn observe(&mut self, position: f64) -> bool {
        let bucket = self.bucket(position);
        if bucket == self.last_bucket {
            return false;
        }
        self.last_bucket = bucket;
        true
    }

    /// Re-anchor after a seek or restore without signalling a checkpoint.
    pub fn reset(&mut self, position: f64) {
        self.last_bucket = self.bucket(position);
    }
}
