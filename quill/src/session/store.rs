//! Session persistence.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use super::handle::{ChangeSet, SessionId};
use crate::error::Result;

/// A stored session: its data and the end of its lifetime window.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub data: HashMap<String, Value>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(expires_at: DateTime<Utc>) -> Self {
        Self {
            data: HashMap::new(),
            expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Backend holding session records.
///
/// `apply` must be atomic with respect to other calls for the same id:
/// two requests persisting different keys of one session both land.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    async fn load(&self, id: &SessionId) -> Result<Option<SessionRecord>>;

    /// Merge `changes` into the record for `id`, creating it if needed, and
    /// move its expiry to `expires_at`.
    async fn apply(
        &self,
        id: &SessionId,
        changes: &ChangeSet,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn delete(&self, id: &SessionId) -> Result<()>;
}

/// Minimum time between two sweeps of lapsed records.
const SWEEP_INTERVAL_SECS: i64 = 60;

/// In-process store. Records vanish with the process.
///
/// Lapsed records whose token never comes back are dropped by a sweep that
/// piggybacks on `apply`, at most once per [`SWEEP_INTERVAL_SECS`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Records>>,
}

#[derive(Debug, Default)]
struct Records {
    by_id: HashMap<SessionId, SessionRecord>,
    next_sweep: Option<DateTime<Utc>>,
}

impl Records {
    fn sweep_expired(&mut self, now: DateTime<Utc>) {
        if self.next_sweep.is_some_and(|at| now < at) {
            return;
        }
        let before = self.by_id.len();
        self.by_id.retain(|_, record| !record.is_expired(now));
        let swept = before - self.by_id.len();
        if swept > 0 {
            debug!(swept, "Dropped expired sessions");
        }
        self.next_sweep = Some(now + Duration::seconds(SWEEP_INTERVAL_SECS));
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, expired ones not yet swept included.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.by_id.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, id: &SessionId) -> Result<Option<SessionRecord>> {
        Ok(self.inner.lock().await.by_id.get(id).cloned())
    }

    async fn apply(
        &self,
        id: &SessionId,
        changes: &ChangeSet,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut records = self.inner.lock().await;
        records.sweep_expired(now);

        let record = records
            .by_id
            .entry(id.clone())
            .or_insert_with(|| SessionRecord::new(expires_at));

        // A lapsed record is not revived with its old data
        if record.is_expired(now) {
            record.data.clear();
        }

        changes.apply_to(&mut record.data);
        record.expires_at = expires_at;
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<()> {
        self.inner.lock().await.by_id.remove(id);
        Ok(())
    }
}
