//! # Delivery Idempotency Cache
//!
//! Short-TTL marker keyed by `message_id`, consulted before every outbound
//! send. A present marker means the message already reached the channel; the
//! caller reports the cached external id with `skipped = true` instead of
//! sending again.
//!
//! The cache is advisory. Losing it (process restart, eviction) degrades to
//! "attempt send", never to blocking a delivery.

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Writes between full expired-marker sweeps.
const PURGE_INTERVAL: usize = 1024;

#[derive(Debug, Clone)]
struct SentMarker {
    external_id: Option<String>,
    recorded_at: Instant,
}

pub struct SentMarkerCache {
    markers: DashMap<Uuid, SentMarker>,
    ttl: Duration,
    writes_since_purge: AtomicUsize,
}

impl SentMarkerCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            markers: DashMap::new(),
            ttl,
            writes_since_purge: AtomicUsize::new(0),
        }
    }

    /// The cached external id for an already-sent message, if the marker is
    /// still live. Expired markers are evicted on the way out.
    pub fn lookup(&self, message_id: Uuid) -> Option<Option<String>> {
        let expired = match self.markers.get(&message_id) {
            Some(marker) if marker.recorded_at.elapsed() < self.ttl => {
                return Some(marker.external_id.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.markers.remove(&message_id);
        }
        None
    }

    /// Record a successful send. Written only after the channel confirmed.
    ///
    /// Every `PURGE_INTERVAL` writes the whole map is swept for expired
    /// markers, so entries for message ids that are never looked up again
    /// still get reclaimed.
    pub fn record(&self, message_id: Uuid, external_id: Option<String>) {
        self.markers.insert(
            message_id,
            SentMarker {
                external_id,
                recorded_at: Instant::now(),
            },
        );

        let writes = self.writes_since_purge.fetch_add(1, Ordering::Relaxed) + 1;
        if writes >= PURGE_INTERVAL {
            self.writes_since_purge.store(0, Ordering::Relaxed);
            self.purge_expired();
        }
    }

    /// Drop every marker past its TTL.
    fn purge_expired(&self) {
        self.markers
            .retain(|_, marker| marker.recorded_at.elapsed() < self.ttl);
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}
