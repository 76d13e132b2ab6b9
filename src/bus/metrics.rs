use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Счётчики шины. Все операции используют `Relaxed`.
#[derive(Debug, Default)]
pub struct BusMetrics {
    publishes: AtomicU64,
    vetoes: AtomicU64,
    listener_failures: AtomicU64,
    deliveries: AtomicU64,
    channels_created: AtomicU64,
    channels_removed: AtomicU64,
}

/// Копия счётчиков на момент вызова [`BusMetrics::snapshot`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub publishes: u64,
    pub vetoes: u64,
    pub listener_failures: u64,
    pub deliveries: u64,
    pub channels_created: u64,
    pub channels_removed: u64,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl BusMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_publish(&self) {
        self.publishes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_veto(&self) {
        self.vetoes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_listener_failure(&self) {
        self.listener_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Регистрирует доставку одного сообщения `count` сессиям.
    pub fn on_deliveries(
        &self,
        count: usize,
    ) {
        self.deliveries.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn on_channel_created(&self) {
        self.channels_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_channel_removed(&self) {
        self.channels_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            publishes: self.publishes.load(Ordering::Relaxed),
            vetoes: self.vetoes.load(Ordering::Relaxed),
            listener_failures: self.listener_failures.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            channels_created: self.channels_created.load(Ordering::Relaxed),
            channels_removed: self.channels_removed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = BusMetrics::new();
        metrics.on_publish();
        metrics.on_publish();
        metrics.on_veto();
        metrics.on_deliveries(3);
        metrics.on_channel_created();
        metrics.on_channel_removed();
        metrics.on_listener_failure();

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                publishes: 2,
                vetoes: 1,
                listener_failures: 1,
                deliveries: 3,
                channels_created: 1,
                channels_removed: 1,
            }
        );
    }
}
