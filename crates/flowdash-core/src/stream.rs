// ── Reactive snapshot stream ──
//
// Subscription handle over the store's snapshot channel, for consumers
// that redraw on every change (CLI `watch`, dashboards).

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::EnergySnapshot;

type Published = Option<Arc<EnergySnapshot>>;

/// A subscription to the live energy snapshot.
///
/// Gives point-in-time access plus change notification, either through
/// [`changed()`](Self::changed) or by converting into a `Stream`.
pub struct SnapshotStream {
    current: Published,
    receiver: watch::Receiver<Published>,
}

impl SnapshotStream {
    pub(crate) fn new(receiver: watch::Receiver<Published>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation time (or at the last `changed()`).
    pub fn current(&self) -> Option<&Arc<EnergySnapshot>> {
        self.current.as_ref()
    }

    /// The latest published snapshot.
    pub fn latest(&self) -> Published {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. `None` once the client is gone.
    pub async fn changed(&mut self) -> Option<Published> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current.clone_from(&snap);
        Some(snap)
    }

    pub fn into_stream(self) -> SnapshotWatchStream {
        SnapshotWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding every snapshot the store publishes,
/// starting with the current one.
pub struct SnapshotWatchStream {
    inner: WatchStream<Published>,
}

impl Stream for SnapshotWatchStream {
    type Item = Published;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use futures_util::StreamExt;

    use super::*;
    use crate::model::GridStatus;

    fn snapshot(load: f64) -> EnergySnapshot {
        EnergySnapshot {
            battery_power: 0.0,
            battery_count: None,
            battery_percentage: None,
            load_power: load,
            solar_power: 0.0,
            solar_energy_exported: None,
            site_power: 0.0,
            grid_status: Some(GridStatus::Connected),
            wall_connectors: Vec::new(),
            taken_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn changed_tracks_latest_value() {
        let (tx, rx) = watch::channel(None);
        let mut stream = SnapshotStream::new(rx);
        assert!(stream.current().is_none());

        tx.send_replace(Some(Arc::new(snapshot(500.0))));
        let next = stream.changed().await.flatten().expect("snapshot");
        assert!((next.load_power - 500.0).abs() < f64::EPSILON);
        assert!(stream.current().is_some());
    }

    #[tokio::test]
    async fn stream_yields_current_then_updates() {
        let (tx, rx) = watch::channel(Some(Arc::new(snapshot(1.0))));
        let mut stream = SnapshotStream::new(rx).into_stream();

        let first = stream.next().await.flatten().expect("initial");
        assert!((first.load_power - 1.0).abs() < f64::EPSILON);

        tx.send_replace(Some(Arc::new(snapshot(2.0))));
        let second = stream.next().await.flatten().expect("update");
        assert!((second.load_power - 2.0).abs() < f64::EPSILON);
    }
}
