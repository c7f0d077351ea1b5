// ── Registration streams ──
//
// Reactive view of the monitored-parameter list, so a host can create or
// drop display variables whenever a session registers parameters.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::store::MonitoredParameter;

type Snapshot = Arc<Vec<Arc<MonitoredParameter>>>;

/// A subscription to the registry's entry list.
///
/// Provides both point-in-time snapshot access and change notification
/// via [`changed`](Self::changed) or by converting to a `Stream`.
pub struct ParameterStream {
    current: Snapshot,
    receiver: watch::Receiver<Snapshot>,
}

impl ParameterStream {
    pub(crate) fn new(receiver: watch::Receiver<Snapshot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Get the snapshot captured at creation time.
    pub fn current(&self) -> &Snapshot {
        &self.current
    }

    /// Get the latest snapshot (may have changed since creation).
    pub fn latest(&self) -> Snapshot {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` if the registry has been dropped.
    pub async fn changed(&mut self) -> Option<Snapshot> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> ParameterWatchStream {
        ParameterWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding a new snapshot each time the registry changes.
pub struct ParameterWatchStream {
    inner: WatchStream<Snapshot>,
}

impl Stream for ParameterWatchStream {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::ParameterRegistry;

    #[tokio::test]
    async fn changed_yields_new_registrations() {
        let registry = ParameterRegistry::new();
        let mut stream = ParameterStream::new(registry.subscribe());
        assert!(stream.current().is_empty());

        registry.register("1.1".parse().unwrap(), "Audio.Gain");

        let snap = stream.changed().await.unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(stream.current()[0].label, "Audio.Gain");
    }

    #[tokio::test]
    async fn stream_yields_current_then_changes() {
        use tokio_stream::StreamExt;

        let registry = ParameterRegistry::new();
        let mut stream = ParameterStream::new(registry.subscribe()).into_stream();
        assert!(stream.next().await.unwrap().is_empty());

        registry.register("2.1".parse().unwrap(), "Video.Source");
        let snap = stream.next().await.unwrap();
        assert_eq!(snap[0].label, "Video.Source");
    }
}
