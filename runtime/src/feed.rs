//! Live subscription feed: replay history, then stream new commits.
//!
//! A subscriber first receives every committed event from the beginning of
//! the log in id order, then each newly committed event as it lands. The
//! committed-notification channel is only a wakeup: after every wakeup the
//! feed re-queries the log from the last delivered id, so a lagged receiver
//! skips nothing and delivers no duplicates.

use crate::app::App;
use emporium_core::event::{CommittedEvent, EventId};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{broadcast, watch};

/// A replay-then-live stream of committed events.
///
/// Obtained from [`App::subscribe`]. Ends when shutdown is signalled (or the
/// shutdown handle is dropped); dropping the feed releases its log
/// subscription immediately.
pub struct EventFeed {
    inner: Pin<Box<dyn Stream<Item = CommittedEvent> + Send>>,
}

impl Stream for EventFeed {
    type Item = CommittedEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl App {
    /// Open a subscription feed over the whole log.
    ///
    /// Returns the feed plus a shutdown handle: send `true` (or drop the
    /// handle) to end the stream after any already-queried events are
    /// delivered.
    #[must_use]
    pub fn subscribe(&self) -> (EventFeed, watch::Sender<bool>) {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let app = self.clone();

        let stream = async_stream::stream! {
            // Register for wakeups before the first query so commits landing
            // between replay and the first recv are not missed.
            let mut committed = app.log().subscribe_committed();
            let mut last: Option<EventId> = None;

            loop {
                for event in app.log().query(last, None).await {
                    last = Some(event.id);
                    yield event;
                }

                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        match changed {
                            Ok(()) if !*shutdown_rx.borrow() => {}
                            // Signalled or handle dropped: stop.
                            _ => break,
                        }
                    }
                    notice = committed.recv() => {
                        match notice {
                            // Lagging is fine: the next query catches up.
                            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }

            tracing::debug!(last = last.map(EventId::value), "Subscription feed closed");
        };

        (
            EventFeed {
                inner: Box::pin(stream),
            },
            shutdown_tx,
        )
    }
}
