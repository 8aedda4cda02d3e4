use crate::connection::{ConnectionSlot, Link};
use crate::error::LinkError;
use crate::input_state::InputStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

#[derive(Debug)]
pub enum TickOutcome {
    Sent,
    /// No link was available; the frame was dropped.
    Skipped,
    Failed(LinkError),
}

/// Sends a snapshot of the input state once per period over whatever link
/// the connection slot currently holds.
pub struct SenderLoop<L> {
    store: InputStore,
    slot: Arc<ConnectionSlot<L>>,
    period: Duration,
    send_timeout: Duration,
}

impl<L: Link> SenderLoop<L> {
    pub fn new(
        store: InputStore,
        slot: Arc<ConnectionSlot<L>>,
        period: Duration,
        send_timeout: Duration,
    ) -> Self {
        Self {
            store,
            slot,
            period,
            send_timeout,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut deadline = Instant::now();
        loop {
            select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep_until(deadline) => {}
            }

            match self.tick().await {
                TickOutcome::Sent | TickOutcome::Skipped => {}
                TickOutcome::Failed(e) => debug!("{e}, dropping connection"),
            }

            deadline = next_deadline(deadline, self.period, Instant::now());
        }
        debug!("Sender exiting");
    }

    /// Send one frame. A failed send discards the link so the connection
    /// manager replaces it; the frame itself is not retried.
    pub async fn tick(&self) -> TickOutcome {
        let Some(link) = self.slot.current() else {
            trace!("No connection, skipping frame");
            return TickOutcome::Skipped;
        };

        let frame = self.store.snapshot().encode();
        let error = match tokio::time::timeout(self.send_timeout, link.send(&frame)).await {
            Ok(Ok(())) => return TickOutcome::Sent,
            Ok(Err(e)) => LinkError::Send(e),
            Err(_) => LinkError::SendTimeout,
        };

        self.slot.discard(&link);
        TickOutcome::Failed(error)
    }
}

/// The next send time: one period after the previous one, or right away if
/// the loop has fallen behind. Missed ticks are not made up.
fn next_deadline(previous: Instant, period: Duration, now: Instant) -> Instant {
    (previous + period).max(now)
}
