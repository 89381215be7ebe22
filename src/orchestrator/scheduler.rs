//! Fixed-interval poll loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};

use super::context::BridgeContext;
use super::correlator::EventCorrelator;

/// Spawn the poll loop.
///
/// The first tick runs immediately. Ticks never overlap: a slow tick
/// delays the next one instead of queueing a burst.
#[must_use]
pub fn spawn_poll_task(
    ctx: Arc<BridgeContext>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let correlator = EventCorrelator;
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tick_no: u64 = 0;
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("poll task shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    tick_no += 1;
                    let report = correlator
                        .tick(&ctx, Utc::now(), &cancel)
                        .instrument(info_span!("tick", tick = tick_no))
                        .await;
                    debug!(?report, "tick finished");
                }
            }
        }
    })
}
