//! One poll cycle across mailbox, tracker and chat.

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info_span, Instrument};

use super::context::BridgeContext;
use super::{inbound, lifecycle, outbound};

/// Runs the five passes of a tick in order.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventCorrelator;

/// What a tick got through.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Inbound pass completed without a fetch failure.
    pub inbound_ok: bool,
    /// Outbound comment pass completed.
    pub outbound_ok: bool,
    /// Changed tasks were fetched and the lifecycle and SLA passes ran.
    pub lifecycle_ok: bool,
    /// The tick stopped early on cancellation.
    pub cancelled: bool,
}

impl EventCorrelator {
    /// Run one tick observed at `now`.
    ///
    /// Pass failures are logged and recorded in the report; a failed
    /// changed-task fetch skips the completion, reopen and SLA passes.
    pub async fn tick(
        &self,
        ctx: &BridgeContext,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> TickReport {
        let mut report = TickReport::default();

        report.inbound_ok = match inbound::run(ctx, now, cancel)
            .instrument(info_span!("inbound_pass"))
            .await
        {
            Ok(()) => true,
            Err(err) => {
                error!(%err, "inbound pass failed");
                false
            }
        };
        if cancel.is_cancelled() {
            report.cancelled = true;
            return report;
        }

        report.outbound_ok = match outbound::run(ctx, now, cancel)
            .instrument(info_span!("outbound_pass"))
            .await
        {
            Ok(()) => true,
            Err(err) => {
                error!(%err, "outbound pass failed");
                false
            }
        };
        if cancel.is_cancelled() {
            report.cancelled = true;
            return report;
        }

        let since = now - ctx.config.changed_window();
        let tasks = match ctx.tracker().list_changed_since(since).await {
            Ok(tasks) => tasks,
            Err(err) => {
                error!(%err, "failed to list changed tasks, skipping lifecycle passes");
                return report;
            }
        };
        debug!(count = tasks.len(), %since, "changed tasks in window");

        lifecycle::run_completed(ctx, &tasks, cancel)
            .instrument(info_span!("completion_pass"))
            .await;
        if cancel.is_cancelled() {
            report.cancelled = true;
            return report;
        }

        lifecycle::run_reopened(ctx, &tasks, cancel)
            .instrument(info_span!("reopen_pass"))
            .await;
        if cancel.is_cancelled() {
            report.cancelled = true;
            return report;
        }

        ctx.sla_monitor()
            .run(&tasks, now, cancel)
            .instrument(info_span!("sla_pass"))
            .await;

        report.lifecycle_ok = true;
        report.cancelled = cancel.is_cancelled();
        report
    }
}
