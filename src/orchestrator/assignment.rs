//! Least-loaded operator assignment.

use std::collections::HashMap;

use tracing::{debug, info};

use super::context::BridgeContext;
use crate::models::task::TaskId;
use crate::{AppError, Result};

/// Pick the operator with the fewest open tasks.
///
/// Ties go to the operator listed first; operators missing from `counts`
/// count as zero.
#[must_use]
pub fn pick_operator<'a>(
    operators: &'a [String],
    counts: &HashMap<String, usize>,
) -> Option<&'a str> {
    let mut best: Option<(&str, usize)> = None;
    for operator in operators {
        let count = counts.get(operator).copied().unwrap_or_default();
        debug!(operator, count, "operator load");
        match best {
            Some((_, min)) if count >= min => {}
            _ => best = Some((operator.as_str(), count)),
        }
    }
    best.map(|(operator, _)| operator)
}

/// Assign `task_id` to the least-loaded configured operator and move it to
/// the "assigned" stage when one is configured.
///
/// Returns the chosen login, or `None` when no operators are configured.
///
/// # Errors
///
/// Propagates tracker failures from counting, assigning or staging.
pub async fn auto_assign(ctx: &BridgeContext, task_id: TaskId) -> Result<Option<String>> {
    let operators = &ctx.config.app.operators;
    if operators.is_empty() {
        return Ok(None);
    }

    let counts = ctx.tracker().count_open_tasks_by_assignee(operators).await?;
    let operator = pick_operator(operators, &counts)
        .ok_or_else(|| AppError::NotFound("no available operators".into()))?
        .to_owned();

    ctx.tracker().assign(task_id, &operator).await?;
    let assigned_stage = ctx.config.tracker.stages.assigned;
    if assigned_stage != 0 {
        ctx.tracker().set_stage(task_id, assigned_stage).await?;
    }
    info!(task_id, operator, "task auto-assigned");
    Ok(Some(operator))
}
