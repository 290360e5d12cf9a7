//! Probe-then-fan-out execution of slice and chunk jobs.

use crate::error::{Error, Result};
use crate::executor::run_with_concurrency_limit;
use crate::models::JobOutcome;
use std::future::Future;
use tracing::{info, warn};

/// Runs `items[0]` on its own, then the rest with at most `limit` in flight.
///
/// The first job is a probe: if it returns `JobOutcome::Abort`, no other job
/// is started and only its outcome is returned. Outcomes are in input order.
/// A zero `limit` is rejected before any job runs.
pub async fn run_sliced_jobs<T, R, F, Fut>(
    items: Vec<T>,
    limit: usize,
    run: F,
) -> Result<Vec<JobOutcome<R>>>
where
    F: Fn(T, usize) -> Fut,
    Fut: Future<Output = Result<JobOutcome<R>>>,
{
    if limit == 0 {
        return Err(Error::invalid("concurrency limit must be at least 1"));
    }
    let mut items = items.into_iter();
    let Some(first) = items.next() else {
        return Ok(Vec::new());
    };
    let rest: Vec<T> = items.collect();

    let probe = run(first, 0).await?;
    if probe.is_abort() {
        warn!("first job requested abort, skipping {} remaining jobs", rest.len());
        return Ok(vec![probe]);
    }

    let mut outcomes = Vec::with_capacity(rest.len() + 1);
    outcomes.push(probe);
    if rest.is_empty() {
        return Ok(outcomes);
    }

    info!("running {} jobs, {} at a time", rest.len(), limit);
    let run = &run;
    let tail = run_with_concurrency_limit(rest, limit, |item, index| run(item, index + 1)).await?;
    outcomes.extend(tail);
    Ok(outcomes)
}
