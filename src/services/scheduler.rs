//! Bounded fan-out of one file's batches.
//!
//! All batch futures are polled from the calling task, so at most `limit` backend
//! calls are in flight and result handling never runs in parallel.

use std::collections::VecDeque;
use std::future::Future;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::debug;

use crate::error::{AbortReason, RunError};
use crate::model::{Batch, StringMap};
use crate::services::context::RunContext;

/// Run `job` for every batch with at most `limit` in flight, handing each success
/// to `on_done` as it resolves.
///
/// After the first fatal error (or once cancellation is observed) no further batch
/// is started; batches already in flight are still awaited and their successes
/// delivered, then the first error is returned.
pub async fn dispatch<J, Fut, D>(
    batches: Vec<Batch>,
    limit: usize,
    ctx: &RunContext,
    mut job: J,
    mut on_done: D,
) -> Result<(), RunError>
where
    J: FnMut(Batch) -> Fut,
    Fut: Future<Output = (Batch, Result<StringMap, RunError>)>,
    D: FnMut(&Batch, StringMap),
{
    let limit = limit.max(1);
    let mut queue: VecDeque<Batch> = batches.into();
    let mut in_flight = FuturesUnordered::new();
    let mut failure: Option<RunError> = None;

    loop {
        while failure.is_none() && in_flight.len() < limit && !queue.is_empty() {
            if ctx.is_cancelled() {
                failure = Some(AbortReason::Cancelled.into());
                break;
            }
            if let Some(batch) = queue.pop_front() {
                debug!("dispatching batch {} ({} queued)", batch.id, queue.len());
                in_flight.push(job(batch));
            }
        }

        match in_flight.next().await {
            Some((batch, Ok(result))) => on_done(&batch, result),
            Some((batch, Err(e))) => {
                debug!("batch {} failed: {e}", batch.id);
                if failure.is_none() {
                    failure = Some(e);
                }
            }
            None => break,
        }
    }

    if !queue.is_empty() {
        debug!("{} batches left unstarted", queue.len());
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
