//! Bounded-parallelism map that keeps results in input order.

use crate::error::{Error, Result};
use futures::stream::{self, StreamExt};
use std::future::Future;

/// Runs `f(item, index)` over `items` with at most `min(limit, items.len())`
/// invocations in flight and returns the results in input order.
///
/// `f` is only called once a slot is free, so an item is never started early.
/// The first error fails the whole batch and drops the invocations still in
/// flight; callers wanting per-item isolation encode failure in `R` instead.
pub async fn run_with_concurrency_limit<T, R, F, Fut>(
    items: Vec<T>,
    limit: usize,
    f: F,
) -> Result<Vec<R>>
where
    F: Fn(T, usize) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    if limit == 0 {
        return Err(Error::invalid("concurrency limit must be positive"));
    }
    let total = items.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();
    let mut in_flight = stream::iter(items.into_iter().enumerate())
        .map(|(index, item)| {
            let fut = f(item, index);
            async move { fut.await.map(|value| (index, value)) }
        })
        .buffer_unordered(limit.min(total));

    while let Some(done) = in_flight.next().await {
        let (index, value) = done?;
        slots[index] = Some(value);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.ok_or_else(|| Error::Job(format!("item {index} produced no result")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_preserves_input_order() {
        let items: Vec<u64> = (0..12).collect();
        // Later items finish first.
        let results = run_with_concurrency_limit(items, 4, |item, index| async move {
            tokio::time::sleep(Duration::from_millis(30 - item * 2)).await;
            Ok((index, item * 10))
        })
        .await
        .unwrap();

        assert_eq!(results.len(), 12);
        for (i, (index, value)) in results.into_iter().enumerate() {
            assert_eq!(index, i);
            assert_eq!(value, i as u64 * 10);
        }
    }

    #[tokio::test]
    async fn test_never_exceeds_limit() {
        for (count, limit) in [(10usize, 3usize), (2, 5), (7, 1), (9, 9)] {
            let active = Arc::new(AtomicUsize::new(0));
            let peak = Arc::new(AtomicUsize::new(0));
            let calls = Arc::new(AtomicUsize::new(0));

            let items: Vec<usize> = (0..count).collect();
            let results = run_with_concurrency_limit(items, limit, |item, _| {
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(((item * 7) % 5) as u64 + 1)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(item)
                }
            })
            .await
            .unwrap();

            assert_eq!(results, (0..count).collect::<Vec<_>>());
            assert_eq!(calls.load(Ordering::SeqCst), count);
            assert!(peak.load(Ordering::SeqCst) <= limit.min(count));
        }
    }

    #[tokio::test]
    async fn test_empty_input() {
        let results: Vec<u8> =
            run_with_concurrency_limit(Vec::<u8>::new(), 3, |item, _| async move { Ok(item) })
                .await
                .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_zero_limit_rejected() {
        let err = run_with_concurrency_limit(vec![1], 0, |item, _| async move { Ok(item) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_error_fails_batch() {
        let err = run_with_concurrency_limit(vec![1, 2, 3, 4], 2, |item, _| async move {
            if item == 3 {
                Err(Error::Job("boom".to_string()))
            } else {
                Ok(item)
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Job(msg) if msg == "boom"));
    }
}
