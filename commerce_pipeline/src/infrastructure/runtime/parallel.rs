// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bounded Ordered Parallel Map
//!
//! The one concurrency primitive every stage doing per-item work goes
//! through: frame extraction, centering, background removal, commercial
//! synthesis, upload. Unifying the primitive means back-pressure and error
//! behavior is reasoned about once.
//!
//! ## Contract
//!
//! - At most `concurrency` invocations in flight (`concurrency ≥ 1`).
//! - Results preserve input order; each slot holds the item's result or its
//!   captured error.
//! - **Per-item isolation**: one item's failure never cancels siblings; the
//!   error is logged at debug level with the item index and execution
//!   proceeds.
//! - **No partial return**: the call returns only after every item completed
//!   or failed. On cooperative cancellation, in-flight items finish
//!   naturally (they carry their own provider-level timeouts); still-pending
//!   slots come back as cancellation errors.
//! - O(N) scheduling; no intermediate collection grows beyond N.
//!
//! ## Implementation
//!
//! A pool of `min(concurrency, N)` workers pulls `(index, item)` pairs from
//! a shared iterator, which gives bounded concurrency, start order equal to
//! input order, and, with `concurrency = 1`, fully sequential execution.

use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;

use commerce_pipeline_domain::{CancellationToken, PipelineError};

/// Aggregate result of a [`parallel_map`] call.
#[derive(Debug)]
pub struct ParallelOutcome<T> {
    /// Per-item results, index-aligned with the input.
    pub results: Vec<Result<T, PipelineError>>,
    pub success_count: usize,
    pub error_count: usize,
}

impl<T> ParallelOutcome<T> {
    /// Consumes the outcome, yielding the successful values in input order.
    pub fn into_successes(self) -> Vec<T> {
        self.results.into_iter().filter_map(Result::ok).collect()
    }

    /// The first captured error, if any.
    pub fn first_error(&self) -> Option<&PipelineError> {
        self.results.iter().find_map(|r| r.as_ref().err())
    }
}

/// Maps `f` over `items` with bounded concurrency and per-item error
/// isolation. See the module docs for the full contract.
pub async fn parallel_map<I, T, F, Fut>(
    items: Vec<I>,
    concurrency: usize,
    cancel: &CancellationToken,
    f: F,
) -> ParallelOutcome<T>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(usize, I) -> Fut + Clone + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<T, PipelineError>> + Send + 'static,
{
    let total = items.len();
    if total == 0 {
        return ParallelOutcome {
            results: Vec::new(),
            success_count: 0,
            error_count: 0,
        };
    }

    let workers = concurrency.max(1).min(total);
    let feed = Arc::new(Mutex::new(items.into_iter().enumerate()));
    let slots: Arc<Mutex<Vec<Option<Result<T, PipelineError>>>>> =
        Arc::new(Mutex::new((0..total).map(|_| None).collect()));

    let mut pool: JoinSet<()> = JoinSet::new();
    for _ in 0..workers {
        let feed = Arc::clone(&feed);
        let slots = Arc::clone(&slots);
        let cancel = cancel.clone();
        let f = f.clone();
        pool.spawn(async move {
            loop {
                let next = {
                    let mut guard = feed.lock().unwrap_or_else(|e| e.into_inner());
                    guard.next()
                };
                let Some((index, item)) = next else {
                    break;
                };

                // In-flight work runs to completion; items not yet started
                // when cancellation fires become cancellation errors.
                let outcome = if cancel.is_cancelled() {
                    Err(PipelineError::cancelled(format!(
                        "parallel item {} was pending at cancellation",
                        index
                    )))
                } else {
                    f(index, item).await
                };

                if let Err(error) = &outcome {
                    tracing::debug!(index, error = %error, "parallel item failed");
                }
                let mut guard = slots.lock().unwrap_or_else(|e| e.into_inner());
                guard[index] = Some(outcome);
            }
        });
    }

    while let Some(joined) = pool.join_next().await {
        if let Err(join_error) = joined {
            // A panicked worker loses the item it was driving; the slot is
            // backfilled below. Remaining items are picked up by the
            // surviving workers.
            tracing::error!(error = %join_error, "parallel worker terminated abnormally");
        }
    }

    let mut slots = Arc::try_unwrap(slots)
        .map(|m| m.into_inner().unwrap_or_else(|e| e.into_inner()))
        .unwrap_or_default();
    // Every worker has joined; slots only lack entries if one panicked.
    slots.resize_with(total, || None);
    let results: Vec<Result<T, PipelineError>> = slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| {
                Err(PipelineError::internal(
                    "parallel worker terminated before completing its item",
                ))
            })
        })
        .collect();

    let success_count = results.iter().filter(|r| r.is_ok()).count();
    let error_count = total - success_count;
    ParallelOutcome {
        results,
        success_count,
        error_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_empty_input_returns_immediately() {
        let outcome = parallel_map(
            Vec::<u32>::new(),
            4,
            &CancellationToken::new(),
            |_, item| async move { Ok::<_, PipelineError>(item) },
        )
        .await;
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.success_count, 0);
        assert_eq!(outcome.error_count, 0);
    }

    #[tokio::test]
    async fn test_order_preserved_despite_uneven_latency() {
        let items: Vec<u64> = (0..16).collect();
        let outcome = parallel_map(items, 4, &CancellationToken::new(), |index, item| async move {
            // Later items finish first.
            tokio::time::sleep(Duration::from_millis(20 - index as u64)).await;
            Ok::<_, PipelineError>(item * 10)
        })
        .await;

        assert_eq!(outcome.success_count, 16);
        for (index, result) in outcome.results.iter().enumerate() {
            assert_eq!(*result.as_ref().unwrap(), (index as u64) * 10);
        }
    }

    #[tokio::test]
    async fn test_per_item_failure_does_not_cancel_siblings() {
        let outcome = parallel_map(
            vec!["a", "b", "c", "d"],
            2,
            &CancellationToken::new(),
            |index, item| async move {
                if index == 1 {
                    Err(PipelineError::processing_failed(format!("{} exploded", item)))
                } else {
                    Ok(item.to_uppercase())
                }
            },
        )
        .await;

        assert_eq!(outcome.results.len(), 4);
        assert_eq!(outcome.success_count, 3);
        assert_eq!(outcome.error_count, 1);
        assert_eq!(outcome.results[0].as_ref().unwrap(), "A");
        assert!(outcome.results[1].is_err());
        assert_eq!(outcome.results[2].as_ref().unwrap(), "C");
        assert_eq!(outcome.results[3].as_ref().unwrap(), "D");
    }

    #[tokio::test]
    async fn test_concurrency_one_is_sequential() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&order);
        let outcome = parallel_map(
            (0..8).collect::<Vec<usize>>(),
            1,
            &CancellationToken::new(),
            move |index, _| {
                let recorder = Arc::clone(&recorder);
                async move {
                    recorder.lock().unwrap().push(index);
                    Ok::<_, PipelineError>(index)
                }
            },
        )
        .await;

        assert_eq!(outcome.success_count, 8);
        assert_eq!(*order.lock().unwrap(), (0..8).collect::<Vec<usize>>());
    }

    #[tokio::test]
    async fn test_concurrency_bound_respected() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let in_flight_probe = Arc::clone(&in_flight);
        let peak_probe = Arc::clone(&peak);

        parallel_map(
            (0..20).collect::<Vec<usize>>(),
            3,
            &CancellationToken::new(),
            move |_, _| {
                let in_flight = Arc::clone(&in_flight_probe);
                let peak = Arc::clone(&peak_probe);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, PipelineError>(())
                }
            },
        )
        .await;

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(32))]
        #[test]
        fn prop_order_preserved_for_any_size_and_width(
            len in 0usize..40,
            concurrency in 1usize..8,
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let items: Vec<usize> = (0..len).collect();
                let outcome = parallel_map(
                    items,
                    concurrency,
                    &CancellationToken::new(),
                    |_, item| async move { Ok::<_, PipelineError>(item * 2) },
                )
                .await;

                assert_eq!(outcome.results.len(), len);
                assert_eq!(outcome.success_count, len);
                for (index, result) in outcome.results.iter().enumerate() {
                    assert_eq!(*result.as_ref().unwrap(), index * 2);
                }
            });
        }
    }

    #[tokio::test]
    async fn test_cancellation_marks_pending_slots() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let outcome = parallel_map(
            (0..10).collect::<Vec<usize>>(),
            1,
            &cancel,
            move |index, item| {
                let trigger = trigger.clone();
                async move {
                    if index == 2 {
                        trigger.cancel();
                    }
                    Ok::<_, PipelineError>(item)
                }
            },
        )
        .await;

        // Items 0..=2 ran (the in-flight item finished naturally); the rest
        // were pending and are marked as cancellation errors.
        assert_eq!(outcome.results.len(), 10);
        assert_eq!(outcome.success_count, 3);
        for result in &outcome.results[3..] {
            match result {
                Err(PipelineError::Cancelled(_)) => {}
                other => panic!("expected cancellation error, got {:?}", other.is_ok()),
            }
        }
    }
}
