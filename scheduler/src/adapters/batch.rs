//! Generic bisect-retry (§4.6.1): shared by every adapter's batch
//! start/stop/tag calls. A batch call that fails without identifying the
//! bad item is retried on each half, recursively, until failures are
//! isolated to single items.

use futures::future::BoxFuture;

pub struct BisectRetryResponse<T, E> {
    pub successes: Vec<T>,
    pub failures: Vec<(T, E)>,
    /// Count of non-leaf batches (more than one item) whose whole-batch
    /// call failed before being split further — diagnostic visibility
    /// distinct from the leaf single-item failures in `failures`.
    pub intermediate_failures: usize,
}

impl<T, E> BisectRetryResponse<T, E> {
    fn empty() -> Self {
        Self {
            successes: Vec::new(),
            failures: Vec::new(),
            intermediate_failures: 0,
        }
    }

    fn merge(mut self, other: Self) -> Self {
        self.successes.extend(other.successes);
        self.failures.extend(other.failures);
        self.intermediate_failures += other.intermediate_failures;
        self
    }
}

/// `action` attempts the whole slice at once; `O(n + k log n)` calls for
/// `k` failing items out of `n`.
pub fn bisect_retry<'a, T, E, F>(inputs: Vec<T>, action: &'a F) -> BoxFuture<'a, BisectRetryResponse<T, E>>
where
    T: Clone + Send + Sync + 'a,
    E: Clone + Send + Sync + 'a,
    F: Fn(&[T]) -> BoxFuture<'a, Result<(), E>> + Sync,
{
    Box::pin(async move {
        if inputs.is_empty() {
            return BisectRetryResponse::empty();
        }

        match action(&inputs).await {
            Ok(()) => BisectRetryResponse {
                successes: inputs,
                failures: Vec::new(),
                intermediate_failures: 0,
            },
            Err(e) if inputs.len() == 1 => {
                let item = inputs.into_iter().next().expect("length checked above");
                BisectRetryResponse {
                    successes: Vec::new(),
                    failures: vec![(item, e)],
                    intermediate_failures: 0,
                }
            }
            Err(_) => {
                let mut left = inputs;
                let right = left.split_off(left.len() / 2);
                let (left_result, right_result) =
                    futures::join!(bisect_retry(left, action), bisect_retry(right, action));
                let merged = left_result.merge(right_result);
                BisectRetryResponse {
                    intermediate_failures: merged.intermediate_failures + 1,
                    ..merged
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing_action<'a>(bad: &'a [u32]) -> impl Fn(&[u32]) -> BoxFuture<'a, Result<(), String>> + Sync {
        move |batch: &[u32]| {
            let fails = batch.iter().any(|id| bad.contains(id));
            Box::pin(async move {
                if fails {
                    Err("batch failed".to_string())
                } else {
                    Ok(())
                }
            })
        }
    }

    #[tokio::test]
    async fn all_succeed_when_nothing_is_bad() {
        let action = failing_action(&[]);
        let response = bisect_retry(vec![1, 2, 3, 4], &action).await;
        assert_eq!(response.successes, vec![1, 2, 3, 4]);
        assert!(response.failures.is_empty());
    }

    #[tokio::test]
    async fn isolates_single_bad_item() {
        let action = failing_action(&[3]);
        let response = bisect_retry(vec![1, 2, 3, 4], &action).await;
        assert_eq!(response.failures.len(), 1);
        assert_eq!(response.failures[0].0, 3);
        assert_eq!(response.successes.len(), 3);
        assert!(response.intermediate_failures >= 1);
    }

    #[tokio::test]
    async fn isolates_multiple_bad_items() {
        let action = failing_action(&[2, 7]);
        let response = bisect_retry(vec![1, 2, 3, 4, 5, 6, 7, 8], &action).await;
        let mut bad_ids: Vec<_> = response.failures.iter().map(|(id, _)| *id).collect();
        bad_ids.sort();
        assert_eq!(bad_ids, vec![2, 7]);
        assert_eq!(response.successes.len(), 6);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_response() {
        let action = failing_action(&[]);
        let response: BisectRetryResponse<u32, String> = bisect_retry(vec![], &action).await;
        assert!(response.successes.is_empty());
        assert!(response.failures.is_empty());
        assert_eq!(response.intermediate_failures, 0);
    }
}
