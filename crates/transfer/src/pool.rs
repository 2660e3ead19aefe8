use crate::error::{ErrorKind, Result};
use async_stream::stream;
use exn::ResultExt;
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::future::Future;
use tokio::task::JoinSet;

/// Run `jobs` on the runtime, at most `limit` at a time, yielding each
/// result as it finishes.
///
/// Jobs start in the order given; whenever one finishes, the next waiting job
/// is promoted (FIFO). After the first error every other job is aborted and
/// awaited, so whatever they hold (slots, temporary files) has been dropped
/// by the time the stream ends.
pub(crate) fn bounded<F, T>(jobs: impl IntoIterator<Item = F>, limit: usize) -> impl Stream<Item = Result<T>>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let mut waiting: VecDeque<F> = jobs.into_iter().collect();
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        let mut running = JoinSet::new();
        while running.len() < limit.max(1)
            && let Some(job) = waiting.pop_front()
        {
            running.spawn(job);
        }
        while let Some(joined) = running.join_next().await {
            let result = joined.or_raise(|| ErrorKind::Worker).and_then(|result| result);
            let failed = result.is_err();
            yield result;
            if failed {
                running.shutdown().await;
                return;
            }
            // Pop-n-push, but FIFO instead of LIFO.
            if let Some(job) = waiting.pop_front() {
                running.spawn(job);
            }
        }
    })
}

/// Drive a job stream to the end, collecting successes. The first error is
/// returned once the stream has wound down.
pub(crate) async fn collect<T>(results: impl Stream<Item = Result<T>>) -> Result<Vec<T>> {
    let mut results = std::pin::pin!(results);
    let mut done = Vec::new();
    let mut first_error = None;
    while let Some(result) = results.next().await {
        match result {
            Ok(value) => done.push(value),
            Err(e) => {
                first_error.get_or_insert(e);
            },
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(done),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_is_bounded() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let jobs = (0..20).map(|i| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, crate::error::Error>(i)
            }
        });
        let mut done = collect(bounded(jobs, 3)).await.unwrap();
        done.sort();
        assert_eq!(done, (0..20).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_jobs_start_in_order() {
        let started = Arc::new(std::sync::Mutex::new(Vec::new()));
        let jobs = (0..6).map(|i| {
            let started = Arc::clone(&started);
            async move {
                started.lock().unwrap().push(i);
                Ok::<_, crate::error::Error>(())
            }
        });
        collect(bounded(jobs, 1)).await.unwrap();
        assert_eq!(*started.lock().unwrap(), [0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_first_error_aborts_the_rest() {
        let finished = Arc::new(AtomicUsize::new(0));
        let jobs = (0..10).map(|i| {
            let finished = Arc::clone(&finished);
            async move {
                if i == 0 {
                    exn::bail!(ErrorKind::Network("boom".to_string()));
                }
                tokio::time::sleep(Duration::from_secs(30)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok::<_, crate::error::Error>(())
            }
        });
        let err = collect(bounded(jobs, 4)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Network(_)));
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    async fn explode() -> Result<()> {
        panic!("worker exploded")
    }

    #[tokio::test]
    async fn test_panicking_job_is_a_worker_error() {
        let err = collect(bounded([explode()], 1)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Worker));
    }
}
