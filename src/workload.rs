//! Load generation against a single running server.
//!
//! A batch issues a fixed number of operations against one container, either
//! strictly sequentially or through a bounded pool of workers, and measures
//! wall-clock time for the whole batch. Setup work (container creation, the
//! read batch's seed upload, payload allocation) happens outside the timed
//! window so it cannot contaminate the measurement.
//!
//! Workers share nothing but an index counter and the join barrier: every
//! operation touches its own blob key, so there is no locking on the data
//! path. A failing operation aborts the batch — remaining workers stop
//! claiming indices, everything already in flight is awaited (never
//! cancelled), and the first failure propagates after the barrier.

use bytes::Bytes;
use hdrhistogram::Histogram;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use azure_storage_blobs::prelude::ContainerClient;

use crate::client;
use crate::error::HarnessError;

/// The single object a read batch hammers.
const READ_BLOB: &str = "read-blob";

/// Container used by one (size, clients) cell of the sweep matrix.
pub fn container_name(blob_size: usize, clients: usize) -> String {
    format!("bench-{blob_size}-{clients}")
}

/// Blob key written by operation `index` of a write batch.
pub fn write_key(index: usize) -> String {
    format!("blob-{index}")
}

/// Run a write batch: `op_count` uploads of a `payload_size`-byte payload to
/// distinct keys `blob-0..blob-{op_count-1}`, at the given concurrency.
/// Returns the elapsed wall-clock time of the timed window.
pub async fn run_write(
    container: &ContainerClient,
    payload_size: usize,
    op_count: usize,
    concurrency: usize,
) -> Result<Duration, HarnessError> {
    // Container setup stays outside the timed window; a concurrent-creation
    // conflict is benign and swallowed.
    client::ensure_container(container).await?;
    let payload = fixed_payload(payload_size);

    let container = container.clone();
    let batch = execute(op_count, concurrency, move |index| {
        let blob = container.blob_client(write_key(index));
        let payload = payload.clone();
        async move { blob.put_block_blob(payload).await.map(|_| ()) }
    })
    .await?;

    batch.log_latency("write", payload_size, concurrency);
    Ok(batch.elapsed)
}

/// Run a read batch: seed one `payload_size`-byte object, then issue
/// `op_count` full-content reads of it, discarding the returned bytes.
/// The seed upload happens before timing starts.
pub async fn run_read(
    container: &ContainerClient,
    payload_size: usize,
    op_count: usize,
    concurrency: usize,
) -> Result<Duration, HarnessError> {
    let payload = fixed_payload(payload_size);
    container
        .blob_client(READ_BLOB)
        .put_block_blob(payload)
        .await?;

    let container = container.clone();
    let batch = execute(op_count, concurrency, move |_| {
        let blob = container.blob_client(READ_BLOB);
        // Bytes are discarded unverified: this measures throughput, not
        // correctness.
        async move { client::download_blob(&blob).await.map(|_| ()) }
    })
    .await?;

    batch.log_latency("read", payload_size, concurrency);
    Ok(batch.elapsed)
}

/// One fixed-content buffer per batch, reference-cloned per operation so
/// payload allocation never lands inside the timed window.
fn fixed_payload(size: usize) -> Bytes {
    Bytes::from(vec![b'x'; size])
}

/// Outcome of a completed batch: the timed window plus per-operation
/// latencies for diagnostics.
#[derive(Debug)]
struct TimedBatch {
    elapsed: Duration,
    latency: Histogram<u64>,
}

impl TimedBatch {
    fn log_latency(&self, operation: &str, payload_size: usize, concurrency: usize) {
        if self.latency.is_empty() {
            return;
        }
        debug!(
            "{} batch (size={}, clients={}): p50={}µs p95={}µs p99={}µs max={}µs",
            operation,
            payload_size,
            concurrency,
            self.latency.value_at_quantile(0.50) / 1_000,
            self.latency.value_at_quantile(0.95) / 1_000,
            self.latency.value_at_quantile(0.99) / 1_000,
            self.latency.max() / 1_000,
        );
    }
}

fn latency_histogram() -> Histogram<u64> {
    // Auto-resizing, 3 significant figures; construction with a constant
    // sigfig cannot fail.
    Histogram::new(3).expect("3 significant figures is a valid histogram precision")
}

/// Execute `op_count` operations at the given concurrency and time the
/// whole batch.
///
/// Concurrency 1 runs operations strictly sequentially in index order. For
/// higher levels, exactly `concurrency` workers pull indices from a shared
/// counter: claim order is index order, completion order is unconstrained.
/// The join is a full barrier — the batch only finishes (and the clock only
/// stops) once every claimed operation has completed. The first failure is
/// surfaced after the barrier; in-flight operations are awaited, not
/// cancelled, and partial timing is discarded with the error.
async fn execute<F, Fut>(
    op_count: usize,
    concurrency: usize,
    op: F,
) -> Result<TimedBatch, HarnessError>
where
    F: Fn(usize) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Result<(), azure_core::error::Error>> + Send + 'static,
{
    let mut latency = latency_histogram();
    let start = Instant::now();

    if concurrency <= 1 {
        for index in 0..op_count {
            let begin = Instant::now();
            op(index).await?;
            latency.saturating_record(begin.elapsed().as_nanos() as u64);
        }
        return Ok(TimedBatch {
            elapsed: start.elapsed(),
            latency,
        });
    }

    let next_index = Arc::new(AtomicUsize::new(0));
    let aborted = Arc::new(AtomicBool::new(false));

    let mut workers = Vec::with_capacity(concurrency);
    for _ in 0..concurrency {
        let next_index = Arc::clone(&next_index);
        let aborted = Arc::clone(&aborted);
        let op = op.clone();
        workers.push(tokio::spawn(async move {
            let mut latency = latency_histogram();
            loop {
                if aborted.load(Ordering::Relaxed) {
                    return Ok(latency);
                }
                let index = next_index.fetch_add(1, Ordering::Relaxed);
                if index >= op_count {
                    return Ok(latency);
                }
                let begin = Instant::now();
                if let Err(err) = op(index).await {
                    aborted.store(true, Ordering::Relaxed);
                    return Err(err);
                }
                latency.saturating_record(begin.elapsed().as_nanos() as u64);
            }
        }));
    }

    let mut first_error = None;
    for worker in workers {
        match worker.await {
            Ok(Ok(worker_latency)) => {
                let _ = latency.add(&worker_latency);
            }
            Ok(Err(err)) => {
                if first_error.is_none() {
                    first_error = Some(HarnessError::Operation(err));
                }
            }
            Err(join_err) => {
                if join_err.is_panic() {
                    std::panic::resume_unwind(join_err.into_panic());
                }
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(TimedBatch {
            elapsed: start.elapsed(),
            latency,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use azure_core::error::{Error as ClientError, ErrorKind};
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn injected_failure() -> ClientError {
        ClientError::message(ErrorKind::Other, "injected failure")
    }

    #[test]
    fn test_container_name_scheme() {
        assert_eq!(container_name(1024, 4), "bench-1024-4");
        assert_eq!(write_key(999), "blob-999");
    }

    #[tokio::test]
    async fn test_sequential_batch_runs_in_index_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);

        let batch = execute(50, 1, move |index| {
            let seen = Arc::clone(&recorder);
            async move {
                seen.lock().unwrap().push(index);
                Ok(())
            }
        })
        .await
        .unwrap();

        assert_eq!(*seen.lock().unwrap(), (0..50).collect::<Vec<_>>());
        assert!(batch.elapsed > Duration::ZERO);
        assert_eq!(batch.latency.len(), 50);
    }

    #[tokio::test]
    async fn test_pool_claims_every_index_exactly_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);

        let batch = execute(200, 8, move |index| {
            let seen = Arc::clone(&recorder);
            async move {
                tokio::task::yield_now().await;
                seen.lock().unwrap().push(index);
                Ok(())
            }
        })
        .await
        .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 200);
        assert_eq!(seen.iter().copied().collect::<HashSet<_>>().len(), 200);
        assert_eq!(batch.latency.len(), 200);
    }

    #[tokio::test]
    async fn test_failure_aborts_batch_and_propagates() {
        let completed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&completed);

        let err = execute(100, 4, move |index| {
            let completed = Arc::clone(&counter);
            async move {
                if index == 5 {
                    return Err(injected_failure());
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
                completed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, HarnessError::Operation(_)));
        // The batch aborted early: nowhere near all 100 operations ran, but
        // everything already in flight was allowed to finish.
        assert!(completed.load(Ordering::Relaxed) < 100);
    }

    #[tokio::test]
    async fn test_join_is_a_full_barrier() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let tracker = Arc::clone(&in_flight);

        let result = execute(40, 4, move |index| {
            let in_flight = Arc::clone(&tracker);
            async move {
                in_flight.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                if index == 0 {
                    return Err(injected_failure());
                }
                Ok(())
            }
        })
        .await;

        assert!(result.is_err());
        // Once the barrier releases, nothing is still running.
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }
}
