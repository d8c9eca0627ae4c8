//! # Concurrent TCP Latency Prober
//!
//! Measures how long a plain TCP handshake takes for every candidate target.
//! Probes run concurrently but never more than `ProbeOptions::concurrency` at a
//! time; targets beyond the limit wait until a slot frees up. Every probe owns
//! its own deadline, which starts when that probe starts, not when the round
//! starts.
//!
//! A single failed or timed-out attempt is final for the round. The socket is
//! dropped as soon as the handshake completes.

use std::future::Future;
use std::io::ErrorKind;
use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

use super::target::{ProbeFailure, ProbeOptions, ProbeResult, ProbeTarget};

/// Probes every target and returns exactly one result per input target.
///
/// The returned vector is in completion order; feed it to
/// [`rank`](super::ranker::rank) for a deterministic ordering.
pub async fn probe_all(targets: &[ProbeTarget], options: &ProbeOptions) -> Vec<ProbeResult> {
    let workers = options.concurrency.max(1);
    let limit = options.timeout;
    let started = Instant::now();

    let results = fan_out(targets, workers, |index, target| probe_one(index, target, limit)).await;

    let reachable = results.iter().filter(|r| r.reachable).count();
    info!(
        total = results.len(),
        reachable,
        workers,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "probing round finished"
    );
    results
}

/// Runs `probe` for every target with at most `workers` futures in flight.
async fn fan_out<F, Fut>(targets: &[ProbeTarget], workers: usize, mut probe: F) -> Vec<ProbeResult>
where
    F: FnMut(usize, ProbeTarget) -> Fut,
    Fut: Future<Output = ProbeResult>,
{
    stream::iter(targets.iter().cloned().enumerate())
        .map(|(index, target)| probe(index, target))
        .buffer_unordered(workers.max(1))
        .collect()
        .await
}

/// Probes a single target with its own timeout.
pub async fn probe_one(index: usize, target: ProbeTarget, limit: Duration) -> ProbeResult {
    let Some(port) = target.socket_port() else {
        debug!(name = %target.name, address = %target.address(), "invalid target, skipping connect");
        return ProbeResult::unreachable(index, target, ProbeFailure::InvalidTarget);
    };

    let started = Instant::now();
    let attempt = timeout(limit, TcpStream::connect((target.host.as_str(), port))).await;

    match attempt {
        Ok(Ok(stream)) => {
            let latency_ms = started.elapsed().as_millis() as u64;
            drop(stream);
            debug!(name = %target.name, latency_ms, "target reachable");
            ProbeResult::reachable(index, target, latency_ms)
        }
        Ok(Err(e)) => {
            let failure = if e.kind() == ErrorKind::ConnectionRefused {
                ProbeFailure::Refused
            } else {
                ProbeFailure::Io(e.to_string())
            };
            debug!(name = %target.name, error = %e, "target unreachable");
            ProbeResult::unreachable(index, target, failure)
        }
        Err(_) => {
            debug!(name = %target.name, timeout_ms = limit.as_millis() as u64, "probe timed out");
            ProbeResult::unreachable(index, target, ProbeFailure::Timeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    /// A port that was just released, so connecting to it is refused.
    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    }

    fn fast_options() -> ProbeOptions {
        ProbeOptions {
            timeout: Duration::from_millis(500),
            concurrency: 4,
        }
    }

    #[tokio::test]
    async fn reachable_listener_reports_latency() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port() as i64;

        let result = probe_one(0, ProbeTarget::new("local", "127.0.0.1", port), Duration::from_secs(2)).await;
        assert!(result.reachable);
        assert!(result.latency_ms.is_some());
        assert!(result.failure.is_none());
    }

    #[tokio::test]
    async fn closed_port_is_refused() {
        let port = closed_port().await as i64;
        let result = probe_one(3, ProbeTarget::new("gone", "127.0.0.1", port), Duration::from_secs(2)).await;
        assert!(!result.reachable);
        assert_eq!(result.index, 3);
        assert_eq!(result.latency_ms, None);
        assert!(matches!(result.failure, Some(ProbeFailure::Refused) | Some(ProbeFailure::Io(_))));
    }

    #[tokio::test]
    async fn invalid_targets_never_connect() {
        for target in [
            ProbeTarget::new("no-host", "", 443),
            ProbeTarget::new("zero", "127.0.0.1", 0),
            ProbeTarget::new("negative", "127.0.0.1", -1),
            ProbeTarget::new("huge", "127.0.0.1", 65_536),
        ] {
            let result = probe_one(0, target, Duration::from_secs(1)).await;
            assert!(!result.reachable);
            assert_eq!(result.failure, Some(ProbeFailure::InvalidTarget));
        }
    }

    #[tokio::test]
    async fn unroutable_target_is_bounded_by_timeout() {
        // TEST-NET-1 never answers; depending on the sandbox the attempt either
        // hangs until the deadline or fails immediately.
        let started = Instant::now();
        let result = probe_one(0, ProbeTarget::new("void", "192.0.2.1", 9), Duration::from_millis(200)).await;
        assert!(!result.reachable);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn returns_one_result_per_target() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open = listener.local_addr().unwrap().port() as i64;
        let closed = closed_port().await as i64;

        let targets: Vec<ProbeTarget> = (0..11)
            .map(|i| match i % 3 {
                0 => ProbeTarget::new(format!("n{i}"), "127.0.0.1", open),
                1 => ProbeTarget::new(format!("n{i}"), "127.0.0.1", closed),
                _ => ProbeTarget::new(format!("n{i}"), "", 0),
            })
            .collect();

        let results = probe_all(&targets, &fast_options()).await;
        assert_eq!(results.len(), targets.len());

        let indices: HashSet<usize> = results.iter().map(|r| r.index).collect();
        assert_eq!(indices.len(), targets.len());
        for result in &results {
            assert_eq!(result.target, targets[result.index]);
        }
        assert_eq!(results.iter().filter(|r| r.reachable).count(), 4);
    }

    #[tokio::test]
    async fn in_flight_probes_never_exceed_the_worker_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let targets: Vec<ProbeTarget> = (0..10).map(|i| ProbeTarget::new(format!("n{i}"), "10.0.0.1", 443)).collect();

        let started = Instant::now();
        let results = fan_out(&targets, 3, |index, target| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(40)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                ProbeResult::unreachable(index, target, ProbeFailure::Timeout)
            }
        })
        .await;

        assert_eq!(results.len(), 10);
        assert_eq!(peak.load(Ordering::SeqCst), 3);
        // ceil(10 / 3) waves of 40 ms each.
        assert!(started.elapsed() >= Duration::from_millis(160));
    }

    #[tokio::test]
    async fn single_worker_probes_one_at_a_time() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let targets: Vec<ProbeTarget> = (0..4).map(|i| ProbeTarget::new(format!("n{i}"), "10.0.0.1", 443)).collect();

        fan_out(&targets, 0, |index, target| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                ProbeResult::unreachable(index, target, ProbeFailure::Timeout)
            }
        })
        .await;

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_input_yields_no_results() {
        assert!(probe_all(&[], &ProbeOptions::default()).await.is_empty());
    }

    #[tokio::test]
    async fn zero_concurrency_still_probes() {
        let options = ProbeOptions {
            timeout: Duration::from_millis(200),
            concurrency: 0,
        };
        let targets = vec![ProbeTarget::new("a", "", 1), ProbeTarget::new("b", "", 1)];
        assert_eq!(probe_all(&targets, &options).await.len(), 2);
    }
}
