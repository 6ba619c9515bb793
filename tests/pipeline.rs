//! End-to-end properties of the partition → scan → gather pipeline

use primegather::config::Config;
use primegather::coordinator::LocalCoordinator;
use primegather::distributed::{DistributedCoordinator, NodeService};
use primegather::executor::mock::{Delivery, MockExecutor};
use primegather::executor::{Executor, RayonExecutor, ThreadExecutor};
use primegather::partition::{partition, SearchBounds};
use primegather::prime::is_prime;
use primegather::scanner::{create_scanner, ScannerKind};
use primegather::PrimeError;
use std::sync::Arc;

fn reference(limit: u64) -> Vec<u64> {
    (0..limit).filter(|&n| is_prime(n)).collect()
}

fn run_local(executor: Arc<dyn Executor>, limit: i64, workers: i64) -> Vec<u64> {
    LocalCoordinator::new(executor)
        .run(SearchBounds::new(limit, workers).unwrap())
        .unwrap()
        .result
        .primes
}

fn thread_executor(kind: ScannerKind) -> Arc<dyn Executor> {
    Arc::new(ThreadExecutor::new(create_scanner(kind)))
}

#[test]
fn test_primes_below_1000() {
    let primes = run_local(thread_executor(ScannerKind::TrialDivision), 1000, 4);
    assert_eq!(primes.len(), 168);
    assert_eq!(primes.first(), Some(&2));
    assert_eq!(primes.last(), Some(&997));
}

#[test]
fn test_end_to_end_30_3() {
    let primes = run_local(thread_executor(ScannerKind::TrialDivision), 30, 3);
    assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
}

#[test]
fn test_result_independent_of_worker_count() {
    let expected = reference(10_000);
    for workers in [1, 3, 7, 16] {
        for kind in [ScannerKind::TrialDivision, ScannerKind::SegmentedSieve] {
            let primes = run_local(thread_executor(kind), 10_000, workers);
            assert_eq!(primes, expected, "W={} scanner={}", workers, kind.as_str());
        }
    }
}

#[test]
fn test_rayon_matches_threads() {
    let rayon: Arc<dyn Executor> =
        Arc::new(RayonExecutor::new(create_scanner(ScannerKind::SegmentedSieve), 3).unwrap());
    assert_eq!(
        run_local(rayon, 100_000, 16),
        run_local(thread_executor(ScannerKind::TrialDivision), 100_000, 16)
    );
}

#[test]
fn test_more_workers_than_numbers() {
    let report = LocalCoordinator::new(thread_executor(ScannerKind::TrialDivision))
        .run(SearchBounds::new(3, 10).unwrap())
        .unwrap();
    assert_eq!(report.result.primes, vec![2]);
    assert_eq!(report.result.workers.len(), 10);
    assert!(report.result.workers[3..].iter().all(|w| w.range.is_empty()));
}

#[test]
fn test_zero_limit() {
    assert!(run_local(thread_executor(ScannerKind::SegmentedSieve), 0, 5).is_empty());
}

#[test]
fn test_invalid_bounds_rejected_before_dispatch() {
    assert!(matches!(SearchBounds::new(-1, 4), Err(PrimeError::InvalidArgument(_))));
    assert!(matches!(SearchBounds::new(100, 0), Err(PrimeError::InvalidArgument(_))));
    assert!(matches!(SearchBounds::new(100, -2), Err(PrimeError::InvalidArgument(_))));
}

#[test]
fn test_partition_idempotent() {
    assert_eq!(partition(123_457, 7).unwrap(), partition(123_457, 7).unwrap());
}

#[test]
fn test_reversed_arrival_regression() {
    // W = 4, N = 40: results arrive last worker first; the merge must still
    // produce the ascending list.
    let executor = Arc::new(
        MockExecutor::new(create_scanner(ScannerKind::TrialDivision))
            .with_delivery(Delivery::Reversed),
    );
    let coordinator = LocalCoordinator::new(executor.clone());
    let handle = std::thread::spawn(move || coordinator.run(SearchBounds::new(40, 4).unwrap()));

    executor.wait_for_submissions(4);
    executor.flush();

    let primes = handle.join().unwrap().unwrap().result.primes;
    assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37]);
}

#[test]
fn test_failed_worker_fails_the_run() {
    let executor = Arc::new(
        MockExecutor::new(create_scanner(ScannerKind::TrialDivision))
            .with_delivery(Delivery::Immediate)
            .fail_worker(2),
    );
    let err = LocalCoordinator::new(executor)
        .run(SearchBounds::new(100, 4).unwrap())
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PrimeError>(),
        Some(PrimeError::WorkerFailure { worker_id: 2, .. })
    ));
}

async fn start_node() -> String {
    let service = NodeService::new(0).unwrap();
    let listener = service.bind().await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move { service.serve(listener).await });
    format!("127.0.0.1:{}", port)
}

#[tokio::test]
async fn test_distributed_two_nodes() {
    let nodes = vec![start_node().await, start_node().await];

    let mut config = Config::with_limit(10_000);
    config.search.workers = Some(7);
    config.search.scanner = ScannerKind::SegmentedSieve;
    config.runtime.result_timeout_secs = 30;

    let coordinator = DistributedCoordinator::new(Arc::new(config), nodes).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.result.primes, reference(10_000));
    assert_eq!(report.result.workers.len(), 7);
    let ids: Vec<usize> = report.result.workers.iter().map(|w| w.worker_id).collect();
    assert_eq!(ids, (0..7).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_distributed_more_nodes_than_workers() {
    let nodes = vec![start_node().await, start_node().await, start_node().await];

    let mut config = Config::with_limit(30);
    config.search.workers = Some(2);
    config.executor.threads = Some(1);

    let coordinator = DistributedCoordinator::new(Arc::new(config), nodes).unwrap();
    let report = coordinator.run().await.unwrap();
    assert_eq!(report.result.primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
}

#[tokio::test]
async fn test_distributed_unreachable_node() {
    // Bind and immediately drop to get a port nothing listens on
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut config = Config::with_limit(100);
    config.search.workers = Some(2);
    let coordinator =
        DistributedCoordinator::new(Arc::new(config), vec![format!("127.0.0.1:{}", port)]).unwrap();

    let err = coordinator.run().await.unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to connect"));
}
