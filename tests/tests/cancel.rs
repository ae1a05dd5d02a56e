#[allow(unused)]
use volley_tests::*;

use std::time::{Duration, Instant};
use volley::prelude::*;
use volley::Lifecycle;

#[tokio::test]
#[ntest::timeout(20_000)]
async fn stop_returns_promptly_with_real_results_only() {
    let mock = init().await;
    let profile = LoadProfile::new().requests(1_000_000).concurrency(10);
    let test = load_test(&mock, "/delay/ms/10", short_timeout(), profile);

    let stop = test.stop_handle();
    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let at = Instant::now();
        stop.stop();
        at
    });

    let report = test.run().await.unwrap();
    let stopped_at = stopper.await.unwrap();

    // In-flight requests finish within one timeout.
    assert!(stopped_at.elapsed() < Duration::from_secs(1) + Duration::from_millis(500));
    assert_eq!(test.lifecycle(), Lifecycle::Finalized);

    assert!(report.attempted > 0 && report.attempted < 1_000_000);
    assert_eq!(report.completed, report.attempted);
    assert_eq!(report.status_codes.get(&200), Some(&report.attempted));
    assert_eq!(test.progress().dispatched, report.attempted);
    assert_eq!(mock.hits(), report.attempted);
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn stop_releases_workers_waiting_on_permits() {
    let mock = init().await;
    let profile = LoadProfile::new().requests(100).concurrency(4).rate(1.);
    let test = load_test(&mock, "/delay/ms/0", short_timeout(), profile);

    let stop = test.stop_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        stop.stop();
        stop.stop();
    });

    let start = Instant::now();
    let report = test.run().await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(report.attempted, 1);
    assert_eq!(report.results.len(), 1);
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn stop_after_finish_is_a_no_op() {
    let mock = init().await;
    let profile = LoadProfile::new().requests(5).concurrency(5);
    let test = load_test(&mock, "/delay/ms/0", short_timeout(), profile);

    let report = test.run().await.unwrap();
    test.stop();
    test.stop_handle().stop();

    assert_eq!(report.attempted, 5);
    assert_eq!(test.lifecycle(), Lifecycle::Finalized);
    assert!(matches!(test.run().await, Err(RunError::AlreadyStarted)));
}
