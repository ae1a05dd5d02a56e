#[allow(unused)]
use volley_tests::*;

use std::time::{Duration, Instant};
use volley::prelude::*;

#[tokio::test]
#[ntest::timeout(20_000)]
async fn rate_cap_spaces_requests_evenly() {
    let mock = init().await;
    let profile = LoadProfile::new().requests(150).concurrency(30).rate(50.);

    let start = Instant::now();
    let report = load_test(&mock, "/delay/ms/1", short_timeout(), profile)
        .run()
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert_eq!(report.attempted, 150);
    // 149 gaps of 20ms.
    assert!(elapsed >= Duration::from_millis(2_970), "{elapsed:?}");

    let mut offsets: Vec<_> = report.results.iter().map(|r| r.offset).collect();
    offsets.sort_unstable();
    for (i, start) in offsets.iter().enumerate() {
        let window = offsets[i..]
            .iter()
            .take_while(|o| **o < *start + Duration::from_secs(1))
            .count();
        // 50 permits per second, plus one boundary sample of scheduling jitter.
        assert!(window <= 51, "{window} requests started within 1s of {start:?}");
    }
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn duration_bound_ignores_request_count() {
    let mock = init().await;
    let profile = LoadProfile::new()
        .requests(1_000_000)
        .concurrency(8)
        .duration(Duration::from_secs(2));

    let start = Instant::now();
    let report = load_test(&mock, "/delay/ms/5", short_timeout(), profile)
        .run()
        .await
        .unwrap();
    let elapsed = start.elapsed();

    // Duration plus at most one request timeout.
    assert!(elapsed >= Duration::from_millis(1_950), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(3) + Duration::from_millis(500), "{elapsed:?}");
    assert!(report.attempted > 0 && report.attempted < 1_000_000);
    assert_eq!(report.completed + report.failed, report.attempted);
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn rate_cap_and_duration_both_hold() {
    let mock = init().await;
    let profile = LoadProfile::new()
        .concurrency(10)
        .rate(20.)
        .duration(Duration::from_secs(1));

    let report = load_test(&mock, "/delay/ms/1", short_timeout(), profile)
        .run()
        .await
        .unwrap();

    // Permits at 0, 50ms, .., 950ms, and possibly one right at the deadline.
    assert!(report.attempted >= 15, "{}", report.attempted);
    assert!(report.attempted <= 22, "{}", report.attempted);
}
