#[allow(unused)]
use volley_tests::*;

use std::collections::HashSet;
use std::time::Duration;
use volley::prelude::*;
use volley::ErrorKind;

#[tokio::test]
#[ntest::timeout(20_000)]
async fn count_profile_produces_every_result() {
    let mock = init().await;
    let profile = LoadProfile::new().requests(100).concurrency(10);

    let report = load_test(&mock, "/delay/ms/2", short_timeout(), profile)
        .run()
        .await
        .unwrap();

    assert_eq!(report.attempted, 100);
    assert_eq!(report.completed + report.failed, 100);
    assert_eq!(report.results.len(), 100);
    assert_eq!(report.status_codes.get(&200), Some(&100));

    let indices: HashSet<_> = report.results.iter().map(|r| r.index).collect();
    assert_eq!(indices, (0..100).collect());
    assert_eq!(mock.hits(), 100);
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn statuses_and_errors_sum_to_attempted() {
    let mock = init().await;
    let profile = LoadProfile::new().requests(60).concurrency(6);

    // Capacity-limited route: some requests are answered with 429.
    let report = load_test(&mock, "/limited/20", short_timeout(), profile)
        .run()
        .await
        .unwrap();

    let statuses: u64 = report.status_codes.values().sum();
    let errors: u64 = report.error_kinds.values().sum();
    assert_eq!(statuses + errors, report.attempted);
    assert_eq!(report.attempted, 60);
    assert!(report.status_codes.get(&429).copied().unwrap_or(0) > 0);
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn non_success_statuses_are_completed_requests() {
    let mock = init().await;
    let profile = LoadProfile::new().requests(10).concurrency(2);

    let report = load_test(&mock, "/status/503", short_timeout(), profile)
        .run()
        .await
        .unwrap();

    assert_eq!(report.completed, 10);
    assert_eq!(report.status_codes.get(&503), Some(&10));
    assert!(report.latency.is_some());
}

#[tokio::test]
async fn invalid_profiles_never_reach_the_network() {
    let mock = init().await;
    let template = RequestTemplate::get(mock.url("/delay/ms/0").parse().unwrap());

    let zero = LoadProfile::new().concurrency(0);
    assert!(matches!(
        LoadTest::new(template.clone(), zero),
        Err(ConfigError::ZeroConcurrency)
    ));

    let below = LoadProfile::new().requests(3).concurrency(4);
    assert!(matches!(
        LoadTest::new(template, below),
        Err(ConfigError::RequestsBelowConcurrency { .. })
    ));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(mock.hits(), 0);
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn timeouts_are_tallied_not_fatal() {
    let mock = init().await;
    let transport = TransportOptions::default().timeout(Some(Duration::from_millis(200)));
    let profile = LoadProfile::new().requests(4).concurrency(2);

    let report = load_test(&mock, "/stall", transport, profile)
        .run()
        .await
        .unwrap();

    assert_eq!(report.failed, 4);
    assert_eq!(report.error_kinds.get(&ErrorKind::Timeout), Some(&4));
    assert_eq!(report.error_rate(), 1.);
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn redirects_follow_the_toggle() {
    let mock = init().await;
    let profile = LoadProfile::new().requests(2).concurrency(1);

    let followed = load_test(&mock, "/redirect", short_timeout(), profile.clone())
        .run()
        .await
        .unwrap();
    assert_eq!(followed.status_codes.get(&200), Some(&2));

    let transport = short_timeout().disable_redirects();
    let kept = load_test(&mock, "/redirect", transport, profile)
        .run()
        .await
        .unwrap();
    assert_eq!(kept.status_codes.get(&302), Some(&2));
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn compression_toggle_controls_accept_encoding() {
    let mock = init().await;
    let profile = LoadProfile::new().requests(1).concurrency(1);

    let on = load_test(&mock, "/headers/accept-encoding", short_timeout(), profile.clone())
        .run()
        .await
        .unwrap();
    assert!(on.total_bytes > 0);

    let transport = short_timeout().disable_compression();
    let off = load_test(&mock, "/headers/accept-encoding", transport, profile)
        .run()
        .await
        .unwrap();
    assert_eq!(off.completed, 1);
    assert_eq!(off.total_bytes, 0);
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn body_size_counts_decoded_bytes() {
    let mock = init().await;
    let profile = LoadProfile::new().requests(3).concurrency(1);

    let report = load_test(&mock, "/gzip/4096", short_timeout(), profile)
        .run()
        .await
        .unwrap();

    assert_eq!(report.total_bytes, 3 * 4096);
    assert_eq!(report.bytes_per_request(), 4096.);
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn disabled_keep_alive_dials_every_request() {
    let mock = init().await;
    let transport = short_timeout().disable_keep_alive();
    let profile = LoadProfile::new().requests(20).concurrency(4);

    let report = load_test(&mock, "/bytes/16", transport, profile)
        .run()
        .await
        .unwrap();

    assert_eq!(report.completed, 20);
    assert!(report
        .results
        .iter()
        .all(|r| r.phases.connect > Duration::ZERO));
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn pooled_connections_skip_dialing() {
    let mock = init().await;
    let profile = LoadProfile::new().requests(20).concurrency(1);

    let report = load_test(&mock, "/delay/ms/1", short_timeout(), profile)
        .run()
        .await
        .unwrap();

    let dialed = report
        .results
        .iter()
        .filter(|r| r.phases.connect > Duration::ZERO)
        .count();
    assert!(dialed >= 1);
    assert!(dialed < 20, "every request dialed a new connection");
}
