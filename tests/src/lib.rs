//! Shared helpers for the integration tests.
use mock_service::MockService;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use volley::{LoadProfile, LoadTest, RequestTemplate, TransportOptions};

/// Install logging once per test binary and start a fresh mock server for the calling test.
pub async fn init() -> MockService {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
            std::process::exit(1);
        }));

        let _ = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("volley=debug,mock_service=debug")),
            )
            .with_test_writer()
            .try_init();
    });

    mock_service::spawn().await
}

pub fn load_test(
    mock: &MockService,
    path: &str,
    transport: TransportOptions,
    profile: LoadProfile,
) -> LoadTest {
    let template = RequestTemplate::get(mock.url(path).parse().unwrap()).transport(transport);
    LoadTest::new(template, profile).unwrap()
}

pub fn short_timeout() -> TransportOptions {
    TransportOptions::default().timeout(Some(Duration::from_secs(1)))
}
