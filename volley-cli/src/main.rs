use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use volley::LoadTest;

mod cli;
mod report;

use cli::Cli;

#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut runtime = tokio::runtime::Builder::new_multi_thread();
    runtime.enable_all();
    if let Some(cpus) = cli.cpus {
        runtime.worker_threads(cpus);
    }

    runtime
        .build()
        .context("Failed to start the async runtime")?
        .block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let template = cli.request_template().await?;
    let profile = cli.load_profile();
    let test = LoadTest::new(template, profile).context("Invalid load test configuration")?;

    let stop = test.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted; waiting for in-flight requests.");
            stop.stop();
        }
    });

    let mut reporter = report::reporter(cli.output, io::stdout());
    test.run_with(&mut reporter).await?;

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = if verbose > 0 {
        "volley=debug"
    } else {
        "volley=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
