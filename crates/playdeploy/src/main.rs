//! playdeploy - publish Android App Bundles to Google Play

mod cli;
mod exit_codes;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use cli::Cli;

fn main() {
    let cli = Cli::parse();
    let log_guard = install_subscriber(cli.console_log_level());

    let code = cli.execute();

    // flush the file appender before exiting
    drop(log_guard);
    std::process::exit(code);
}

/// Human-readable events go to stderr at `console_level` unless `RUST_LOG`
/// says otherwise. Every deploy also leaves a debug-level JSON trail in
/// `~/.playdeploy/logs/playdeploy.log.<date>` when that directory is usable.
fn install_subscriber(
    console_level: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(console_level)),
        );

    let (json_log, guard) = match deploy_log_dir() {
        Some(dir) => {
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "playdeploy.log"));
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(true)
                .with_filter(EnvFilter::new("debug"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(console).with(json_log).init();

    guard
}

/// `~/.playdeploy/logs`, or `None` without a home directory or when it
/// cannot be created
fn deploy_log_dir() -> Option<std::path::PathBuf> {
    let dir = dirs::home_dir()?.join(".playdeploy").join("logs");
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}
