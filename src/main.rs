//! Stream client load harness.
//!
//! Reads its configuration from `RABBITMQ_*` and `STREAM_APP_*` environment
//! variables, connects, produces and consumes until every producer is done
//! or SIGINT/SIGTERM arrives.

use std::process::ExitCode;

use stream_client_app::{Config, Console, LoadTest, RabbitEnvironment, ShutdownSignal};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stream_client_app=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Before connecting, so an early Ctrl-C still gets an orderly teardown.
    let signal = ShutdownSignal::install();

    let config = Config::from_env();
    let console = Console::stdout();

    console.line(format_args!("Rust Stream Client Application"));
    console.line(format_args!("Connecting to {}:{}", config.host, config.port));

    let env = match RabbitEnvironment::connect(&config).await {
        Ok(env) => env,
        Err(e) => {
            console.line(format_args!("{}", e));
            return ExitCode::FAILURE;
        }
    };

    match LoadTest::new(env, config, console.clone())
        .run(signal.recv())
        .await
    {
        Ok(summary) => {
            info!(
                trigger = %summary.trigger,
                sent = summary.sent,
                confirmed = summary.confirmed,
                received = summary.received,
                "run complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            console.line(format_args!("{}", e));
            if e.is_fatal() {
                ExitCode::FAILURE
            } else {
                error!(error = %e, "run ended with an error");
                ExitCode::SUCCESS
            }
        }
    }
}
