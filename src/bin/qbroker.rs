//! qbroker: a simple AMQP-style message broker for testing.

use std::sync::Arc;

use clap::Parser;
use qtools::broker::Broker;
use qtools::config::load_config;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "qbroker", about = "A simple message broker for testing")]
struct Args {
    /// Host to listen on (default from config, falling back to 127.0.0.1)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (default from config, falling back to 5672)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    qtools::utils::logging::init("info");
    let args = Args::parse();

    let mut settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            error!("failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }

    let broker = Arc::new(Broker::new(settings));
    let runner = broker.clone();
    let mut run = tokio::spawn(async move { runner.start().await });

    tokio::select! {
        finished = &mut run => {
            match finished {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!("{e}");
                    std::process::exit(1);
                }
                Err(e) => {
                    error!("broker task failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, stopping");
            broker.stop();
            match run.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!("{e}");
                    std::process::exit(1);
                }
                Err(e) => {
                    error!("broker task failed: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}
