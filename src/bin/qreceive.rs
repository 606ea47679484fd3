//! qreceive: receive messages from one or more addresses.

use std::fs::File;
use std::io::Write;

use clap::Parser;
use qtools::broker::message::Message;
use qtools::client::Connection;
use qtools::transport::url::parse_address_url;
use qtools::utils::error::Result;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "qreceive", about = "Receive messages")]
struct Args {
    /// The location of a message source
    #[arg(value_name = "ADDRESS-URL", required = true)]
    urls: Vec<String>,

    /// Exit after receiving COUNT messages
    #[arg(short, long, value_name = "COUNT")]
    count: Option<u64>,

    /// Write messages in JSON format
    #[arg(long)]
    json: bool,

    /// Suppress the address prefix
    #[arg(long)]
    no_prefix: bool,

    /// Write messages to FILE (default stdout)
    #[arg(long, value_name = "FILE")]
    output: Option<String>,
}

#[tokio::main]
async fn main() {
    qtools::utils::logging::init("info");
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<(String, Message)>();

    for url in &args.urls {
        let target = parse_address_url(url)?;
        let tx = tx.clone();
        tokio::spawn(async move {
            let connection = match Connection::connect(&target.host, target.port).await {
                Ok(connection) => connection,
                Err(e) => {
                    error!("failed to connect to {}: {e}", target.domain());
                    return;
                }
            };
            let mut receiver = match connection.attach_receiver(Some(&target.address)).await {
                Ok(receiver) => receiver,
                Err(e) => {
                    error!("failed to attach to '{}': {e}", target.address);
                    return;
                }
            };
            info!("created receiver for source address '{}'", target.address);

            loop {
                match receiver.recv().await {
                    Ok(message) => {
                        if tx.send((target.address.clone(), message)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("receiver for '{}' stopped: {e}", target.address);
                        break;
                    }
                }
            }
        });
    }
    drop(tx);

    let mut output: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(std::io::stdout()),
    };

    let mut received = 0u64;
    while let Some((address, message)) = rx.recv().await {
        if !args.no_prefix {
            write!(output, "{address}: ")?;
        }
        if args.json {
            serde_json::to_writer(&mut output, &message)?;
        } else {
            write!(output, "{}", message.body)?;
        }
        writeln!(output)?;
        output.flush()?;

        received += 1;
        if Some(received) == args.count {
            break;
        }
    }

    info!(
        "received {received} {}",
        if received == 1 { "message" } else { "messages" }
    );
    Ok(())
}
