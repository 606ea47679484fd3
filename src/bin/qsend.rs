//! qsend: send messages to one or more addresses.
//!
//! Input lines that parse as JSON objects with a `body` field (the output of
//! `qmessage`) become messages with that body and id; other lines are sent
//! verbatim as message bodies.

use clap::Parser;
use qtools::broker::message::Message;
use qtools::client::{Connection, SenderLink};
use qtools::transport::url::parse_address_url;
use qtools::utils::error::Result;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "qsend", about = "Send messages")]
struct Args {
    /// The location of a message target
    #[arg(value_name = "ADDRESS-URL", required = true)]
    urls: Vec<String>,

    /// A string containing message content; can be repeated
    #[arg(short, long = "message", value_name = "MESSAGE")]
    messages: Vec<String>,

    /// Read message content from FILE, one per line; '-' means stdin
    #[arg(short, long, value_name = "FILE", default_value = "-")]
    input: String,
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
    let mut connections = Vec::new();
    let mut senders: Vec<SenderLink> = Vec::new();

    for url in &args.urls {
        let target = parse_address_url(url)?;
        let connection = Connection::connect(&target.host, target.port).await?;
        let sender = connection.attach_sender(Some(&target.address)).await?;
        info!("created sender for target address '{}'", target.address);
        connections.push(connection);
        senders.push(sender);
    }

    let bodies = if args.messages.is_empty() {
        read_lines(&args.input).await?
    } else {
        args.messages.clone()
    };

    let mut sent = 0usize;
    for (n, line) in bodies.iter().enumerate() {
        let idx = n % senders.len();
        let sender = &mut senders[idx];
        sender.send(message_from_line(line)).await?;
        sent += 1;
    }

    info!(
        "sent {sent} {}",
        if sent == 1 { "message" } else { "messages" }
    );
    Ok(())
}

async fn read_lines(input: &str) -> Result<Vec<String>> {
    if input == "-" {
        collect_lines(tokio::io::stdin()).await
    } else {
        collect_lines(tokio::fs::File::open(input).await?).await
    }
}

async fn collect_lines(reader: impl AsyncRead + Unpin) -> Result<Vec<String>> {
    let mut lines = BufReader::new(reader).lines();
    let mut collected = Vec::new();
    while let Some(line) = lines.next_line().await? {
        collected.push(line);
    }
    Ok(collected)
}

fn message_from_line(line: &str) -> Message {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(line) {
        if let Some(body) = value.get("body").and_then(|b| b.as_str()) {
            let mut message = Message::new(body);
            if let Some(id) = value.get("id").and_then(|i| i.as_str()) {
                message.id = id.to_string();
            }
            return message;
        }
    }
    Message::new(line)
}
