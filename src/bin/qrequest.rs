//! qrequest: send requests and print the responses.
//!
//! Each target URL gets a sender link plus a dynamic reply receiver; every
//! request carries a fresh correlation id and the dynamic reply-to address.

use clap::Parser;
use qtools::broker::message::Message;
use qtools::client::{Connection, ReceiverLink, SenderLink};
use qtools::transport::url::parse_address_url;
use qtools::utils::error::Result;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{error, info};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "qrequest", about = "Send requests")]
struct Args {
    /// The location of a request target
    #[arg(value_name = "ADDRESS-URL", required = true)]
    urls: Vec<String>,

    /// Send a request containing CONTENT; can be repeated
    #[arg(short, long = "request", value_name = "CONTENT")]
    requests: Vec<String>,

    /// Read requests from FILE, one per line; '-' means stdin
    #[arg(short, long, value_name = "FILE", default_value = "-")]
    input: String,
}

struct RequestChannel {
    sender: SenderLink,
    replies: ReceiverLink,
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
    let mut channels: Vec<RequestChannel> = Vec::new();

    for url in &args.urls {
        let target = parse_address_url(url)?;
        let connection = Connection::connect(&target.host, target.port).await?;
        let sender = connection.attach_sender(Some(&target.address)).await?;
        let replies = connection.attach_receiver(None).await?;
        info!(
            "created sender for target address '{}' with reply queue '{}'",
            target.address,
            replies.address()
        );
        connections.push(connection);
        channels.push(RequestChannel { sender, replies });
    }

    let bodies = if args.requests.is_empty() {
        read_lines(&args.input).await?
    } else {
        args.requests.clone()
    };

    let mut responses = 0usize;
    for (n, body) in bodies.iter().enumerate() {
        let idx = n % channels.len();
        let channel = &mut channels[idx];
        let correlation_id = Uuid::new_v4().to_string();

        let mut request = Message::with_generated_id(body.clone());
        request.correlation_id = Some(correlation_id.clone());
        request.reply_to = Some(channel.replies.address().to_string());
        channel.sender.send(request).await?;

        loop {
            let response = channel.replies.recv().await?;
            if response.correlation_id.as_deref() == Some(&correlation_id) {
                println!("{}", response.body);
                responses += 1;
                break;
            }
        }
    }

    info!(
        "received {responses} {}",
        if responses == 1 { "response" } else { "responses" }
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
