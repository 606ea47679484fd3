//! qrespond: consume requests from a queue and send back processed
//! responses.
//!
//! The "processing" is uppercasing the request body. Responses go to each
//! request's reply-to address through an anonymous sender link, carrying the
//! request's correlation id (or its message id when no correlation id was
//! set).

use clap::Parser;
use qtools::broker::message::Message;
use qtools::client::Connection;
use qtools::transport::url::parse_address_url;
use qtools::utils::error::Result;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "qrespond", about = "Respond to requests")]
struct Args {
    /// The location of a request source
    #[arg(value_name = "ADDRESS-URL")]
    url: String,

    /// Exit after processing COUNT requests
    #[arg(short, long, value_name = "COUNT")]
    count: Option<u64>,
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
    let target = parse_address_url(&args.url)?;
    let connection = Connection::connect(&target.host, target.port).await?;
    let mut requests = connection.attach_receiver(Some(&target.address)).await?;
    let mut replies = connection.attach_sender(None).await?;
    info!("processing requests from '{}'", target.address);

    let mut processed = 0u64;
    loop {
        let request = requests.recv().await?;

        let Some(reply_to) = request.reply_to.clone() else {
            warn!("discarding request without a reply-to address");
            continue;
        };

        let mut response = Message::with_generated_id(request.body.to_uppercase());
        response.to = Some(reply_to);
        response.correlation_id = request.correlation_id.clone().or_else(|| {
            if request.id.is_empty() {
                None
            } else {
                Some(request.id.clone())
            }
        });
        replies.send(response).await?;

        processed += 1;
        if Some(processed) == args.count {
            break;
        }
    }

    info!(
        "processed {processed} {}",
        if processed == 1 { "request" } else { "requests" }
    );
    Ok(())
}
