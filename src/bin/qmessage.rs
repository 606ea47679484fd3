//! qmessage: emit newline-delimited JSON messages on stdout, one
//! `{id, body}` object per line, for piping into `qsend` or `qrequest`.

use clap::Parser;
use serde_json::json;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "qmessage", about = "Generate messages")]
struct Args {
    /// Number of messages to generate
    #[arg(short, long, value_name = "COUNT", default_value_t = 1)]
    count: u64,

    /// Use BODY for every message instead of generated content
    #[arg(long, value_name = "BODY")]
    body: Option<String>,
}

fn main() {
    let args = Args::parse();

    for n in 1..=args.count {
        let body = args
            .body
            .clone()
            .unwrap_or_else(|| format!("message-{n}"));
        let message = json!({
            "id": Uuid::new_v4().to_string(),
            "body": body,
        });
        println!("{message}");
    }
}
