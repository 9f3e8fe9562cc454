use clap::{Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Send traffic through a running relay-proxy", long_about = None)]
struct Cli {
    /// Base URL of the HTTP relay
    #[arg(long, default_value = "http://127.0.0.1:3010")]
    http_url: String,

    /// URL of the WebSocket relay
    #[arg(long, default_value = "ws://127.0.0.1:3011")]
    ws_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Relay one HTTP request and print the mirrored response
    Http {
        #[arg(short, long, default_value = "GET")]
        method: String,
        /// Target URL
        #[arg(long)]
        url: String,
        /// Header as `name: value`, repeatable
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
        /// JSON payload
        #[arg(long)]
        payload: Option<String>,
    },
    /// Open a WebSocket relay session; stdin lines become data frames
    Ws {
        /// Upstream WebSocket URL
        #[arg(long)]
        target: String,
        /// Header as `name: value`, repeatable
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Http {
            method,
            url,
            headers,
            payload,
        } => {
            let mut body = json!({
                "method": method,
                "url": url,
                "headers": parse_headers(&headers)?,
            });
            if let Some(payload) = payload {
                body["payload"] = serde_json::from_str(&payload)?;
            }

            let res = reqwest::Client::new()
                .post(format!("{}/proxy", cli.http_url.trim_end_matches('/')))
                .json(&body)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Ws { target, headers } => {
            let (stream, _) = connect_async(cli.ws_url.as_str()).await?;
            let (mut write, mut read) = stream.split();

            let connect = json!({ "url": target, "headers": parse_headers(&headers)? });
            write.send(Message::Text(connect.to_string().into())).await?;

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                tokio::select! {
                    line = lines.next_line() => match line? {
                        Some(line) if line.trim().is_empty() => {}
                        Some(line) => write.send(Message::Text(line.into())).await?,
                        None => {
                            write.send(Message::Close(None)).await?;
                            break;
                        }
                    },
                    frame = read.next() => match frame {
                        Some(Ok(Message::Text(text))) => println!("{}", text.as_str()),
                        Some(Ok(Message::Binary(bytes))) => println!("<{} bytes>", bytes.len()),
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                    },
                }
            }
        }
    }

    Ok(())
}

fn parse_headers(raw: &[String]) -> Result<Value, Box<dyn std::error::Error>> {
    let mut headers = Map::new();
    for header in raw {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| format!("header '{}' is not `name: value`", header))?;
        headers.insert(name.trim().to_string(), Value::String(value.trim().to_string()));
    }
    Ok(Value::Object(headers))
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    println!("{}", status);

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
