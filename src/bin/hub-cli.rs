use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "hub-cli")]
#[command(about = "Management CLI for the exchange hub", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Shared secret for /internal routes.
    #[arg(short, long, env = "EXCHANGE_HUB_INTERNAL_SECRET", default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show hub status and configured peers
    Status,
    /// Show per-peer circuit breaker state
    Breakers,
    /// Send an exchange request through the hub
    Exchange {
        #[arg(short, long)]
        requester: String,
        /// Peer that should answer; omit to ask the hub itself
        #[arg(short, long)]
        target: Option<String>,
        /// Payload document as JSON
        #[arg(short, long, default_value = "{}")]
        payload: String,
    },
    /// Push a record into the hub's local directory
    Push {
        resource: String,
        /// Record as JSON; must carry an "id"
        #[arg(short, long)]
        record: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{}/internal/status", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Breakers => {
            let res = client.get(format!("{}/internal/breakers", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Exchange { requester, target, payload } => {
            let mut payload: Value = serde_json::from_str(&payload)?;
            if let (Some(target), Some(doc)) = (target, payload.as_object_mut()) {
                doc.insert("targetService".to_string(), Value::String(target));
            }
            let res = client.post(format!("{}/exchange", cli.url))
                .json(&json!({ "requesterName": requester, "payload": payload.to_string() }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Push { resource, record } => {
            let record: Value = serde_json::from_str(&record)?;
            let res = client.post(format!("{}/internal/resources/{}", cli.url, resource))
                .headers(headers)
                .json(&record)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: hub returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let mut json: Value = res.json().await?;
    // Exchange answers carry their payload as a JSON string.
    if let Some(payload) = json.get("payload").and_then(Value::as_str) {
        if let Ok(decoded) = serde_json::from_str::<Value>(payload) {
            json["payload"] = decoded;
        }
    }
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
