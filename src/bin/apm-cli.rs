use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "apm-cli")]
#[command(about = "Management CLI for the APM workload generator", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    /// Bearer key for error-rate updates, if the service requires one.
    #[arg(short, long)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current global error rate
    GetErrorRate,
    /// Set the global error rate (percent, 0-100)
    SetErrorRate { value: f64 },
    /// Show request counters and uptime
    Stats,
    /// Probe the health endpoint
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }

    let res = match cli.command {
        Commands::GetErrorRate => {
            client.get(format!("{}/api/get-error-rate", cli.url)).send().await?
        }
        Commands::SetErrorRate { value } => {
            client
                .post(format!("{}/api/set-error-rate", cli.url))
                .headers(headers)
                .json(&json!({ "error_rate": value }))
                .send()
                .await?
        }
        Commands::Stats => client.get(format!("{}/api/stats", cli.url)).send().await?,
        Commands::Health => client.get(format!("{}/health", cli.url)).send().await?,
    };
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
