use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "cache-cli")]
#[command(about = "Ops CLI for the resilient cache health endpoint", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the write/read/delete probe and print the report
    Health,
    /// Show breaker, pool and metrics snapshots
    Status,
    /// Force the circuit breaker closed
    Reset,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let res = match cli.command {
        Commands::Health => client.get(format!("{}/health", cli.url)).send().await?,
        Commands::Status => client.get(format!("{}/status", cli.url)).send().await?,
        Commands::Reset => client.post(format!("{}/breaker/reset", cli.url)).send().await?,
    };
    let healthy = print_response(res).await?;
    if !healthy {
        std::process::exit(1);
    }
    Ok(())
}

/// Health answers 503 with a full report when unhealthy, so print the body either way.
async fn print_response(res: reqwest::Response) -> Result<bool, Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{text}"),
    }
    if !status.is_success() {
        eprintln!("Error: endpoint returned status {}", status);
    }
    Ok(status.is_success())
}
