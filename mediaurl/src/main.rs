mod cli;
mod commands;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use mediaurl_client::{Client, ClientConfig};
use mediaurl_core::observability::{init_tracing, TracingMode};
use serde_json::Value;

#[tokio::main]
async fn main() -> Result<()> {
    mediaurl_core::config::load_dotenv();
    let cli = Cli::parse();
    init_tracing(if cli.verbose {
        TracingMode::Verbose
    } else {
        TracingMode::Default
    });

    let mut config = ClientConfig::from_env();
    if let Some(legacy_routes) = cli.legacy_routes {
        config.legacy_routes = legacy_routes;
    }
    if let Some(ms) = cli.timeout {
        config.endpoint_test_timeout = Duration::from_millis(ms);
    }

    match cli.command {
        Commands::Candidates { input } => {
            print_json(&commands::candidates(&input))?;
        }
        Commands::Discover { input } => {
            let client = Client::new(config).context("Failed to create HTTP client")?;
            let addons = commands::discover(&client, &input).await?;
            print_json(&Value::Array(addons))?;
        }
        Commands::Call {
            url,
            action,
            input,
            signature,
        } => {
            let input = match input.as_deref() {
                Some("-") => {
                    let mut s = String::new();
                    std::io::Read::read_to_string(&mut std::io::stdin(), &mut s)
                        .context("Failed to read input from stdin")?;
                    s
                }
                Some(s) => s.to_string(),
                None => "{}".to_string(),
            };
            let input: Value =
                serde_json::from_str(&input).context("Input is not valid JSON")?;
            let client = Client::new(config).context("Failed to create HTTP client")?;
            let result = commands::call(&client, &url, &action, input, signature).await?;
            print_json(&result)?;
        }
    }
    Ok(())
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
