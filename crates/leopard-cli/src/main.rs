//! CLI binary for running one-shot LLM inferences.

use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use leopard_llm::{CancellationToken, InferenceClient};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "leopard", version, about = "Send a prompt to an LLM backend and print the JSON it answers with")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// YAML config file (default: $LLM_CONFIG_PATH)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Provider id, overriding ACTIVE_PROVIDER / LLM_PROVIDER
    #[arg(short, long, global = true)]
    provider: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one inference and print the resulting JSON
    Infer {
        /// Prompt text, or "-" to read it from stdin
        prompt: String,
    },

    /// Show the resolved provider configuration
    Config,

    /// Print the request that would be sent, without sending it
    Request {
        /// Prompt text, or "-" to read it from stdin
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing; stdout is reserved for the JSON result
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let client = InferenceClient::from_env(cli.provider.as_deref(), cli.config.as_deref())?;

    match cli.command {
        Commands::Infer { prompt } => {
            cmd_infer(&client, &read_prompt(&prompt)?).await?;
        }
        Commands::Config => {
            cmd_config(&client);
        }
        Commands::Request { prompt } => {
            cmd_request(&client, &read_prompt(&prompt)?)?;
        }
    }

    Ok(())
}

fn read_prompt(arg: &str) -> anyhow::Result<String> {
    if arg != "-" {
        return Ok(arg.to_string());
    }
    let mut prompt = String::new();
    std::io::stdin().read_to_string(&mut prompt)?;
    Ok(prompt)
}

async fn cmd_infer(client: &InferenceClient, prompt: &str) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling inference");
            on_interrupt.cancel();
        }
    });

    let result = client.infer_with_cancel(prompt, &cancel).await;
    println!("{}", result.to_pretty_json());

    if !result.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_config(client: &InferenceClient) {
    let config = client.config();
    let base_url = if config.base_url().is_empty() {
        "(missing)"
    } else {
        config.base_url()
    };

    println!("Provider: {}", config.provider_id());
    println!("Dialect: {}", client.dialect().name());
    println!("Model: {}", config.model_name());
    println!("Base URL: {}", base_url);
    println!(
        "API key: {}",
        if config.has_api_key() { "present" } else { "absent" }
    );
    println!("Max retries: {}", config.max_retries());
    println!("Timeout: {}s", config.timeout().as_secs());
    println!("Registered providers: {}", client.registry().ids().join(", "));
}

fn cmd_request(client: &InferenceClient, prompt: &str) -> anyhow::Result<()> {
    let request = client.prepare(prompt);
    let base_url = client.config().base_url();
    let endpoint = if base_url.is_empty() {
        request.redacted_path().to_string()
    } else {
        format!("{}{}", base_url, request.redacted_path())
    };

    let headers: Vec<&str> = request.headers.iter().map(|(k, _)| k.as_str()).collect();
    println!("POST {}", endpoint);
    println!("Headers: {}", headers.join(", "));
    println!("{}", serde_json::to_string_pretty(&request.body)?);
    Ok(())
}
