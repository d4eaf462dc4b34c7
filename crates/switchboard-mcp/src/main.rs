//! Switchboard gateway
//!
//! Usage:
//!   switchboard [serve]                          MCP over stdio
//!   switchboard call <tool> [--action A] [--args JSON]
//!   switchboard tools
//!
//! Configuration is read once from `SWITCHBOARD_*` environment variables.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

use switchboard_core::{GateError, GatewayConfig, OperationResult};
use switchboard_mcp::tools::all_tools;
use switchboard_mcp::{Dispatcher, McpServer};

#[derive(Parser)]
#[command(name = "switchboard")]
#[command(about = "Agent-facing gateway for MCP server management")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve MCP over stdio (default)
    Serve,

    /// Perform one tool call and print the result as JSON
    Call {
        /// Tool name (server, profile, client, config, project, system, share, status)
        tool: String,

        /// Action to perform
        #[arg(short, long)]
        action: Option<String>,

        /// Further arguments as a JSON object
        #[arg(long)]
        args: Option<String>,
    },

    /// Print the tool definitions
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the protocol, logs go to stderr
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Some(Command::Tools) = cli.command {
        println!("{}", serde_json::to_string_pretty(&all_tools())?);
        return Ok(());
    }

    let config = GatewayConfig::from_env().context("Invalid configuration")?;
    let backends = switchboard_adapters::build_backends(&config)
        .await
        .context("Failed to initialise backends")?;
    let dispatcher = Dispatcher::new(backends, config);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            tracing::info!("Starting Switchboard MCP server");
            McpServer::new(dispatcher).run().await?;
        }
        Command::Call { tool, action, args } => {
            let result = match call_arguments(action, args.as_deref()) {
                Ok(arguments) => dispatcher.call(&tool, arguments).await,
                Err(e) => OperationResult::failure(&e),
            };
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Tools => {}
    }

    Ok(())
}

/// Merge `--action` into the `--args` object
fn call_arguments(
    action: Option<String>,
    args: Option<&str>,
) -> Result<Map<String, Value>, GateError> {
    let mut arguments = match args {
        None => Map::new(),
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(GateError::validation("--args must be a JSON object")),
            Err(e) => return Err(GateError::validation(format!("--args is not valid JSON: {}", e))),
        },
    };
    if let Some(action) = action {
        arguments.insert("action".to_string(), Value::String(action));
    }
    Ok(arguments)
}
