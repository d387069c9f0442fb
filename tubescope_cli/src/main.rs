use clap::Parser;
use owo_colors::OwoColorize;
use std::process;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tubescope_core::detect::DetectionPipeline;
use tubescope_core::llm::AnthropicClient;
use tubescope_core::{ingest_path, ingest_url, PipelineError, VideoRecord};

mod cli;
mod output;

use cli::{Cli, Commands, OutputFormat};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tubescope_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let format = cli.output;
    if let Err(e) = run(cli).await {
        match format {
            OutputFormat::Json => eprintln!("{}", e.to_json()),
            OutputFormat::Pretty => {
                eprintln!("{}: {}", "Error".red().bold(), e.user_message());
                eprintln!("  {}", e);
            }
        }
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), PipelineError> {
    match cli.command {
        Commands::Detect {
            input,
            channel,
            no_ai,
            model,
            api_key,
        } => {
            let records = ingest(&input).await?;
            if records.is_empty() {
                return Err(PipelineError::InvalidInput(format!(
                    "no video rows found in {}",
                    input
                )));
            }

            let channel = channel
                .or_else(|| records.first().map(|r| r.channel.clone()))
                .unwrap_or_else(|| "channel".to_string());

            let mut pipeline = DetectionPipeline::new();
            if !no_ai {
                match AnthropicClient::new(api_key, model) {
                    Ok(client) => pipeline = pipeline.with_llm(Arc::new(client)),
                    // Run pattern-only instead of refusing outright.
                    Err(err) => warn!("semantic stage disabled: {}", err),
                }
            }

            let report = pipeline.run(&records, &channel).await?;
            output::render(&report, cli.output)?;
        }
    }
    Ok(())
}

async fn ingest(input: &str) -> Result<Vec<VideoRecord>, PipelineError> {
    if input.starts_with("http://") || input.starts_with("https://") {
        ingest_url(input).await
    } else {
        ingest_path(input)
    }
}
