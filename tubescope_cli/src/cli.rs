use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "tubescope")]
#[command(about = "Detect recurring content series in YouTube analytics exports")]
#[command(version)]
#[command(after_help = "\x1b[1;36mQuick Start:\x1b[0m
  tubescope detect export.csv                 Analyze a single Studio export
  tubescope detect channels.zip               Analyze a ZIP of per-channel exports
  tubescope detect exports/ --no-ai           Pattern detection only, no API calls
  tubescope detect https://host/export.zip    Fetch and analyze a remote export

\x1b[1;36mAuthentication:\x1b[0m
  Set ANTHROPIC_API_KEY (or pass --api-key) to enable semantic clustering
  of videos the title patterns cannot group.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse an export and detect content series
    Detect {
        /// Export file (.csv or .zip), directory of .csv files, or URL
        input: String,

        /// Channel label when the export itself does not name one
        #[arg(long)]
        channel: Option<String>,

        /// Skip the semantic clustering stage even if a key is available
        #[arg(long)]
        no_ai: bool,

        /// Anthropic model to use for semantic clustering
        #[arg(long)]
        model: Option<String>,

        /// Anthropic API key
        #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },
}
