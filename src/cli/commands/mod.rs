mod subcommands;


use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kazebot")]
#[command(about = "Webhook-driven chat bot: weather, time, media and an AI assistant")]
#[command(version = crate::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook gateway until Ctrl-C
    Serve {
        /// Config file (defaults to ~/.kazebot/config.json)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long, short = 'p')]
        port: Option<u16>,
    },
    /// Load and validate the configuration, then print it with secrets redacted
    CheckConfig {
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
    /// List the cities the router recognizes
    Cities {
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, host, port } => {
            subcommands::serve(config.as_deref(), host, port).await?;
        }
        Commands::CheckConfig { config } => {
            subcommands::check_config(config.as_deref())?;
        }
        Commands::Cities { config } => {
            subcommands::cities(config.as_deref())?;
        }
    }

    Ok(())
}
