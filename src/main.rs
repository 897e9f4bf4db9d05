use std::path::Path;

use anyhow::Context;
use clap::Parser;
use fusionrag::cli::handlers::*;
use fusionrag::cli::Cli;
use fusionrag::cli::Commands;
use fusionrag::config::AppConfig;
use tracing::info;

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => AppConfig::load().context("Failed to load configuration"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Offline fusion works without a config file
    let config = match (&cli.command, load_config(cli.config.as_deref())) {
        (_, Ok(config)) => config,
        (Commands::Fuse { .. }, Err(e)) if cli.config.is_none() => {
            eprintln!("{e:#}; using defaults");
            AppConfig::default()
        }
        (_, Err(e)) => return Err(e),
    };

    // Initialize logging
    if cli.verbose {
        fusionrag::logging::init_logging_with_level("debug")?;
    } else {
        fusionrag::logging::init_logging_with_config(Some(&config))?;
    }
    info!("Configuration loaded successfully");
    if fusionrag::logging::configure_backtrace(&config.logging) {
        info!("Error backtraces enabled");
    }

    // Execute the requested command
    match cli.command {
        Commands::Fuse { file, k, top_k } => {
            handle_fuse(&config, &file, k, top_k)
                .with_context(|| format!("Failed to fuse {}", file.display()))?;
        }
        Commands::Expand { query, num_queries } => {
            handle_expand(&config, &query, num_queries).await?;
        }
        Commands::Ingest { file, force } => {
            handle_ingest(&config, &file, force)
                .await
                .with_context(|| format!("Failed to ingest {}", file.display()))?;
        }
        Commands::Query {
            question,
            basic,
            rerank,
            fields,
            json,
        } => {
            handle_query(&config, &question, basic, rerank, fields, json)
                .await
                .context("RAG query failed")?;
        }
        Commands::Clean => {
            handle_clean(&config)
                .await
                .context("Failed to delete collection")?;
        }
        Commands::Check => {
            handle_check(&config).context("Configuration check failed")?;
        }
        Commands::Config => {
            handle_config(&config)?;
        }
    }

    Ok(())
}
