//! CLI command definitions and argument parsing

use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

#[derive(Parser)]
#[command(name = "fusionrag")]
#[command(about = "RAG-Fusion CLI: multi-query retrieval with reciprocal rank fusion")]
#[command(version)]
pub struct Cli {
    /// Enable verbose debug logging (default: info level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (default: config.toml, then config.example.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fuse ranked lists from a JSON file (array of arrays of documents)
    Fuse {
        /// Path to the JSON file
        file: PathBuf,
        /// RRF smoothing constant (default: fusion.k from config)
        #[arg(long)]
        k: Option<f64>,
        /// Keep only the best N fused documents
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Expand a query into related queries
    Expand {
        /// Query to expand
        query: String,
        /// Number of queries to generate
        #[arg(short = 'n', long, default_value = "3")]
        num_queries: usize,
    },
    /// Ingest a text file into the vector store, one document per non-empty line
    Ingest {
        /// Path to the text file
        file: PathBuf,
        /// Add documents even if the collection already has some
        #[arg(short, long)]
        force: bool,
    },
    /// Answer a question with the full RAG pipeline
    Query {
        /// Question to answer
        question: String,
        /// Use single-query retrieval instead of RAG-Fusion
        #[arg(long)]
        basic: bool,
        /// Rerank results (basic retrieval only)
        #[arg(long, requires = "basic")]
        rerank: bool,
        /// Extract these comma-separated fields from the answer as JSON
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete the vector collection
    Clean,
    /// Validate configuration and report the resolved LLM provider
    Check,
    /// Show current configuration
    Config,
}
