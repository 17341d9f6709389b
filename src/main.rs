//! Thin CLI shell: resolves configuration once at the boundary and dispatches
//! to the engines. All pipeline logic lives in the library.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use varcite::config::PipelineConfig;
use varcite::llm::OllamaCompletionClient;
use varcite::pipeline::{
    AggregationEngine, AnnotationEngine, ExtractionEngine, PromptSet,
};
use varcite::storage::FsObjectStore;

#[derive(Parser)]
#[command(name = "varcite", version, about = "Citation-grounded variant evidence pipeline")]
struct Cli {
    /// Root directory of the object store.
    #[arg(long, env = "VARCITE_STORAGE_ROOT")]
    storage_root: PathBuf,

    /// Model identifier passed to the completion service.
    #[arg(long, env = "VARCITE_MODEL")]
    model: String,

    /// Base URL of the completion service.
    #[arg(long, env = "VARCITE_COMPLETION_URL", default_value = "http://localhost:11434")]
    completion_url: String,

    /// Prompt/schema set key.
    #[arg(long, env = "VARCITE_PROMPT_SET", default_value = "acmg")]
    prompt_set: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract evidence for a variant from one paper.
    Extract {
        #[arg(long)]
        variant_id: String,
        #[arg(long)]
        doi: String,
    },
    /// Aggregate evidence for a variant across its paper set.
    Aggregate {
        #[arg(long)]
        variant_id: String,
        /// Repeatable; the full candidate paper set for the variant.
        #[arg(long = "doi")]
        dois: Vec<String>,
    },
    /// Write annotated PDFs from the persisted aggregate.
    Annotate {
        #[arg(long)]
        variant_id: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let Some(prompt_set) = PromptSet::from_key(&cli.prompt_set) else {
        return Err(format!("unknown prompt set: {}", cli.prompt_set).into());
    };

    let mut config = PipelineConfig::new(cli.model);
    config.completion_url = cli.completion_url;
    config.prompt_set = prompt_set;

    let store = FsObjectStore::new(cli.storage_root);

    match cli.command {
        Command::Extract { variant_id, doi } => {
            let client = OllamaCompletionClient::new(
                &config.completion_url,
                &config.model,
                config.request_timeout_secs,
                config.think,
            )?;
            let engine = ExtractionEngine::new(&store, &client, &config);
            engine.extract(&variant_id, &doi)?;
        }
        Command::Aggregate { variant_id, dois } => {
            let client = OllamaCompletionClient::new(
                &config.completion_url,
                &config.model,
                config.request_timeout_secs,
                config.think,
            )?;
            let engine = AggregationEngine::new(&store, &client, &config);
            engine.aggregate(&variant_id, &dois)?;
        }
        Command::Annotate { variant_id } => {
            let engine = AnnotationEngine::new(&store);
            engine.annotate(&variant_id)?;
        }
    }

    Ok(())
}
