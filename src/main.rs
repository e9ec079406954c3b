use clap::{Args, Parser, Subcommand};
use policy_rag::Result;
use policy_rag::commands::{
    ask_question, ingest_documents, list_values, remove_document, reset_index, run_chat,
    show_stats, show_status,
};
use policy_rag::config::{get_config_dir, run_interactive_config, show_config};
use policy_rag::documents::{MetadataDefaults, MetadataField};
use policy_rag::index::MetadataFilter;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "policy-rag")]
#[command(about = "Answer questions about organizational policies from indexed PDF documents")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the index (defaults to ~/.policy-rag)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Metadata values, used as ingest defaults or as query filters
#[derive(Args, Debug, Default)]
struct MetadataArgs {
    /// Department, e.g. "HR"
    #[arg(long)]
    department: Option<String>,
    /// Region, e.g. "North America"
    #[arg(long)]
    region: Option<String>,
    /// Policy type, e.g. "Compliance"
    #[arg(long)]
    policy_type: Option<String>,
}

impl MetadataArgs {
    fn into_defaults(self) -> MetadataDefaults {
        MetadataDefaults {
            department: self.department,
            region: self.region,
            policy_type: self.policy_type,
        }
    }

    fn into_filter(self) -> Result<MetadataFilter> {
        let mut filter = MetadataFilter::new();
        for (field, value) in [
            (MetadataField::Department, self.department),
            (MetadataField::Region, self.region),
            (MetadataField::PolicyType, self.policy_type),
        ] {
            if let Some(value) = value {
                filter.insert(field, value)?;
            }
        }
        Ok(filter)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama, retrieval and generation settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Extract, chunk and index every PDF in a directory
    Ingest {
        /// Directory containing policy PDFs
        dir: PathBuf,
        /// CSV with per-file metadata (filename, department, region, policy_type, effective_date, description)
        #[arg(long)]
        metadata: Option<PathBuf>,
        #[command(flatten)]
        defaults: MetadataArgs,
    },
    /// Ask a single question
    Ask {
        question: String,
        #[command(flatten)]
        filter: MetadataArgs,
        /// Number of passages to retrieve
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Start an interactive question session
    Chat {
        #[command(flatten)]
        filter: MetadataArgs,
    },
    /// Show indexed documents and their chunk counts
    Stats,
    /// List distinct values of a metadata field
    Values {
        /// filename, department, region, policy_type, effective_date or description
        field: String,
    },
    /// Remove a document from the index
    Remove {
        /// File name as ingested, e.g. "expense_policy.pdf"
        filename: String,
    },
    /// Delete all indexed content
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Show the status of Ollama, the index and the generation API
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config_dir = get_config_dir(cli.config_dir)?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Ingest {
            dir,
            metadata,
            defaults,
        } => {
            ingest_documents(
                &config_dir,
                &dir,
                metadata.as_deref(),
                &defaults.into_defaults(),
            )
            .await?;
        }
        Commands::Ask {
            question,
            filter,
            k,
        } => {
            ask_question(&config_dir, &question, &filter.into_filter()?, k).await?;
        }
        Commands::Chat { filter } => {
            run_chat(&config_dir, filter.into_filter()?).await?;
        }
        Commands::Stats => {
            show_stats(&config_dir).await?;
        }
        Commands::Values { field } => {
            list_values(&config_dir, &field).await?;
        }
        Commands::Remove { filename } => {
            remove_document(&config_dir, &filename).await?;
        }
        Commands::Reset { yes } => {
            reset_index(&config_dir, yes).await?;
        }
        Commands::Status => {
            show_status(&config_dir).await?;
        }
    }

    Ok(())
}
