//! knowbase CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use knowbase::{
    commands::{
        cmd_add, cmd_chunks, cmd_faq_add, cmd_faq_embed, cmd_faq_list, cmd_faq_remove,
        cmd_faq_update, cmd_init, cmd_list, cmd_remove, cmd_retry, cmd_search, cmd_show,
        cmd_stats, cmd_update, print_chunks, print_document, print_documents, print_embed_stats,
        print_faqs, print_hits, print_stats, App,
    },
    config::Config,
    db::DocumentStatus,
    error::Result,
    search::Corpus,
};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "knowbase")]
#[command(version, about = "Local knowledge base with semantic retrieval", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize knowbase configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Upload and ingest a document (PDF or plain text)
    Add {
        /// Path to the file
        path: PathBuf,

        /// Display title (defaults to the file name)
        #[arg(short, long)]
        title: Option<String>,
    },

    /// List documents
    List {
        /// Filter by status (uploading, processing, completed, failed)
        #[arg(long)]
        status: Option<DocumentStatus>,

        /// Only show active documents
        #[arg(long)]
        active: bool,

        /// Maximum number of documents
        #[arg(short, long, default_value = "50")]
        limit: i64,

        /// Listing offset
        #[arg(long, default_value = "0")]
        offset: i64,
    },

    /// Show one document with its ingestion details
    Show {
        /// Document ID
        id: String,

        /// Also print the stored chunks
        #[arg(long)]
        chunks: bool,
    },

    /// Update a document's title or active flag
    Update {
        /// Document ID
        id: String,

        /// New title
        #[arg(short, long)]
        title: Option<String>,

        /// Include in search results
        #[arg(long, conflicts_with = "deactivate")]
        activate: bool,

        /// Exclude from search results
        #[arg(long)]
        deactivate: bool,
    },

    /// Remove a document, its chunks and its stored file
    Remove {
        /// Document ID
        id: String,
    },

    /// Retry ingestion of a failed document
    Retry {
        /// Document ID
        id: String,
    },

    /// Search documents and FAQs
    Search {
        /// The search query
        query: String,

        /// Which corpus to search
        #[arg(long, value_enum, default_value = "both")]
        corpus: Corpus,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Minimum similarity score (0-1)
        #[arg(short, long)]
        min_score: Option<f32>,
    },

    /// Manage FAQ entries
    Faq {
        #[command(subcommand)]
        action: FaqAction,
    },

    /// Show corpus statistics
    Stats,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum FaqAction {
    /// Add a FAQ entry (embedded immediately)
    Add {
        /// The question
        question: String,
        /// The answer
        answer: String,
    },

    /// List FAQ entries
    List,

    /// Update a FAQ entry
    Update {
        /// FAQ ID
        id: String,

        /// New question
        #[arg(short, long)]
        question: Option<String>,

        /// New answer
        #[arg(short, long)]
        answer: Option<String>,

        /// Include in search results
        #[arg(long, conflicts_with = "deactivate")]
        activate: bool,

        /// Exclude from search results
        #[arg(long)]
        deactivate: bool,
    },

    /// Remove a FAQ entry
    Remove {
        /// FAQ ID
        id: String,
    },

    /// Generate missing FAQ embeddings
    Embed {
        /// Embed only this FAQ
        id: Option<String>,

        /// Re-embed FAQs that already have an embedding
        #[arg(long)]
        force: bool,
    },
}

fn active_flag(activate: bool, deactivate: bool) -> Option<bool> {
    match (activate, deactivate) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Handle init command specially (doesn't need existing config)
    if let Commands::Init { force } = cli.command {
        let base_dir = cli.config.as_deref().and_then(|p| p.parent()).map(PathBuf::from);
        cmd_init(base_dir, force).await?;
        println!("✓ knowbase initialized");
        println!("\nNext steps:");
        println!("  1. Edit the config file to pick an embedding provider");
        println!("  2. Add a document: knowbase add manual.pdf");
        println!("  3. Search it: knowbase search \"how do I return an item\"");
        return Ok(());
    }

    // Handle completions command (doesn't need config/db)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "knowbase", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    let app = App::new(config).await?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Add { path, title } => {
            let detail = cmd_add(&app, &path, title).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&detail)?);
            } else {
                println!("✓ Document ingested");
                print_document(&detail);
            }
        }

        Commands::List {
            status,
            active,
            limit,
            offset,
        } => {
            let page = cmd_list(&app, status, active, limit, offset).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&page)?);
            } else {
                print_documents(&page);
            }
        }

        Commands::Show { id, chunks } => {
            let detail = cmd_show(&app, &id).await?;
            if chunks {
                let chunk_rows = cmd_chunks(&app, &id).await?;
                if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&serde_json::json!({
                            "document": detail,
                            "chunks": chunk_rows,
                        }))?
                    );
                } else {
                    print_document(&detail);
                    println!();
                    print_chunks(&chunk_rows);
                }
            } else if cli.json {
                println!("{}", serde_json::to_string_pretty(&detail)?);
            } else {
                print_document(&detail);
            }
        }

        Commands::Update {
            id,
            title,
            activate,
            deactivate,
        } => {
            let doc = cmd_update(&app, &id, title, active_flag(activate, deactivate)).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&doc)?);
            } else {
                println!("✓ Document '{}' updated", doc.id);
            }
        }

        Commands::Remove { id } => {
            cmd_remove(&app, &id).await?;
            if cli.json {
                println!(r#"{{"status": "ok"}}"#);
            } else {
                println!("✓ Document '{}' removed", id);
            }
        }

        Commands::Retry { id } => {
            let detail = cmd_retry(&app, &id).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&detail)?);
            } else {
                println!("✓ Retry finished");
                print_document(&detail);
            }
        }

        Commands::Search {
            query,
            corpus,
            limit,
            min_score,
        } => {
            let hits = cmd_search(&app, &query, corpus, limit, min_score).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                print_hits(&hits);
            }
        }

        Commands::Faq { action } => {
            handle_faq_action(&app, action, cli.json).await?;
        }

        Commands::Stats => {
            let stats = cmd_stats(&app).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_stats(&stats);
            }
        }
    }

    Ok(())
}

async fn handle_faq_action(app: &App, action: FaqAction, json: bool) -> Result<()> {
    match action {
        FaqAction::Add { question, answer } => {
            let faq = cmd_faq_add(app, question, answer).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&faq)?);
            } else {
                println!("✓ FAQ '{}' created", faq.id);
            }
        }

        FaqAction::List => {
            let faqs = cmd_faq_list(app).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&faqs)?);
            } else {
                print_faqs(&faqs);
            }
        }

        FaqAction::Update {
            id,
            question,
            answer,
            activate,
            deactivate,
        } => {
            let faq = cmd_faq_update(
                app,
                &id,
                question,
                answer,
                active_flag(activate, deactivate),
            )
            .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&faq)?);
            } else {
                println!("✓ FAQ '{}' updated", faq.id);
                if faq.embedding.is_none() {
                    println!("  Embedding cleared; run 'knowbase faq embed'");
                }
            }
        }

        FaqAction::Remove { id } => {
            cmd_faq_remove(app, &id).await?;
            if json {
                println!(r#"{{"status": "ok"}}"#);
            } else {
                println!("✓ FAQ '{}' removed", id);
            }
        }

        FaqAction::Embed { id, force } => {
            let stats = cmd_faq_embed(app, id.as_deref(), force).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_embed_stats(&stats);
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_config_path);

    if !config_path.exists() {
        eprintln!(
            "Config file not found: {}\nRun 'knowbase init' first.",
            config_path.display()
        );
        std::process::exit(1);
    }

    Config::load(&config_path)
}
