//! course-rag CLI
//!
//! Build the course collection, ask questions and fetch the benchmark data.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use course_rag::{
    agent::{Answer, Conversation, RagAgent},
    config::Config,
    embedding::{ConfiguredEmbedder, Embedder},
    eval::{dataset, download},
    ingest::Ingestor,
    llm::LlmClient,
    persistence::collection_size,
    splitter::TextSplitter,
    store::VectorStore,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Course document question answering with retrieval-augmented generation
#[derive(Parser)]
#[command(name = "course-rag")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load documents into the vector collection
    Ingest {
        /// Files or directories to ingest
        #[arg(default_value = "data")]
        paths: Vec<PathBuf>,

        /// Drop the existing collection first
        #[arg(long)]
        clear: bool,
    },

    /// Answer a single question
    Ask {
        /// The question
        query: String,

        /// Number of chunks to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Interactive question answering with conversation history
    Chat,

    /// Show information about the collection
    Info,

    /// Test LLM and embedding connections
    Test,

    /// Download course PDFs and QA splits from the Hugging Face Hub
    Download {
        /// Only download the PDFs
        #[arg(long, conflicts_with = "qa")]
        pdf: bool,

        /// Only download the QA splits
        #[arg(long)]
        qa: bool,

        /// Directory for the PDFs
        #[arg(long, default_value = "data")]
        pdf_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Ingest { paths, clear } => cmd_ingest(config, paths, clear).await,
        Commands::Ask { query, top_k } => cmd_ask(config, query, top_k).await,
        Commands::Chat => cmd_chat(config).await,
        Commands::Info => cmd_info(config),
        Commands::Test => cmd_test(config).await,
        Commands::Download { pdf, qa, pdf_dir } => {
            cmd_download(config, !qa || pdf, !pdf || qa, &pdf_dir).await
        }
    }
}

fn open_store(config: &Config) -> Result<VectorStore<ConfiguredEmbedder>> {
    let embedder =
        ConfiguredEmbedder::from_config(&config.resolved_embedding(), config.llm.max_retries)
            .context("Failed to create embedder")?;
    VectorStore::open(&config.store, embedder).context("Failed to open vector collection")
}

fn build_agent(config: &Config) -> Result<RagAgent<ConfiguredEmbedder, LlmClient>> {
    let store = open_store(config)?;
    if store.is_empty() {
        anyhow::bail!(
            "Collection '{}' is empty. Run 'ingest' first.",
            config.store.collection
        );
    }
    Ok(RagAgent::new(
        store,
        LlmClient::new(config.llm.clone()),
        config.rag.clone(),
    ))
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.text);
    if !answer.sources.is_empty() {
        println!("\nSources:");
        for (i, source) in answer.sources.iter().enumerate() {
            println!("  [{}] {}", i + 1, source);
        }
    }
}

async fn cmd_ingest(config: Config, paths: Vec<PathBuf>, clear: bool) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let mut store = open_store(&config)?;
    if clear {
        println!("Clearing collection '{}'...", config.store.collection);
        store.clear();
    }

    println!("Ingesting {} path(s)...", paths.len());
    println!("Using embedding model: {}", store.embedder().model_id());

    let start = Instant::now();
    let report = Ingestor::new(&mut store, TextSplitter::from_config(&config.chunking))
        .ingest_paths(&paths)
        .await
        .context("Ingestion failed")?;

    println!("\nIngestion finished:");
    for doc in &report.documents {
        println!("  {} ({} pages, {} chunks)", doc.name, doc.pages, doc.chunks);
    }
    for skipped in &report.skipped {
        println!("  skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    println!("  Documents:   {}", report.documents.len());
    println!("  Chunks:      {}", report.total_chunks());
    println!("  Collection:  {} records", store.len());
    println!("  Time:        {:.2?}", start.elapsed());
    println!("\nSaved to: {}", store.path().display());

    Ok(())
}

async fn cmd_ask(mut config: Config, query: String, top_k: Option<usize>) -> Result<()> {
    if let Some(k) = top_k {
        config.rag.top_k = k;
    }
    config.validate().context("Invalid configuration")?;

    let agent = build_agent(&config)?;

    println!("Question: {}", query);
    println!("Using model: {}\n", config.llm.model);

    let answer = agent
        .answer_question(&query, None)
        .await
        .context("Failed to answer question")?;
    print_answer(&answer);

    Ok(())
}

async fn cmd_chat(config: Config) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let agent = build_agent(&config)?;
    let mut conversation = Conversation::new(config.rag.max_history_turns);

    println!("Course assistant ({} records)", agent.store().len());
    println!("Type a question, 'clear' to reset history, 'exit' to quit.\n");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        match line.trim() {
            "" => continue,
            "exit" | "quit" => break,
            "clear" => {
                conversation.clear();
                println!("History cleared.\n");
            }
            query => match agent.chat_turn(&mut conversation, query).await {
                Ok(answer) => {
                    print_answer(&answer);
                    println!();
                }
                Err(e) => println!("Error: {}\n", e),
            },
        }
    }

    Ok(())
}

fn cmd_info(config: Config) -> Result<()> {
    let path = config.store.collection_file();
    if !path.exists() {
        anyhow::bail!(
            "Collection not found at '{}'. Run 'ingest' command first.",
            path.display()
        );
    }

    let store = open_store(&config)?;
    let collection = store.collection();
    let size = collection_size(&path)?;

    println!("Collection Information");
    println!("{}", "─".repeat(40));
    println!("  Name:         {}", collection.name);
    println!("  Records:      {}", store.len());
    println!("  Embeddings:   {}", collection.embedding_model);
    if let Some(dim) = collection.dimension {
        println!("  Dimension:    {}", dim);
    }
    println!("  File size:    {:.1} KB", size as f64 / 1024.0);
    println!("  Path:         {}", path.display());

    let sources = store.sources();
    println!("  Documents:    {}", sources.len());
    for source in sources {
        println!("    - {}", source);
    }

    Ok(())
}

async fn cmd_test(config: Config) -> Result<()> {
    println!("Testing connections...\n");

    println!("Configuration:");
    println!("  API Base:  {}", config.llm.api_base);
    println!("  Model:     {}", config.llm.model);
    println!(
        "  API Key:   {}...",
        config.llm.api_key.chars().take(8).collect::<String>()
    );
    println!("  Embedding: {}", config.embedding.model);
    println!();

    if let Err(e) = config.validate() {
        println!("Configuration error: {}", e);
        return Ok(());
    }

    println!("Sending chat request...");
    match LlmClient::new(config.llm.clone()).test_connection().await {
        Ok(()) => println!("Chat connection successful!"),
        Err(e) => println!("Chat connection failed: {}", e),
    }

    println!("Sending embedding request...");
    let embedder =
        ConfiguredEmbedder::from_config(&config.resolved_embedding(), config.llm.max_retries)?;
    match embedder.embed_one("hello").await {
        Ok(vector) => println!("Embedding successful ({} dimensions)", vector.len()),
        Err(e) => println!("Embedding failed: {}", e),
    }

    Ok(())
}

async fn cmd_download(config: Config, pdfs: bool, qa: bool, pdf_dir: &Path) -> Result<()> {
    if pdfs {
        println!("Downloading PDFs from {}...", download::PDF_REPO_ID);
        let report = download::download_pdfs(pdf_dir).await?;
        report.print("PDF Download Summary", pdf_dir);
    }

    if qa {
        let qa_dir = &config.benchmark.qa_data_dir;
        let splits = dataset::resolve_splits(&config.benchmark.splits)?;
        println!("Downloading QA splits from {}...", download::QA_REPO_ID);
        let report = download::download_qa_splits(qa_dir, &splits).await?;
        report.print("QA Dataset Download Summary", qa_dir);
    }

    Ok(())
}
