//! Benchmark CLI for the course assistant.
//!
//! Usage:
//!   benchmark run                      # Answer, judge, save and chart every split
//!   benchmark answer -i <qa.csv>       # Answer step only
//!   benchmark evaluate -i <answers>    # Judge step only
//!   benchmark visualize -i <results>   # Charts from a saved result file
//!
//! Options:
//!   --config <path>                    # YAML config file
//!   --split <NAME>                     # Restrict `run` to these splits
//!   --max-questions <N>                # Questions per split (-1 for all)
//!   --workers <N>                      # Concurrent requests

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use course_rag::agent::RagAgent;
use course_rag::config::{Config, OutputFormat, SplitSelection};
use course_rag::embedding::ConfiguredEmbedder;
use course_rag::eval::{
    BenchmarkRunner, LlmJudge, SplitStatistics, answer_questions, charts, dataset,
    judge_answers, load_evaluations, save_evaluations,
};
use course_rag::llm::LlmClient;
use course_rag::store::VectorStore;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "benchmark")]
#[command(about = "Evaluate the course assistant with an LLM judge", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Maximum questions per split (-1 for all)
    #[arg(long, global = true, allow_negative_numbers = true)]
    max_questions: Option<i64>,

    /// Concurrent answer/judge requests
    #[arg(long, global = true)]
    workers: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline over the configured splits
    Run {
        /// Splits to run (defaults to the config, "all" for every split)
        #[arg(long = "split")]
        splits: Vec<String>,

        /// Result file format
        #[arg(long, value_parser = parse_format)]
        format: Option<OutputFormat>,

        /// Skip chart rendering
        #[arg(long)]
        no_viz: bool,
    },

    /// Answer the questions of a QA file
    Answer {
        /// QA split CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV with an agent_answer column
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Judge the answers of an answer-step CSV
    Evaluate {
        /// Answer-step CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Result file (.csv or .json); defaults to `<input>_evaluated.csv`
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render charts from a saved result file
    Visualize {
        /// Result file (.csv or .json)
        #[arg(short, long)]
        input: PathBuf,

        /// Chart directory; defaults to `visualizations/<input stem>` next to the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_format(value: &str) -> std::result::Result<OutputFormat, String> {
    match value.to_lowercase().as_str() {
        "csv" => Ok(OutputFormat::Csv),
        "json" => Ok(OutputFormat::Json),
        other => Err(format!("unknown format '{}', expected csv or json", other)),
    }
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
    let mut config =
        Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(max) = cli.max_questions {
        config.benchmark.max_questions_per_split = Some(max);
    }
    if let Some(workers) = cli.workers {
        config.benchmark.workers = workers;
    }

    match cli.command {
        Commands::Run {
            splits,
            format,
            no_viz,
        } => {
            match splits.len() {
                0 => {}
                1 => config.benchmark.splits = SplitSelection::One(splits[0].clone()),
                _ => config.benchmark.splits = SplitSelection::Many(splits),
            }
            if let Some(format) = format {
                config.benchmark.output_format = format;
            }
            if no_viz {
                config.benchmark.enable_visualization = false;
            }
            run_benchmark(&config).await
        }
        Commands::Answer { input, output } => run_answer(&config, &input, &output).await,
        Commands::Evaluate { input, output } => {
            let output = output.unwrap_or_else(|| sibling(&input, "_evaluated", "csv"));
            run_evaluate(&config, &input, &output).await
        }
        Commands::Visualize { input, output } => run_visualize(&input, output),
    }
}

/// `dir/stem{suffix}.{ext}` for a file `dir/stem.*`.
fn sibling(path: &Path, suffix: &str, ext: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "results".to_string());
    path.with_file_name(format!("{}{}.{}", stem, suffix, ext))
}

fn build_agent(config: &Config) -> Result<RagAgent<ConfiguredEmbedder, LlmClient>> {
    let embedder =
        ConfiguredEmbedder::from_config(&config.resolved_embedding(), config.llm.max_retries)
            .context("Failed to create embedder")?;
    let store =
        VectorStore::open(&config.store, embedder).context("Failed to open vector collection")?;
    if store.is_empty() {
        anyhow::bail!(
            "Collection '{}' is empty. Run `course-rag ingest` first.",
            config.store.collection
        );
    }
    Ok(RagAgent::new(
        store,
        LlmClient::new(config.llm.clone()),
        config.rag.clone(),
    ))
}

fn build_judge(config: &Config) -> LlmJudge<LlmClient> {
    LlmJudge::new(LlmClient::new(config.judge_llm()))
}

async fn run_benchmark(config: &Config) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let agent = build_agent(config)?;
    let judge = build_judge(config);

    println!("Answer model: {}", config.llm.model);
    println!("Judge model:  {}", config.judge_llm().model);
    println!("Workers:      {}", config.benchmark.workers);

    let start = Instant::now();
    let summary = BenchmarkRunner::new(&agent, &judge, &config.benchmark)
        .run()
        .await?;

    summary.print();
    println!("Total time: {:.1}s", start.elapsed().as_secs_f64());

    Ok(())
}

async fn run_answer(config: &Config, input: &Path, output: &Path) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let items = dataset::load_questions(input, config.benchmark.question_limit())?;
    println!("Answering {} questions from {}...", items.len(), input.display());

    let agent = build_agent(config)?;
    let start = Instant::now();
    let answered = answer_questions(
        &agent,
        items,
        config.benchmark.workers,
        config.benchmark.answer_max_chars,
    )
    .await;

    dataset::write_answered(output, &answered)?;

    let failed = answered
        .iter()
        .filter(|a| a.agent_answer.starts_with("[error]"))
        .count();
    println!(
        "Saved {} answers ({} failed) to {} in {:.1}s",
        answered.len(),
        failed,
        output.display(),
        start.elapsed().as_secs_f64()
    );

    Ok(())
}

async fn run_evaluate(config: &Config, input: &Path, output: &Path) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let answered = dataset::load_answered(input)?;
    println!("Judging {} answers from {}...", answered.len(), input.display());

    let judge = build_judge(config);
    let evaluations = judge_answers(&judge, &answered, config.benchmark.workers).await;

    let format = if output
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
    {
        OutputFormat::Json
    } else {
        OutputFormat::Csv
    };
    save_evaluations(
        output,
        &evaluations,
        format,
        config.benchmark.detailed_reasoning,
    )?;

    let name = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    if let Some(stats) = SplitStatistics::from_evaluations(&evaluations) {
        stats.print(&name);
    }
    println!("Results saved to {}", output.display());

    Ok(())
}

fn run_visualize(input: &Path, output: Option<PathBuf>) -> Result<()> {
    let evaluations = load_evaluations(input)
        .with_context(|| format!("Failed to load results from {}", input.display()))?;
    if evaluations.is_empty() {
        anyhow::bail!("No evaluations in {}", input.display());
    }

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "results".to_string());
    let out_dir = output.unwrap_or_else(|| {
        input
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("visualizations")
            .join(&stem)
    });

    let written = charts::render_all(&evaluations, &out_dir, Some(&stem))?;
    println!("Wrote {} charts to {}:", written.len(), out_dir.display());
    for path in written {
        println!("  {}", path.display());
    }

    Ok(())
}
