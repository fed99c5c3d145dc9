use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use ragbench_core::llm::{API_KEY_ENV, DEFAULT_MODEL};
use ragbench_core::{
    ingest_folder_passages, BasicRunPipeline, Bm25Retrieval, ChromaStore, Datastore,
    GeneratorConfig, HashingEmbedder, IngestionOptions, JsonFileDatastore, Metric,
    MsMarcoDataset, MsMarcoEvaluator, OpenAiGenerator, Retrieval, VectorRetrieval,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "ragbench", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Retrieval backend used for ingestion and answering.
    #[arg(long, value_enum, default_value_t = RetrievalKind::Bm25)]
    retrieval: RetrievalKind,

    /// BM25 index file (JSON).
    #[arg(long, default_value = "resources/bm25/index.json")]
    bm25_path: PathBuf,

    /// Passage datastore file (JSON).
    #[arg(long, default_value = "resources/datastore/passages.json")]
    datastore_path: PathBuf,

    /// Chroma base URL
    #[arg(long, env = "CHROMA_URL", default_value = "http://localhost:8000")]
    chroma_url: String,

    /// Chroma collection
    #[arg(long, default_value = "passages")]
    chroma_collection: String,

    /// Chat model name
    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// OpenAI-compatible API base; the key may be omitted for local servers.
    #[arg(long, env = "OPENAI_API_BASE")]
    api_base: Option<String>,

    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f32>,

    /// Number of passages retrieved per question.
    #[arg(long, default_value = "5")]
    top_k: usize,
}

#[derive(Clone, Copy, ValueEnum)]
enum RetrievalKind {
    Bm25,
    Chroma,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk a folder of .txt/.md/.pdf files into the datastore and index.
    IngestFiles {
        /// Folder scanned recursively.
        #[arg(long)]
        folder: PathBuf,
    },
    /// Answer one question with the RAG pipeline.
    Ask {
        /// Question text
        #[arg(long)]
        query: String,
        /// Print the retrieved passages.
        #[arg(long, default_value_t = false)]
        show_passages: bool,
    },
    /// Score the pipeline on an MS MARCO JSON Lines file.
    Evaluate {
        /// MS MARCO rows, one JSON object per line.
        #[arg(long)]
        dataset: PathBuf,
        /// Ingest the passages of this many rows before evaluating.
        #[arg(long)]
        ingest_size: Option<usize>,
        /// Number of leading rows to evaluate.
        #[arg(long, default_value = "5")]
        evaluate_size: usize,
        /// Metric names; defaults to every supported metric.
        #[arg(long, value_delimiter = ',')]
        metrics: Vec<String>,
        /// Write the full results table as JSON.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn build_retrieval(cli: &Cli) -> anyhow::Result<Arc<dyn Retrieval>> {
    let retrieval: Arc<dyn Retrieval> = match cli.retrieval {
        RetrievalKind::Bm25 => Arc::new(Bm25Retrieval::new(&cli.bm25_path)?),
        RetrievalKind::Chroma => Arc::new(VectorRetrieval::new(
            Arc::new(ChromaStore::new(&cli.chroma_url, &cli.chroma_collection)),
            HashingEmbedder::default(),
        )),
    };
    Ok(retrieval)
}

fn generator_config(cli: &Cli) -> anyhow::Result<GeneratorConfig> {
    let mut config = match &cli.api_base {
        Some(api_base) => {
            let config = GeneratorConfig {
                api_key: std::env::var(API_KEY_ENV).ok(),
                api_base: api_base.clone(),
                model: cli.model.clone(),
                ..GeneratorConfig::default()
            };
            config.validate()?;
            config
        }
        None => GeneratorConfig::from_env(cli.model.clone())?,
    };
    config.temperature = cli.temperature;
    Ok(config)
}

fn build_pipeline(
    cli: &Cli,
    retrieval: Arc<dyn Retrieval>,
    datastore: Arc<JsonFileDatastore>,
) -> anyhow::Result<BasicRunPipeline> {
    let generator = OpenAiGenerator::new(generator_config(cli)?)?;
    Ok(BasicRunPipeline::new(retrieval, datastore, Arc::new(generator)).with_top_k(cli.top_k))
}

fn write_output(path: &Path, body: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, body)?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    ragbench_core::llm::load_dotenv()?;
    let cli = Cli::parse();

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "ragbench boot"
    );

    let datastore = Arc::new(JsonFileDatastore::new(&cli.datastore_path)?);
    let retrieval = build_retrieval(&cli)?;

    match &cli.command {
        Command::IngestFiles { folder } => {
            let report = ingest_folder_passages(folder, &IngestionOptions::default())?;

            for skipped in &report.skipped_files {
                warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped document");
            }

            datastore.save(&report.passages)?;
            retrieval.ingest(&report.passages).await?;

            println!(
                "{} passages ingested from {} at {}",
                report.passages.len(),
                folder.display(),
                Utc::now().to_rfc3339()
            );
        }
        Command::Ask {
            query,
            show_passages,
        } => {
            let pipeline = build_pipeline(&cli, retrieval, datastore.clone())?;
            let output = pipeline.run(query).await?;

            println!("question: {query}");
            println!("answer: {}", output.answer);
            if *show_passages {
                for passage in datastore.load(&output.retrieved_ids)? {
                    println!("[{}]", passage.id);
                    if let Some(path) = &passage.filepath {
                        println!("  source={path}");
                    }
                    println!("  {}", passage.content);
                }
            }
        }
        Command::Evaluate {
            dataset,
            ingest_size,
            evaluate_size,
            metrics,
            output,
        } => {
            let dataset = MsMarcoDataset::from_jsonl(dataset)?;
            let metric_names: Vec<String> = if metrics.is_empty() {
                Metric::ALL.iter().map(|metric| metric.name().to_string()).collect()
            } else {
                metrics.clone()
            };

            let pipeline = build_pipeline(&cli, retrieval.clone(), datastore.clone())?;
            let evaluator = MsMarcoEvaluator::new(pipeline, dataset, metric_names.as_slice())?;

            if let Some(ingest_size) = ingest_size {
                let passages = evaluator
                    .ingest(&[&*retrieval], &*datastore, *ingest_size)
                    .await?;
                info!(passages, "corpus ingested");
            }

            let summary = evaluator.evaluate(*evaluate_size).await?;
            for row in &summary.each_results {
                println!("question: {}", row.question);
                println!("  answer: {}", row.answer);
                for (metric, score) in &row.scores {
                    println!("  {metric}={score:.4}");
                }
            }
            for (metric, score) in &summary.average {
                println!("average {metric}={score:.4}");
            }

            if let Some(path) = output {
                write_output(path, &summary.to_json_pretty()?)?;
                println!("results written to {}", path.display());
            }
        }
    }

    Ok(())
}
