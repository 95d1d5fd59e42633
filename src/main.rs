use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use faq_rag::core::config::{AppPaths, ConfigService, RagConfig};
use faq_rag::core::logging;
use faq_rag::corpus;
use faq_rag::embedding::{EmbeddingProvider, HashingEmbedder, OpenAiEmbeddingProvider};
use faq_rag::llm::{ClientConfig, GenerationClient};
use faq_rag::pipeline::{PipelineSettings, QueryPipeline};
use faq_rag::rag::{StoreSettings, VectorCollection, VectorStore};

/// Answer questions from an FAQ corpus with retrieval-augmented generation.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a JSON array of {question, answer} records into the collection.
    Ingest { corpus: PathBuf },
    /// Retrieve the closest FAQ entries and generate a grounded answer.
    Ask {
        #[arg(required = true)]
        question: Vec<String>,
        /// Number of documents to retrieve (defaults to retrieval.top_k).
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Print the number of stored documents.
    Count,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = Arc::new(AppPaths::new());
    logging::init(&paths);

    let config_service = ConfigService::new(paths.clone());
    let config = config_service
        .load_config()
        .context("Failed to load configuration")?;
    tracing::debug!(
        "Effective config: {}",
        config_service.redact_sensitive_values(&serde_json::to_value(&config)?)
    );

    let store_root = config_service.store_root(&config);
    let store = VectorStore::open(&store_root, StoreSettings::from_config(&config))
        .await
        .with_context(|| format!("Failed to open vector store at {}", store_root.display()))?;
    let collection = store
        .create_or_load(&config.storage.collection, build_embedder(&config)?)
        .await
        .with_context(|| format!("Failed to load collection '{}'", config.storage.collection))?;

    let result = run(cli.command, &config, collection).await;
    store.close().await;
    result
}

async fn run(command: Command, config: &RagConfig, collection: VectorCollection) -> anyhow::Result<()> {
    match command {
        Command::Ingest { corpus: path } => {
            let records = corpus::load_corpus(&path)?;
            let stored = corpus::ingest(&collection, &records, &config.corpus.name).await?;
            println!("Stored {} documents in '{}'", stored, collection.name());
        }
        Command::Ask { question, k } => {
            let question = question.join(" ");
            let k = k.unwrap_or(config.retrieval.top_k);

            let client = GenerationClient::new(ClientConfig::from_config(config))
                .context("Failed to configure the generation client")?;
            let pipeline = QueryPipeline::new(
                collection,
                Arc::new(client),
                PipelineSettings::from_config(config),
            );

            let answer = pipeline.answer(&question, k).await?;
            println!("{}", answer);
        }
        Command::Count => {
            println!("{}", collection.count().await?);
        }
    }
    Ok(())
}

fn build_embedder(config: &RagConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    let section = &config.embedding;
    match section.provider.as_str() {
        "openai" => {
            let api_key = config.credentials.api_key.clone().unwrap_or_default();
            let provider = OpenAiEmbeddingProvider::new(
                &api_key,
                section.model.clone(),
                &section.base_url,
                section.timeout(),
            )?;
            Ok(Arc::new(provider))
        }
        "local" => Ok(Arc::new(HashingEmbedder::new(section.dimensions)?)),
        other => bail!("Unknown embedding provider '{}'", other),
    }
}
