use anyhow::Context;
use clap::{Parser, Subcommand};
use docflow_rs::docflow::classifier::IntentClassifier;
use docflow_rs::docflow::config::DocflowConfig;
use docflow_rs::docflow::generation::ResponseGenerator;
use docflow_rs::docflow::retrieval::{HttpContextStore, HttpMemoryStore};
use docflow_rs::docflow::server::{self, AppState};
use docflow_rs::docflow::workflow::{SessionContext, WorkflowEngine};
use docflow_rs::llm::openai::OpenAiInference;
use docflow_rs::llm::InferenceService;
use dotenv::dotenv;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "configs/default.yaml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one query through the workflow and print the resulting state
    Query {
        /// The user query
        #[arg(short, long)]
        query: String,

        /// Session identifier for conversation-memory lookups
        #[arg(short, long)]
        session: Option<String>,

        /// Stop after the merge, skipping answer generation
        #[arg(long)]
        no_answer: bool,
    },
    /// Start the HTTP surface
    Serve {
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },
}

fn build_engine(config: &DocflowConfig) -> anyhow::Result<WorkflowEngine> {
    let inference: Arc<dyn InferenceService> =
        Arc::new(OpenAiInference::new(config.classifier_model.clone())?);
    let classifier = IntentClassifier::new(inference);

    let memory = Arc::new(HttpMemoryStore::new(config.memory_service()?));
    let context = Arc::new(HttpContextStore::new(
        config.context_service()?,
        config.context_top_k,
    ));

    Ok(WorkflowEngine::new(classifier, memory, context, config))
}

fn build_generator(config: &DocflowConfig) -> anyhow::Result<ResponseGenerator> {
    let inference: Arc<dyn InferenceService> =
        Arc::new(OpenAiInference::new(config.generation_model.clone())?);
    Ok(ResponseGenerator::new(inference))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let config = DocflowConfig::from_file(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config))?;
    log::info!(
        "loaded config: classifier={} retrieval_timeout={}ms",
        config.classifier_model,
        config.retrieval_timeout_ms
    );

    let engine = build_engine(&config)?;

    match args.command {
        Commands::Query {
            query,
            session,
            no_answer,
        } => {
            let session_context = SessionContext { session_id: session };

            let mut state = engine.run_workflow(&query, session_context).await?;

            if !no_answer {
                let generator = build_generator(&config)?;
                let answer = generator
                    .generate(&state)
                    .await
                    .context("answer generation failed")?;
                state.response = Some(answer);
            }

            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Commands::Serve { port } => {
            let generator = build_generator(&config)?;
            let state = Arc::new(AppState {
                engine,
                generator: Some(generator),
            });
            server::serve(port, state).await?;
        }
    }

    Ok(())
}
