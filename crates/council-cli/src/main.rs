mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use council::{
    migrate_legacy_sessions, BotMemoryStore, ContextAssembler, CouncilConfig,
    CouncilOrchestrator, Document, HttpProviderClient, JsonlSessionStore, KnowledgeBase,
    MemoryStore, ModelSuggestionService, NoSuggestions, PersonaConfig, PersonaRole,
    PersonaSuggestionService, SessionMode, SessionRequest, SessionStore, ToolRegistry,
};

use config::CliConfig;

#[derive(Parser)]
#[command(name = "council", about = "Run council deliberations from the command line")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a fixed-round deliberation on a topic.
    Deliberate {
        topic: String,
        /// Override the configured round count.
        #[arg(long)]
        rounds: Option<u32>,
    },
    /// Run an open-ended swarm coding session.
    Swarm { topic: String },
    /// Ask a single persona a direct question.
    Inquire {
        question: String,
        /// Persona id to address. Defaults to the speaker.
        #[arg(long)]
        councilor: Option<String>,
    },
    /// Migrate legacy one-file-per-session JSON into the store.
    Migrate {
        /// Directory containing legacy session files.
        dir: PathBuf,
    },
    /// Print a stored session transcript.
    Show { session_id: String },
    /// List stored sessions.
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;

    let store = Arc::new(JsonlSessionStore::open(config.store_dir()));
    store.initialize().await.context("initializing session store")?;

    let result = dispatch(&cli.command, &config, store.clone()).await;

    // The drain barrier: every queued write is durable before we exit.
    store.shutdown().await.context("flushing session store")?;
    result
}

async fn dispatch(command: &Command, config: &CliConfig, store: Arc<JsonlSessionStore>) -> Result<()> {
    match command {
        Command::Deliberate { topic, rounds } => {
            let mut council_config = CouncilConfig::from_env();
            if let Some(rounds) = rounds {
                council_config.deliberation_rounds = *rounds;
            }
            run_council(config, council_config, store, |personas| {
                SessionRequest::new(topic, SessionMode::Deliberation, personas)
            })
            .await
        }
        Command::Swarm { topic } => {
            run_council(config, CouncilConfig::from_env(), store, |personas| {
                SessionRequest::new(topic, SessionMode::SwarmCoding, personas)
            })
            .await
        }
        Command::Inquire { question, councilor } => {
            run_council(config, CouncilConfig::from_env(), store, |personas| {
                let mut request = SessionRequest::new(question, SessionMode::Inquiry, personas);
                if let Some(id) = councilor {
                    request = request.addressed_to(id);
                }
                request
            })
            .await
        }
        Command::Migrate { dir } => {
            let report = migrate_legacy_sessions(dir, store.as_ref()).await?;
            println!(
                "migrated {} sessions, skipped {}, failed {}",
                report.migrated, report.skipped, report.failed
            );
            Ok(())
        }
        Command::Show { session_id } => {
            let session = store
                .get_session(session_id)
                .await?
                .with_context(|| format!("no session {}", session_id))?;
            println!("{} [{}] {} ({})", session.id, session.status, session.title, session.mode);
            for m in &session.messages {
                println!("--- {} ({})\n{}", m.author, m.role_label, m.content);
            }
            Ok(())
        }
        Command::List => {
            for session in store.list_sessions().await? {
                println!(
                    "{}  [{}] {} ({}, {} messages)",
                    session.id,
                    session.status,
                    session.title,
                    session.mode,
                    session.messages.len()
                );
            }
            Ok(())
        }
    }
}

/// Construct the collaborators, wire the orchestrator, and run one session.
///
/// Everything the orchestrator touches is built here and passed by
/// reference; there is no global state.
async fn run_council(
    config: &CliConfig,
    council_config: CouncilConfig,
    store: Arc<JsonlSessionStore>,
    make_request: impl FnOnce(Vec<PersonaConfig>) -> SessionRequest,
) -> Result<()> {
    let provider = Arc::new(HttpProviderClient::new(
        &config.provider.endpoint,
        config.provider.api_key.clone(),
    ));
    info!(endpoint = %config.provider.endpoint, model = %config.provider.model, "provider configured");

    let memory = Arc::new(MemoryStore::new());
    let bot_memory = Arc::new(BotMemoryStore::new());
    let knowledge = Arc::new(KnowledgeBase::new());
    if let Some(ref dir) = config.knowledge_dir {
        let loaded = load_documents(dir, &knowledge)?;
        info!(count = loaded, dir = %dir.display(), "knowledge documents loaded");
    }

    let mut registry = ToolRegistry::new();
    if let Some(ref workspace) = config.workspace {
        registry.register(Arc::new(council::tools::fs_tools::ReadFileTool::new(workspace)));
        registry.register(Arc::new(council::tools::fs_tools::WriteFileTool::new(workspace)));
        registry.register(Arc::new(council::tools::fs_tools::ListFilesTool::new(workspace)));
    }
    if let Some(ref endpoint) = config.search_endpoint {
        registry.register(Arc::new(council::tools::web_search::WebSearchTool::new(endpoint)));
    }
    info!(tools = registry.len(), "tool registry populated");

    let personas = council::preset_personas(&config.provider.model);
    let suggester: Arc<dyn PersonaSuggestionService> = if config.dynamic_personas {
        let routing = PersonaConfig::new(
            "suggestion-router",
            "Suggestion Router",
            PersonaRole::Councilor,
            &config.provider.model,
        );
        let candidates = personas.iter().map(|p| p.id.clone()).collect();
        Arc::new(ModelSuggestionService::new(provider.clone(), routing, candidates))
    } else {
        Arc::new(NoSuggestions)
    };

    let assembler = ContextAssembler::new(
        memory,
        bot_memory,
        knowledge,
        council_config.transcript_budget_chars,
    );
    let orchestrator = CouncilOrchestrator::new(
        council_config,
        store,
        provider,
        Arc::new(registry),
        assembler,
        suggester,
    );

    // Ctrl-C cancels at the next round boundary; the partial transcript
    // stays durable.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping at the next round boundary");
            signal_cancel.cancel();
        }
    });

    let request = make_request(personas);
    let outcome = orchestrator.run_session(request, cancel).await?;

    println!("{}", outcome.summary_line());
    if let Some(result) = outcome.result {
        println!("\n{}", result);
    }
    Ok(())
}

fn load_documents(dir: &std::path::Path, knowledge: &KnowledgeBase) -> Result<usize> {
    let mut count = 0;
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("reading knowledge dir {}", dir.display()))?
    {
        let path = entry?.path();
        let is_doc = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("md") | Some("txt")
        );
        if !is_doc {
            continue;
        }
        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "untitled".to_string());
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading document {}", path.display()))?;
        knowledge.add_document(Document::new(&title, &content));
        count += 1;
    }
    Ok(count)
}
