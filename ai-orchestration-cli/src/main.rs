//! # AI Orchestration CLI binary
//!
//! Command-line entry point that loads configuration, wires an
//! `Orchestrator`, and drives one of its high-level operations
//! (`query`, `chat`, `parse-command`, `status`, `test-connection`).
//!
//! ## Usage
//!
//! ```bash
//! # One-shot query against the default agent
//! ai-orchestration query "What is the capital of France?"
//!
//! # Multi-turn chat, reading turns as alternating user/assistant lines
//! ai-orchestration chat --system "You are terse." "Hello" "Hi, how can I help?" "What's 2+2?"
//!
//! # Health and usage snapshot
//! ai-orchestration status
//!
//! # Custom configuration file
//! ai-orchestration --config my-config.toml query "Summarize this repo"
//! ```
//!
//! ## Environment Variables
//!
//! - `ANTHROPIC_API_KEY`, `OPENAI_API_KEY`, `GOOGLE_API_KEY`, `XAI_API_KEY`
//! - `AI_ORCH_DAILY_BUDGET_DOLLARS`, `AI_ORCH_DEFAULT_AGENT`
//! - `AI_ORCH_GOVERNANCE_ENABLED`, `AI_ORCH_QUALITY_ESCALATION_ENABLED`,
//!   `AI_ORCH_PROMPT_CACHING_ENABLED`, `AI_ORCH_GOVERNANCE_COST_THRESHOLD_DOLLARS`
//! - `RUST_LOG`

use ai_orchestration_cli::config::Config;
use ai_orchestration_cli::wiring::build_orchestrator;
use ai_orchestration_core::{AIRequest, Category, ConversationMessage, ConversationRole};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Logging level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Agent identity attributed to requests issued by this invocation.
    #[arg(long)]
    agent: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a single-turn question through the orchestrator.
    Query {
        text: String,
        /// Routing category; defaults to `query`.
        #[arg(long, value_enum, default_value_t = CategoryArg::Query)]
        category: CategoryArg,
    },
    /// Send a multi-turn conversation, alternating user/assistant turns.
    Chat {
        /// Optional system prompt.
        #[arg(long)]
        system: Option<String>,
        /// Conversation turns in order, starting with the user.
        turns: Vec<String>,
    },
    /// Summarize a block of text.
    Summarize {
        text: String,
        #[arg(long, default_value_t = 200)]
        max_length: u32,
    },
    /// Parse a natural-language command into structured intent/entities.
    ParseCommand { text: String },
    /// Print circuit breaker state, usage counters, and uptime.
    Status,
    /// Check whether at least one configured provider is reachable.
    TestConnection,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum CategoryArg {
    Query,
    Chat,
    Summarize,
    Analysis,
    CodeGeneration,
    CodeReview,
    Planning,
    Security,
    Heartbeat,
    ParseCommand,
}

impl From<CategoryArg> for Category {
    fn from(c: CategoryArg) -> Self {
        match c {
            CategoryArg::Query => Category::Query,
            CategoryArg::Chat => Category::Chat,
            CategoryArg::Summarize => Category::Summarize,
            CategoryArg::Analysis => Category::Analysis,
            CategoryArg::CodeGeneration => Category::CodeGeneration,
            CategoryArg::CodeReview => Category::CodeReview,
            CategoryArg::Planning => Category::Planning,
            CategoryArg::Security => Category::Security,
            CategoryArg::Heartbeat => Category::Heartbeat,
            CategoryArg::ParseCommand => Category::ParseCommand,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(&args.log_level)
        .init();

    let config = Config::load(&args.config)?;
    config.validate()?;

    let agent = args.agent.unwrap_or_else(|| config.default_agent.clone());
    let orchestrator = build_orchestrator(&config)?;

    match args.command {
        Command::Query { text, category } => {
            let category: Category = category.into();
            if category == Category::Query {
                let response = orchestrator.query(&text, &agent).await?;
                println!("{response}");
            } else {
                let request = AIRequest::new(text, category, agent);
                let response = orchestrator.execute(request).await?;
                println!("{}", response.content);
            }
        }
        Command::Chat { system, turns } => {
            let messages = turns
                .into_iter()
                .enumerate()
                .map(|(i, content)| ConversationMessage {
                    role: if i % 2 == 0 {
                        ConversationRole::User
                    } else {
                        ConversationRole::Assistant
                    },
                    content,
                })
                .collect();
            let response = orchestrator.chat(messages, system, &agent).await?;
            println!("{response}");
        }
        Command::Summarize { text, max_length } => {
            let response = orchestrator.summarize(&text, max_length, &agent).await?;
            println!("{response}");
        }
        Command::ParseCommand { text } => {
            let parsed = orchestrator.parse_command(&text, &agent).await?;
            println!("{}", serde_json::to_string_pretty(&parsed)?);
        }
        Command::Status => {
            let status = orchestrator.get_status().await;
            println!(
                "{}",
                serde_json::to_string_pretty(&StatusView::from(status))?
            );
        }
        Command::TestConnection => {
            let connected = orchestrator.test_connection().await;
            println!("{}", if connected { "ok" } else { "unreachable" });
            if !connected {
                std::process::exit(1);
            }
        }
    }

    orchestrator.shutdown().await;
    Ok(())
}

/// Serializable view of `OrchestratorStatus`; the engine type intentionally
/// doesn't derive `Serialize` since it isn't meant to be a wire format.
#[derive(serde::Serialize)]
struct StatusView {
    orchestrator_enabled: bool,
    circuit_breaker_state: String,
    total_requests: u64,
    total_errors: u64,
    total_cost_dollars: f64,
    average_latency_ms: f64,
    model_usage: std::collections::HashMap<String, u64>,
    uptime_secs: u64,
}

impl From<ai_orchestration_core::OrchestratorStatus> for StatusView {
    fn from(s: ai_orchestration_core::OrchestratorStatus) -> Self {
        Self {
            orchestrator_enabled: s.orchestrator_enabled,
            circuit_breaker_state: format!("{:?}", s.circuit_breaker_state),
            total_requests: s.total_requests,
            total_errors: s.total_errors,
            total_cost_dollars: s.total_cost,
            average_latency_ms: s.average_latency_ms,
            model_usage: s
                .model_usage
                .into_iter()
                .map(|(tier, count)| (tier.to_string(), count))
                .collect(),
            uptime_secs: s.uptime_secs,
        }
    }
}
