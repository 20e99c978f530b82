//! # Fireglobe CLI
//!
//! Usage:
//!   fireglobe serve [--bind ADDR] [--transport plain-http|message-protocol]
//!   fireglobe run --agent-url URL --description TEXT [--personas N]
//!   fireglobe personas --description TEXT [-n N]
//!   fireglobe rubrics
//!   fireglobe config
//!
//! Settings come from defaults, then `--config <file.toml>`, then the
//! environment (`ASI_ONE_API_KEY`, `FIREGLOBE_RELAY_URL`,
//! `FIREGLOBE_STORAGE_DIR`), then command-line flags.

use anyhow::Context;
use clap::{Parser, Subcommand};
use fireglobe_core::{Rubric, RubricSetting, ServiceConfig, TesterService, TransportMode};
use fireglobe_tester::{AgentTester, HttpAgent, ResultsLogger, TestEvent, TesterConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fireglobe")]
#[command(author, version, about = "Fireglobe - persona-driven testing for AI agents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Relay base URL, enables transaction forwarding
    #[arg(long, global = true)]
    relay_url: Option<String>,

    /// Directory for stored transcripts
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    /// Rubric preset (general, tool-use)
    #[arg(long, global = true)]
    rubric: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the REST API
    Serve {
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// plain-http or message-protocol
        #[arg(long)]
        transport: Option<TransportMode>,
    },
    /// Run a full test against an HTTP agent
    Run {
        /// Endpoint that accepts {"message": ...}
        #[arg(long)]
        agent_url: String,

        /// Endpoint POSTed to before each conversation
        #[arg(long)]
        reset_url: Option<String>,

        #[arg(short, long)]
        description: String,

        #[arg(long, default_value = "")]
        capabilities: String,

        #[arg(short = 'n', long, default_value = "10")]
        personas: usize,

        #[arg(long, default_value = "10")]
        max_messages: usize,

        /// Seconds to wait between exchanges
        #[arg(long, default_value = "10")]
        turn_delay_secs: u64,

        /// Where message logs and the results file go
        #[arg(short, long, default_value = "./test-results")]
        output: PathBuf,

        /// Agent request timeout in seconds
        #[arg(long, default_value = "60")]
        agent_timeout_secs: u64,
    },
    /// Generate personas and print them as JSON
    Personas {
        #[arg(short, long)]
        description: String,

        #[arg(long, default_value = "")]
        capabilities: String,

        #[arg(short = 'n', long, default_value = "5")]
        count: usize,
    },
    /// List rubric presets and their criteria
    Rubrics,
    /// Print the effective configuration
    Config,
}

fn load_config(cli: &Cli) -> anyhow::Result<ServiceConfig> {
    let mut config = match &cli.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };
    config.apply_env();

    if let Some(url) = &cli.relay_url {
        config.relay.base_url = Some(url.clone());
    }
    if let Some(dir) = &cli.storage_dir {
        config.storage.dir = dir.clone();
    }
    if let Some(rubric) = &cli.rubric {
        config.evaluation.rubric = RubricSetting::Preset(rubric.clone());
    }
    if let Commands::Serve { bind, transport } = &cli.command {
        if let Some(bind) = bind {
            config.server.bind = *bind;
        }
        if let Some(transport) = transport {
            config.server.transport = *transport;
        }
    }

    config.validate()?;
    Ok(config)
}

fn show_rubrics() {
    for name in Rubric::preset_names() {
        if let Some(rubric) = Rubric::preset(name) {
            println!("{}:", rubric.name);
            for criterion in &rubric.criteria {
                println!("  {:<22} {}", criterion.key, criterion.description);
            }
            println!();
        }
    }
}

fn print_event(event: &TestEvent) {
    match event {
        TestEvent::TestStarted { test_id } => println!("Test {} started", test_id),
        TestEvent::PersonalitiesGenerated { count, used_fallback } => {
            let source = if *used_fallback { " (fallback roster)" } else { "" };
            println!("Generated {} personalities{}", count, source);
        }
        TestEvent::ConversationStarted { personality_name, .. } => {
            println!("\n--- Conversation with {} ---", personality_name)
        }
        TestEvent::MessageSent { role, content, .. } => println!("[{}] {}", role.as_str(), content),
        TestEvent::ConversationCompleted { status, .. } => println!("Conversation finished: {:?}", status),
        TestEvent::EvaluationCompleted { score, .. } => println!("Evaluation score: {}", score),
        TestEvent::Error { error, .. } => eprintln!("Error: {}", error),
        TestEvent::TestCompleted { overall_score, .. } => println!("\nOverall score: {}", overall_score),
    }
}

async fn run_test(service: Arc<TesterService>, command: Commands) -> anyhow::Result<()> {
    let Commands::Run {
        agent_url,
        reset_url,
        description,
        capabilities,
        personas,
        max_messages,
        turn_delay_secs,
        output,
        agent_timeout_secs,
    } = command
    else {
        return Ok(());
    };

    let mut agent = HttpAgent::new(agent_url, Duration::from_secs(agent_timeout_secs))?;
    if let Some(url) = reset_url {
        agent = agent.with_reset_url(url);
    }

    let logger = ResultsLogger::new(&output)?;
    let mut tester = AgentTester::new(
        service,
        TesterConfig {
            agent_description: description,
            agent_capabilities: capabilities,
            num_personalities: personas,
            max_messages_per_conversation: max_messages,
            turn_delay: Duration::from_secs(turn_delay_secs),
        },
    );
    let mut events = tester.subscribe();
    let tester = tester.with_logger(logger);

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event);
        }
    });

    let results = tester.run(&mut agent).await;
    drop(tester);
    let _ = printer.await;

    println!(
        "{} of {} conversations completed",
        results.summary.successful_conversations, results.summary.total_conversations
    );
    if !results.summary.top_strengths.is_empty() {
        println!("Strengths: {}", results.summary.top_strengths.join("; "));
    }
    if !results.summary.top_weaknesses.is_empty() {
        println!("Weaknesses: {}", results.summary.top_weaknesses.join("; "));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Commands::Rubrics = cli.command {
        show_rubrics();
        return Ok(());
    }

    let config = load_config(&cli).context("invalid configuration")?;

    match cli.command {
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
        Commands::Serve { .. } => {
            let service = Arc::new(TesterService::new(config)?);
            fireglobe_server::serve(service).await?;
        }
        Commands::Personas {
            description,
            capabilities,
            count,
        } => {
            let service = TesterService::new(config)?;
            let set = service.generate_personalities(&description, &capabilities, count).await;
            if set.used_fallback {
                tracing::warn!("Model output unusable, printing the fallback roster");
            }
            println!("{}", serde_json::to_string_pretty(&set.personalities)?);
        }
        command @ Commands::Run { .. } => {
            let service = Arc::new(TesterService::new(config)?);
            run_test(service, command).await?;
        }
        Commands::Rubrics => show_rubrics(),
    }
    Ok(())
}
