//! Chatflow CLI
//!
//! Validate and inspect workflow definitions, and drive them locally from
//! the console.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chatflow::channel::{create_channel, ChannelAdapter, ConsoleChannel};
use chatflow::workflow::{RunnerOptions, Workflow, WorkflowNode, WorkflowRunner};
use chatflow::{Config, InboundEvent, MemoryStore, Result, SessionRegistry};

#[derive(Parser)]
#[command(name = "chatflow")]
#[command(author, version, about = "Scripted-conversation workflow engine")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and index a workflow definition
    Validate {
        /// Workflow definition file (JSON)
        workflow: std::path::PathBuf,
    },

    /// Print the step tree of a workflow definition
    Show {
        /// Workflow definition file (JSON)
        workflow: std::path::PathBuf,
    },

    /// Drive a workflow from the console (one simulated conversation)
    Chat {
        /// Workflow definition file (default: from config)
        #[arg(long)]
        workflow: Option<std::path::PathBuf>,

        /// Send through the configured channel instead of the console
        #[arg(long)]
        live: bool,
    },

    /// Show current configuration
    Config,

    /// Initialize the .chatflow directory
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load config
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Validate { workflow } => {
            let workflow = Workflow::load(&workflow)?;
            println!(
                "{}: {} steps, entry {}",
                workflow.name().unwrap_or("workflow"),
                workflow.len(),
                workflow
                    .entry()
                    .map(|n| n.id.as_str())
                    .unwrap_or("(none)")
            );
        }

        Commands::Show { workflow } => {
            let workflow = Workflow::load(&workflow)?;
            if let Some(name) = workflow.name() {
                println!("{}", name);
            }
            print_node(workflow.root(), 0);
        }

        Commands::Chat { workflow, live } => {
            let path = workflow.unwrap_or_else(|| config.workflow_file.clone());
            run_chat(&config, &path, live).await?;
        }

        Commands::Config => match toml::to_string_pretty(&config) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("Failed to serialize config: {}", e),
        },

        Commands::Init => {
            chatflow::config::init()?;
            info!("Initialized .chatflow directory");
        }
    }

    Ok(())
}

fn print_node(node: &WorkflowNode, depth: usize) {
    println!("{}{} [{}]", "  ".repeat(depth), node.id, node.kind.name());
    for child in &node.children {
        print_node(child, depth + 1);
    }
}

/// Read lines from stdin and feed them through the runner as one
/// conversation.
async fn run_chat(config: &Config, workflow_path: &std::path::Path, live: bool) -> Result<()> {
    let workflow = Arc::new(Workflow::load(workflow_path)?);
    info!(
        workflow = workflow.name().unwrap_or("unnamed"),
        steps = workflow.len(),
        "workflow loaded"
    );

    let sessions = Arc::new(SessionRegistry::new(config.engine.idle_timeout));
    let channel: Arc<dyn ChannelAdapter> = if live {
        create_channel(&config.channel).into()
    } else {
        Arc::new(ConsoleChannel)
    };
    let sink = Arc::new(MemoryStore::new());

    let options = RunnerOptions {
        max_jumps: config.engine.max_jumps,
        list_button: config.engine.list_button.clone(),
    };
    let runner = WorkflowRunner::with_options(workflow, sessions, channel, sink, options);

    let display_name = std::env::var("USER").unwrap_or_else(|_| "console".to_string());
    println!("Chat simulation started. Type a message, /quit to exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line == "/quit" || line == "/exit" {
            break;
        }
        if line.is_empty() {
            continue;
        }

        let event = InboundEvent::new("console", line, &display_name);
        runner.handle_message(&event).await?;
    }

    Ok(())
}
