//! taskd CLI - Main entry point

mod init;
mod project;
mod serve;
mod tasks;

use clap::{Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;
use taskd_core::AllowScope;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// taskd - run project tasks on behalf of an MCP client
#[derive(Parser, Debug)]
#[command(name = "taskd")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Project root (defaults to the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Allowlist file (overrides the configured one)
    #[arg(long, global = true)]
    allowlist: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve JSON-RPC on stdin/stdout (default)
    Mcp,
    /// List discovered tasks
    List {
        /// Only show tasks for this runner
        #[arg(long)]
        runner: Option<String>,
    },
    /// Grant MCP access to a task
    Allow {
        /// Task name as shown by `taskd list`
        task: String,

        /// How much to allow
        #[arg(long, value_enum, default_value = "task")]
        scope: ScopeArg,
    },
    /// Create .taskd/ with a default config and an empty allowlist
    Init {
        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },
    /// Print the effective configuration
    Config,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ScopeArg {
    /// Only this task
    Task,
    /// Every task in the same file
    File,
    /// Every task under the file's directory
    Directory,
    /// Deny the file's tasks
    Deny,
}

impl From<ScopeArg> for AllowScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::Task => AllowScope::Task,
            ScopeArg::File => AllowScope::File,
            ScopeArg::Directory => AllowScope::Directory,
            ScopeArg::Deny => AllowScope::Deny,
        }
    }
}

/// fmt layer; pass `ansi = false` unless the writer is a terminal
fn log_layer<S, W>(writer: W, ansi: bool) -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(ansi)
        .with_writer(writer)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries protocol frames only
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(log_layer(std::io::stderr, std::io::stderr().is_terminal()))
        .init();

    let project = project::Project::open(args.root, args.allowlist)?;

    match args.command.unwrap_or(Command::Mcp) {
        Command::Mcp => serve::run(&project).await,
        Command::List { runner } => tasks::list(&project, runner.as_deref()),
        Command::Allow { task, scope } => tasks::allow(&project, &task, scope.into()),
        Command::Init { force } => init::init_project(&project, force),
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&project.config)?);
            println!("allowlist: {}", project.allowlist_path.display());
            Ok(())
        }
    }
}
