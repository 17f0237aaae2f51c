use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use spoolq::config::{DaemonConfig, WorkerConfig, DEFAULT_QUEUE, DEFAULT_SPOOL_ROOT};
use spoolq::dispatch::Envelope;
use spoolq::fleet::{self, FleetStatus};
use spoolq::spool::QueueRegistry;
use spoolq::worker::{CommandHandler, DispatchHandler, HandlerRegistry};

#[derive(Parser, Debug)]
#[command(name = "spoolq")]
#[command(version)]
#[command(about = "Filesystem-backed job spooler with supervised workers")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start a worker process for one queue
    Start(StartArgs),

    /// Signal tracked workers and clean up their pid files
    Stop(StopArgs),

    /// Report worker instances and their processing backlogs
    Status(StatusArgs),

    /// Write one job envelope into a queue
    Submit(SubmitArgs),
}

// =============================================================================
// Subcommand Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct StartArgs {
    /// Queue to work
    #[arg(short = 'm', long, default_value = DEFAULT_QUEUE)]
    queue: String,

    /// Spool root containing one directory per queue
    #[arg(long, default_value = DEFAULT_SPOOL_ROOT)]
    root: PathBuf,

    /// Stay in the foreground instead of daemonizing
    #[arg(short = 'D', long)]
    foreground: bool,

    /// Stdout log file for the daemonized worker
    #[arg(short = 'o', long, default_value = "/dev/null")]
    out_log: PathBuf,

    /// Stderr log file for the daemonized worker
    #[arg(short = 'e', long, default_value = "/dev/null")]
    err_log: PathBuf,

    /// Seconds to sleep when the queue is empty
    #[arg(short = 's', long, default_value = "1")]
    sleep: u64,

    /// Finish the current cycle on SIGINT/SIGTERM instead of exiting hard
    #[arg(long)]
    graceful: bool,
}

#[derive(Parser, Debug)]
struct StopArgs {
    /// Queue to stop; all queues under the root when omitted
    #[arg(short = 'm', long)]
    queue: Option<String>,

    /// Spool root containing one directory per queue
    #[arg(long, default_value = DEFAULT_SPOOL_ROOT)]
    root: PathBuf,
}

#[derive(Parser, Debug)]
struct StatusArgs {
    /// Queue to inspect; all queues under the root when omitted
    #[arg(short = 'm', long)]
    queue: Option<String>,

    /// Spool root containing one directory per queue
    #[arg(long, default_value = DEFAULT_SPOOL_ROOT)]
    root: PathBuf,

    /// Output format
    #[arg(short = 'o', long, default_value = "table")]
    output: OutputFormat,
}

#[derive(Parser, Debug)]
struct SubmitArgs {
    /// Registered handler name the worker should route this job to
    handler: String,

    /// Handler arguments as a JSON value
    #[arg(long)]
    args: Option<String>,

    /// Queue to submit into
    #[arg(short = 'm', long, default_value = DEFAULT_QUEUE)]
    queue: String,

    /// Spool root containing one directory per queue
    #[arg(long, default_value = DEFAULT_SPOOL_ROOT)]
    root: PathBuf,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// Command Handlers
// =============================================================================

fn handle_start(args: StartArgs) -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr/stdout now and to the log files once the daemon
    // redirects its fds.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = WorkerConfig {
        root: args.root,
        queue: args.queue,
        idle_sleep: Duration::from_secs(args.sleep),
        graceful_shutdown: args.graceful,
        foreground: args.foreground,
        daemon: DaemonConfig {
            stdout_log: args.out_log,
            stderr_log: args.err_log,
            ..DaemonConfig::default()
        },
    };

    let mut handlers = HandlerRegistry::new();
    handlers.register("command", Arc::new(CommandHandler));

    fleet::start_worker(&config, Arc::new(DispatchHandler::new(handlers)))?;
    Ok(())
}

fn handle_stop(args: StopArgs) -> Result<(), Box<dyn std::error::Error>> {
    let registry = QueueRegistry::new(args.root);
    let outcomes = fleet::stop(&registry, args.queue.as_deref())?;

    if outcomes.is_empty() {
        println!("no tracked workers");
        return Ok(());
    }
    for outcome in &outcomes {
        match (outcome.pid, outcome.signalled) {
            (Some(pid), true) => println!("killing process {}", pid),
            (Some(pid), false) => eprintln!("couldn't kill process {}", pid),
            (None, _) => eprintln!("removed malformed pid file for {}", outcome.instance),
        }
    }
    Ok(())
}

fn handle_status(args: StatusArgs) -> Result<(), Box<dyn std::error::Error>> {
    let registry = QueueRegistry::new(args.root);
    let report = fleet::status(&registry, args.queue.as_deref())?;

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => print_status_table(&report),
    }
    Ok(())
}

fn print_status_table(report: &FleetStatus) {
    println!(
        "{:<12} {:<28} {:<6} {:<12} STATUS",
        "QUEUE", "INSTANCE", "JOBS", "MAX AGE (S)"
    );
    println!("{}", "-".repeat(78));

    if report.instances.is_empty() {
        println!("(no worker instances)");
    }
    for row in &report.instances {
        println!(
            "{:<12} {:<28} {:<6} {:<12} {}",
            row.queue, row.instance, row.jobs, row.max_age_secs, row.health
        );
    }

    if !report.orphaned.is_empty() {
        println!();
        println!("orphaned pid files:");
        for orphan in &report.orphaned {
            let pid = orphan
                .pid
                .map(|p| p.to_string())
                .unwrap_or_else(|| "?".to_string());
            println!("{:<12} {}.pid  {}", orphan.queue, orphan.instance, pid);
        }
    }
}

fn handle_submit(args: SubmitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let payload = match args.args.as_deref() {
        Some(raw) => serde_json::from_str(raw)?,
        None => serde_json::Value::Null,
    };

    let registry = QueueRegistry::new(args.root);
    let queue = registry.queue(&args.queue)?;
    let envelope = Envelope::new(args.handler, payload);
    let name = queue.submit(&envelope.to_bytes()?)?;
    println!("{}", name);
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // clap renders its own usage text; the exit code is ours. Help
            // and version are not usage errors.
            let _ = e.print();
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    let outcome = match args.command {
        Commands::Start(args) => handle_start(args),
        Commands::Stop(args) => handle_stop(args),
        Commands::Status(args) => handle_status(args),
        Commands::Submit(args) => handle_submit(args),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
