use crate::server;
use clap::{Args, Parser, Subcommand};
use form_intake::config::AppConfig;
use form_intake::error::AppError;
use form_intake::intake::{FileRecordStore, LifecycleTracker, MarkOutcome, SubmissionKind};
use form_intake::telemetry;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "form-intake",
    about = "Run the form intake service or work its pending queue from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// List candidate registrations still waiting for CRM acknowledgment
    Pending(StoreArgs),
    /// Mark a candidate registration as processed
    Process {
        /// Registration id, e.g. REG_1700000000000_k3j9x2m1q
        id: String,
        #[command(flatten)]
        store: StoreArgs,
    },
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override the local record store directory
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct StoreArgs {
    /// Override the local record store directory
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Pending(args) => list_pending(args).await,
        Command::Process { id, store } => process(store, &id).await,
    }
}

fn offline_tracker(args: StoreArgs) -> Result<LifecycleTracker, AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry, config.environment)?;
    let data_dir = args.data_dir.unwrap_or(config.storage.data_dir);
    Ok(LifecycleTracker::new(FileRecordStore::new(data_dir)))
}

async fn list_pending(args: StoreArgs) -> Result<(), AppError> {
    let tracker = offline_tracker(args)?;
    let pending = tracker.list_pending(SubmissionKind::Registration).await?;

    if pending.is_empty() {
        println!("No pending registrations");
        return Ok(());
    }

    println!("{} pending registration(s), newest first", pending.len());
    for record in pending {
        let first = record.text("firstName").unwrap_or_default();
        let last = record.text("lastName").unwrap_or_default();
        println!(
            "- {} | {} | {} {}",
            record.id,
            record.timestamp.to_rfc3339(),
            first,
            last
        );
    }
    Ok(())
}

async fn process(args: StoreArgs, id: &str) -> Result<(), AppError> {
    let tracker = offline_tracker(args)?;
    match tracker
        .mark_processed(SubmissionKind::Registration, id)
        .await?
    {
        MarkOutcome::Processed(_) => println!("Registration {id} marked as processed"),
        MarkOutcome::AlreadyProcessed => println!("Registration {id} was already processed"),
    }
    Ok(())
}
