mod headless;
mod persistence;
mod settings;

use anyhow::{Context, Result};
use chatlink_core::{
    BootstrapController, BootstrapEvent, BootstrapStores, ConnectionIntent, HistoryRepository,
    HistoryStore,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::headless::HeadlessHandler;
use crate::persistence::{
    get_config_dir, JsonCredentialStore, JsonHistoryStore, CREDENTIALS_FILE, HISTORY_FILE,
};

/// How long to wait for the certificate picker before giving up
const PICK_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolve a chat server address and hand the connection to the client.
#[derive(Parser, Debug)]
#[command(name = "chatlink", version, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    // Without a subcommand, connect
    #[command(flatten)]
    connect: ConnectArgs,
}

impl Cli {
    fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Connect(self.connect))
    }
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Connect to a server (default)
    Connect(ConnectArgs),
    /// List recent servers
    History {
        /// Only servers whose URL contains this text
        filter: Option<String>,
    },
    /// Remove a server from history
    Forget {
        /// Entry id as printed by `history`
        id: String,
    },
}

#[derive(Args, Debug, Default, PartialEq, Eq)]
struct ConnectArgs {
    /// Workspace name, host or URL (defaults to the last server)
    address: Option<String>,

    /// Client certificate to present
    #[arg(long, value_name = "PATH")]
    cert: Option<PathBuf>,

    /// Username to remember for this server
    #[arg(long, value_name = "NAME")]
    user: Option<String>,

    /// Server the session came from
    #[arg(long, value_name = "URL")]
    previous: Option<String>,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.into_command()) {
        eprintln!("chatlink: {:#}", e);
        std::process::exit(1);
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Connect(args) => connect(args),
        Command::History { filter } => list_history(filter.as_deref()),
        Command::Forget { id } => forget(&id),
    }
}

fn history_store() -> Arc<JsonHistoryStore> {
    Arc::new(JsonHistoryStore::new(get_config_dir().join(HISTORY_FILE)))
}

fn connect(args: ConnectArgs) -> Result<()> {
    let mut settings = settings::load_settings();
    let mut config = settings.bootstrap_config();
    if let Some(address) = &args.address {
        config.initial_server = address.clone();
    }
    if config.initial_server.trim().is_empty() {
        anyhow::bail!("no server address given and none remembered");
    }
    if let Some(cert) = &args.cert {
        if !cert.is_file() {
            anyhow::bail!("certificate {} does not exist", cert.display());
        }
    }
    // With a certificate the submit waits until the pick has been applied
    config.auto_connect = args.cert.is_none();

    let runtime = Arc::new(
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .thread_name("chatlink")
            .build()
            .context("Failed to create tokio runtime")?,
    );

    let stores = BootstrapStores {
        history: history_store(),
        credentials: Arc::new(JsonCredentialStore::new(
            get_config_dir().join(CREDENTIALS_FILE),
        )),
    };
    let handler = Arc::new(HeadlessHandler::new(args.cert.clone()));
    // No invite links arrive in a terminal session; the sender only keeps the
    // subscription open while the controller lives.
    let (_deep_link_tx, deep_link_rx) = async_channel::unbounded();

    let mut controller = BootstrapController::new(
        config,
        runtime.clone(),
        handler.clone(),
        stores,
        deep_link_rx,
        args.previous.clone(),
    );

    if args.cert.is_some() {
        pick_certificate_then_submit(&runtime, &mut controller, PICK_TIMEOUT)?;
    }

    let intent = handler
        .last_intent()
        .context("no connect intent was dispatched")?;

    settings.last_server = Some(intent.url.to_string());
    if let Err(e) = settings::save_settings(&settings) {
        log::warn!("Failed to remember last server: {:#}", e);
    }

    let recorded = controller.record_connection(&intent.url, args.user.as_deref());
    if let Err(e) = runtime.block_on(recorded) {
        log::warn!("History write did not finish: {}", e);
    }

    Ok(())
}

/// Apply the certificate pick, then connect. A pick that fails or never
/// arrives only costs the certificate, not the connect.
fn pick_certificate_then_submit(
    runtime: &tokio::runtime::Runtime,
    controller: &mut BootstrapController<HeadlessHandler>,
    timeout: Duration,
) -> Result<ConnectionIntent> {
    controller.choose_certificate();
    if let Err(e) = wait_for_certificate(runtime, controller, timeout) {
        log::warn!("Connecting without a client certificate: {:#}", e);
    }
    Ok(controller.submit()?)
}

fn wait_for_certificate(
    runtime: &tokio::runtime::Runtime,
    controller: &mut BootstrapController<HeadlessHandler>,
    timeout: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let event = runtime
            .block_on(tokio::time::timeout(remaining, controller.next_event()))
            .context("timed out waiting for the certificate")?
            .context("bootstrap event channel closed")?;

        let picked = matches!(event, BootstrapEvent::CertificatePicked(_));
        controller.handle_event(event);
        if picked {
            return Ok(());
        }
    }
}

fn list_history(filter: Option<&str>) -> Result<()> {
    let settings = settings::load_settings();
    let repository = HistoryRepository::new(history_store(), settings.bootstrap.history_limit);
    for entry in repository.query(filter) {
        println!(
            "{}\t{}\t{}",
            entry.id,
            entry.url,
            entry.username.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn forget(id: &str) -> Result<()> {
    history_store()
        .remove(id)
        .with_context(|| format!("Failed to forget {}", id))
}
