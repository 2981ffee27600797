use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex, mpsc};

use clap::Parser;
use ratatui::DefaultTerminal;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod account;
mod columns;
mod controller;
mod detail;
mod domain;
mod model;
mod source;
mod table;
mod ui;

use controller::Controller;
use domain::{
    DEFAULT_EVENT_POLL_TIME, DEFAULT_PAGE_SIZE, DEFAULT_TRIGGER_OFFSET, IntakeError, TVConfig,
};
use model::{Model, Status};
use source::IntakeSource;
use ui::TableUI;

/// Terminal dashboard for patient intake accounts.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Intake accounts file (csv, parquet or arrow)
    path: String,

    /// Accounts fetched per page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// Lines around the viewport in which the sentinel row triggers the next fetch
    #[arg(long, default_value_t = DEFAULT_TRIGGER_OFFSET)]
    trigger_offset: u16,

    /// Terminal event poll time in milliseconds
    #[arg(long, default_value_t = DEFAULT_EVENT_POLL_TIME)]
    poll_ms: u64,

    /// Artificial delay added to every page fetch, in milliseconds
    #[arg(long, default_value_t = 0)]
    latency_ms: u64,

    /// Log file, verbosity is controlled with RUST_LOG
    #[arg(long, default_value = "intake-tv.log")]
    log_file: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_logging(&args.log_file) {
        eprintln!("Logging disabled: {e}");
    }

    match run(args) {
        Err(e) => {
            error!("Exiting with error: {e:?}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn expand(path: &str) -> Result<String, IntakeError> {
    shellexpand::full(path)
        .map(|p| p.into_owned())
        .map_err(|e| IntakeError::LoadingFailed(e.to_string()))
}

fn init_logging(log_file: &str) -> Result<(), IntakeError> {
    let file = File::create(expand(log_file)?)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| IntakeError::LoadingFailed(e.to_string()))
}

fn run(args: Args) -> Result<(), IntakeError> {
    let config = TVConfig {
        event_poll_time: args.poll_ms,
        page_size: args.page_size,
        trigger_offset: args.trigger_offset,
        latency_ms: args.latency_ms,
        ..TVConfig::default()
    };
    info!("Starting with {:?}", config);

    let path = PathBuf::from(expand(&args.path)?);
    let source = Arc::new(IntakeSource::open(path)?);
    info!("Loaded {} accounts from {}", source.len(), source.name());

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &config, source);
    ratatui::restore();
    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    config: &TVConfig,
    source: Arc<IntakeSource>,
) -> Result<(), IntakeError> {
    let (sender, receiver) = mpsc::channel();
    let size = terminal.size()?;
    let mut model = Model::init(
        config,
        source,
        sender,
        size.width as usize,
        size.height as usize,
    )?;
    let mut ui = TableUI::new();
    let controller = Controller::new(config, receiver);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event()?;
        model.update(message)?;
    }

    Ok(())
}
