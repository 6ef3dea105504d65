use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod controller;
mod domain;
mod inputter;
mod model;
mod report;
mod sections;
mod tableview;
mod ui;

use controller::Controller;
use domain::{RVConfig, RVError};
use model::{Model, Status};
use report::Report;
use ui::TableUI;

#[derive(Parser, Debug)]
#[command(name = "rv", version, about = "A tui based analysis report viewer.")]
struct Cli {
    /// Path to the analysis report (.json)
    report: String,

    /// Terminal event poll time in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_time: u64,

    /// Maximum rendered column width
    #[arg(long, default_value_t = 80)]
    max_column_width: usize,

    /// Append logs to this file (the terminal belongs to the ui)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Err(e) => {
            ratatui::restore();
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
        Ok(_) => {
            ratatui::restore();
            ExitCode::SUCCESS
        }
    }
}

fn init_logging(cli: &Cli) -> Result<(), RVError> {
    let Some(path) = &cli.log_file else {
        return Ok(());
    };
    let log_file = File::create(path)?;
    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Arc::new(log_file)).with_ansi(false))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run(cli: Cli) -> Result<(), RVError> {
    init_logging(&cli)?;

    let path = PathBuf::from(
        shellexpand::full(&cli.report)
            .map_err(|e| RVError::LoadingFailed(e.to_string()))?
            .into_owned(),
    );

    // Load before the terminal is taken over, loader errors stay readable.
    let report = Report::load(&path)?;
    info!("Starting rv for \"{}\"", report.binary.file_name);

    let cfg = RVConfig::default()
        .with_event_poll_time(cli.poll_time)
        .with_max_column_width(cli.max_column_width);

    let mut terminal = ratatui::init();
    let size = terminal.size()?;

    let mut model = Model::init(&cfg, size.width as usize, size.height as usize)?;
    model.install_report(report);

    let mut ui = TableUI::new();
    let controller = Controller::new(&cfg);

    while model.status != Status::Quitting {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message; None is the idle tick
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }

    Ok(())
}
