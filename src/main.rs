use clap::Parser;
use ratatui::DefaultTerminal;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod controller;
mod domain;
mod inputter;
mod loader;
mod model;
mod sorter;
mod table;
mod ui;

use controller::Controller;
use domain::{TSConfig, TSError};
use model::{Model, Status};
use sorter::SortOutcome;
use table::{Direction, Table};
use ui::TableUI;

/// View a table and sort it by any column.
#[derive(Parser, Debug)]
#[command(name = "tsort", version)]
struct Cli {
    /// Data file to show (csv, parquet or arrow)
    path: String,

    /// Sort by COLUMN before showing the table. Without a direction it acts
    /// like a header click, so repeating a column reverses the order.
    #[arg(short, long = "sort", value_name = "COLUMN[:asc|:desc]")]
    sort: Vec<String>,

    /// Print the table as tab separated values instead of starting the viewer
    #[arg(short, long)]
    print: bool,

    /// Column that can not be sorted
    #[arg(long = "inert", value_name = "COLUMN")]
    inert: Vec<String>,

    /// Columns named <COLUMN><SUFFIX> hold the sort values of <COLUMN>
    #[arg(long, default_value = "@timestamp")]
    timestamp_suffix: String,

    #[arg(long, default_value_t = 40)]
    max_column_width: usize,

    /// Milliseconds to wait for terminal events
    #[arg(long, default_value_t = 100)]
    event_poll_time: u64,

    /// Log file of the viewer. With --print, warnings go to stderr instead.
    #[arg(long, default_value = "tsort.log")]
    log_file: PathBuf,
}

impl Cli {
    fn config(&self) -> TSConfig {
        TSConfig::default()
            .with_event_poll_time(self.event_poll_time)
            .with_max_column_width(self.max_column_width)
            .with_timestamp_suffix(self.timestamp_suffix.as_str())
            .with_inert_columns(self.inert.clone())
    }

    // The headless print never touches the log file.
    fn log_file(&self) -> Option<&Path> {
        if self.print {
            None
        } else {
            Some(self.log_file.as_path())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn init_logging(log_file: Option<&Path>) -> Result<(), TSError> {
    let registry = tracing_subscriber::registry().with(ErrorLayer::default());
    match log_file {
        Some(path) => {
            let file = File::create(path)?;
            registry
                .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_ansi(false),
                )
                .init();
        }
        None => {
            registry
                .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), TSError> {
    init_logging(cli.log_file())?;
    let config = cli.config();
    info!("Starting tsort with {:?}", config);

    let mut table = loader::load_table(&cli.path, &config)?;
    for request in cli.sort.iter() {
        apply_sort_request(&mut table, request)?;
    }

    if cli.print {
        print!("{}", table.to_tsv());
        return Ok(());
    }
    run_viewer(&config, table)
}

fn run_viewer(config: &TSConfig, table: Table) -> Result<(), TSError> {
    let mut terminal = ratatui::init();
    let result = view_loop(&mut terminal, config, table);
    ratatui::restore();
    result
}

fn view_loop(
    terminal: &mut DefaultTerminal,
    config: &TSConfig,
    table: Table,
) -> Result<(), TSError> {
    let size = terminal.size()?;
    let mut model = Model::init(config, table, size.width as usize, size.height as usize);
    let mut ui = TableUI::new(config);
    let controller = Controller::new(config);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        if let Some(message) = controller.handle_event(&model)? {
            model.update(Some(message))?;
        }
    }
    Ok(())
}

/// Splits `COLUMN[:asc|:desc]`. Anything else after a colon is part of the label.
fn parse_sort_request(request: &str) -> (&str, Option<Direction>) {
    match request.rsplit_once(':') {
        Some((label, "asc")) => (label, Some(Direction::Ascending)),
        Some((label, "desc")) => (label, Some(Direction::Descending)),
        _ => (request, None),
    }
}

fn apply_sort_request(table: &mut Table, request: &str) -> Result<SortOutcome, TSError> {
    let (label, direction) = parse_sort_request(request);
    let column = table
        .column_index(label)
        .ok_or_else(|| TSError::UnknownColumn(label.to_string()))?;
    let outcome = match direction {
        Some(direction) => sorter::sort_with(table, column, direction),
        None => sorter::sort_by_column(table, column),
    };
    if outcome == SortOutcome::Inert {
        warn!("Column \"{label}\" is not sortable, ignoring --sort {request}");
    }
    Ok(outcome)
}
