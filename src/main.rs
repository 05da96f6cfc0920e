use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use statsheet::controller::Controller;
use statsheet::domain::{EXPORT_FILE, STATS_CSV_URL, SheetConfig, SheetError};
use statsheet::model::{Model, Status};
use statsheet::ui::SheetUI;

#[derive(Parser, Debug)]
#[command(version, about = "Terminal viewer for a published player/game stats sheet")]
struct Args {
    /// CSV url to load instead of the published sheet
    #[arg(long)]
    url: Option<String>,
    /// Where the CSV export ends up
    #[arg(long, default_value = EXPORT_FILE)]
    out: String,
}

fn main() -> ExitCode {
    match run() {
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

fn run() -> Result<(), SheetError> {
    init_logging()?;
    let args = Args::parse();

    let out_path = shellexpand::full(&args.out)
        .map_err(|e| SheetError::LoadingFailed(format!("Bad output path: {e}")))?
        .into_owned();
    let config = SheetConfig {
        csv_url: args.url.unwrap_or_else(|| STATS_CSV_URL.to_string()),
        out_path: PathBuf::from(out_path),
        ..SheetConfig::default()
    };
    info!("Starting statsheet against {}", config.csv_url);

    let (tx, rx) = mpsc::channel();
    let mut terminal = ratatui::init();
    let size = terminal.size()?;

    let mut model = Model::init(&config, tx, size.width as usize, size.height as usize)?;
    model.start_load();

    let ui = SheetUI::new();
    let controller = Controller::new(&config, rx);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(model.get_uidata(), f))?;

        // Handle events and map to a Message
        if let Some(message) = controller.handle_event(&model)? {
            model.update(message)?;
        }
    }

    Ok(())
}

fn init_logging() -> Result<(), SheetError> {
    // The terminal belongs to the UI, so logs only go to a file and only
    // when asked for.
    if std::env::var_os("RUST_LOG").is_none() {
        return Ok(());
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("statsheet.log")?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::sync::Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
