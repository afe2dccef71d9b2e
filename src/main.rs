mod actions;
mod api;
mod app;
mod audio;
mod config;
mod error;
mod geo;
mod search;
mod tuner;
mod ui;
mod utils;
mod worker;

use actions::Response;
use anyhow::{Context, Result};
use api::RadioBrowserClient;
use app::AppController;
use audio::{AudioOutput, NullOutput, SimpleAudioPlayer};
use clap::Parser;
use config::{Args, Config};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use geo::GeoClient;
use log::{info, warn};
use ratatui::{backend::CrosstermBackend, Terminal};
use search::SearchBox;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tuner::Tuner;
use ui::UiState;

fn init_logging(log_file: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("cannot open log file {}", log_file.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_file)?;
    let config = Config::from_args(args)?;
    info!("Starting with directory {} and location {:?}", config.api_url, config.location);

    let directory = RadioBrowserClient::new(&config)?;
    let geo = GeoClient::new(&config)?;

    let output: Box<dyn AudioOutput> = if config.no_audio {
        Box::new(NullOutput::new())
    } else {
        match SimpleAudioPlayer::new() {
            Ok(player) => Box::new(player),
            Err(e) => {
                warn!("No audio device ({}), continuing silently", e);
                Box::new(NullOutput::new())
            }
        }
    };

    let (req_tx, req_rx) = mpsc::channel(32);
    let (resp_tx, resp_rx) = mpsc::channel(32);
    tokio::spawn(worker::run(req_rx, resp_tx, directory, geo, config.location));

    let tuner = Tuner::new(output, config.volume);
    let search = SearchBox::new(config.suggest_min_chars, config.suggest_debounce);
    let mut app_controller = AppController::new(UiState::new(tuner, search), req_tx);
    app_controller.initialize(config.initial_search.clone())?;

    // Set up panic handler to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app_controller, resp_rx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = &res {
        warn!("UI loop ended with error: {:#}", e);
    }
    res
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app_controller: &mut AppController,
    mut resp_rx: mpsc::Receiver<Response>,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::render_ui(f, &mut app_controller.ui_app))?;

        // Handle input with short timeout for responsiveness
        if event::poll(Duration::from_millis(50))? {
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    if app_controller.handle_key_event(key, Instant::now())? {
                        break;
                    }
                }
                Ok(_) => {} // Resizes are picked up by the next draw
                Err(e) => warn!("Failed to read terminal event: {}", e),
            }
        }

        while let Ok(resp) = resp_rx.try_recv() {
            app_controller.process_response(resp)?;
        }

        app_controller.tick(Instant::now());

        // Small delay to prevent high CPU usage but keep responsive
        sleep(Duration::from_millis(16)).await; // ~60 FPS

        if app_controller.should_quit() {
            break;
        }
    }

    Ok(())
}
