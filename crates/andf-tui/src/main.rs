use std::sync::Arc;
use std::time::Duration;
use andf_core::{Config, HttpBackend, Session};
use anyhow::Result;

mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

const TICK_RATE: Duration = Duration::from_millis(300);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: could not read config ({e}), using defaults");
        let mut config = Config::new();
        if let Ok(url) = std::env::var(andf_core::config::BASE_URL_ENV) {
            config.apply_base_url(&url);
        }
        config
    });

    // Logging is best effort; the assistant works without it
    match logging::init(&config) {
        Ok(path) => tracing::info!(log = %path.display(), "logging initialised"),
        Err(e) => eprintln!("Warning: logging disabled: {e:#}"),
    }

    let backend = HttpBackend::from_config(&config)?;
    tracing::info!(
        base_url = backend.base_url(),
        max_results = config.max_results,
        "starting assistant"
    );

    let mut session = Session::new(Arc::new(backend), &config);
    session.start();
    let mut app = App::new(session);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    if let Err(e) = &result {
        tracing::error!(error = %e, "assistant exited with an error");
    }
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new(TICK_RATE);

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }

    Ok(())
}
