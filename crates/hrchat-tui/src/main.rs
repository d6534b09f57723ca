use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use hrchat_core::{
    AnswerClient, Config, KeyValueStore, MemoryStore, Orchestrator, SessionStore, SqliteStore,
};
use tracing::{info, warn};

mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

const TICK_RATE: Duration = Duration::from_millis(300);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().unwrap_or_else(|_| Config::new());

    if let Err(e) = logging::init(&config) {
        eprintln!("Warning: {}", e);
    }

    let app = build_app(&config)?;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, app).await;
    tui::restore()?;

    result
}

fn build_app(config: &Config) -> Result<App> {
    let backend: Box<dyn KeyValueStore> = match open_session_db() {
        Ok(db) => Box::new(db),
        Err(e) => {
            warn!(error = %e, "session database unavailable; history won't survive restart");
            Box::new(MemoryStore::new())
        }
    };
    let store = SessionStore::initialize(backend);

    let client = match config.request_timeout_secs {
        Some(secs) => AnswerClient::with_timeout(&config.backend_url, Duration::from_secs(secs))?,
        None => AnswerClient::new(&config.backend_url),
    };
    let orchestrator = Orchestrator::new(Arc::new(client)).with_top_k(config.top_k);

    info!(
        backend = %config.backend_url,
        sessions = store.sessions().len(),
        "starting chat client"
    );

    Ok(App::new(store, orchestrator, config.backend_url.clone()))
}

fn open_session_db() -> Result<SqliteStore> {
    let path = Config::sessions_db_path()?;
    Ok(SqliteStore::open(&path)?)
}

async fn run(terminal: &mut Tui, mut app: App) -> Result<()> {
    let mut events = EventHandler::new(TICK_RATE);

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(&mut app, event).await?,
            None => break,
        }
    }

    Ok(())
}
