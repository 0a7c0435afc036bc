use std::fs::{self, File};
use std::time::Duration;
use anyhow::Result;
use banter_core::Config;

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

/// Log to a file under the cache dir; the terminal belongs to the UI.
fn init_logging() {
    let Some(dir) = dirs::cache_dir().map(|d| d.join("banter")) else {
        return;
    };
    let file = fs::create_dir_all(&dir).and_then(|_| File::create(dir.join("banter.log")));
    let Ok(file) = file else {
        return;
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = Config::load_with_env();
    log::info!(
        "[tui] starting, relay {} model {}",
        config.relay_url(),
        config.default_model()
    );

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut events = EventHandler::new(Duration::from_millis(250));
    let mut app = App::new(&config, events.sender());

    let result = run(&mut terminal, &mut app, &mut events).await;

    app.shutdown();
    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        let Some(event) = events.next().await else {
            break;
        };
        handler::handle_event(app, event)?;

        // Drain whatever else is queued so a burst of reveal frames costs one redraw
        while let Some(event) = events.try_next() {
            handler::handle_event(app, event)?;
            if app.should_quit {
                break;
            }
        }
    }
    Ok(())
}
