use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use realty_desk::{
    app::{handle_key, App},
    init_logging,
    submission::OutboxSink,
    ui::ui,
    AppConfig, CliArgs,
};
use std::{io, time::Duration};
use tracing::{error, info};

const TICK_RATE: Duration = Duration::from_millis(100);

fn main() -> Result<()> {
    let config = AppConfig::from_args(CliArgs::parse())?;
    let _guard = init_logging(&config.log_file, &config.log_level)?;

    let sink = OutboxSink::open(&config.outbox)
        .with_context(|| format!("failed to open outbox {}", config.outbox.display()))?;
    info!(outbox = %sink.path().display(), "starting realty desk");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let app = App::new(config, Box::new(sink));
    let res = run_app(&mut terminal, app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!(error = ?err, "realty desk exited with an error");
        println!("{:?}", err)
    }

    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, mut app: App) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, &mut app))?;

        if !event::poll(TICK_RATE)? {
            app.on_tick();
            continue;
        }

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if handle_key(&mut app, key)? {
                info!("quitting");
                return Ok(());
            }
        }
    }
}
