use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Style},
    widgets::Paragraph,
    Terminal,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ledgerwatch::app::{App, View};
use ledgerwatch::data::{ExportDocument, ProcessedPayload};
use ledgerwatch::source::{
    ApiClient, DataSource, FileSource, HttpSource, MetricsPayload, RequestMethod,
};
use ledgerwatch::{events, ui, Settings};

/// How often a file source is checked for changes.
const FILE_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "ledgerwatch")]
#[command(about = "Terminal dashboard for ledger node telemetry")]
struct Args {
    /// TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the metrics backend
    #[arg(short, long, conflicts_with = "file")]
    url: Option<String>,

    /// HTTP method for /get_metrics
    #[arg(short, long, value_enum)]
    method: Option<RequestMethod>,

    /// Network environment sent with POST requests
    #[arg(long)]
    environment: Option<String>,

    /// Read metrics from a JSON file instead of the backend
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Refresh interval (e.g. "30s", "2m")
    #[arg(short, long)]
    refresh: Option<String>,

    /// Per-request timeout (e.g. "10s")
    #[arg(short, long)]
    timeout: Option<String>,

    /// Show full node addresses
    #[arg(long)]
    no_redact: bool,

    /// Log file (the terminal is owned by the UI)
    #[arg(long, default_value = "ledgerwatch.log")]
    log_file: PathBuf,

    /// Fetch once, write the view model to a JSON file and exit
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Only export nodes running this version (used with --export)
    #[arg(long = "version", requires = "export")]
    version_filter: Option<String>,
}

impl Args {
    /// Apply command-line overrides on top of the layered settings.
    fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::load(self.config.as_deref())?;
        if let Some(ref url) = self.url {
            settings.api_url = url.clone();
        }
        if let Some(method) = self.method {
            settings.method = method;
        }
        if let Some(ref environment) = self.environment {
            settings.environment = Some(environment.clone());
        }
        if let Some(ref refresh) = self.refresh {
            settings.refresh = refresh.clone();
        }
        if let Some(ref timeout) = self.timeout {
            settings.timeout = timeout.clone();
        }
        if self.no_redact {
            settings.redact_addresses = false;
        }
        settings.validate()?;
        Ok(settings)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let settings = args.settings()?;

    if let Some(ref export_path) = args.export {
        init_logging(None)?;
        return export_to_file(&args, &settings, export_path);
    }

    init_logging(Some(&args.log_file))?;

    if let Some(ref path) = args.file {
        info!(path = %path.display(), "starting with file source");
        let source = Box::new(FileSource::new(path));
        return run_tui(source, settings.redact_addresses, FILE_POLL_INTERVAL);
    }

    // Fetches run on the runtime's worker threads while the UI owns this one
    let rt = tokio::runtime::Runtime::new()?;
    let _guard = rt.enter();

    let client = api_client(&settings)?;
    info!(url = client.base_url(), method = ?settings.method, "starting with HTTP source");
    let source = HttpSource::spawn(client, settings.refresh_interval()?);

    // The source is polled often; it only yields when a fetch has completed
    run_tui(Box::new(source), settings.redact_addresses, Duration::from_millis(250))
}

/// Log to `path`, or to stderr when no file is given.
fn init_logging(path: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(io::stderr).init(),
    }
    Ok(())
}

fn api_client(settings: &Settings) -> Result<ApiClient> {
    let client = ApiClient::new(&settings.api_url, settings.request_timeout()?)?
        .with_method(settings.method, settings.environment.clone());
    Ok(client)
}

/// Run the TUI with the given data source
fn run_tui(source: Box<dyn DataSource>, redact: bool, poll_interval: Duration) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic);
    }));

    let mut app = App::new(source, redact);
    app.reload_data();

    let result = run_app(&mut terminal, &mut app, poll_interval);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(ref e) = result {
        error!(error = %e, "terminal UI exited with error");
    }
    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    poll_interval: Duration,
) -> Result<()> {
    let mut last_poll = Instant::now();

    // Minimum terminal size for usable display
    const MIN_WIDTH: u16 = 80;
    const MIN_HEIGHT: u16 = 14;

    while app.running {
        terminal.draw(|frame| {
            let area = frame.area();

            if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
                let msg = format!(
                    "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
                    area.width, area.height, MIN_WIDTH, MIN_HEIGHT
                );
                let paragraph = Paragraph::new(msg)
                    .alignment(Alignment::Center)
                    .style(Style::default().fg(Color::Yellow));
                let centered = Rect::new(0, (area.height / 2).saturating_sub(2), area.width, 5)
                    .intersection(area);
                frame.render_widget(paragraph, centered);
                return;
            }

            let chunks = Layout::vertical([
                Constraint::Length(1), // Header bar
                Constraint::Length(1), // Tabs
                Constraint::Min(8),    // Content
                Constraint::Length(1), // Status bar
            ])
            .split(area);

            ui::common::render_header(frame, app, chunks[0]);
            ui::common::render_tabs(frame, app, chunks[1]);

            match app.current_view {
                View::Nodes => ui::nodes::render(frame, app, chunks[2]),
                View::Versions => ui::versions::render(frame, app, chunks[2]),
                View::Chart => ui::chart::render(frame, app, chunks[2]),
            }

            ui::common::render_status_bar(frame, app, chunks[3]);

            if app.show_detail_overlay {
                ui::detail::render_overlay(frame, app, area);
            }
            if app.show_help {
                ui::common::render_help(frame, app, area);
            }
        })?;

        if let Some(event) = events::poll_event(Duration::from_millis(100))? {
            match event {
                Event::Key(key) => events::handle_key_event(app, key),
                Event::Mouse(mouse) => events::handle_mouse_event(app, mouse),
                // Terminal will redraw on next iteration
                Event::Resize(_, _) => {}
                _ => {}
            }
        }

        if last_poll.elapsed() >= poll_interval {
            app.reload_data();
            last_poll = Instant::now();
        }
    }

    Ok(())
}

/// Fetch one payload and write the view model to a JSON file
fn export_to_file(args: &Args, settings: &Settings, export_path: &Path) -> Result<()> {
    let payload: MetricsPayload = match args.file {
        Some(ref path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("invalid metrics payload in {}", path.display()))?
        }
        None => {
            let client = api_client(settings)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(client.get_metrics())
                .with_context(|| format!("failed to fetch metrics from {}", settings.api_url))?
        }
    };

    let processed = ProcessedPayload::from_payload(payload);
    ExportDocument::new(
        &processed.view_model,
        args.version_filter.as_deref(),
        processed.skipped,
    )
    .write_to(export_path)?;

    info!(
        path = %export_path.display(),
        nodes = processed.view_model.node_count(),
        skipped = processed.skipped,
        "exported view model"
    );
    println!("Exported view model to: {}", export_path.display());
    Ok(())
}
