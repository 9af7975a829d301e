use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout},
    Terminal,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sparsewatch::app::write_export;
use sparsewatch::train::{build_trainer, reset_train_dir, TrainSettings};
use sparsewatch::{events, ui, App, ChannelSource, FileSource, ReportSource, Thresholds, View, WindowData};
use sparsewatch_sdk::{DataFormat, Output};

#[derive(Parser, Debug)]
#[command(name = "sparsewatch", version)]
#[command(about = "Train with an activation sparsity monitor and browse its windows")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the training loop with the sparsity monitor attached
    Train(TrainArgs),
    /// Browse exported window artifacts
    View(ViewArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Settings file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for run state, cleared at startup
    #[arg(long)]
    train_dir: Option<PathBuf>,

    /// Number of steps to run
    #[arg(long)]
    max_steps: Option<u64>,

    /// Steps between loss log lines
    #[arg(long)]
    log_frequency: Option<u64>,

    /// Examples per step
    #[arg(long)]
    batch_size: Option<usize>,

    /// Steps between sparsity samples
    #[arg(long)]
    monitor_interval: Option<u64>,

    /// Samples per monitoring window
    #[arg(long)]
    monitor_period: Option<usize>,

    /// Write window artifacts to --io-path
    #[arg(long)]
    file_io: bool,

    /// Artifact directory
    #[arg(long)]
    io_path: Option<PathBuf>,

    /// Model tag used in artifact names
    #[arg(long)]
    model: Option<String>,

    /// Activation layout (NHWC or NCHW)
    #[arg(long)]
    data_format: Option<DataFormat>,

    /// Magnitude at or below which an activation counts as zero
    #[arg(long)]
    zero_threshold: Option<f32>,

    /// Tensors fetched per monitored step, rotating through the candidates
    #[arg(long)]
    tensors_per_step: Option<usize>,

    /// Skip spatial masks
    #[arg(long)]
    no_spatial: bool,

    /// Run without the sparsity monitor
    #[arg(long)]
    no_monitor: bool,

    /// Log engine placement details at startup
    #[arg(long)]
    log_device_placement: bool,

    /// Seed for the synthetic engine
    #[arg(long)]
    seed: Option<u64>,

    /// Watch windows in the viewer while training (logs go to the train dir)
    #[arg(long)]
    live: bool,

    #[command(flatten)]
    thresholds: ThresholdArgs,
}

impl TrainArgs {
    /// Apply command-line overrides on top of layered settings.
    fn apply(&self, settings: &mut TrainSettings) {
        if let Some(ref dir) = self.train_dir {
            settings.train_dir = dir.clone();
        }
        if let Some(n) = self.max_steps {
            settings.max_steps = n;
        }
        if let Some(n) = self.log_frequency {
            settings.log_frequency = n;
        }
        if let Some(n) = self.batch_size {
            settings.batch_size = n;
        }
        if let Some(n) = self.monitor_interval {
            settings.monitor_interval = n;
        }
        if let Some(n) = self.monitor_period {
            settings.monitor_period = n;
        }
        if self.file_io {
            settings.file_io = true;
        }
        if let Some(ref path) = self.io_path {
            settings.io_path = path.clone();
        }
        if let Some(ref model) = self.model {
            settings.model = model.clone();
        }
        if let Some(format) = self.data_format {
            settings.data_format = format;
        }
        if let Some(t) = self.zero_threshold {
            settings.zero_threshold = t;
        }
        if let Some(n) = self.tensors_per_step {
            settings.tensors_per_step = Some(n);
        }
        if self.no_spatial {
            settings.track_spatial = false;
        }
        if self.no_monitor {
            settings.monitor_disabled = true;
        }
        if self.log_device_placement {
            settings.log_device_placement = true;
        }
        if let Some(seed) = self.seed {
            settings.seed = seed;
        }
    }
}

#[derive(Args, Debug)]
struct ViewArgs {
    /// Window artifact, or a directory of artifacts
    #[arg(default_value = "resnet_50Kiter")]
    path: PathBuf,

    /// Refresh interval in seconds
    #[arg(short, long, default_value = "1")]
    refresh: u64,

    /// Export the newest window to a JSON file and exit
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(flatten)]
    thresholds: ThresholdArgs,
}

#[derive(Args, Debug)]
struct ThresholdArgs {
    /// Ratio from which a tensor is shown as elevated
    #[arg(long, default_value_t = 0.5)]
    elevated: f64,

    /// Ratio from which a tensor is shown as high
    #[arg(long, default_value_t = 0.9)]
    high: f64,
}

impl ThresholdArgs {
    fn thresholds(&self) -> Thresholds {
        Thresholds {
            elevated: self.elevated,
            high: self.high,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Train(args) => train(args),
        Command::View(args) => view(args),
    }
}

/// Install the tracing subscriber, writing to `log_file` when given and to
/// stderr otherwise. `RUST_LOG` overrides the default `info` level.
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(io::stderr).init(),
    }
    Ok(())
}

fn train(args: TrainArgs) -> Result<()> {
    let mut settings = TrainSettings::load(args.config.as_deref())?;
    args.apply(&mut settings);
    settings.validate()?;

    reset_train_dir(&settings.train_dir)?;

    if args.live {
        let log_path = settings.train_dir.join("sparsewatch.log");
        init_logging(Some(&log_path))?;
        return run_live(&settings, args.thresholds.thresholds());
    }

    init_logging(None)?;
    let mut trainer = build_trainer(&settings, None)?;
    let summary = trainer.run()?;
    info!(
        steps = summary.steps_run,
        loss = ?summary.final_loss,
        elapsed = ?summary.elapsed,
        "training finished"
    );
    Ok(())
}

/// Train on a background thread and show windows as they complete.
fn run_live(settings: &TrainSettings, thresholds: Thresholds) -> Result<()> {
    let (output, rx) = Output::channel(64);
    let cancel = Arc::new(AtomicBool::new(false));
    let mut trainer = build_trainer(settings, Some(Box::new(output)))?.cancel_on(cancel.clone());

    let handle = std::thread::Builder::new()
        .name("trainer".to_string())
        .spawn(move || match trainer.run() {
            Ok(summary) => info!(
                steps = summary.steps_run,
                cancelled = summary.cancelled,
                "training finished"
            ),
            Err(e) => error!("training failed: {:#}", e),
        })
        .context("Failed to spawn training thread")?;

    let source = Box::new(ChannelSource::new(rx, &settings.model));
    let result = run_tui(source, thresholds, Duration::from_millis(100));

    cancel.store(true, Ordering::Relaxed);
    if handle.join().is_err() {
        error!("training thread panicked");
    }
    result
}

fn view(args: ViewArgs) -> Result<()> {
    if let Some(ref path) = args.log_file {
        init_logging(Some(path))?;
    }
    let thresholds = args.thresholds.thresholds();

    // Handle export mode (non-interactive)
    if let Some(ref export_path) = args.export {
        return export_to_file(&args.path, export_path, &thresholds);
    }

    let source = Box::new(FileSource::new(&args.path));
    run_tui(source, thresholds, Duration::from_secs(args.refresh))
}

/// Run the TUI with the given report source
fn run_tui(
    source: Box<dyn ReportSource>,
    thresholds: Thresholds,
    refresh_interval: Duration,
) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    // Create app and load initial data
    let mut app = App::new(source, thresholds);
    let _ = app.reload_data();

    let result = run_app(&mut terminal, &mut app, refresh_interval);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    refresh_interval: Duration,
) -> Result<()> {
    let mut last_refresh = Instant::now();

    // Minimum terminal size for usable display
    const MIN_WIDTH: u16 = 60;
    const MIN_HEIGHT: u16 = 12;

    while app.running {
        terminal.draw(|frame| {
            let area = frame.area();

            if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
                let msg = format!(
                    "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
                    area.width, area.height, MIN_WIDTH, MIN_HEIGHT
                );
                let paragraph = ratatui::widgets::Paragraph::new(msg)
                    .alignment(ratatui::layout::Alignment::Center)
                    .style(ratatui::style::Style::default().fg(ratatui::style::Color::Yellow));
                let centered = ratatui::layout::Rect::new(0, area.height / 2 - 2, area.width, 5);
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
                View::Summary => ui::summary::render(frame, app, chunks[2]),
                View::Pattern => ui::pattern::render(frame, app, chunks[2]),
            }

            ui::common::render_status_bar(frame, app, chunks[3]);

            if app.show_help {
                ui::common::render_help(frame, app, area);
            }
        })?;

        // Poll for events with a short timeout
        if let Some(event) = events::poll_event(Duration::from_millis(50))? {
            match event {
                Event::Key(key) => events::handle_key_event(app, key),
                Event::Mouse(mouse) => {
                    // Content starts after header (1) + tabs (1) + block border (1)
                    events::handle_mouse_event(app, mouse, 3);
                }
                _ => {}
            }
        }

        app.tick();

        if last_refresh.elapsed() >= refresh_interval {
            let _ = app.reload_data();
            last_refresh = Instant::now();
        }
    }

    Ok(())
}

/// Export the newest window under `path` to a JSON file
fn export_to_file(path: &Path, export_path: &Path, thresholds: &Thresholds) -> Result<()> {
    let mut source = FileSource::new(path);
    let Some(report) = source.poll() else {
        anyhow::bail!(
            "No window report at {}: {}",
            path.display(),
            source.error().unwrap_or("nothing to read")
        );
    };

    let data = WindowData::from_report(report, thresholds);
    write_export(&data, export_path)?;

    println!("Exported window to: {}", export_path.display());
    Ok(())
}
