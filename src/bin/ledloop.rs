use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ledloop", version)]
struct Cli {
    /// Log filter (overrides RUST_LOG), e.g. `debug` or `ledloop=trace`.
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Own the panel and serve the ingest and control sockets.
    Renderer(RendererArgs),
    /// Run the rotation plan and relay app frames to the renderer.
    Scheduler(SchedulerArgs),
    /// Send one command to a running renderer.
    Ctl(CtlArgs),
}

#[derive(Parser, Debug)]
struct RendererArgs {
    /// Settings file (display state and panel geometry).
    #[arg(long, default_value = "/var/lib/ledloop/settings.json")]
    settings: PathBuf,

    #[arg(long, default_value = "/run/ledloop/ingest.sock")]
    ingest_socket: PathBuf,

    #[arg(long, default_value = "/run/ledloop/control.sock")]
    control_socket: PathBuf,
}

#[derive(Parser, Debug)]
struct SchedulerArgs {
    /// Settings file; only the panel resolution is read.
    #[arg(long, default_value = "/var/lib/ledloop/settings.json")]
    settings: PathBuf,

    /// Rotation plan, re-read at the start of every cycle.
    #[arg(long, default_value = "/var/lib/ledloop/plan.json")]
    plan: PathBuf,

    /// Directory holding one sub-directory per installed app.
    #[arg(long, default_value = "/var/lib/ledloop/apps")]
    apps_dir: PathBuf,

    #[arg(long, default_value = "/run/ledloop/ingest.sock")]
    ingest_socket: PathBuf,

    /// Seconds to wait before re-reading an empty plan.
    #[arg(long, default_value_t = 2.0)]
    idle_secs: f64,

    /// Seconds to wait after a failed slot.
    #[arg(long, default_value_t = 1.0)]
    backoff_secs: f64,
}

#[derive(Parser, Debug)]
struct CtlArgs {
    #[arg(long, default_value = "/run/ledloop/control.sock")]
    control_socket: PathBuf,

    /// Seconds to wait for the renderer's reply.
    #[arg(long, default_value_t = 5.0)]
    timeout_secs: f64,

    #[command(subcommand)]
    action: CtlAction,
}

#[derive(Subcommand, Debug)]
enum CtlAction {
    /// Set brightness (clamped to 0..=1).
    Brightness {
        #[arg(allow_negative_numbers = true)]
        value: f64,
    },
    /// Turn the panel on or off.
    Power { state: ledloop::PowerState },
    /// Re-read brightness, power and gamma from the settings file.
    Reload,
    /// Print the current display state.
    Status,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log.as_deref());
    match cli.cmd {
        Command::Renderer(args) => cmd_renderer(args),
        Command::Scheduler(args) => cmd_scheduler(args),
        Command::Ctl(args) => cmd_ctl(args),
    }
}

fn init_tracing(filter: Option<&str>) {
    let env_filter = match filter {
        Some(f) => EnvFilter::new(f),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    // Ignore error if already set.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Cancel on SIGINT or SIGTERM.
fn stop_on_signals() -> anyhow::Result<ledloop::CancelToken> {
    let cancel = ledloop::CancelToken::new();
    for sig in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(sig, cancel.flag())
            .with_context(|| format!("install handler for signal {sig}"))?;
    }
    Ok(cancel)
}

fn secs(value: f64, what: &str) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("invalid {what}: {value}"))
}

fn cmd_renderer(args: RendererArgs) -> anyhow::Result<()> {
    let cancel = stop_on_signals()?;
    let cfg = ledloop::RendererConfig::new(&args.ingest_socket, &args.control_socket);
    let store = ledloop::SettingsStore::new(&args.settings);
    let renderer = ledloop::Renderer::from_settings(cfg, store)
        .with_context(|| format!("start renderer from '{}'", args.settings.display()))?;
    renderer.bind()?.run(&cancel)?;
    Ok(())
}

fn cmd_scheduler(args: SchedulerArgs) -> anyhow::Result<()> {
    let cancel = stop_on_signals()?;
    let settings = ledloop::SettingsStore::new(&args.settings)
        .load()
        .with_context(|| format!("load settings '{}'", args.settings.display()))?;

    let opts = ledloop::SchedulerOptions {
        idle_interval: secs(args.idle_secs, "--idle-secs")?,
        failure_backoff: secs(args.backoff_secs, "--backoff-secs")?,
        ..ledloop::SchedulerOptions::default()
    };
    let scheduler = ledloop::Scheduler::new(
        ledloop::PlanSource::new(&args.plan),
        ledloop::AppCatalog::new(&args.apps_dir),
        settings.panel.resolution(),
        Box::new(ledloop::IngestConnector::new(&args.ingest_socket)),
    )
    .with_options(opts);

    tracing::info!(
        plan = %args.plan.display(),
        apps_dir = %args.apps_dir.display(),
        res = %settings.panel.resolution(),
        "scheduler starting"
    );
    scheduler.run(&cancel);
    Ok(())
}

fn cmd_ctl(args: CtlArgs) -> anyhow::Result<()> {
    let cmd = match args.action {
        CtlAction::Brightness { value } => ledloop::ControlCommand::SetBrightness { value },
        CtlAction::Power { state } => ledloop::ControlCommand::Power { state },
        CtlAction::Reload => ledloop::ControlCommand::Reload,
        CtlAction::Status => ledloop::ControlCommand::Status,
    };
    let timeout = secs(args.timeout_secs, "--timeout-secs")?;
    let response = ledloop::send_command(&args.control_socket, &cmd, timeout)?;

    println!("{}", serde_json::to_string(&response)?);
    if !response.ok {
        anyhow::bail!(
            "renderer rejected '{}': {}",
            cmd.name(),
            response.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
