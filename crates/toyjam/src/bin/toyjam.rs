//! Toyjam daemon binary
//!
//! Loads configuration and assets, brings up sensors and the audio engine,
//! then runs the main loop until SIGINT or SIGTERM.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use toyconf::{EngineKind, SensorBackend, ToyConfig};
use toyjam::{
    edge_queue, init_with_retry, spawn_startup_chime, AnalogReader, AnalogSensor, AssetLibrary,
    AudioChannelPool, AudioEngine, ConsoleSensors, CrossfadeController, DebounceFilter, EdgeEvent,
    IioAdc, InitOutcome, LineMap, MainLoop, MemoryEngine, RetryPolicy, SensorRelease,
    SessionStateMachine, SharedDial, Snapshot, SysfsGpio, SystemState,
};

/// Toyjam - slot sensors drive an ambience bed and six foreground loops
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Config file used in place of ./toyjam.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sensor backend (sysfs or console)
    #[arg(long)]
    sensors: Option<SensorBackend>,

    /// Audio engine (memory or rodio)
    #[arg(long)]
    engine: Option<EngineKind>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, sources) = ToyConfig::load_with_sources_from(args.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(backend) = args.sensors {
        config.sensors.backend = backend;
    }
    if let Some(engine) = args.engine {
        config.audio.engine = engine;
    }
    config.validate().context("invalid configuration")?;

    if args.print_config {
        print!("{}", config.to_toml());
        return Ok(());
    }

    init_tracing(&config.telemetry.log_level)?;
    info!("toyjam {} starting", env!("CARGO_PKG_VERSION"));
    for file in &sources.files {
        info!(path = %file.display(), "config loaded");
    }
    for var in &sources.env_overrides {
        debug!(var = %var, "config overridden from environment");
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let library = AssetLibrary::load(
        &config.audio.asset_dir,
        &config.audio.foreground,
        &config.audio.background,
    )
    .with_context(|| format!("failed to load assets from {}", config.audio.asset_dir.display()))?;

    let lines = LineMap::new(config.sensors.slot_lines.clone());
    let (edges_tx, edges_rx) = edge_queue(config.sensors.queue_capacity);
    let (mut sensors, analog): (Box<dyn SensorRelease>, Box<dyn AnalogSensor>) =
        match config.sensors.backend {
            SensorBackend::Sysfs => {
                let gpio = SysfsGpio::open(
                    &config.sensors.gpio_root,
                    lines.lines(),
                    std::time::Duration::from_millis(config.sensors.poll_interval_ms),
                    edges_tx,
                )
                .context("failed to open gpio lines")?;
                let adc: Box<dyn AnalogSensor> = Box::new(IioAdc::new(&config.sensors.adc_path));
                (Box::new(gpio) as Box<dyn SensorRelease>, adc)
            }
            SensorBackend::Console => {
                let dial = SharedDial::new(config.sensors.fallback_raw);
                let console = ConsoleSensors::stdin(edges_tx, dial.clone());
                (Box::new(console) as Box<dyn SensorRelease>, Box::new(dial) as Box<dyn AnalogSensor>)
            }
        };
    info!(backend = %config.sensors.backend, "sensors ready");

    spawn_startup_chime(&config.audio.startup_chime);

    let policy = RetryPolicy {
        backoff: config.audio.init_backoff(),
        max_attempts: config.audio.init_max_attempts,
    };
    let max_voices = config.audio.max_voices;

    let snapshot = match config.audio.engine {
        EngineKind::Memory => {
            let outcome = init_with_retry(policy, &shutdown, || {
                Ok::<_, toyjam::PlaybackError>(MemoryEngine::new(max_voices))
            })
            .await;
            match engine_ready(outcome)? {
                Some(engine) => Some(serve(engine, library, analog, lines, edges_rx, &config, shutdown).await),
                None => None,
            }
        }
        #[cfg(feature = "rodio")]
        EngineKind::Rodio => {
            let outcome =
                init_with_retry(policy, &shutdown, || toyjam::RodioEngine::open(max_voices)).await;
            match engine_ready(outcome)? {
                Some(engine) => Some(serve(engine, library, analog, lines, edges_rx, &config, shutdown).await),
                None => None,
            }
        }
        #[cfg(not(feature = "rodio"))]
        EngineKind::Rodio => {
            sensors.release();
            bail!("this build has no rodio support; rebuild with --features rodio");
        }
    };

    sensors.release();

    match snapshot {
        Some(snapshot) => match serde_json::to_string(&snapshot) {
            Ok(json) => info!(snapshot = %json, "final state"),
            Err(e) => warn!(error = %e, "failed to serialize final state"),
        },
        None => info!("shutdown before the audio engine came up"),
    }
    info!("toyjam shutdown complete");
    Ok(())
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))
}

/// Unwrap the engine, or `None` if shutdown came first
fn engine_ready<E>(outcome: InitOutcome<E>) -> Result<Option<E>> {
    match outcome {
        InitOutcome::Ready { value, attempts } => {
            info!(attempts, "audio engine ready");
            Ok(Some(value))
        }
        InitOutcome::Cancelled { attempts } => {
            info!(attempts, "audio engine init cancelled");
            Ok(None)
        }
        InitOutcome::Failed {
            attempts,
            last_error,
        } => bail!("audio engine unavailable after {} attempts: {}", attempts, last_error),
    }
}

async fn serve<E: AudioEngine>(
    engine: E,
    library: AssetLibrary,
    analog: Box<dyn AnalogSensor>,
    lines: LineMap,
    edges: mpsc::Receiver<EdgeEvent>,
    config: &ToyConfig,
    shutdown: CancellationToken,
) -> Snapshot {
    let state = SystemState::new(
        AudioChannelPool::new(engine, library, config.audio.loop_forever),
        SessionStateMachine::new(config.timing.playback_duration()),
        CrossfadeController::new(
            AnalogReader::new(analog, config.sensors.fallback_raw),
            config.sensors.sensor_max,
        ),
        DebounceFilter::new(config.timing.debounce_window()),
        lines,
    );

    info!(
        timeout_secs = config.timing.playback_duration_secs,
        debounce_ms = config.timing.debounce_ms,
        "waiting for the first insertion"
    );
    let state = MainLoop::new(state, edges, config.timing.tick_interval())
        .run(shutdown)
        .await;
    state.snapshot(Instant::now())
}

/// Cancel `shutdown` on SIGINT or SIGTERM
async fn wait_for_signal(shutdown: CancellationToken) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT, shutting down");
        }
        _ = sigterm() => {
            info!("received SIGTERM, shutting down");
        }
    }
    shutdown.cancel();
}

#[cfg(unix)]
async fn sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            term.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "SIGTERM handler unavailable");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn sigterm() {
    std::future::pending::<()>().await;
}
