//! gatepulse binary entry point.
//!
//! Usage: gatepulse [--config <path>] [--log-level <level>] [--mock-relay] [--init]
//!
//! Reads codes from stdin, validates them against the access service and
//! pulses the gate relay for every accepted code.

mod console;

use anyhow::{Context, bail};
use clap::Parser;
use gatepulse_agent::{CodeFilter, InputPipeline, LineSource};
use gatepulse_core::constants::{DEFAULT_CONFIG_FILE, DEFAULT_LOG_LEVEL};
use gatepulse_core::{AgentConfig, ConfigLoad, RelayState, StatusSink};
use gatepulse_hardware::mock::MockOutputLine;
use gatepulse_hardware::{
    AnyOutputLine, Polarity, RelayController, RelayWorker, SysfsOutputLine, resolve_chip_line,
};
use gatepulse_network::{ValidationClient, ValidationClientConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

/// Exit code when a configuration template was written and must be edited.
const EXIT_TEMPLATE_CREATED: u8 = 2;

const STDIN_SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// gatepulse: validate operator codes and pulse a gate relay.
#[derive(Parser, Debug)]
#[command(name = "gatepulse", version)]
#[command(about = "Validate access codes remotely and pulse a gate relay")]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(long, env = "GATEPULSE_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(long)]
    log_level: Option<String>,

    /// Drive an in-memory relay line instead of GPIO.
    #[arg(long)]
    mock_relay: bool,

    /// Write a configuration template and exit.
    #[arg(long)]
    init: bool,
}

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Install the subscriber. `RUST_LOG`, when set, wins over every other level.
fn init_logging(level: &str) -> Option<FilterHandle> {
    let from_env = std::env::var_os(EnvFilter::DEFAULT_ENV).is_some();
    let filter = if from_env {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(level)
    };
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();

    (!from_env).then_some(handle)
}

fn write_template(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        bail!("{} already exists, refusing to overwrite it", path.display());
    }
    AgentConfig::default()
        .save(path)
        .with_context(|| format!("writing {}", path.display()))
}

fn open_line(config: &AgentConfig, mock_relay: bool) -> anyhow::Result<AnyOutputLine> {
    if mock_relay {
        let (line, _handle) = MockOutputLine::with_name("Bench Relay");
        return Ok(line.into());
    }

    let pin = match &config.gpio_chip {
        Some(chip) => resolve_chip_line(&config.gpio_root, chip, config.relay_pin)
            .with_context(|| format!("locating line {} on {chip}", config.relay_pin))?,
        None => config.relay_pin,
    };
    let polarity = Polarity::from_active_low(config.active_low);
    let line = SysfsOutputLine::open(
        &config.gpio_root,
        pin,
        polarity.level_for(RelayState::Inactive),
    )
    .with_context(|| format!("claiming GPIO {pin}"))?;
    Ok(line.into())
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let reload = init_logging(args.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL));

    if args.init {
        write_template(&args.config)?;
        println!("Config template written to {}", args.config.display());
        println!("Edit it and set your api_key before starting the agent.");
        return Ok(ExitCode::SUCCESS);
    }

    let config = match AgentConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?
    {
        ConfigLoad::Loaded(config) => config,
        ConfigLoad::TemplateCreated(path) => {
            println!("Config file not found. Template created at {}", path.display());
            println!("Please edit the config file and add your API key before running again.");
            return Ok(ExitCode::from(EXIT_TEMPLATE_CREATED));
        }
    };

    if args.log_level.is_none()
        && let Some(handle) = &reload
        && let Err(e) = handle.modify(|filter| *filter = EnvFilter::new(&config.log_level))
    {
        warn!(error = %e, "Could not apply configured log level");
    }

    info!(
        version = gatepulse_core::VERSION,
        endpoint = %config.endpoint,
        relay_pin = config.relay_pin,
        gpio_chip = config.gpio_chip.as_deref().unwrap_or("-"),
        pulse_ms = config.pulse_duration().as_millis() as u64,
        mock_relay = args.mock_relay,
        "Starting gatepulse"
    );

    let client = ValidationClient::new(ValidationClientConfig::from(&config))
        .context("building validation client")?;

    let mut relay = RelayController::new(
        open_line(&config, args.mock_relay)?,
        Polarity::from_active_low(config.active_low),
        config.pulse_duration(),
    );
    if let Err(e) = relay.initialize().await {
        if let Err(release) = relay.release().await {
            warn!(error = %release, "Releasing relay after failed start");
        }
        return Err(e).context("driving relay to inactive");
    }

    let (status, events) = StatusSink::channel();
    let presenter = console::spawn(events);
    println!("{}", console::banner(args.mock_relay));

    let relay = RelayWorker::new(relay, config.queue_capacity).spawn(status.clone());
    let pipeline = InputPipeline::new(LineSource::stdin(), client, relay, status)
        .with_filter(CodeFilter::new(&config.permitted_prefixes));

    let report = pipeline
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Could not listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await;

    // All sinks are gone once the pipeline returns; wait for the last lines.
    let _ = presenter.await;

    println!();
    println!("Exiting ({})", report.reason);
    info!(
        reason = %report.reason,
        validations = report.counts.validations,
        accepted = report.counts.accepted,
        pulses = report.counts.pulses_requested,
        "Session ended"
    );

    if let Err(e) = report.cleanup {
        warn!(error = %e, "Relay cleanup reported an error");
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let args = Args::parse();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: starting async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(args));
    // A pending stdin read holds a blocking thread until the next newline.
    runtime.shutdown_timeout(STDIN_SHUTDOWN_GRACE);

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
