use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use verikiosk::capture::{ScanScript, ScriptedDecoder, SyntheticCameraOpener};
use verikiosk::ocr::TesseractExtractor;
use verikiosk::{CameraSetup, HttpBackend, KioskConfig, KioskOrchestrator};

/// Frames each `--scan` payload stays in view of the synthetic camera
const DEMO_PAYLOAD_FRAMES: u32 = 5;

#[derive(Parser, Debug)]
#[command(name = "verikiosk")]
#[command(about = "Certificate and product verification kiosk")]
#[command(version)]
#[command(long_about = "Unattended kiosk that scans QR codes and product labels, verifies them \
against the verification service and shows the result. Falls back to maintenance mode while \
the service is unreachable.")]
struct Args {
    #[arg(short, long, default_value = "verikiosk.toml", help = "Path to TOML configuration file")]
    config: String,

    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    #[arg(long, help = "Validate configuration file and exit without starting the kiosk")]
    validate_config: bool,

    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    #[arg(long, help = "Initialize components but don't start them")]
    dry_run: bool,

    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    #[arg(long, value_name = "DIR", help = "Also write daily-rolling log files to this directory")]
    log_dir: Option<String>,

    #[arg(long, help = "Enable the operator keyboard console")]
    keyboard: bool,

    #[arg(long, help = "Start scanning immediately instead of waiting for the operator")]
    auto_start: bool,

    #[arg(long, help = "Use the synthetic camera even when a real camera is available")]
    synthetic: bool,

    #[arg(
        long = "scan",
        value_name = "PAYLOAD",
        help = "Payload shown to the synthetic camera; repeat for more. Also bound to keys 1-9"
    )]
    scan: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let log_guard = init_logging(&args)?;

    info!("Starting verikiosk v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match KioskConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }
    if args.validate_config {
        println!("✓ Configuration is valid");
        return Ok(());
    }

    let backend = Arc::new(HttpBackend::new(&config.backend).map_err(|e| {
        error!("Failed to create verification backend client: {}", e);
        e
    })?);
    let extractor = Arc::new(TesseractExtractor::new());

    let script = ScanScript::new();
    let camera = select_camera(&args, &config, &script)?;

    let mut orchestrator = KioskOrchestrator::new(config, backend, extractor, camera).map_err(|e| {
        error!("Failed to create orchestrator: {}", e);
        e
    })?;
    orchestrator.set_keyboard_enabled(args.keyboard);
    orchestrator.set_auto_start(args.auto_start);
    if !args.scan.is_empty() {
        orchestrator.set_scripted_payloads(script.clone(), args.scan.clone());
    }

    orchestrator.initialize().await.map_err(|e| {
        error!("Failed to initialize kiosk: {}", e);
        e
    })?;

    if args.dry_run {
        info!("Dry run mode - components initialized but not started");
        println!("✓ Dry run completed successfully - all components initialized");
        return Ok(());
    }

    orchestrator.start().await.map_err(|e| {
        error!("Failed to start kiosk: {}", e);
        e
    })?;

    for payload in &args.scan {
        script.show(payload.clone(), DEMO_PAYLOAD_FRAMES);
    }

    let exit_code = orchestrator.run().await.map_err(|e| {
        error!("Kiosk error during execution: {}", e);
        e
    })?;

    info!("verikiosk exited with code: {}", exit_code);
    // process::exit skips destructors, so flush file logs first
    drop(log_guard);
    std::process::exit(exit_code);
}

#[cfg(all(feature = "camera", target_os = "linux"))]
fn select_camera(args: &Args, config: &KioskConfig, script: &ScanScript) -> Result<CameraSetup> {
    use verikiosk::capture::{GstCameraOpener, ZbarDecoder};

    if args.synthetic || !args.scan.is_empty() {
        return Ok(synthetic_camera(script));
    }
    info!("Using GStreamer camera with zbar decoding");
    Ok(CameraSetup {
        opener: Arc::new(GstCameraOpener::new()?),
        decoder: Box::new(ZbarDecoder::new(config.scan.decode_every_n_frames)),
    })
}

#[cfg(not(all(feature = "camera", target_os = "linux")))]
fn select_camera(args: &Args, _config: &KioskConfig, script: &ScanScript) -> Result<CameraSetup> {
    if !args.synthetic {
        warn!("Built without camera support, using the synthetic camera");
    }
    Ok(synthetic_camera(script))
}

fn synthetic_camera(script: &ScanScript) -> CameraSetup {
    info!("Using synthetic camera with scripted decoding");
    CameraSetup {
        opener: Arc::new(SyntheticCameraOpener::new()),
        decoder: Box::new(ScriptedDecoder::new(script.clone())),
    }
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    // The screen target carries the presenter output and stays visible
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "verikiosk={},verikiosk::screen=info",
            log_level
        ))
    });

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    let (file_layer, guard) = match &args.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, "verikiosk.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

fn print_default_config() -> Result<()> {
    println!("# verikiosk configuration file");
    println!("# Every value can be overridden from the environment, e.g.");
    println!("# VERIKIOSK_BACKEND__BASE_URL=https://verify.example.org/api/v1");
    println!();
    println!("{}", toml::to_string_pretty(&KioskConfig::default())?);
    Ok(())
}
