use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use tracing::warn;
use verikiosk::{
    config::KioskConfig,
    scanlog::{load_entries, JsonFileScanLog, ScanLogEntry, SCAN_LOG_FILE},
};

/// Inspect the kiosk scan log.
#[derive(Parser, Debug)]
#[command(name = "scanlog")]
#[command(about = "Inspect and maintain the verikiosk scan log")]
struct Args {
    /// Path to a scan log file (overrides the configured data directory)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to verikiosk configuration file (for the data directory)
    #[arg(short = 'c', long, default_value = "verikiosk.toml")]
    config: PathBuf,

    /// Timezone used when printing timestamps
    #[arg(long, default_value = "UTC")]
    timezone: String,

    /// Print entries as JSON lines
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every entry, oldest first
    List,
    /// Print the most recent entries
    Tail {
        #[arg(default_value_t = 10)]
        count: usize,
    },
    /// Count entries by result type
    Stats,
    /// Remove every entry
    Clear,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let path = resolve_log_path(&args)?;
    let timezone = resolve_timezone(&args.timezone);

    match args.command {
        Command::List => {
            let entries = load_entries(&path)
                .with_context(|| format!("Failed to read scan log {}", path.display()))?;
            print_entries(&entries, &timezone, args.json)?;
        }
        Command::Tail { count } => {
            let entries = load_entries(&path)
                .with_context(|| format!("Failed to read scan log {}", path.display()))?;
            let start = entries.len().saturating_sub(count);
            print_entries(&entries[start..], &timezone, args.json)?;
        }
        Command::Stats => {
            let entries = load_entries(&path)
                .with_context(|| format!("Failed to read scan log {}", path.display()))?;
            print_stats(&entries, &timezone);
        }
        Command::Clear => {
            // Capacity is irrelevant for clearing
            JsonFileScanLog::new(path.clone(), 1)
                .clear()
                .with_context(|| format!("Failed to clear scan log {}", path.display()))?;
            println!("Cleared {}", path.display());
        }
    }

    Ok(())
}

fn resolve_log_path(args: &Args) -> Result<PathBuf> {
    if let Some(file) = &args.file {
        return Ok(file.clone());
    }
    let data_dir = load_data_dir(&args.config)?;
    Ok(Path::new(&data_dir).join(SCAN_LOG_FILE))
}

fn load_data_dir(config_path: &Path) -> Result<String> {
    if config_path.exists() {
        let cfg = KioskConfig::load_from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
        Ok(cfg.system.data_dir)
    } else {
        warn!(
            "Config file {} not found, using built-in defaults",
            config_path.display()
        );
        Ok(KioskConfig::default().system.data_dir)
    }
}

fn resolve_timezone(tz_name: &str) -> Tz {
    match tz_name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            warn!("Invalid timezone '{}', falling back to UTC", tz_name);
            chrono_tz::UTC
        }
    }
}

fn print_entries(entries: &[ScanLogEntry], timezone: &Tz, json: bool) -> Result<()> {
    if entries.is_empty() {
        println!("Scan log is empty");
        return Ok(());
    }
    for entry in entries {
        if json {
            println!("{}", serde_json::to_string(entry)?);
        } else {
            println!("{}", format_entry(entry, timezone));
        }
    }
    Ok(())
}

fn format_entry(entry: &ScanLogEntry, timezone: &Tz) -> String {
    let when = entry.timestamp.with_timezone(timezone);
    format!(
        "{}  {:<11}  {}",
        when.format("%Y-%m-%d %H:%M:%S %Z"),
        entry.kind,
        summarize(entry)
    )
}

/// One-line summary of the most identifying field of an entry
fn summarize(entry: &ScanLogEntry) -> String {
    const KEYS: [&str; 4] = ["certificate_id", "product_name", "message", "status"];
    KEYS.iter()
        .find_map(|key| {
            entry
                .data
                .get(*key)
                .and_then(|v| v.as_str())
                .map(|v| format!("{}={}", key, v))
        })
        .unwrap_or_else(|| "-".to_string())
}

fn count_by_kind(entries: &[ScanLogEntry]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for entry in entries {
        *counts.entry(entry.kind.as_str()).or_insert(0) += 1;
    }
    counts
}

fn print_stats(entries: &[ScanLogEntry], timezone: &Tz) {
    println!("Total entries: {}", entries.len());
    for (kind, count) in count_by_kind(entries) {
        println!("  {:<11} {}", kind, count);
    }
    if let (Some(first), Some(last)) = (entries.first(), entries.last()) {
        println!(
            "Oldest: {}",
            first.timestamp.with_timezone(timezone).format("%Y-%m-%d %H:%M:%S %Z")
        );
        println!(
            "Newest: {}",
            last.timestamp.with_timezone(timezone).format("%Y-%m-%d %H:%M:%S %Z")
        );
    }
}
