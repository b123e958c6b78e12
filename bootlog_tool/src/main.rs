//! # Bootlog Tool Binary
//!
//! Records text into a file-backed log region and decodes region images.
//!
//! # Usage
//!
//! ```bash
//! # Capture a service's output into a fresh 1 MiB region
//! my_service 2>&1 | bootlog_tool record --file /tmp/boot.bin --size 1048576
//!
//! # Same, mirroring every line to stdout as the hardware port
//! dmesg | bootlog_tool record --file /tmp/boot.bin --echo
//!
//! # Inspect it afterwards
//! bootlog_tool dump --file /tmp/boot.bin
//! bootlog_tool dump --file /tmp/boot.bin --json
//! ```

#![deny(warnings)]

use bootlog_common::config::{ChannelConfig, ConfigLoader};
use bootlog_shm::{Channel, StdoutPort, map_image};
use bootlog_tool::logging::setup_tracing;
use bootlog_tool::record::{DEFAULT_RECORD_LEVEL, record_lines};
use bootlog_tool::report::DumpReport;
use bootlog_tool::{ToolError, ToolResult};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing::{error, info};

/// Bootlog Tool - record into and dump shared memory log regions
#[derive(Parser, Debug)]
#[command(name = "bootlog_tool")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Record stdin into a bootlog region and dump region images")]
#[command(long_about = None)]
struct Args {
    /// Channel configuration file (TOML). Built-in defaults when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write stdin lines into a fresh file-backed region
    Record(RecordArgs),
    /// Decode a region image
    Dump(DumpArgs),
}

#[derive(ClapArgs, Debug)]
struct RecordArgs {
    /// Region file (overrides `region.path`)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Region size in bytes (overrides `region.size`)
    #[arg(short, long)]
    size: Option<usize>,

    /// Lock the mapping into RAM
    #[arg(long)]
    locked: bool,

    /// Stamp the hardware port as disabled
    #[arg(long)]
    hdw_port_disabled: bool,

    /// Mirror every line to stdout as the hardware port
    #[arg(long)]
    echo: bool,

    /// Level tag for recorded lines
    #[arg(short, long, default_value_t = DEFAULT_RECORD_LEVEL)]
    level: u32,
}

#[derive(ClapArgs, Debug)]
struct DumpArgs {
    /// Region image (defaults to `region.path`)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("bootlog_tool failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> ToolResult<()> {
    let args = Args::parse();

    // Config first, so `[shared] log_level` can drive the subscriber. A load
    // failure is reported once tracing is up.
    let loaded = match &args.config {
        Some(path) => ChannelConfig::load(path),
        None => Ok(ChannelConfig::default()),
    };
    let configured = loaded
        .as_ref()
        .map(|config| config.shared.log_level)
        .unwrap_or_default();
    setup_tracing(configured, args.verbose, args.json_logs);

    let mut config = loaded?;
    if let Some(path) = &args.config {
        info!("Loaded config from {:?}", path);
    }

    match args.command {
        Command::Record(record) => {
            if let Some(file) = record.file {
                config.region.path = file;
            }
            if let Some(size) = record.size {
                config.region.size = size;
            }
            config.region.locked |= record.locked;
            config.hdw_port.disabled |= record.hdw_port_disabled;
            config.validate()?;
            run_record(&config, record.echo, record.level)
        }
        Command::Dump(dump) => {
            let path = dump.file.unwrap_or(config.region.path);
            run_dump(&path, dump.json)
        }
    }
}

fn run_record(config: &ChannelConfig, echo: bool, level: u32) -> ToolResult<()> {
    let builder = Channel::from_config(config)?;
    let channel = if echo {
        builder.sink(StdoutPort).build()
    } else {
        builder.build()
    };

    let unavailable = || ToolError::Unavailable {
        path: config.region.path.display().to_string(),
    };
    channel.acquire().ok_or_else(unavailable)?;
    info!(
        "Recording into {} ({} bytes)",
        config.region.path.display(),
        config.region.size
    );

    let stats = record_lines(&channel, std::io::stdin().lock(), level)?.ok_or_else(unavailable)?;
    info!(
        lines = stats.lines,
        skipped = stats.skipped,
        used = stats.used,
        discarded = stats.discarded,
        "Recording finished"
    );
    Ok(())
}

fn run_dump(path: &std::path::Path, json: bool) -> ToolResult<()> {
    let mmap = map_image(path)?;
    let image = bootlog_shm::LogImage::parse(&mmap)?;
    let report = DumpReport::from_image(&image);

    let mut stdout = std::io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut stdout, &report)?;
        writeln!(stdout)?;
    } else {
        write!(stdout, "{report}")?;
    }
    Ok(())
}
