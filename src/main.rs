//! tiff-stack - inspect TIFF/LSM image stacks and their channel layout.

use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tiff_stack::{
    config::{Cli, Command, InspectConfig, OutputFormat, SamplesConfig},
    MemoryRegion, RegionIssue, StackSummary,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Inspect(config) => run_inspect(config),
        Command::Samples(config) => run_samples(config),
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "tiff_stack=debug"
    } else {
        "tiff_stack=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to serialize output: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Inspect Command
// =============================================================================

#[derive(Serialize)]
struct EntryReport {
    tag: u16,
    name: String,
    type_name: String,
    count: u64,
    offset: Option<u64>,
    value: String,
}

#[derive(Serialize)]
struct DirectoryReport {
    index: usize,
    offset: u64,
    vendor: Option<&'static str>,
    entries: Vec<EntryReport>,
}

#[derive(Serialize)]
struct InspectReport {
    file: String,
    size: u64,
    byte_order: String,
    directories: Vec<DirectoryReport>,
    memory_valid: bool,
    unknown_bytes: u64,
    regions: Vec<MemoryRegion>,
    issues: Vec<RegionIssue>,
}

fn run_inspect(config: InspectConfig) -> ExitCode {
    init_logging(config.common.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let image = match config.common.open_options().open(&config.common.path) {
        Ok(image) => image,
        Err(e) => {
            error!("Failed to open {}: {}", config.common.path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let bytes = image.accessor();
    let directories = image
        .directories()
        .iter()
        .map(|dir| DirectoryReport {
            index: dir.index,
            offset: dir.offset,
            vendor: dir.vendor().map(|v| v.name()),
            entries: dir
                .entries
                .iter()
                .map(|entry| EntryReport {
                    tag: entry.tag,
                    name: entry.tag_name.to_string(),
                    type_name: entry.type_name.to_string(),
                    count: entry.count,
                    offset: entry.offset(),
                    value: entry.describe(bytes),
                })
                .collect(),
        })
        .collect();

    let memory = image.memory_report();
    let report = InspectReport {
        file: image.identifier().to_string(),
        size: image.size(),
        byte_order: format!("{:?}", image.byte_order()),
        directories,
        memory_valid: memory.is_valid,
        unknown_bytes: memory.unknown_bytes(),
        regions: memory.regions.clone(),
        issues: memory.issues.clone(),
    };

    let status = match config.common.format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => {
            print_inspect_text(&report);
            ExitCode::SUCCESS
        }
    };

    if config.strict && !report.memory_valid {
        error!(
            "Memory layout check failed: {} issue(s), {} unknown byte(s)",
            report.issues.len(),
            report.unknown_bytes
        );
        return ExitCode::FAILURE;
    }
    status
}

fn print_inspect_text(report: &InspectReport) {
    println!("{} ({} bytes, {})", report.file, report.size, report.byte_order);
    println!();

    for dir in &report.directories {
        match dir.vendor {
            Some(vendor) => println!("IFD{} @ {} [{}]", dir.index, dir.offset, vendor),
            None => println!("IFD{} @ {}", dir.index, dir.offset),
        }
        for entry in &dir.entries {
            println!("  {}", entry.value);
        }
        println!();
    }

    println!("Memory regions:");
    for region in &report.regions {
        println!(
            "  {}..{}[{}] {}",
            region.start,
            region.end,
            region.len(),
            region.label
        );
    }
    for issue in &report.issues {
        match issue {
            RegionIssue::Gap { start, end } => {
                println!("  ! {} unknown bytes at {}..{}", end - start, start, end)
            }
            RegionIssue::Overlap {
                start,
                previous_end,
                label,
            } => println!(
                "  ! {} overlaps previous region by {} bytes",
                label,
                previous_end - start
            ),
        }
    }
    if report.memory_valid {
        println!("✓ memory layout accounted for");
    } else {
        println!("✗ {} unknown byte(s)", report.unknown_bytes);
    }
}

// =============================================================================
// Samples Command
// =============================================================================

#[derive(Serialize)]
struct ChannelReport {
    name: String,
    shape: [usize; 3],
    element_type: String,
    storage: &'static str,
}

#[derive(Serialize)]
struct SamplesReport {
    file: String,
    subfile_type: u32,
    summary: StackSummary,
    channels: Vec<ChannelReport>,
    warnings: Vec<String>,
}

fn run_samples(config: SamplesConfig) -> ExitCode {
    init_logging(config.common.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let image = match config.common.open_options().open(&config.common.path) {
        Ok(image) => image,
        Err(e) => {
            error!("Failed to open {}: {}", config.common.path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let samples = match image.get_samples(config.subfile_type, config.common.verbose) {
        Ok(samples) => samples,
        Err(e) => {
            error!("Failed to assemble samples ({:?}): {}", e.category(), e);
            return ExitCode::FAILURE;
        }
    };

    let report = SamplesReport {
        file: image.identifier().to_string(),
        subfile_type: config.subfile_type,
        summary: samples.summary.clone(),
        channels: samples
            .iter()
            .map(|(name, view)| ChannelReport {
                name: name.to_string(),
                shape: view.shape(),
                element_type: view.element_type().to_string(),
                storage: view.storage_kind(),
            })
            .collect(),
        warnings: samples.warnings.clone(),
    };

    match config.common.format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => {
            let s = &report.summary;
            println!("{}", report.file);
            println!(
                "  {} x {} x {} (depth x height x width), {} sample(s) per pixel",
                s.depth, s.height, s.width, s.samples_per_pixel
            );
            println!(
                "  planar configuration {}, compression {}, bits {:?}",
                s.planar_configuration, s.compression, s.bits_per_sample
            );
            for channel in &report.channels {
                println!(
                    "  {:<16} {:?} {} ({})",
                    channel.name, channel.shape, channel.element_type, channel.storage
                );
            }
            for warning in &report.warnings {
                println!("  warning: {}", warning);
            }
            ExitCode::SUCCESS
        }
    }
}
