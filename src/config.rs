//! Command-line configuration for the `tiff-stack` binary.
//!
//! Options can be given on the command line or through environment variables
//! with the `TIFF_STACK_` prefix:
//!
//! - `TIFF_STACK_MAX_DIRECTORIES` - Directory chain limit (default: 65536)
//! - `TIFF_STACK_FIRST_BYTE` - Offset of the TIFF header in the file (default: 0)
//! - `TIFF_STACK_FORMAT` - Output format, `text` or `json` (default: text)
//! - `TIFF_STACK_STRICT` - Fail `inspect` when memory regions do not tile the file
//! - `TIFF_STACK_SUBFILE_TYPE` - Subfile type selected by `samples` (default: 0)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::format::tiff::DEFAULT_MAX_DIRECTORIES;
use crate::image::OpenOptions;

// =============================================================================
// CLI Arguments
// =============================================================================

/// tiff-stack - zero-copy reader for TIFF and LSM image stacks.
#[derive(Parser, Debug, Clone)]
#[command(name = "tiff-stack")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List directories and entries, and check memory layout
    Inspect(InspectConfig),

    /// Assemble channel arrays and describe them
    Samples(SamplesConfig),
}

/// Output format of the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON document
    Json,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct CommonOptions {
    /// TIFF or LSM file to read.
    pub path: PathBuf,

    /// Maximum number of directories accepted in one chain.
    #[arg(long, default_value_t = DEFAULT_MAX_DIRECTORIES, env = "TIFF_STACK_MAX_DIRECTORIES")]
    pub max_directories: usize,

    /// Offset of the TIFF header, for TIFF data embedded in another file.
    #[arg(long, default_value_t = 0, env = "TIFF_STACK_FIRST_BYTE")]
    pub first_byte: u64,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, env = "TIFF_STACK_FORMAT")]
    pub format: OutputFormat,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl CommonOptions {
    /// Validate the options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.path.as_os_str().is_empty() {
            return Err("A file path is required".to_string());
        }
        if self.max_directories == 0 {
            return Err("max_directories must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Open options matching these settings.
    pub fn open_options(&self) -> OpenOptions {
        OpenOptions::new()
            .max_directories(self.max_directories)
            .first_byte(self.first_byte)
    }
}

/// `inspect` subcommand.
#[derive(Args, Debug, Clone)]
pub struct InspectConfig {
    #[command(flatten)]
    pub common: CommonOptions,

    /// Exit with failure when memory regions leave gaps or overlap.
    #[arg(long, default_value_t = false, env = "TIFF_STACK_STRICT")]
    pub strict: bool,
}

impl InspectConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.common.validate()
    }
}

/// `samples` subcommand.
#[derive(Args, Debug, Clone)]
pub struct SamplesConfig {
    #[command(flatten)]
    pub common: CommonOptions,

    /// Subfile type to select: 0 for full resolution, 1 for thumbnails.
    #[arg(long, default_value_t = 0, env = "TIFF_STACK_SUBFILE_TYPE")]
    pub subfile_type: u32,
}

impl SamplesConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.common.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================
