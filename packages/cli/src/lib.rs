//! # sdmount-cli
//!
//! Command-line front end for the mount-and-verify sequence.
//!
//! ## Usage
//!
//! ```bash
//! # Self-check against a freshly formatted in-memory card
//! sdmount
//!
//! # Check an existing card image, report as JSON
//! sdmount --image card.img --json
//!
//! # Create and format a 16 MiB image, skip the read-back
//! sdmount --image card.img --format --size-mb 16 --no-read-test
//! ```

use std::cell::RefCell;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use sdmount_core::{fat, run_shared, SmokeConfig, VerifyReport};
use sdmount_disk::{BlockDevice, DiskError, ImageDisk, MemDisk};
use tracing::{info, Level};

/// sdmount - mount a FAT volume, list it and prove it can be written
#[derive(Parser, Debug)]
#[command(name = "sdmount")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Disk image to use instead of a formatted in-memory card
    #[arg(long, value_name = "PATH")]
    pub image: Option<PathBuf>,

    /// Format the image first, creating it if it does not exist
    #[arg(long, requires = "image")]
    pub format: bool,

    /// Size of a created image or in-memory card
    #[arg(long, value_name = "MB", default_value_t = 8)]
    pub size_mb: u32,

    #[arg(long, value_name = "BYTES", default_value_t = 512)]
    pub sector_size: u32,

    /// JSON config file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Read the test file back after writing it
    #[arg(long, overrides_with = "no_read_test")]
    pub read_test: bool,

    /// Stop after the write test
    #[arg(long)]
    pub no_read_test: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Keep the process alive after the run
    #[arg(long)]
    pub stay_resident: bool,
}

impl Args {
    pub fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else if self.quiet {
            Level::WARN
        } else {
            Level::INFO
        }
    }

    fn read_test_override(&self) -> Option<bool> {
        if self.no_read_test {
            Some(false)
        } else if self.read_test {
            Some(true)
        } else {
            None
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Run(#[from] sdmount_core::Error),

    #[error("failed to render report: {0}")]
    Render(#[from] serde_json::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Run(e) => e.exit_code(),
            CliError::Render(_) => -1,
        }
    }
}

impl From<sdmount_core::ConfigError> for CliError {
    fn from(e: sdmount_core::ConfigError) -> Self {
        CliError::Run(e.into())
    }
}

impl From<DiskError> for CliError {
    fn from(e: DiskError) -> Self {
        CliError::Run(e.into())
    }
}

/// Install the stderr log subscriber.
pub fn init_logging(level: Level) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

/// Defaults, then `--config`, then `SDMOUNT_*`, then flags.
pub fn load_config(args: &Args) -> Result<SmokeConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => SmokeConfig::load(path)?,
        None => SmokeConfig::default(),
    };
    config.apply_env()?;
    if let Some(read_test) = args.read_test_override() {
        config.read_test = read_test;
    }
    config.validate()?;
    Ok(config)
}

/// Run the sequence and render its report for stdout.
pub fn run(args: &Args) -> Result<String, CliError> {
    let config = load_config(args)?;
    let report = match &args.image {
        Some(path) => {
            if args.format {
                let disk = if path.exists() {
                    info!(
                        path = %path.display(),
                        "image exists, keeping its size; --size-mb is ignored"
                    );
                    ImageDisk::open(path, args.sector_size)
                } else {
                    ImageDisk::create(path, sector_count(args)?, args.sector_size)?
                };
                run_formatted(&config, disk)?
            } else {
                sdmount_core::run(&config, ImageDisk::open(path, args.sector_size))?
            }
        }
        None => {
            info!(size_mb = args.size_mb, "no image given, using an in-memory card");
            run_formatted(&config, MemDisk::new(sector_count(args)?, args.sector_size))?
        }
    };

    if args.json {
        Ok(serde_json::to_string_pretty(&report)?)
    } else {
        Ok(Summary(&report).to_string())
    }
}

fn run_formatted<D: BlockDevice>(
    config: &SmokeConfig,
    device: D,
) -> Result<VerifyReport, CliError> {
    let disk = Rc::new(RefCell::new(device));
    fat::format_volume(&disk).map_err(|source| sdmount_core::Error::Format { source })?;
    Ok(run_shared(config, disk)?)
}

fn sector_count(args: &Args) -> Result<u32, DiskError> {
    if args.sector_size == 0 || !args.sector_size.is_power_of_two() {
        return Err(DiskError::InvalidGeometry {
            message: format!("sector size {} is not a power of two", args.sector_size),
        });
    }
    let bytes = u64::from(args.size_mb) << 20;
    let count = bytes / u64::from(args.sector_size);
    match u32::try_from(count) {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(DiskError::InvalidGeometry {
            message: format!(
                "{} MB in {} byte sectors is not a usable sector count",
                args.size_mb, args.sector_size
            ),
        }),
    }
}

/// Plain-text rendering of a report.
pub struct Summary<'a>(pub &'a VerifyReport);

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        writeln!(f, "state:    {:?}", report.state)?;
        if let Some(geometry) = &report.geometry {
            writeln!(
                f,
                "device:   {} sectors x {} bytes ({} MB)",
                geometry.sector_count,
                geometry.sector_size,
                geometry.capacity_mb()
            )?;
        }
        writeln!(
            f,
            "mount:    {} ({} attempt(s))",
            report.mount_point, report.mount_attempts
        )?;
        match &report.entries {
            Some(entries) => {
                writeln!(f, "entries:  {}", entries.len())?;
                for entry in entries {
                    if entry.is_dir() {
                        writeln!(f, "  [DIR ] {}", entry.name)?;
                    } else {
                        writeln!(f, "  [FILE] {} ({} bytes)", entry.name, entry.size)?;
                    }
                }
            }
            None => writeln!(f, "entries:  unavailable")?,
        }
        writeln!(f, "written:  {} bytes", report.bytes_written)?;
        if let Some(lines) = &report.lines {
            for line in lines {
                writeln!(f, "read:     {}", line)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdmount_core::{DirEntry, MountState};
    use sdmount_disk::DeviceGeometry;

    fn args(argv: &[&str]) -> Args {
        let mut full = vec!["sdmount"];
        full.extend_from_slice(argv);
        Args::try_parse_from(full).unwrap()
    }

    #[test]
    fn read_test_flags() {
        assert_eq!(args(&[]).read_test_override(), None);
        assert_eq!(args(&["--read-test"]).read_test_override(), Some(true));
        assert_eq!(args(&["--no-read-test"]).read_test_override(), Some(false));
    }

    #[test]
    fn log_levels() {
        assert_eq!(args(&[]).log_level(), Level::INFO);
        assert_eq!(args(&["-v"]).log_level(), Level::DEBUG);
        assert_eq!(args(&["-q"]).log_level(), Level::WARN);
        assert!(Args::try_parse_from(["sdmount", "-v", "-q"]).is_err());
    }

    #[test]
    fn format_needs_an_image() {
        assert!(Args::try_parse_from(["sdmount", "--format"]).is_err());
        assert!(args(&["--image", "card.img", "--format"]).format);
    }

    #[test]
    fn sector_count_from_size() {
        assert_eq!(sector_count(&args(&[])).unwrap(), 16384);
        assert_eq!(
            sector_count(&args(&["--size-mb", "1", "--sector-size", "4096"])).unwrap(),
            256
        );
        assert!(sector_count(&args(&["--sector-size", "500"])).is_err());
        assert!(sector_count(&args(&["--size-mb", "0"])).is_err());
    }

    #[test]
    fn in_memory_run_renders_json() {
        let json = run(&args(&["--json", "-q"])).unwrap();
        let report: VerifyReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report.state, MountState::ReadVerified);
        assert_eq!(report.lines, Some(vec!["hello world!".to_string()]));
    }

    #[test]
    fn summary_lists_entries() {
        let report = VerifyReport {
            state: MountState::WriteVerified,
            geometry: Some(DeviceGeometry {
                sector_count: 2048,
                sector_size: 512,
            }),
            mount_point: "/SD:".to_string(),
            mount_attempts: 2,
            entries: Some(vec![DirEntry::directory("LOGS"), DirEntry::file("a.txt", 3)]),
            bytes_written: 13,
            lines: None,
        };
        let text = Summary(&report).to_string();
        assert!(text.contains("WriteVerified"));
        assert!(text.contains("(1 MB)"));
        assert!(text.contains("2 attempt(s)"));
        assert!(text.contains("[DIR ] LOGS"));
        assert!(text.contains("[FILE] a.txt (3 bytes)"));
        assert!(!text.contains("read:"));
    }
}
