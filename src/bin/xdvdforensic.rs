use clap::{Parser, ValueEnum};
use indicatif::ProgressBar;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use xdvdfs_forensic::{
    EmptyFilePolicy, EntryOutcome, EntryStatus, ExtractOptions, FileImage, IntegrityWarning, Mode,
    RecoveryTarget, Termination, default_output_dir, recover_directory,
};

/// XDVDFS data recovery tool
#[derive(Parser, Debug)]
#[command(name = "xdvdforensic")]
#[command(version, about, long_about = None)]
#[command(arg_required_else_help = true)]
struct Arguments {
    /// Path to the damaged disc image
    image: PathBuf,

    /// Byte offset of the directory table, in hex (e.g. 0x28800)
    #[arg(value_parser = parse_hex_offset)]
    offset: u64,

    /// List the directory, or list it and extract its files
    #[arg(value_enum)]
    mode: CliMode,

    /// Output directory (defaults to recovered_0x{sector})
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Do not create output files for zero-length entries
    #[arg(long)]
    skip_empty: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress progress bars
    #[arg(short, long)]
    quiet: bool,

    /// Number of threads to use for extraction (defaults to num_cpus / 4)
    #[arg(short = 't', long, default_value_t = num_cpus())]
    num_threads: usize,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum CliMode {
    List,
    Extract,
}

impl From<CliMode> for Mode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::List => Mode::List,
            CliMode::Extract => Mode::Extract,
        }
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().div_ceil(4))
        .unwrap_or(1)
}

fn parse_hex_offset(s: &str) -> Result<u64, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u64::from_str_radix(digits, 16).map_err(|e| format!("invalid hex offset {:?}: {}", s, e))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "error" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Main recovery pass
struct Recoverer {
    image: FileImage,
    arguments: Arguments,
    target: RecoveryTarget,
    output_dir: PathBuf,
}

impl Recoverer {
    fn new(arguments: Arguments) -> Result<Self, Box<dyn std::error::Error>> {
        let image = FileImage::open(&arguments.image)?;

        let empty_files = if arguments.skip_empty {
            EmptyFilePolicy::Skip
        } else {
            EmptyFilePolicy::Write
        };
        let target = RecoveryTarget::new(arguments.offset, arguments.mode.into())
            .with_options(ExtractOptions { empty_files });

        let output_dir = arguments
            .output_dir
            .clone()
            .unwrap_or_else(|| default_output_dir(target.sector()));

        if target.mode == Mode::Extract {
            fs::create_dir_all(&output_dir)?;
        }

        Ok(Self {
            image,
            arguments,
            target,
            output_dir,
        })
    }

    fn create_progress_bar(&self, len: u64, msg: &str) -> ProgressBar {
        if self.arguments.quiet {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len);

        pb.set_message(msg.to_string());
        pb
    }

    fn create_spinner(&self, msg: &str) -> ProgressBar {
        if self.arguments.quiet {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new_spinner();
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }

    fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let sector = self.target.sector();

        if !self.arguments.quiet {
            eprintln!(
                "Reading directory structure at sector 0x{:X} from '{}'...",
                sector,
                self.arguments.image.display()
            );
        }

        let spinner = self.create_spinner("Decoding directory...");
        let directory = self.image.read_directory(sector)?;
        spinner.finish_with_message(format!("Found {} entries", directory.len()));

        match directory.termination() {
            Termination::Sentinel => {}
            Termination::StructuralBreak { record_offset } => eprintln!(
                " ! directory broken at 0x{:X}, stopping read",
                record_offset
            ),
            Termination::EntryLimit => eprintln!(
                " ! directory did not terminate after {} entries, stopping read",
                directory.len()
            ),
        }

        let label = match self.target.mode {
            Mode::List => "Checking",
            Mode::Extract => "Extracting",
        };
        let pb = self.create_progress_bar(directory.len() as u64, label);

        let report = recover_directory(
            &self.image,
            &self.target,
            directory,
            &self.output_dir,
            |_| pb.inc(1),
        );

        pb.finish_and_clear();

        for outcome in &report.outcomes {
            print!("{}", format_outcome(outcome, self.arguments.verbose));
        }

        if !self.arguments.quiet {
            eprintln!();
            eprintln!(
                "{} entries, {} extracted, {} partial, {} failed, {} out of bounds, {} warnings",
                report.directory.len(),
                report.extracted(),
                report.partial(),
                report.failed(),
                report.out_of_bounds(),
                report.warnings()
            );
            if self.target.mode == Mode::Extract {
                eprintln!("  Output: {}", self.output_dir.display());
            }
        }

        Ok(())
    }
}

/// Listing lines for one entry, each ending in a newline.
fn format_outcome(outcome: &EntryOutcome, verbose: bool) -> String {
    let entry = &outcome.entry;
    let mut lines = Vec::new();

    if entry.is_file() {
        lines.push(format!(
            "{} - 0x{:08X} - {} - {} bytes",
            entry.name,
            entry.data_offset(),
            entry.kind(),
            entry.size
        ));
    } else {
        lines.push(format!(
            "{} - 0x{:08X} - {}",
            entry.name,
            entry.data_offset(),
            entry.kind()
        ));
    }

    if verbose {
        lines.push(format!(
            "   flags 0x{:02X} {:?}, field 0x{:08X}, record at 0x{:X}",
            entry.flags,
            entry.attributes(),
            entry.unknown_field,
            entry.record_offset
        ));
    }

    match &outcome.status {
        EntryStatus::Listed => {}
        EntryStatus::OutOfBounds => {
            lines.push(" ! sector goes past the boundaries of the disc! skipping".to_string())
        }
        EntryStatus::SkippedEmpty => lines.push(" skipped, file is empty".to_string()),
        EntryStatus::Failed { message } => {
            lines.push(format!(" !! extraction failed: {}", message))
        }
        EntryStatus::Extracted { path, report } => {
            if let Some(failure) = &report.predecessor_failure {
                lines.push(format!(
                    " ! could not read sector 0x{:X} before the file: {}",
                    failure.sector, failure.message
                ));
            }
            for warning in &report.warnings {
                match warning {
                    IntegrityWarning::UncleanPredecessor { .. } => {
                        lines.push(format!(" ! {}", warning))
                    }
                    IntegrityWarning::SuspectFirstSector { .. } => {
                        lines.push(format!(" !! {}", warning))
                    }
                }
            }
            match &report.read_failure {
                Some(failure) => lines.push(format!(
                    " !! read failed at sector 0x{:X}, kept {} of {} bytes: {}",
                    failure.sector, report.bytes_written, entry.size, failure.message
                )),
                None => lines.push(" extracted!".to_string()),
            }
            if verbose {
                lines.push(format!("   -> {}", path.display()));
            }
        }
    }

    lines.iter().map(|line| format!("{}\n", line)).collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Arguments::parse();

    init_tracing(args.verbose);

    if !args.image.exists() {
        return Err(Box::new(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Image file not found: {}", args.image.display()),
        )));
    }

    rayon::ThreadPoolBuilder::new()
        .num_threads(args.num_threads)
        .build_global()?;

    if !args.quiet {
        eprintln!("XDVDForenSic - XDVDFS data recovery tool");
        eprintln!("Using {} threads for extraction", args.num_threads);
    }

    Recoverer::new(args)?.run()?;

    Ok(())
}
