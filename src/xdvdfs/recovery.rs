use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufWriter, Read, Seek},
    path::{Path, PathBuf},
};

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::{info, warn};

use crate::{
    utils::EntryPath,
    xdvdfs::{
        Directory, DirectoryEntry, EntryKind, ExtractionReport, Image, IntegrityWarning, Result,
        SectorIndex, XdvdfsError, sector_from_byte_offset,
    },
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Decode and report entries only.
    #[default]
    List,
    /// Also copy every file entry out of the image.
    Extract,
}

/// What to do with file entries of size 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptyFilePolicy {
    /// Create an empty output file.
    #[default]
    Write,
    /// Leave them out of the output directory.
    Skip,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    pub empty_files: EmptyFilePolicy,
}

/// Where the directory table is and what to do with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryTarget {
    /// Byte offset of the directory table; rounded down to its sector.
    pub offset: u64,
    pub mode: Mode,
    pub options: ExtractOptions,
}

impl RecoveryTarget {
    pub fn new(offset: u64, mode: Mode) -> Self {
        Self {
            offset,
            mode,
            options: ExtractOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    pub fn sector(&self) -> SectorIndex {
        sector_from_byte_offset(self.offset)
    }
}

/// `recovered_0x{SECTOR}` in the current directory.
pub fn default_output_dir(sector: SectorIndex) -> PathBuf {
    PathBuf::from(format!("recovered_0x{:X}", sector))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    /// Listed only: list mode, a directory, or an unrecognized entry.
    Listed,
    /// The entry's data would start past the end of the image.
    OutOfBounds,
    /// A zero-length file skipped by [`EmptyFilePolicy::Skip`].
    SkippedEmpty,
    Extracted {
        path: PathBuf,
        report: ExtractionReport,
    },
    /// The output file could not be created or written.
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryOutcome {
    pub entry: DirectoryEntry,
    pub status: EntryStatus,
}

impl EntryOutcome {
    pub fn report(&self) -> Option<&ExtractionReport> {
        match &self.status {
            EntryStatus::Extracted { report, .. } => Some(report),
            _ => None,
        }
    }

    pub fn warnings(&self) -> &[IntegrityWarning] {
        self.report().map(|r| r.warnings.as_slice()).unwrap_or(&[])
    }
}

#[derive(Debug, Clone)]
pub struct RecoveryReport {
    pub target: RecoveryTarget,
    pub directory: Directory,
    pub outcomes: Vec<EntryOutcome>,
}

impl RecoveryReport {
    pub fn extracted(&self) -> usize {
        self.count(|status| matches!(status, EntryStatus::Extracted { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|status| matches!(status, EntryStatus::Failed { .. }))
    }

    pub fn out_of_bounds(&self) -> usize {
        self.count(|status| matches!(status, EntryStatus::OutOfBounds))
    }

    /// Extractions that stopped at an unreadable sector
    pub fn partial(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.report().is_some_and(ExtractionReport::is_partial))
            .count()
    }

    pub fn warnings(&self) -> usize {
        self.outcomes.iter().map(|o| o.warnings().len()).sum()
    }

    fn count(&self, predicate: impl Fn(&EntryStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.status)).count()
    }
}

impl<R: Read + Seek, F: Fn() -> io::Result<R>> Image<R, F> {
    /// List one entry and, in extract mode, copy it to `output_dir/<name>`.
    ///
    /// Never fails: every problem is reported in the returned outcome, so one
    /// entry cannot stop the others.
    pub fn process_entry(
        &self,
        entry: &DirectoryEntry,
        target: &RecoveryTarget,
        output_dir: &Path,
    ) -> EntryOutcome {
        let status = match self.process(entry, target, output_dir) {
            Ok(status) => status,
            Err(XdvdfsError::OutOfBounds { .. }) => EntryStatus::OutOfBounds,
            Err(e) => {
                warn!(name = %entry.name, "Extraction failed: {}", e);
                EntryStatus::Failed {
                    message: e.to_string(),
                }
            }
        };

        EntryOutcome {
            entry: entry.clone(),
            status,
        }
    }

    fn process(
        &self,
        entry: &DirectoryEntry,
        target: &RecoveryTarget,
        output_dir: &Path,
    ) -> Result<EntryStatus> {
        if !self.contains_sector(entry.start_sector as SectorIndex) {
            warn!(
                name = %entry.name,
                sector = entry.start_sector,
                "Sector goes past the end of the image, skipping"
            );
            return Ok(EntryStatus::OutOfBounds);
        }

        if entry.kind() != EntryKind::File || target.mode == Mode::List {
            return Ok(EntryStatus::Listed);
        }

        if entry.size == 0 && target.options.empty_files == EmptyFilePolicy::Skip {
            return Ok(EntryStatus::SkippedEmpty);
        }

        let path = output_dir.entry_path(&entry.name)?;
        let mut output = BufWriter::new(File::create(&path)?);
        let report = self.extract_entry(entry, &mut output)?;

        Ok(EntryStatus::Extracted { path, report })
    }
}

/// Decode the directory at `target.offset` and process each of its entries.
///
/// Only a failure to decode the directory is returned as an error. The output
/// directory must already exist when extracting.
pub fn recover<R, F>(
    image: &Image<R, F>,
    target: &RecoveryTarget,
    output_dir: &Path,
) -> Result<RecoveryReport>
where
    R: Read + Seek,
    F: Fn() -> io::Result<R> + Send + Sync,
{
    let directory = image.read_directory(target.sector())?;
    info!(
        sector = directory.sector(),
        entries = directory.len(),
        "Read directory structure"
    );

    Ok(recover_directory(image, target, directory, output_dir, |_| {}))
}

/// Process every entry of an already decoded `directory` on the rayon pool.
///
/// Entries that map to the same output file run one after another in on-disk
/// order, so the last of them wins exactly as in a sequential pass. Outcomes
/// are returned in directory order; `on_outcome` sees them as they finish.
pub fn recover_directory<R, F, P>(
    image: &Image<R, F>,
    target: &RecoveryTarget,
    directory: Directory,
    output_dir: &Path,
    on_outcome: P,
) -> RecoveryReport
where
    R: Read + Seek,
    F: Fn() -> io::Result<R> + Send + Sync,
    P: Fn(&EntryOutcome) + Sync,
{
    let entries = directory.entries();
    let groups = output_groups(entries);

    let mut processed: Vec<(usize, EntryOutcome)> = groups
        .par_iter()
        .flat_map_iter(|group| {
            group
                .iter()
                .map(|&index| {
                    let outcome = image.process_entry(&entries[index], target, output_dir);
                    on_outcome(&outcome);
                    (index, outcome)
                })
                .collect::<Vec<_>>()
        })
        .collect();
    processed.sort_by_key(|(index, _)| *index);

    let report = RecoveryReport {
        target: *target,
        outcomes: processed.into_iter().map(|(_, outcome)| outcome).collect(),
        directory,
    };

    info!(
        extracted = report.extracted(),
        failed = report.failed(),
        out_of_bounds = report.out_of_bounds(),
        warnings = report.warnings(),
        "Recovery pass finished"
    );

    report
}

/// Indices of entries grouped by output file name, each group in disk order.
/// Names compare case-insensitively since XDVDFS and many hosts do.
fn output_groups(entries: &[DirectoryEntry]) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for (index, entry) in entries.iter().enumerate() {
        let group = *by_name
            .entry(entry.name.to_ascii_lowercase())
            .or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
        groups[group].push(index);
    }

    for group in groups.iter().filter(|group| group.len() > 1) {
        warn!(
            name = %entries[group[0]].name,
            count = group.len(),
            "Duplicate entry name, later entries overwrite earlier ones"
        );
    }

    groups
}
