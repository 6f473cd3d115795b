use std::io::{Read, Seek, Write};

use tracing::{debug, warn};

use crate::xdvdfs::{
    DirectoryEntry, IntegrityWarning, Result, SECTOR_SIZE, SectorIndex, XdvdfsError,
    followed_clean_data, is_sector_suspect, read_sector, stream_length,
};

/// A sector that could not be read during extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadFailure {
    pub sector: SectorIndex,
    pub message: String,
}

impl ReadFailure {
    fn new(sector: SectorIndex, error: &XdvdfsError) -> Self {
        Self {
            sector,
            message: error.to_string(),
        }
    }
}

/// Outcome of extracting one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    pub bytes_written: u64,
    /// Data sectors read, not counting the predecessor.
    pub sectors_read: u64,
    pub warnings: Vec<IntegrityWarning>,
    /// The predecessor sector could not be read, so its check was skipped.
    pub predecessor_failure: Option<ReadFailure>,
    /// A data sector could not be read. Bytes before it were written and kept.
    pub read_failure: Option<ReadFailure>,
}

impl ExtractionReport {
    pub fn unclean_predecessor(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, IntegrityWarning::UncleanPredecessor { .. }))
    }

    pub fn suspect_first_sector(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, IntegrityWarning::SuspectFirstSector { .. }))
    }

    pub fn any_read_failed(&self) -> bool {
        self.predecessor_failure.is_some() || self.read_failure.is_some()
    }

    /// Data extraction stopped early.
    pub fn is_partial(&self) -> bool {
        self.read_failure.is_some()
    }

    pub fn is_complete(&self, entry: &DirectoryEntry) -> bool {
        !self.is_partial() && self.bytes_written == entry.size as u64
    }
}

/// Number of sectors a file of `size` bytes occupies. Never less than one.
pub fn sector_count(size: u32) -> u64 {
    (size as u64).div_ceil(SECTOR_SIZE as u64).max(1)
}

/// Copy the data of `entry` to `sink`, one sector at a time.
///
/// The sector before the data and the first data sector are checked with the
/// integrity heuristics; their findings end up in the report and never stop
/// the copy. At most `entry.size` bytes are written. An entry whose data would
/// start past the end of the image fails with [`XdvdfsError::OutOfBounds`]
/// before anything is read. A data sector that cannot be read ends the copy
/// and is recorded as a partial failure. Errors writing to `sink` are returned.
pub fn extract<R: Read + Seek, W: Write>(
    stream: &mut R,
    entry: &DirectoryEntry,
    sink: &mut W,
) -> Result<ExtractionReport> {
    let start = SectorIndex::from(entry.start_sector);
    let image_len = stream_length(stream)?;

    if entry.data_offset() >= image_len {
        return Err(XdvdfsError::OutOfBounds {
            sector: start,
            image_len,
        });
    }

    let mut report = ExtractionReport::default();

    if start > 0 {
        let previous = start - 1;
        match read_sector(stream, previous) {
            Ok(data) => {
                if !followed_clean_data(&data) {
                    let warning = IntegrityWarning::UncleanPredecessor {
                        sector: previous,
                        trailing_byte: data[SECTOR_SIZE - 1],
                    };
                    warn!(name = %entry.name, "{}", warning);
                    report.warnings.push(warning);
                }
            }
            Err(e) => {
                warn!(name = %entry.name, sector = previous, "Predecessor unreadable: {}", e);
                report.predecessor_failure = Some(ReadFailure::new(previous, &e));
            }
        }
    }

    let total = entry.size as u64;
    let count = sector_count(entry.size);

    for i in 0..count {
        let sector = start + i;
        let data = match read_sector(stream, sector) {
            Ok(data) => data,
            Err(e) => {
                warn!(name = %entry.name, sector, "Stopping extraction: {}", e);
                report.read_failure = Some(ReadFailure::new(sector, &e));
                break;
            }
        };
        report.sectors_read += 1;

        if i == 0 && is_sector_suspect(&data) {
            let warning = IntegrityWarning::SuspectFirstSector { sector };
            warn!(name = %entry.name, "{}", warning);
            report.warnings.push(warning);
        }

        let len = (total - report.bytes_written).min(SECTOR_SIZE as u64) as usize;
        if let Err(e) = sink.write_all(&data[..len]) {
            let _ = sink.flush();
            return Err(e.into());
        }
        report.bytes_written += len as u64;
    }

    sink.flush()?;

    debug!(
        name = %entry.name,
        bytes = report.bytes_written,
        sectors = report.sectors_read,
        "Extraction finished"
    );

    Ok(report)
}
