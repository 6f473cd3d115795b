mod directory;
mod entry;
mod extract;
mod heuristics;
mod image;
mod recovery;
mod sector;
#[cfg(test)]
mod test_support;

pub use directory::{
    DecodeLimits, Directory, Termination, decode_directory, decode_directory_with,
};
pub use entry::{Attributes, DirectoryEntry, EntryKind, RecordHeader};
pub use extract::{ExtractionReport, ReadFailure, extract, sector_count};
pub use heuristics::{IntegrityWarning, followed_clean_data, is_sector_suspect};
pub use image::{FileImage, FileReaderFactory, Image};
pub use recovery::{
    EmptyFilePolicy, EntryOutcome, EntryStatus, ExtractOptions, Mode, RecoveryReport,
    RecoveryTarget, default_output_dir, recover, recover_directory,
};
pub use sector::{
    Sector, read_sector, sector_from_byte_offset, sector_offset, seek_sector, stream_length,
};

use thiserror::Error;

pub const SECTOR_SIZE: usize = 0x800;

/// Absolute sector number within the image.
pub type SectorIndex = u64;

/// First field value that marks the end of a directory table.
pub const DIRECTORY_SENTINEL: u32 = 0xFFFF_FFFF;

/// Directory records start on 4-byte boundaries.
pub const RECORD_ALIGNMENT: u64 = 4;

#[derive(Error, Debug)]
pub enum XdvdfsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sector 0x{sector:X} is unavailable: {source}")]
    SectorUnavailable {
        sector: SectorIndex,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Sector 0x{sector:X} lies past the end of the image ({image_len} bytes)")]
    OutOfBounds { sector: SectorIndex, image_len: u64 },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Sector 0x{0:X} has no addressable byte offset")]
    SectorOverflow(SectorIndex),
}

pub type Result<T> = std::result::Result<T, XdvdfsError>;
