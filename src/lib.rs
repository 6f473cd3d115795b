pub mod xdvdfs;
mod utils;

pub use xdvdfs::{
    Attributes, DecodeLimits, Directory, DirectoryEntry, EmptyFilePolicy, EntryKind,
    EntryOutcome, EntryStatus, ExtractOptions, ExtractionReport, FileImage, Image,
    IntegrityWarning, Mode, ReadFailure, RecoveryReport, RecoveryTarget, Result, SECTOR_SIZE,
    Sector, SectorIndex, Termination, XdvdfsError, decode_directory, decode_directory_with,
    default_output_dir, extract, followed_clean_data, is_sector_suspect, read_sector, recover,
    recover_directory, sector_count, sector_from_byte_offset, seek_sector,
};
