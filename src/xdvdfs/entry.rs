use std::fmt;

use bitflags::bitflags;
use nom::Finish;
use nom_derive::{NomLE, Parse};

use crate::xdvdfs::{Result, SECTOR_SIZE, XdvdfsError};

/// Fixed-size prefix of a directory record, up to and including the name length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, NomLE)]
pub struct RecordHeader {
    pub unknown_field: u32,
    pub start_sector: u32,
    pub size: u32,
    pub flags: u8,
    pub name_len: u8,
}

impl RecordHeader {
    pub const SIZE: usize = 14;

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        match Parse::parse(bytes).finish() {
            Ok((_, header)) => Ok(header),
            Err(e) => Err(XdvdfsError::Parse(format!("{:?}", e))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    Unrecognized(u8),
}

impl EntryKind {
    pub fn from_u8(value: u8) -> Self {
        match value {
            DirectoryEntry::DIRECTORY_FLAG => Self::Directory,
            DirectoryEntry::FILE_FLAG => Self::File,
            other => Self::Unrecognized(other),
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory => write!(f, "Directory"),
            Self::File => write!(f, "File"),
            Self::Unrecognized(flags) => write!(f, "Unknown(0x{:02X})", flags),
        }
    }
}

bitflags! {
    /// Attribute bits of the flags byte. Only used for display; the entry kind
    /// comes from the whole byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Attributes: u8 {
        const READ_ONLY = 0x01;
        const HIDDEN = 0x02;
        const SYSTEM = 0x04;
        const DIRECTORY = 0x10;
        const ARCHIVE = 0x20;
        const NORMAL = 0x80;
    }
}

/// One decoded directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Leading field of the record. Kept as read.
    pub unknown_field: u32,
    pub start_sector: u32,
    pub size: u32,
    pub flags: u8,
    pub name: String,
    /// Absolute byte offset of the record in the image.
    pub record_offset: u64,
}

impl DirectoryEntry {
    pub const DIRECTORY_FLAG: u8 = 0x10;
    pub const FILE_FLAG: u8 = 0x80;

    pub(crate) fn from_record(header: RecordHeader, name: &[u8], record_offset: u64) -> Self {
        Self {
            unknown_field: header.unknown_field,
            start_sector: header.start_sector,
            size: header.size,
            flags: header.flags,
            name: decode_name(name),
            record_offset,
        }
    }

    pub fn kind(&self) -> EntryKind {
        EntryKind::from_u8(self.flags)
    }

    pub fn is_file(&self) -> bool {
        self.kind() == EntryKind::File
    }

    pub fn is_directory(&self) -> bool {
        self.kind() == EntryKind::Directory
    }

    pub fn attributes(&self) -> Attributes {
        Attributes::from_bits_retain(self.flags)
    }

    /// Byte offset of the entry's data in the image.
    pub fn data_offset(&self) -> u64 {
        self.start_sector as u64 * SECTOR_SIZE as u64
    }
}

/// Names are ASCII on disk. Any other byte becomes `?` so the decoded name
/// keeps the on-disk length.
fn decode_name(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { '?' })
        .collect()
}
