use std::io::{Read, Seek};

use tracing::{debug, warn};

use crate::xdvdfs::{
    DIRECTORY_SENTINEL, DirectoryEntry, RECORD_ALIGNMENT, RecordHeader, Result, SectorIndex,
    seek_sector,
};

/// How decoding of a directory table ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The `0xFFFFFFFF` sentinel was reached.
    Sentinel,
    /// A record claimed start sector 0. Entries before it are kept.
    StructuralBreak { record_offset: u64 },
    /// The table never terminated within [`DecodeLimits::max_entries`].
    EntryLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    pub max_entries: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_entries: 0x10000,
        }
    }
}

/// The decoded entry list of one directory table. Subdirectories are not followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    sector: SectorIndex,
    entries: Vec<DirectoryEntry>,
    termination: Termination,
}

impl Directory {
    /// Sector the table was decoded from
    pub fn sector(&self) -> SectorIndex {
        self.sector
    }

    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    pub fn termination(&self) -> Termination {
        self.termination
    }

    /// Whether the table ended at its sentinel
    pub fn is_intact(&self) -> bool {
        self.termination == Termination::Sentinel
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&DirectoryEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn files(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.entries.iter().filter(|entry| entry.is_file())
    }
}

impl IntoIterator for Directory {
    type Item = DirectoryEntry;
    type IntoIter = std::vec::IntoIter<DirectoryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

pub fn decode_directory<R: Read + Seek>(
    stream: &mut R,
    start_sector: SectorIndex,
) -> Result<Directory> {
    decode_directory_with(stream, start_sector, DecodeLimits::default())
}

/// Decode the directory table starting at `start_sector`.
///
/// Records are read back to back, each realigned to a 4-byte boundary, until
/// the sentinel. A record whose start sector is 0 ends decoding early but is
/// not an error; the entries decoded so far are returned. Running out of data
/// before either condition is an I/O error.
pub fn decode_directory_with<R: Read + Seek>(
    stream: &mut R,
    start_sector: SectorIndex,
    limits: DecodeLimits,
) -> Result<Directory> {
    let mut position = seek_sector(stream, start_sector)?;

    let mut entries = Vec::new();

    let termination = loop {
        if entries.len() >= limits.max_entries {
            warn!(
                sector = start_sector,
                entries = entries.len(),
                "Directory did not terminate, giving up"
            );
            break Termination::EntryLimit;
        }

        let record_offset = position;
        let mut header = [0u8; RecordHeader::SIZE];

        stream.read_exact(&mut header[0..4])?;
        let unknown_field = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        if unknown_field == DIRECTORY_SENTINEL {
            break Termination::Sentinel;
        }

        stream.read_exact(&mut header[4..8])?;
        let start = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if start == 0 {
            warn!(record_offset, "Directory broken, stopping read");
            break Termination::StructuralBreak { record_offset };
        }

        stream.read_exact(&mut header[8..])?;
        let header = RecordHeader::parse(&header)?;

        let mut name = vec![0u8; header.name_len as usize];
        stream.read_exact(&mut name)?;

        let record_end = record_offset + (RecordHeader::SIZE + name.len()) as u64;
        position = skip_padding(stream, record_end)?;

        let entry = DirectoryEntry::from_record(header, &name, record_offset);
        debug!(
            name = %entry.name,
            sector = entry.start_sector,
            size = entry.size,
            flags = entry.flags,
            "Decoded directory record"
        );
        entries.push(entry);
    };

    Ok(Directory {
        sector: start_sector,
        entries,
        termination,
    })
}

/// Consume the bytes up to the next record boundary and return its offset.
/// Reading them keeps a buffered reader's buffer intact, unlike a seek.
fn skip_padding<R: Read>(stream: &mut R, position: u64) -> Result<u64> {
    let padding = (RECORD_ALIGNMENT - position % RECORD_ALIGNMENT) % RECORD_ALIGNMENT;
    let mut scratch = [0u8; RECORD_ALIGNMENT as usize];
    stream.read_exact(&mut scratch[..padding as usize])?;
    Ok(position + padding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xdvdfs::{EntryKind, SECTOR_SIZE, XdvdfsError, test_support::*};

    #[test]
    fn decodes_entries_in_disk_order() {
        let mut image = ImageBuilder::new(4)
            .directory(
                1,
                &[
                    (10, 3000, 0x80, "A.BIN"),
                    (20, 2048, 0x10, "SUB"),
                    (30, 1, 0x80, "DEFAULT.XBE"),
                ],
            )
            .build();

        let directory = decode_directory(&mut image, 1).unwrap();

        assert_eq!(directory.sector(), 1);
        assert_eq!(directory.termination(), Termination::Sentinel);
        assert!(directory.is_intact());

        let names: Vec<_> = directory.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["A.BIN", "SUB", "DEFAULT.XBE"]);

        let first = &directory.entries()[0];
        assert_eq!(first.unknown_field, 0xA000);
        assert_eq!(first.start_sector, 10);
        assert_eq!(first.size, 3000);
        assert_eq!(first.kind(), EntryKind::File);
        assert_eq!(first.record_offset, SECTOR_SIZE as u64);

        // 14 + 5 bytes, padded to 20
        assert_eq!(directory.entries()[1].record_offset, SECTOR_SIZE as u64 + 20);
        assert!(directory.entries()[1].is_directory());

        assert_eq!(directory.files().count(), 2);
        assert_eq!(directory.find("SUB").map(|e| e.start_sector), Some(20));
        assert!(directory.find("MISSING").is_none());
    }

    #[test]
    fn name_length_matches_prefix() {
        let names = ["", "A", "AB", "ABC", "ABCD", "ABCDEFGHIJKLMNOPQRSTUVWXYZ.DAT"];
        let records: Vec<(u32, u32, u8, &str)> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (i as u32 + 5, 100, 0x80, *name))
            .collect();
        let mut image = ImageBuilder::new(2).directory(0, &records).build();

        let directory = decode_directory(&mut image, 0).unwrap();

        assert_eq!(directory.len(), names.len());
        for (entry, name) in directory.entries().iter().zip(names) {
            assert_eq!(entry.name, name);
            assert_eq!(entry.name.len(), name.len());
        }
    }

    #[test]
    fn sentinel_first_yields_empty_directory() {
        let mut image = ImageBuilder::new(2).directory(1, &[]).build();

        let directory = decode_directory(&mut image, 1).unwrap();

        assert!(directory.is_empty());
        assert_eq!(directory.termination(), Termination::Sentinel);
    }

    #[test]
    fn zero_start_sector_stops_without_error() {
        let mut table = Vec::new();
        push_record(&mut table, 1, 12, 10, 0x80, b"KEEP.BIN");
        push_record(&mut table, 2, 0, 10, 0x80, b"BROKEN");
        push_record(&mut table, 3, 14, 10, 0x80, b"LOST.BIN");
        table.extend_from_slice(&DIRECTORY_SENTINEL.to_le_bytes());

        let mut image = ImageBuilder::new(3).raw(SECTOR_SIZE, &table).build();

        let directory = decode_directory(&mut image, 1).unwrap();

        assert_eq!(directory.len(), 1);
        assert_eq!(directory.entries()[0].name, "KEEP.BIN");
        assert_eq!(
            directory.termination(),
            Termination::StructuralBreak {
                record_offset: SECTOR_SIZE as u64 + 24
            }
        );
        assert!(!directory.is_intact());
    }

    #[test]
    fn zero_start_sector_at_image_end_still_terminates() {
        let mut table = Vec::new();
        table.extend_from_slice(&7u32.to_le_bytes());
        table.extend_from_slice(&0u32.to_le_bytes());

        let mut image = ImageBuilder::new(1).raw(SECTOR_SIZE, &table).build();

        let directory = decode_directory(&mut image, 1).unwrap();
        assert!(directory.is_empty());
        assert!(matches!(
            directory.termination(),
            Termination::StructuralBreak { .. }
        ));
    }

    #[test]
    fn decoding_is_repeatable() {
        let mut image = ImageBuilder::new(3)
            .directory(2, &[(3, 5, 0x80, "X"), (4, 6, 0x10, "YY"), (5, 7, 0x42, "ZZZ")])
            .build();

        let first = decode_directory(&mut image, 2).unwrap();
        let second = decode_directory(&mut image, 2).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn padding_follows_the_last_record() {
        // 14 + 3 = 17 bytes, so the sentinel sits at offset 20.
        let mut table = Vec::new();
        push_record(&mut table, 0, 9, 1, 0x80, b"ABC");
        assert_eq!(table.len(), 20);
        table.extend_from_slice(&DIRECTORY_SENTINEL.to_le_bytes());

        let mut image = ImageBuilder::new(1).raw(0, &table).build();

        let directory = decode_directory(&mut image, 0).unwrap();
        assert_eq!(directory.len(), 1);
        assert_eq!(directory.termination(), Termination::Sentinel);
    }

    #[test]
    fn records_may_cross_sector_boundaries() {
        let mut table = Vec::new();
        for i in 0..150u32 {
            let name = format!("FILE{:03}.DAT", i);
            push_record(&mut table, i, 100 + i, i * 10, 0x80, name.as_bytes());
        }
        table.extend_from_slice(&DIRECTORY_SENTINEL.to_le_bytes());
        assert!(table.len() > SECTOR_SIZE);

        let mut image = ImageBuilder::new(4).raw(SECTOR_SIZE, &table).build();

        let directory = decode_directory(&mut image, 1).unwrap();
        assert_eq!(directory.len(), 150);
        assert_eq!(directory.entries()[149].name, "FILE149.DAT");
        assert_eq!(directory.entries()[149].start_sector, 249);
    }

    #[test]
    fn buffered_decoding_reads_the_table_in_one_pass() {
        let mut table = Vec::new();
        for i in 0..100u32 {
            let name = format!("F{:02}.BIN", i);
            push_record(&mut table, i, 100 + i, 1, 0x80, name.as_bytes());
        }
        table.extend_from_slice(&DIRECTORY_SENTINEL.to_le_bytes());
        assert!(table.len() > SECTOR_SIZE && table.len() < 3 * SECTOR_SIZE);

        let data = ImageBuilder::new(4).raw(SECTOR_SIZE, &table).bytes();
        let mut stream = std::io::BufReader::new(CountingReader::new(data));

        let directory = decode_directory(&mut stream, 1).unwrap();

        assert_eq!(directory.len(), 100);
        assert_eq!(directory.entries()[99].record_offset, SECTOR_SIZE as u64 + 99 * 24);
        assert_eq!(stream.get_ref().seeks, 1);
        assert_eq!(stream.get_ref().reads, 1);
    }

    #[test]
    fn missing_sentinel_is_an_io_error() {
        let mut table = Vec::new();
        push_record(&mut table, 0, 9, 1, 0x80, b"ABC");

        let mut image = ImageBuilder::new(0).raw(0, &table).build();

        assert!(matches!(
            decode_directory(&mut image, 0),
            Err(XdvdfsError::Io(_))
        ));
    }

    #[test]
    fn truncated_name_is_an_io_error() {
        let mut table = Vec::new();
        push_record(&mut table, 0, 9, 1, 0x80, b"LONGNAME.BIN");
        table.truncate(18);

        let mut image = ImageBuilder::new(0).raw(0, &table).build();

        assert!(decode_directory(&mut image, 0).is_err());
    }

    #[test]
    fn entry_limit_bounds_runaway_tables() {
        let records: Vec<(u32, u32, u8, &str)> =
            (0..10).map(|i| (i + 1, 1, 0x80, "F")).collect();
        let mut image = ImageBuilder::new(1).directory(0, &records).build();

        let directory =
            decode_directory_with(&mut image, 0, DecodeLimits { max_entries: 4 }).unwrap();

        assert_eq!(directory.len(), 4);
        assert_eq!(directory.termination(), Termination::EntryLimit);
    }

    #[test]
    fn directory_into_iter_yields_entries() {
        let mut image = ImageBuilder::new(1)
            .directory(0, &[(3, 5, 0x80, "ONE"), (4, 6, 0x80, "TWO")])
            .build();

        let sizes: Vec<u32> = decode_directory(&mut image, 0)
            .unwrap()
            .into_iter()
            .map(|entry| entry.size)
            .collect();

        assert_eq!(sizes, [5, 6]);
    }
}
