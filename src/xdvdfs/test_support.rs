use std::io::{self, Cursor, Read, Seek, SeekFrom};

use crate::xdvdfs::{DIRECTORY_SENTINEL, SECTOR_SIZE};

/// In-memory disc image for tests.
pub(crate) struct ImageBuilder {
    data: Vec<u8>,
}

impl ImageBuilder {
    pub fn new(sectors: usize) -> Self {
        Self {
            data: vec![0u8; sectors * SECTOR_SIZE],
        }
    }

    pub fn fill_sector(mut self, sector: usize, byte: u8) -> Self {
        let start = sector * SECTOR_SIZE;
        self.data[start..start + SECTOR_SIZE].fill(byte);
        self
    }

    /// Fill a sector with a recognizable, non-uniform pattern.
    pub fn pattern_sector(mut self, sector: usize) -> Self {
        let start = sector * SECTOR_SIZE;
        for (i, b) in self.data[start..start + SECTOR_SIZE].iter_mut().enumerate() {
            *b = pattern_byte(sector, i);
        }
        self
    }

    pub fn set_byte(mut self, offset: usize, byte: u8) -> Self {
        self.data[offset] = byte;
        self
    }

    /// Write a directory table of `(sector, size, flags, name)` records at `sector`,
    /// followed by the sentinel.
    pub fn directory(self, sector: usize, records: &[(u32, u32, u8, &str)]) -> Self {
        let mut table = Vec::new();
        for (i, &(start, size, flags, name)) in records.iter().enumerate() {
            push_record(&mut table, 0xA000 + i as u32, start, size, flags, name.as_bytes());
        }
        table.extend_from_slice(&DIRECTORY_SENTINEL.to_le_bytes());
        self.raw(sector * SECTOR_SIZE, &table)
    }

    pub fn raw(mut self, offset: usize, bytes: &[u8]) -> Self {
        if self.data.len() < offset + bytes.len() {
            self.data.resize(offset + bytes.len(), 0);
        }
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        self
    }

    pub fn truncate(mut self, len: usize) -> Self {
        self.data.truncate(len);
        self
    }

    pub fn bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn build(self) -> Cursor<Vec<u8>> {
        Cursor::new(self.data)
    }
}

pub(crate) fn pattern_byte(sector: usize, index: usize) -> u8 {
    ((sector * 7 + index * 13) % 251) as u8 + 1
}

/// Append one record, padded to 4 bytes relative to the start of `table`.
pub(crate) fn push_record(
    table: &mut Vec<u8>,
    unknown: u32,
    start: u32,
    size: u32,
    flags: u8,
    name: &[u8],
) {
    table.extend_from_slice(&unknown.to_le_bytes());
    table.extend_from_slice(&start.to_le_bytes());
    table.extend_from_slice(&size.to_le_bytes());
    table.push(flags);
    table.push(name.len() as u8);
    table.extend_from_slice(name);
    while table.len() % 4 != 0 {
        table.push(0xCC);
    }
}

/// Counts reads and repositioning seeks reaching the underlying stream.
/// Position queries (`SeekFrom::Current(0)`) are not counted.
pub(crate) struct CountingReader {
    inner: Cursor<Vec<u8>>,
    pub reads: usize,
    pub seeks: usize,
}

impl CountingReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            inner: Cursor::new(data),
            reads: 0,
            seeks: 0,
        }
    }
}

impl Read for CountingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads += 1;
        self.inner.read(buf)
    }
}

impl Seek for CountingReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if pos != SeekFrom::Current(0) {
            self.seeks += 1;
        }
        self.inner.seek(pos)
    }
}
