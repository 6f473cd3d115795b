use std::io::{Read, Seek, SeekFrom};

use crate::xdvdfs::{Result, SECTOR_SIZE, SectorIndex, XdvdfsError};

pub type Sector = [u8; SECTOR_SIZE];

/// Sector containing the given byte offset.
pub fn sector_from_byte_offset(offset: u64) -> SectorIndex {
    offset / SECTOR_SIZE as u64
}

/// Byte offset of the first byte of `sector`.
pub fn sector_offset(sector: SectorIndex) -> Result<u64> {
    sector
        .checked_mul(SECTOR_SIZE as u64)
        .ok_or(XdvdfsError::SectorOverflow(sector))
}

/// Position `stream` at the start of `sector`. A stream already there is left
/// alone so buffered readers keep their buffer across consecutive sectors.
pub fn seek_sector<S: Seek>(stream: &mut S, sector: SectorIndex) -> Result<u64> {
    let offset = sector_offset(sector)?;
    if stream.stream_position()? == offset {
        return Ok(offset);
    }
    Ok(stream.seek(SeekFrom::Start(offset))?)
}

/// Read one whole sector. A short read is an error, never a partial buffer.
pub fn read_sector<R: Read + Seek>(stream: &mut R, sector: SectorIndex) -> Result<Sector> {
    seek_sector(stream, sector)?;

    let mut buffer = [0u8; SECTOR_SIZE];
    stream
        .read_exact(&mut buffer)
        .map_err(|source| XdvdfsError::SectorUnavailable { sector, source })?;

    Ok(buffer)
}

/// Total length of the stream, found by seeking to its end.
pub fn stream_length<S: Seek>(stream: &mut S) -> Result<u64> {
    Ok(stream.seek(SeekFrom::End(0))?)
}
