//! Advisory checks over raw sector contents. None of these reject data.

use std::fmt;

use crate::xdvdfs::{SECTOR_SIZE, Sector, SectorIndex};

/// A sector that was never read back from the disc is all `0x00` or all
/// `0xFF`. A genuine file sector filled that way is flagged as well.
pub fn is_sector_suspect(sector: &Sector) -> bool {
    sector.iter().all(|&b| b == 0x00 || b == 0xFF)
}

/// The sector before a file's data normally ends in a NUL byte. Anything else
/// hints that the claimed start sector may be wrong.
pub fn followed_clean_data(previous: &Sector) -> bool {
    previous[SECTOR_SIZE - 1] == 0x00
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityWarning {
    /// The sector preceding the file did not end with `0x00`.
    UncleanPredecessor {
        sector: SectorIndex,
        trailing_byte: u8,
    },
    /// The first data sector is uniformly `0x00`/`0xFF`; the file is probably missing.
    SuspectFirstSector { sector: SectorIndex },
}

impl fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UncleanPredecessor {
                sector,
                trailing_byte,
            } => write!(
                f,
                "sector 0x{:X} before the file had non-zero data (0x{:02X})",
                sector, trailing_byte
            ),
            Self::SuspectFirstSector { sector } => write!(
                f,
                "first sector 0x{:X} of the file is blank, data is probably missing",
                sector
            ),
        }
    }
}
