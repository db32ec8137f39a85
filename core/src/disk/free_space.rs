// Free space discovery between used GPT ranges

use super::gpt::read_gpt;
use super::SECTOR_SIZE;
use crate::error::Result;
use alloc::vec::Vec;
use gpt_disk_io::BlockIo;

/// A gap of unallocated sectors inside the usable area
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FreeRegion {
    pub start_lba: u64,
    /// Inclusive
    pub end_lba: u64,
}

impl FreeRegion {
    pub fn size_lba(&self) -> u64 {
        self.end_lba - self.start_lba + 1
    }

    pub fn size_mb(&self) -> u64 {
        (self.size_lba() * SECTOR_SIZE as u64) / (1024 * 1024)
    }
}

/// Gaps in `[first_usable_lba, last_usable_lba]` not covered by any used entry
pub fn find_free_space<B: BlockIo>(io: &mut B) -> Result<Vec<FreeRegion>> {
    let (header, table) = read_gpt(io)?;

    let mut used: Vec<(u64, u64)> = table
        .used()
        .map(|(_, e)| (e.first_lba, e.last_lba))
        .collect();
    used.sort_unstable();

    let mut regions = Vec::new();
    let mut current = header.first_usable_lba;

    for (start, end) in used {
        if current < start {
            regions.push(FreeRegion {
                start_lba: current,
                end_lba: (start - 1).min(header.last_usable_lba),
            });
        }
        current = current.max(end.saturating_add(1));
        if current > header.last_usable_lba {
            break;
        }
    }

    if current <= header.last_usable_lba {
        regions.push(FreeRegion {
            start_lba: current,
            end_lba: header.last_usable_lba,
        });
    }

    Ok(regions)
}

/// Sum of all free regions in MiB
pub fn total_free_mb<B: BlockIo>(io: &mut B) -> Result<u64> {
    let total_lba: u64 = find_free_space(io)?.iter().map(FreeRegion::size_lba).sum();
    Ok((total_lba * SECTOR_SIZE as u64) / (1024 * 1024))
}
