// Filesystem detection by on-disk magic
//
// Three sectors are read at the partition start and tested in a fixed
// order; the first match wins. Later tests look at single bytes that a
// higher-priority filesystem may carry by coincidence, so the order
// must not change.

use crate::disk::device::{sector_count, PartitionView};
use crate::disk::partition_info;
use crate::error::{DiskError, Result};
use gpt_disk_io::BlockIo;

/// Sectors inspected at each probe location
pub const PROBE_SECTORS: u64 = 3;

/// Sector offset of the ISO 9660 probe (volume descriptors start at 32 KiB)
pub const ISO_PROBE_OFFSET: u64 = 64;

const PLUTON_MAGIC: &[u8] = b"PlutonFS";
const EXFAT_MAGIC: &[u8] = b"EXFAT   ";
const EXT_MAGIC: [u8; 2] = [0x53, 0xEF];
const EXT_MAGIC_OFFSET: usize = 1080;
const NTFS_MAGIC: &[u8] = b"NTFS";
const FAT_SIG_OFFSET: usize = 38;
const FAT32_SIG_OFFSET: usize = 66;
const ISO_MAGIC: &[u8] = b"CD001";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FsKind {
    Unknown,
    NTFS,
    LinuxEXT,
    EXFAT,
    FAT32,
    FAT,
    ISO9660,
    PlutonFS,
}

impl FsKind {
    pub fn name(&self) -> &'static str {
        match self {
            FsKind::Unknown => "Unknown",
            FsKind::NTFS => "NTFS",
            FsKind::LinuxEXT => "ext2/3/4",
            FsKind::EXFAT => "exFAT",
            FsKind::FAT32 => "FAT32",
            FsKind::FAT => "FAT12/16",
            FsKind::ISO9660 => "ISO 9660",
            FsKind::PlutonFS => "PlutonFS",
        }
    }
}

fn has_magic(window: &[u8], offset: usize, magic: &[u8]) -> bool {
    window.get(offset..offset + magic.len()) == Some(magic)
}

fn is_extended_boot_sig(window: &[u8], offset: usize) -> bool {
    matches!(window.get(offset).copied(), Some(0x28) | Some(0x29))
}

/// Classify the first three sectors of a partition.
///
/// Returns `None` when nothing matches; the caller then probes for ISO 9660.
pub fn classify(window: &[u8]) -> Option<FsKind> {
    if has_magic(window, 0, PLUTON_MAGIC) {
        Some(FsKind::PlutonFS)
    } else if has_magic(window, 3, EXFAT_MAGIC) {
        Some(FsKind::EXFAT)
    } else if has_magic(window, EXT_MAGIC_OFFSET, &EXT_MAGIC) {
        Some(FsKind::LinuxEXT)
    } else if has_magic(window, 3, NTFS_MAGIC) {
        Some(FsKind::NTFS)
    } else if is_extended_boot_sig(window, FAT_SIG_OFFSET) {
        Some(FsKind::FAT)
    } else if is_extended_boot_sig(window, FAT32_SIG_OFFSET) {
        Some(FsKind::FAT32)
    } else {
        None
    }
}

/// Primary volume descriptor check on the window read at sector 64
pub fn is_iso9660(window: &[u8]) -> bool {
    has_magic(window, 1, ISO_MAGIC)
}

fn sniff<B: BlockIo>(view: &mut PartitionView<'_, B>) -> Result<FsKind> {
    // Partitions shorter than the probe window carry no recognisable filesystem
    let window = match view.read(0, PROBE_SECTORS) {
        Ok(window) => window,
        Err(DiskError::OutOfRange) => return Ok(FsKind::Unknown),
        Err(e) => return Err(e),
    };
    if let Some(kind) = classify(&window) {
        return Ok(kind);
    }

    match view.read(ISO_PROBE_OFFSET, PROBE_SECTORS) {
        Ok(window) if is_iso9660(&window) => Ok(FsKind::ISO9660),
        Ok(_) | Err(DiskError::OutOfRange) => Ok(FsKind::Unknown),
        Err(e) => Err(e),
    }
}

/// Identify the filesystem starting at `start_lba` on the whole device
pub fn detect_at<B: BlockIo>(io: &mut B, start_lba: u64) -> Result<FsKind> {
    let last = sector_count(io)?
        .checked_sub(1)
        .ok_or(DiskError::OutOfRange)?;
    let mut view = PartitionView::new(io, start_lba, last).map_err(|_| DiskError::OutOfRange)?;
    sniff(&mut view)
}

/// Identify the filesystem of the `index`-th used GPT partition
pub fn detect_filesystem<B: BlockIo>(io: &mut B, index: usize) -> Result<FsKind> {
    let info = partition_info(io, index)?;
    let mut view = PartitionView::new(io, info.start_lba, info.end_lba)?;
    let kind = sniff(&mut view)?;
    log::debug!("partition {} looks like {}", index, kind.name());
    Ok(kind)
}
