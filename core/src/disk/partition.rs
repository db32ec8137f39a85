// Partition information and lookup

use super::gpt::{
    read_gpt, GptEntry, GUID_BASIC_DATA, GUID_EFI_SYSTEM, GUID_LINUX_FILESYSTEM, GUID_LINUX_SWAP,
};
use super::SECTOR_SIZE;
use crate::error::{DiskError, Result};
use alloc::vec::Vec;
use gpt_disk_io::BlockIo;
use uguid::Guid;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PartitionKind {
    EfiSystem,
    LinuxFilesystem,
    LinuxSwap,
    BasicData,
    Unknown,
}

impl PartitionKind {
    pub fn from_type_guid(guid: &Guid) -> Self {
        if *guid == GUID_EFI_SYSTEM {
            PartitionKind::EfiSystem
        } else if *guid == GUID_LINUX_FILESYSTEM {
            PartitionKind::LinuxFilesystem
        } else if *guid == GUID_LINUX_SWAP {
            PartitionKind::LinuxSwap
        } else if *guid == GUID_BASIC_DATA {
            PartitionKind::BasicData
        } else {
            PartitionKind::Unknown
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PartitionKind::EfiSystem => "EFI System",
            PartitionKind::LinuxFilesystem => "Linux FS",
            PartitionKind::LinuxSwap => "Linux Swap",
            PartitionKind::BasicData => "Basic Data",
            PartitionKind::Unknown => "Unknown",
        }
    }
}

/// A used GPT slot
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PartitionInfo {
    /// Position among used slots (the "partition index")
    pub index: usize,
    /// Raw slot number in the entry array (the "entry index")
    pub slot: usize,
    pub kind: PartitionKind,
    pub start_lba: u64,
    /// Inclusive
    pub end_lba: u64,
}

impl PartitionInfo {
    fn from_entry(index: usize, slot: usize, entry: &GptEntry) -> Self {
        Self {
            index,
            slot,
            kind: PartitionKind::from_type_guid(&entry.type_guid),
            start_lba: entry.first_lba,
            end_lba: entry.last_lba,
        }
    }

    pub fn sector_count(&self) -> u64 {
        self.end_lba.saturating_sub(self.start_lba) + 1
    }

    pub fn size_bytes(&self) -> u64 {
        self.sector_count() * SECTOR_SIZE as u64
    }

    pub fn size_mb(&self) -> u64 {
        self.size_bytes() / (1024 * 1024)
    }
}

/// Every used GPT slot, in slot order
pub fn list_partitions<B: BlockIo>(io: &mut B) -> Result<Vec<PartitionInfo>> {
    let (_, table) = read_gpt(io)?;
    Ok(table
        .used()
        .enumerate()
        .map(|(index, (slot, entry))| PartitionInfo::from_entry(index, slot, &entry))
        .collect())
}

/// Geometry of the `index`-th used partition
pub fn partition_info<B: BlockIo>(io: &mut B, index: usize) -> Result<PartitionInfo> {
    list_partitions(io)?
        .into_iter()
        .nth(index)
        .ok_or(DiskError::OutOfRange)
}
