// Disk layout: block device seam, GPT/MBR codecs, partition allocation

pub mod allocator;
pub mod device;
pub mod free_space;
pub mod gpt;
pub mod guid;
pub mod mbr;
pub mod partition;

pub use allocator::{
    create_gpt, create_partition, create_partition_range, delete_partition, find_free_slot,
    gpt_to_mbr, mbr_to_gpt, overlaps,
};
pub use device::PartitionView;
pub use free_space::{find_free_space, total_free_mb, FreeRegion};
pub use gpt::{is_gpt, read_gpt_header, verify_gpt, ChecksumReport, EntryTable, GptEntry, GptHeader};
pub use guid::GuidSource;
#[cfg(feature = "std")]
pub use guid::RandomGuids;
pub use mbr::{read_mbr, uses_mbr, MbrRecord, MbrTable};
pub use partition::{list_partitions, partition_info, PartitionInfo, PartitionKind};

/// Bytes per sector; the only block size this crate accepts
pub const SECTOR_SIZE: usize = 512;

/// Number of GPT partition entries
pub const GPT_ENTRY_COUNT: usize = 128;

/// Size of one GPT partition entry in bytes
pub const GPT_ENTRY_SIZE: usize = 128;

/// Size of the whole entry array (32 sectors)
pub const GPT_ENTRIES_BYTES: usize = GPT_ENTRY_COUNT * GPT_ENTRY_SIZE;

/// Sectors taken by the entry array
pub const GPT_ENTRIES_SECTORS: u64 = (GPT_ENTRIES_BYTES / SECTOR_SIZE) as u64;

/// LBA of the primary entry array
pub const GPT_ENTRIES_LBA: u64 = 2;

/// First LBA a partition may start at (MBR + header + entries)
pub const FIRST_USABLE_LBA: u64 = 34;

/// Sectors reserved at each end of the disk for GPT structures
pub const GPT_REGION_SECTORS: u64 = 34;

/// Convert megabytes to 512-byte sectors (saturating)
pub fn mb_to_lba(size_mb: u64) -> u64 {
    size_mb.saturating_mul(1024 * 1024) / SECTOR_SIZE as u64
}
