// GPT (GUID Partition Table) codec
//
// Byte layouts follow the UEFI GPT header/entry formats. Encoding is
// explicit little-endian field by field; nothing here relies on struct
// layout. Reads are provided for callers; writes belong to the allocator.

use super::device::{check_block_size, read_into, read_sectors, sector_count};
use super::{GPT_ENTRIES_BYTES, GPT_ENTRIES_SECTORS, GPT_ENTRY_COUNT, GPT_ENTRY_SIZE, SECTOR_SIZE};
use crate::checksum::{crc32, Crc32Hasher};
use crate::error::{DiskError, Result};
use alloc::vec;
use alloc::vec::Vec;
use gpt_disk_io::BlockIo;
use uguid::{guid, Guid};

pub const GPT_SIGNATURE: &[u8; 8] = b"EFI PART";

/// GPT 1.0
pub const GPT_REVISION: u32 = 0x0001_0000;

/// Meaningful bytes of the header; the rest of LBA 1 is zero
pub const GPT_HEADER_SIZE: usize = 92;

/// Byte offset of `header_crc32` inside the header
const HEADER_CRC_OFFSET: usize = 16;

/// Bytes at the start of an entry that decide whether the slot is in use
const ENTRY_GUIDS_LEN: usize = 32;

/// Attributes and name bytes of an entry (always zeroed by this crate)
pub const ENTRY_TAIL_LEN: usize = 80;

pub const GUID_EFI_SYSTEM: Guid = guid!("c12a7328-f81f-11d2-ba4b-00a0c93ec93b");
pub const GUID_LINUX_FILESYSTEM: Guid = guid!("0fc63daf-8483-4772-8e79-3d69d8477de4");
pub const GUID_LINUX_SWAP: Guid = guid!("0657fd6d-a4ab-43c4-84e5-0933c84b4f4f");
pub const GUID_BASIC_DATA: Guid = guid!("ebd0a0a2-b9e5-4433-87c0-68b6b72699c7");

fn le_u32(data: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

fn le_u64(data: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

fn guid_at(data: &[u8], offset: usize) -> Guid {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&data[offset..offset + 16]);
    Guid::from_bytes(bytes)
}

/// Decoded GPT header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GptHeader {
    pub signature: [u8; 8],
    pub revision: u32,
    pub header_size: u32,
    pub header_crc32: u32,
    pub reserved: u32,
    pub current_lba: u64,
    pub backup_lba: u64,
    pub first_usable_lba: u64,
    pub last_usable_lba: u64,
    pub disk_guid: Guid,
    pub partition_entry_lba: u64,
    pub num_partition_entries: u32,
    pub partition_entry_size: u32,
    pub partition_array_crc32: u32,
}

impl GptHeader {
    /// Blank primary header for a disk of `disk_size_lba` sectors, checksums zero
    pub fn new(disk_size_lba: u64, disk_guid: Guid) -> Self {
        Self {
            signature: *GPT_SIGNATURE,
            revision: GPT_REVISION,
            header_size: GPT_HEADER_SIZE as u32,
            header_crc32: 0,
            reserved: 0,
            current_lba: 1,
            backup_lba: disk_size_lba - 1,
            first_usable_lba: super::FIRST_USABLE_LBA,
            last_usable_lba: disk_size_lba - super::GPT_REGION_SECTORS,
            disk_guid,
            partition_entry_lba: super::GPT_ENTRIES_LBA,
            num_partition_entries: GPT_ENTRY_COUNT as u32,
            partition_entry_size: GPT_ENTRY_SIZE as u32,
            partition_array_crc32: 0,
        }
    }

    /// Decode a header sector. Fails with `NotGpt` if the magic is absent.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < GPT_HEADER_SIZE {
            return Err(DiskError::InvalidArgument);
        }
        if &data[0..8] != GPT_SIGNATURE {
            return Err(DiskError::NotGpt);
        }

        let mut signature = [0u8; 8];
        signature.copy_from_slice(&data[0..8]);

        Ok(Self {
            signature,
            revision: le_u32(data, 8),
            header_size: le_u32(data, 12),
            header_crc32: le_u32(data, 16),
            reserved: le_u32(data, 20),
            current_lba: le_u64(data, 24),
            backup_lba: le_u64(data, 32),
            first_usable_lba: le_u64(data, 40),
            last_usable_lba: le_u64(data, 48),
            disk_guid: guid_at(data, 56),
            partition_entry_lba: le_u64(data, 72),
            num_partition_entries: le_u32(data, 80),
            partition_entry_size: le_u32(data, 84),
            partition_array_crc32: le_u32(data, 88),
        })
    }

    /// Encode into a full sector (bytes past 92 are zero)
    pub fn to_bytes(&self) -> [u8; SECTOR_SIZE] {
        let mut buffer = [0u8; SECTOR_SIZE];

        buffer[0..8].copy_from_slice(&self.signature);
        buffer[8..12].copy_from_slice(&self.revision.to_le_bytes());
        buffer[12..16].copy_from_slice(&self.header_size.to_le_bytes());
        buffer[16..20].copy_from_slice(&self.header_crc32.to_le_bytes());
        buffer[20..24].copy_from_slice(&self.reserved.to_le_bytes());
        buffer[24..32].copy_from_slice(&self.current_lba.to_le_bytes());
        buffer[32..40].copy_from_slice(&self.backup_lba.to_le_bytes());
        buffer[40..48].copy_from_slice(&self.first_usable_lba.to_le_bytes());
        buffer[48..56].copy_from_slice(&self.last_usable_lba.to_le_bytes());
        buffer[56..72].copy_from_slice(&self.disk_guid.to_bytes());
        buffer[72..80].copy_from_slice(&self.partition_entry_lba.to_le_bytes());
        buffer[80..84].copy_from_slice(&self.num_partition_entries.to_le_bytes());
        buffer[84..88].copy_from_slice(&self.partition_entry_size.to_le_bytes());
        buffer[88..92].copy_from_slice(&self.partition_array_crc32.to_le_bytes());

        buffer
    }

    /// CRC32 of bytes [0, 92) with the header CRC field taken as zero
    pub fn calculate_header_crc32(&self) -> u32 {
        let bytes = self.to_bytes();
        let mut hasher = Crc32Hasher::new();
        hasher.update(&bytes[..HEADER_CRC_OFFSET]);
        hasher.update(&[0u8; 4]);
        hasher.update(&bytes[HEADER_CRC_OFFSET + 4..GPT_HEADER_SIZE]);
        hasher.finalize()
    }

    /// The backup copy: current/backup LBAs swapped, header CRC recomputed
    pub fn mirrored(&self) -> Self {
        let mut mirror = *self;
        mirror.current_lba = self.backup_lba;
        mirror.backup_lba = self.current_lba;
        mirror.header_crc32 = mirror.calculate_header_crc32();
        mirror
    }

    fn has_standard_layout(&self) -> bool {
        self.num_partition_entries as usize == GPT_ENTRY_COUNT
            && self.partition_entry_size as usize == GPT_ENTRY_SIZE
    }
}

/// Fill both checksums of `header` for the given entry array.
///
/// The entries CRC goes in first; the header CRC is then taken over a
/// header that already carries it, with its own field zeroed.
pub fn recompute_checksums(entries: &[u8], header: &mut GptHeader) {
    header.partition_array_crc32 = crc32(entries);
    header.header_crc32 = 0;
    header.header_crc32 = header.calculate_header_crc32();
}

/// One 128-byte partition entry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GptEntry {
    pub type_guid: Guid,
    pub unique_guid: Guid,
    pub first_lba: u64,
    /// Inclusive
    pub last_lba: u64,
    pub tail: [u8; ENTRY_TAIL_LEN],
}

impl GptEntry {
    pub fn new(type_guid: Guid, unique_guid: Guid, first_lba: u64, last_lba: u64) -> Self {
        Self {
            type_guid,
            unique_guid,
            first_lba,
            last_lba,
            tail: [0u8; ENTRY_TAIL_LEN],
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < GPT_ENTRY_SIZE {
            return Err(DiskError::InvalidArgument);
        }
        let mut tail = [0u8; ENTRY_TAIL_LEN];
        tail.copy_from_slice(&data[48..GPT_ENTRY_SIZE]);

        Ok(Self {
            type_guid: guid_at(data, 0),
            unique_guid: guid_at(data, 16),
            first_lba: le_u64(data, 32),
            last_lba: le_u64(data, 40),
            tail,
        })
    }

    pub fn to_bytes(&self) -> [u8; GPT_ENTRY_SIZE] {
        let mut entry = [0u8; GPT_ENTRY_SIZE];
        entry[0..16].copy_from_slice(&self.type_guid.to_bytes());
        entry[16..32].copy_from_slice(&self.unique_guid.to_bytes());
        entry[32..40].copy_from_slice(&self.first_lba.to_le_bytes());
        entry[40..48].copy_from_slice(&self.last_lba.to_le_bytes());
        entry[48..GPT_ENTRY_SIZE].copy_from_slice(&self.tail);
        entry
    }

    /// A slot is blank when both GUIDs are zero
    pub fn is_blank(&self) -> bool {
        self.type_guid == Guid::ZERO && self.unique_guid == Guid::ZERO
    }
}

/// The 128 x 128-byte partition entry array
#[derive(Clone, PartialEq, Eq)]
pub struct EntryTable {
    entries: Vec<u8>,
}

impl EntryTable {
    /// All-blank table
    pub fn new() -> Self {
        Self {
            entries: vec![0u8; GPT_ENTRIES_BYTES],
        }
    }

    pub fn from_bytes(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < GPT_ENTRIES_BYTES {
            return Err(DiskError::InvalidArgument);
        }
        Ok(Self {
            entries: buffer[..GPT_ENTRIES_BYTES].to_vec(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.entries
    }

    fn slot(&self, index: usize) -> Result<&[u8]> {
        if index >= GPT_ENTRY_COUNT {
            return Err(DiskError::OutOfRange);
        }
        let offset = index * GPT_ENTRY_SIZE;
        Ok(&self.entries[offset..offset + GPT_ENTRY_SIZE])
    }

    pub fn entry(&self, index: usize) -> Result<GptEntry> {
        GptEntry::from_bytes(self.slot(index)?)
    }

    pub fn is_blank(&self, index: usize) -> Result<bool> {
        Ok(self.slot(index)?[..ENTRY_GUIDS_LEN].iter().all(|&b| b == 0))
    }

    pub fn set_entry(&mut self, index: usize, entry: &GptEntry) -> Result<()> {
        if index >= GPT_ENTRY_COUNT {
            return Err(DiskError::OutOfRange);
        }
        let offset = index * GPT_ENTRY_SIZE;
        self.entries[offset..offset + GPT_ENTRY_SIZE].copy_from_slice(&entry.to_bytes());
        Ok(())
    }

    /// Zero the two GUIDs of a slot; LBA fields and tail are left as they are
    pub fn clear_guids(&mut self, index: usize) -> Result<()> {
        if index >= GPT_ENTRY_COUNT {
            return Err(DiskError::OutOfRange);
        }
        let offset = index * GPT_ENTRY_SIZE;
        self.entries[offset..offset + ENTRY_GUIDS_LEN].fill(0);
        Ok(())
    }

    /// Non-blank entries in slot order
    pub fn used(&self) -> impl Iterator<Item = (usize, GptEntry)> + '_ {
        self.entries
            .chunks_exact(GPT_ENTRY_SIZE)
            .enumerate()
            .filter(|(_, raw)| raw[..ENTRY_GUIDS_LEN].iter().any(|&b| b != 0))
            .filter_map(|(i, raw)| GptEntry::from_bytes(raw).ok().map(|e| (i, e)))
    }

    pub fn used_count(&self) -> usize {
        self.used().count()
    }

    pub fn crc32(&self) -> u32 {
        crc32(&self.entries)
    }
}

impl Default for EntryTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Check for the GPT magic at LBA 1
pub fn is_gpt<B: BlockIo>(io: &mut B) -> Result<bool> {
    check_block_size(io)?;
    let mut sector = [0u8; SECTOR_SIZE];
    read_into(io, 1, &mut sector)?;
    Ok(&sector[0..8] == GPT_SIGNATURE)
}

/// Read and decode the header stored at `lba`
pub fn read_gpt_header<B: BlockIo>(io: &mut B, lba: u64) -> Result<GptHeader> {
    check_block_size(io)?;
    let mut sector = [0u8; SECTOR_SIZE];
    read_into(io, lba, &mut sector)?;
    GptHeader::from_bytes(&sector)
}

/// Read the primary header and its entry array
pub fn read_gpt<B: BlockIo>(io: &mut B) -> Result<(GptHeader, EntryTable)> {
    let header = read_gpt_header(io, 1)?;
    if !header.has_standard_layout() {
        log::error!(
            "unsupported GPT entry layout: {} entries of {} bytes",
            header.num_partition_entries,
            header.partition_entry_size
        );
        return Err(DiskError::Corrupt);
    }

    let raw = read_sectors(io, header.partition_entry_lba, GPT_ENTRIES_SECTORS)?;
    let table = EntryTable::from_bytes(&raw)?;

    if header.header_crc32 != header.calculate_header_crc32() {
        log::warn!("primary GPT header CRC mismatch");
    }
    if header.partition_array_crc32 != table.crc32() {
        log::warn!("GPT partition entry array CRC mismatch");
    }

    Ok((header, table))
}

/// Result of recomputing the checksums stored on disk
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChecksumReport {
    pub primary_header_ok: bool,
    pub entries_ok: bool,
    /// `None` when no backup header is present at `backup_lba`
    pub backup_header_ok: Option<bool>,
}

impl ChecksumReport {
    pub fn is_consistent(&self) -> bool {
        self.primary_header_ok && self.entries_ok && self.backup_header_ok != Some(false)
    }
}

/// Recompute both checksums from the bytes on disk and compare
pub fn verify_gpt<B: BlockIo>(io: &mut B) -> Result<ChecksumReport> {
    let (header, table) = read_gpt(io)?;

    let backup_header_ok = if header.backup_lba < sector_count(io)? {
        match read_gpt_header(io, header.backup_lba) {
            Ok(backup) => Some(
                backup.header_crc32 == backup.calculate_header_crc32()
                    && backup.partition_array_crc32 == table.crc32(),
            ),
            Err(DiskError::NotGpt) => None,
            Err(e) => return Err(e),
        }
    } else {
        None
    };

    Ok(ChecksumReport {
        primary_header_ok: header.header_crc32 == header.calculate_header_crc32(),
        entries_ok: header.partition_array_crc32 == table.crc32(),
        backup_header_ok,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> GptHeader {
        GptHeader::new(2048, Guid::from_bytes([0x11; 16]))
    }

    #[test]
    fn test_linux_guid_byte_layout() {
        assert_eq!(
            GUID_LINUX_FILESYSTEM.to_bytes(),
            [175, 61, 198, 15, 131, 132, 114, 71, 142, 121, 61, 105, 216, 71, 125, 228]
        );
    }

    #[test]
    fn test_header_field_offsets() {
        let mut header = sample_header();
        header.partition_array_crc32 = 0xDEADBEEF;
        let bytes = header.to_bytes();

        assert_eq!(&bytes[0..8], b"EFI PART");
        assert_eq!(&bytes[8..12], &[0x00, 0x00, 0x01, 0x00]);
        assert_eq!(le_u32(&bytes, 12), 92);
        assert_eq!(le_u64(&bytes, 24), 1);
        assert_eq!(le_u64(&bytes, 32), 2047);
        assert_eq!(le_u64(&bytes, 40), 34);
        assert_eq!(le_u64(&bytes, 48), 2048 - 34);
        assert_eq!(&bytes[56..72], &[0x11; 16]);
        assert_eq!(le_u64(&bytes, 72), 2);
        assert_eq!(le_u32(&bytes, 80), 128);
        assert_eq!(le_u32(&bytes, 84), 128);
        assert_eq!(le_u32(&bytes, 88), 0xDEADBEEF);
        assert!(bytes[92..].iter().all(|&b| b == 0));

        assert_eq!(GptHeader::from_bytes(&bytes).unwrap(), header);
    }

    #[test]
    fn test_from_bytes_requires_magic() {
        let bytes = [0u8; SECTOR_SIZE];
        assert_eq!(GptHeader::from_bytes(&bytes), Err(DiskError::NotGpt));
    }

    #[test]
    fn test_recompute_orders_entries_crc_first() {
        let mut table = EntryTable::new();
        let entry = GptEntry::new(GUID_LINUX_FILESYSTEM, Guid::from_bytes([7; 16]), 34, 100);
        table.set_entry(3, &entry).unwrap();

        let mut header = sample_header();
        recompute_checksums(table.as_bytes(), &mut header);

        assert_eq!(header.partition_array_crc32, crc32(table.as_bytes()));

        // Header CRC covers the entries CRC, with its own field zeroed
        let mut bytes = header.to_bytes();
        bytes[16..20].fill(0);
        assert_eq!(header.header_crc32, crc32(&bytes[..92]));
    }

    #[test]
    fn test_mirrored_swaps_lbas_only() {
        let mut header = sample_header();
        recompute_checksums(EntryTable::new().as_bytes(), &mut header);
        let mirror = header.mirrored();

        assert_eq!(mirror.current_lba, header.backup_lba);
        assert_eq!(mirror.backup_lba, header.current_lba);
        assert_eq!(mirror.partition_entry_lba, header.partition_entry_lba);
        assert_eq!(mirror.partition_array_crc32, header.partition_array_crc32);
        assert_eq!(mirror.header_crc32, mirror.calculate_header_crc32());
        assert_ne!(mirror.header_crc32, header.header_crc32);
    }

    #[test]
    fn test_blank_is_decided_by_guids() {
        let mut table = EntryTable::new();
        let entry = GptEntry::new(GUID_LINUX_FILESYSTEM, Guid::from_bytes([9; 16]), 40, 80);
        table.set_entry(0, &entry).unwrap();
        assert!(!table.is_blank(0).unwrap());

        table.clear_guids(0).unwrap();
        assert!(table.is_blank(0).unwrap());
        // LBA fields survive
        let cleared = table.entry(0).unwrap();
        assert_eq!(cleared.first_lba, 40);
        assert_eq!(cleared.last_lba, 80);
        assert!(cleared.is_blank());
        assert_eq!(table.used_count(), 0);
    }

    #[test]
    fn test_entry_index_bounds() {
        let table = EntryTable::new();
        assert_eq!(table.entry(128), Err(DiskError::OutOfRange));
        assert_eq!(table.is_blank(127), Ok(true));
    }
}
