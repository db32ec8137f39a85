// MBR (Master Boot Record) codec
//
// LBA 0 layout: 440 bytes of boot code, 4-byte disk signature, 2 reserved
// bytes, four 16-byte partition records at 446, then 0x55 0xAA at 510.

use super::device::{check_block_size, read_into};
use super::gpt::is_gpt;
use super::SECTOR_SIZE;
use crate::error::{DiskError, Result};
use gpt_disk_io::BlockIo;

pub const BOOT_CODE_LEN: usize = 440;
pub const DISK_SIGNATURE_OFFSET: usize = 440;
pub const MBR_RECORDS_OFFSET: usize = 446;
pub const MBR_RECORD_SIZE: usize = 16;
pub const MBR_RECORD_COUNT: usize = 4;
pub const MBR_SIGNATURE_OFFSET: usize = 510;
pub const MBR_SIGNATURE: [u8; 2] = [0x55, 0xAA];

/// Partition type of the single record in a protective MBR
pub const TYPE_GPT_PROTECTIVE: u8 = 0xEE;

/// FAT32 with LBA addressing; used for records converted from GPT
pub const TYPE_FAT32_LBA: u8 = 0x0B;

/// CHS, LBA and Linux extended container types
const EXTENDED_TYPES: [u8; 3] = [0x05, 0x0F, 0x85];

/// `cli; hlt; jmp $-1`: parks the CPU if a legacy BIOS boots the disk
pub const BOOT_STUB: [u8; 4] = [0xFA, 0xF4, 0xEB, 0xFD];

/// One of the four primary partition records
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MbrRecord {
    pub boot_indicator: u8,
    pub partition_type: u8,
    pub start_lba: u32,
    pub sector_count: u32,
}

impl MbrRecord {
    pub fn new(partition_type: u8, start_lba: u32, sector_count: u32) -> Self {
        Self {
            boot_indicator: 0,
            partition_type,
            start_lba,
            sector_count,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Self {
        Self {
            boot_indicator: data[0],
            partition_type: data[4],
            start_lba: u32::from_le_bytes([data[8], data[9], data[10], data[11]]),
            sector_count: u32::from_le_bytes([data[12], data[13], data[14], data[15]]),
        }
    }

    /// CHS fields are left zero; everything here is LBA-addressed
    pub fn to_bytes(&self) -> [u8; MBR_RECORD_SIZE] {
        let mut record = [0u8; MBR_RECORD_SIZE];
        record[0] = self.boot_indicator;
        record[4] = self.partition_type;
        record[8..12].copy_from_slice(&self.start_lba.to_le_bytes());
        record[12..16].copy_from_slice(&self.sector_count.to_le_bytes());
        record
    }

    pub fn is_used(&self) -> bool {
        self.partition_type != 0 && self.sector_count != 0
    }

    pub fn is_extended(&self) -> bool {
        EXTENDED_TYPES.contains(&self.partition_type)
    }

    /// Last sector covered by the record (inclusive)
    pub fn end_lba(&self) -> u64 {
        self.start_lba as u64 + self.sector_count as u64 - 1
    }
}

/// Decoded LBA 0
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MbrTable {
    pub boot_code: [u8; BOOT_CODE_LEN],
    pub disk_signature: [u8; 4],
    pub records: [MbrRecord; MBR_RECORD_COUNT],
}

impl MbrTable {
    /// Empty table: no boot code, no records
    pub fn new() -> Self {
        Self {
            boot_code: [0u8; BOOT_CODE_LEN],
            disk_signature: [0u8; 4],
            records: [MbrRecord::default(); MBR_RECORD_COUNT],
        }
    }

    /// Protective MBR for a GPT disk of `disk_size_lba` sectors
    pub fn protective(disk_size_lba: u64) -> Self {
        let size = (disk_size_lba - 1).min(u32::MAX as u64) as u32;
        let mut table = Self::new();
        table.records[0] = MbrRecord::new(TYPE_GPT_PROTECTIVE, 1, size);
        table
    }

    /// Decode a sector. Fails with `NotMbr` without the 0x55 0xAA trailer.
    pub fn from_bytes(sector: &[u8]) -> Result<Self> {
        if sector.len() < SECTOR_SIZE {
            return Err(DiskError::InvalidArgument);
        }
        if sector[MBR_SIGNATURE_OFFSET..MBR_SIGNATURE_OFFSET + 2] != MBR_SIGNATURE {
            return Err(DiskError::NotMbr);
        }

        let mut table = Self::new();
        table.boot_code.copy_from_slice(&sector[..BOOT_CODE_LEN]);
        table
            .disk_signature
            .copy_from_slice(&sector[DISK_SIGNATURE_OFFSET..DISK_SIGNATURE_OFFSET + 4]);
        for (i, record) in table.records.iter_mut().enumerate() {
            let offset = MBR_RECORDS_OFFSET + i * MBR_RECORD_SIZE;
            *record = MbrRecord::from_bytes(&sector[offset..offset + MBR_RECORD_SIZE]);
        }
        Ok(table)
    }

    pub fn to_bytes(&self) -> [u8; SECTOR_SIZE] {
        let mut sector = [0u8; SECTOR_SIZE];
        sector[..BOOT_CODE_LEN].copy_from_slice(&self.boot_code);
        sector[DISK_SIGNATURE_OFFSET..DISK_SIGNATURE_OFFSET + 4]
            .copy_from_slice(&self.disk_signature);
        for (i, record) in self.records.iter().enumerate() {
            let offset = MBR_RECORDS_OFFSET + i * MBR_RECORD_SIZE;
            sector[offset..offset + MBR_RECORD_SIZE].copy_from_slice(&record.to_bytes());
        }
        sector[MBR_SIGNATURE_OFFSET..].copy_from_slice(&MBR_SIGNATURE);
        sector
    }

    pub fn used_records(&self) -> impl Iterator<Item = &MbrRecord> {
        self.records.iter().filter(|r| r.is_used())
    }

    pub fn has_extended(&self) -> bool {
        self.used_records().any(MbrRecord::is_extended)
    }
}

impl Default for MbrTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Read LBA 0 as an MBR
pub fn read_mbr<B: BlockIo>(io: &mut B) -> Result<MbrTable> {
    check_block_size(io)?;
    let mut sector = [0u8; SECTOR_SIZE];
    read_into(io, 0, &mut sector)?;
    MbrTable::from_bytes(&sector)
}

/// True when LBA 0 carries an MBR and LBA 1 no GPT header
pub fn uses_mbr<B: BlockIo>(io: &mut B) -> Result<bool> {
    match read_mbr(io) {
        Ok(_) => Ok(!is_gpt(io)?),
        Err(DiskError::NotMbr) => Ok(false),
        Err(e) => Err(e),
    }
}
