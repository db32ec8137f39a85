//! Block device access
//!
//! Every component talks to storage through [`gpt_disk_io::BlockIo`]. The
//! helpers here pin the sector size to 512 bytes, turn device failures into
//! [`DiskError::Io`], and provide [`PartitionView`], a partition-relative
//! window over a whole-disk device.

use super::SECTOR_SIZE;
use crate::error::{DiskError, Result};
use alloc::vec;
use alloc::vec::Vec;
use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};

/// Reject devices whose block size is not 512 bytes
pub fn check_block_size<B: BlockIo>(io: &B) -> Result<()> {
    if io.block_size() != BlockSize::BS_512 {
        log::error!("unsupported block size {:?}", io.block_size());
        return Err(DiskError::InvalidArgument);
    }
    Ok(())
}

/// Total number of sectors on the device
pub fn sector_count<B: BlockIo>(io: &mut B) -> Result<u64> {
    io.num_blocks().map_err(|e| {
        log::error!("num_blocks failed: {:?}", e);
        DiskError::Io
    })
}

/// Read `count` sectors starting at `lba`
pub fn read_sectors<B: BlockIo>(io: &mut B, lba: u64, count: u64) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; count as usize * SECTOR_SIZE];
    read_into(io, lba, &mut buf)?;
    Ok(buf)
}

/// Read whole sectors into `buf` (length must be a multiple of 512)
pub fn read_into<B: BlockIo>(io: &mut B, lba: u64, buf: &mut [u8]) -> Result<()> {
    if buf.len() % SECTOR_SIZE != 0 {
        return Err(DiskError::InvalidArgument);
    }
    io.read_blocks(Lba(lba), buf).map_err(|e| {
        log::error!("read of {} sectors at LBA {} failed: {:?}", buf.len() / SECTOR_SIZE, lba, e);
        DiskError::Io
    })
}

/// Write whole sectors starting at `lba` (length must be a multiple of 512)
pub fn write_sectors<B: BlockIo>(io: &mut B, lba: u64, data: &[u8]) -> Result<()> {
    if data.len() % SECTOR_SIZE != 0 {
        return Err(DiskError::InvalidArgument);
    }
    io.write_blocks(Lba(lba), data).map_err(|e| {
        log::error!("write of {} sectors at LBA {} failed: {:?}", data.len() / SECTOR_SIZE, lba, e);
        DiskError::Io
    })
}

/// Zero `count` sectors starting at `lba`
pub fn zero_sectors<B: BlockIo>(io: &mut B, lba: u64, count: u64) -> Result<()> {
    let zeros = vec![0u8; count as usize * SECTOR_SIZE];
    write_sectors(io, lba, &zeros)
}

pub fn flush<B: BlockIo>(io: &mut B) -> Result<()> {
    io.flush().map_err(|e| {
        log::error!("flush failed: {:?}", e);
        DiskError::Io
    })
}

/// Partition-relative view of a whole-disk device
///
/// Sector 0 of the view is `start_lba` on the host. Accesses past
/// `end_lba` (inclusive) fail with [`DiskError::OutOfRange`] before any
/// I/O is issued.
pub struct PartitionView<'a, B: BlockIo> {
    io: &'a mut B,
    start_lba: u64,
    end_lba: u64,
}

impl<'a, B: BlockIo> PartitionView<'a, B> {
    pub fn new(io: &'a mut B, start_lba: u64, end_lba: u64) -> Result<Self> {
        if end_lba < start_lba {
            return Err(DiskError::InvalidArgument);
        }
        Ok(Self {
            io,
            start_lba,
            end_lba,
        })
    }

    pub fn start_lba(&self) -> u64 {
        self.start_lba
    }

    /// Number of sectors in the partition
    pub fn sector_count(&self) -> u64 {
        self.end_lba - self.start_lba + 1
    }

    /// Capacity in bytes
    pub fn capacity(&self) -> u64 {
        self.sector_count() * SECTOR_SIZE as u64
    }

    fn translate(&self, lba: u64, sectors: u64) -> Result<u64> {
        let last = lba
            .checked_add(sectors)
            .and_then(|end| end.checked_sub(1))
            .ok_or(DiskError::OutOfRange)?;
        if sectors == 0 || last >= self.sector_count() {
            return Err(DiskError::OutOfRange);
        }
        Ok(self.start_lba + lba)
    }

    /// Read `count` sectors at partition-relative `lba`
    pub fn read(&mut self, lba: u64, count: u64) -> Result<Vec<u8>> {
        let host_lba = self.translate(lba, count)?;
        read_sectors(&mut *self.io, host_lba, count)
    }

    /// Write whole sectors at partition-relative `lba`
    pub fn write(&mut self, lba: u64, data: &[u8]) -> Result<()> {
        let sectors = (data.len() / SECTOR_SIZE) as u64;
        let host_lba = self.translate(lba, sectors)?;
        write_sectors(&mut *self.io, host_lba, data)
    }

    pub fn flush(&mut self) -> Result<()> {
        flush(&mut *self.io)
    }
}
