//! Common test utilities: in-memory disk and deterministic GUIDs

#![allow(dead_code)]

use cosmares_core::disk::{allocator, GuidSource, SECTOR_SIZE};
use gpt_disk_io::{BlockIo, Disk};
use gpt_disk_types::{BlockSize, Lba};
use std::io;
use uguid::Guid;

/// 8 MiB
pub const DISK_SECTORS: u64 = 16384;

/// In-memory block device for testing
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryBlockDevice {
    pub data: Vec<u8>,
    pub block_size: usize,
}

impl MemoryBlockDevice {
    /// Zero-filled device of `sectors` 512-byte sectors
    pub fn new(sectors: u64) -> Self {
        Self {
            data: vec![0u8; sectors as usize * SECTOR_SIZE],
            block_size: SECTOR_SIZE,
        }
    }

    pub fn with_block_size(sectors: u64, block_size: usize) -> Self {
        Self {
            data: vec![0u8; sectors as usize * block_size],
            block_size,
        }
    }

    pub fn sector(&self, lba: u64) -> &[u8] {
        let offset = lba as usize * SECTOR_SIZE;
        &self.data[offset..offset + SECTOR_SIZE]
    }

    pub fn sector_mut(&mut self, lba: u64) -> &mut [u8] {
        let offset = lba as usize * SECTOR_SIZE;
        &mut self.data[offset..offset + SECTOR_SIZE]
    }

    /// `len` bytes starting at `lba`
    pub fn bytes_at(&self, lba: u64, len: usize) -> &[u8] {
        let offset = lba as usize * SECTOR_SIZE;
        &self.data[offset..offset + len]
    }

    pub fn sector_count(&self) -> u64 {
        (self.data.len() / self.block_size) as u64
    }
}

impl BlockIo for MemoryBlockDevice {
    type Error = io::Error;

    fn block_size(&self) -> BlockSize {
        BlockSize::new(self.block_size as u32).expect("valid block size")
    }

    fn num_blocks(&mut self) -> Result<u64, Self::Error> {
        Ok((self.data.len() / self.block_size) as u64)
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> Result<(), Self::Error> {
        let offset = start_lba.0 as usize * self.block_size;
        if offset + dst.len() > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read beyond end of device",
            ));
        }
        dst.copy_from_slice(&self.data[offset..offset + dst.len()]);
        Ok(())
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> Result<(), Self::Error> {
        let offset = start_lba.0 as usize * self.block_size;
        if offset + src.len() > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "write beyond end of device",
            ));
        }
        self.data[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Memory device whose next `failing_flushes` flushes report an error
#[derive(Debug, Clone)]
pub struct FlakyDevice {
    pub inner: MemoryBlockDevice,
    pub failing_flushes: u32,
}

impl FlakyDevice {
    pub fn new(inner: MemoryBlockDevice) -> Self {
        Self {
            inner,
            failing_flushes: 0,
        }
    }
}

impl BlockIo for FlakyDevice {
    type Error = io::Error;

    fn block_size(&self) -> BlockSize {
        self.inner.block_size()
    }

    fn num_blocks(&mut self) -> Result<u64, Self::Error> {
        self.inner.num_blocks()
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> Result<(), Self::Error> {
        self.inner.read_blocks(start_lba, dst)
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> Result<(), Self::Error> {
        self.inner.write_blocks(start_lba, src)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.failing_flushes > 0 {
            self.failing_flushes -= 1;
            return Err(io::Error::new(io::ErrorKind::Other, "flush failed"));
        }
        self.inner.flush()
    }
}

/// Distinct, never-zero GUIDs from a counter
#[derive(Debug, Default)]
pub struct CounterGuids {
    pub issued: u64,
}

impl GuidSource for CounterGuids {
    fn next_guid(&mut self) -> Guid {
        self.issued += 1;
        let mut bytes = [0x5Au8; 16];
        bytes[..8].copy_from_slice(&self.issued.to_le_bytes());
        Guid::from_bytes(bytes)
    }
}

/// Blank disk with a fresh GPT
pub fn gpt_disk(sectors: u64) -> MemoryBlockDevice {
    let mut dev = MemoryBlockDevice::new(sectors);
    allocator::create_gpt(&mut dev, &mut CounterGuids::default()).expect("create_gpt");
    dev
}

/// GPT disk with one partition of `size_mb` MiB at LBA 2048
pub fn disk_with_partition(sectors: u64, size_mb: u64) -> MemoryBlockDevice {
    let mut dev = gpt_disk(sectors);
    allocator::create_partition(&mut dev, 2048, size_mb, &mut CounterGuids::default())
        .expect("create_partition");
    dev
}

/// Deterministic non-repeating test pattern
pub fn image(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2654435761).wrapping_add(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}

/// Check the primary (and backup) checksums with gpt_disk_io's own reader
pub fn assert_checksums_valid(dev: &MemoryBlockDevice) {
    let mut disk = Disk::new(dev.clone()).expect("open disk");
    let mut block = [0u8; 512];

    let header = disk.read_primary_gpt_header(&mut block).expect("primary header");
    assert_eq!(header.header_crc32, header.calculate_header_crc32(), "primary header crc");

    let layout = header
        .get_partition_entry_array_layout()
        .expect("entry layout");
    let mut storage = vec![0u8; 16384];
    let entries = disk
        .read_gpt_partition_entry_array(layout, &mut storage)
        .expect("entry array");
    assert_eq!(
        header.partition_entry_array_crc32,
        entries.calculate_crc32(),
        "entry array crc"
    );

    let backup = disk
        .read_secondary_gpt_header(&mut block)
        .expect("secondary header");
    assert_eq!(backup.header_crc32, backup.calculate_header_crc32(), "backup header crc");
    assert_eq!(backup.partition_entry_array_crc32, header.partition_entry_array_crc32);
}
