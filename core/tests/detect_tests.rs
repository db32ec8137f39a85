//! Filesystem detection against partitions on a GPT disk

mod common;

use common::{disk_with_partition, gpt_disk, CounterGuids, DISK_SECTORS};
use cosmares_core::disk::allocator;
use cosmares_core::fs::{detect_at, detect_filesystem, FsKind};
use cosmares_core::DiskError;

const PART_LBA: u64 = 2048;

#[test]
fn test_detect_ext_partition() {
    let mut dev = disk_with_partition(DISK_SECTORS, 1);
    let offset = PART_LBA as usize * 512 + 1080;
    dev.data[offset..offset + 2].copy_from_slice(&[0x53, 0xEF]);

    assert_eq!(detect_filesystem(&mut dev, 0), Ok(FsKind::LinuxEXT));
    assert_eq!(detect_at(&mut dev, PART_LBA), Ok(FsKind::LinuxEXT));
}

#[test]
fn test_detect_exfat_partition() {
    let mut dev = disk_with_partition(DISK_SECTORS, 1);
    dev.sector_mut(PART_LBA)[3..11].copy_from_slice(b"EXFAT   ");
    assert_eq!(detect_filesystem(&mut dev, 0), Ok(FsKind::EXFAT));
}

#[test]
fn test_detect_iso_at_sector_64() {
    let mut dev = disk_with_partition(DISK_SECTORS, 1);
    let pvd = dev.sector_mut(PART_LBA + 64);
    pvd[0] = 1;
    pvd[1..6].copy_from_slice(b"CD001");

    assert_eq!(detect_filesystem(&mut dev, 0), Ok(FsKind::ISO9660));
}

#[test]
fn test_blank_partition_is_unknown() {
    let mut dev = disk_with_partition(DISK_SECTORS, 1);
    assert_eq!(detect_filesystem(&mut dev, 0), Ok(FsKind::Unknown));
}

#[test]
fn test_iso_probe_past_small_partition() {
    let mut dev = gpt_disk(DISK_SECTORS);
    let mut guids = CounterGuids::default();
    allocator::create_partition_range(&mut dev, PART_LBA, PART_LBA + 9, &mut guids).unwrap();
    // Signature past the end of the partition is not seen
    dev.sector_mut(PART_LBA + 64)[1..6].copy_from_slice(b"CD001");

    assert_eq!(detect_filesystem(&mut dev, 0), Ok(FsKind::Unknown));
    assert_eq!(detect_at(&mut dev, PART_LBA), Ok(FsKind::ISO9660));
}

#[test]
fn test_partition_shorter_than_probe_window() {
    let mut dev = gpt_disk(DISK_SECTORS);
    let mut guids = CounterGuids::default();
    allocator::create_partition_range(&mut dev, PART_LBA, PART_LBA + 1, &mut guids).unwrap();
    dev.sector_mut(PART_LBA)[3..11].copy_from_slice(b"EXFAT   ");

    assert_eq!(detect_filesystem(&mut dev, 0), Ok(FsKind::Unknown));
}

#[test]
fn test_detect_missing_partition() {
    let mut dev = gpt_disk(DISK_SECTORS);
    assert_eq!(detect_filesystem(&mut dev, 0), Err(DiskError::OutOfRange));
}
