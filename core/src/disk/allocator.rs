// GPT partition allocation and GPT <-> MBR conversion
//
// Every mutation follows the same sequence: validate, edit the in-memory
// entry table, recompute both checksums, write LBA 1..=33, rewrite the
// mirrored backup header, flush. Validation failures never touch the disk.

use super::device::{check_block_size, flush, sector_count, write_sectors, zero_sectors};
use super::gpt::{
    is_gpt, read_gpt, recompute_checksums, EntryTable, GptEntry, GptHeader, GUID_LINUX_FILESYSTEM,
};
use super::guid::GuidSource;
use super::mbr::{read_mbr, MbrRecord, MbrTable, BOOT_STUB, MBR_RECORD_COUNT, TYPE_FAT32_LBA};
use super::{
    mb_to_lba, FIRST_USABLE_LBA, GPT_ENTRIES_SECTORS, GPT_ENTRY_COUNT, GPT_REGION_SECTORS,
    SECTOR_SIZE,
};
use crate::error::{DiskError, Result};
use alloc::vec::Vec;
use gpt_disk_io::BlockIo;

/// First blank slot, scanning from 0
pub fn find_free_slot(table: &EntryTable) -> Option<usize> {
    (0..GPT_ENTRY_COUNT).find(|&i| table.is_blank(i).unwrap_or(false))
}

/// True iff either endpoint of the candidate `a` lies inside existing `b`.
///
/// One-directional: a candidate that strictly contains `b` is not reported.
pub fn overlaps(a_start: u64, a_end: u64, b_start: u64, b_end: u64) -> bool {
    (b_start..=b_end).contains(&a_start) || (b_start..=b_end).contains(&a_end)
}

/// Write the primary header and entry array, then the mirrored backup header
fn write_gpt<B: BlockIo>(io: &mut B, header: &mut GptHeader, table: &EntryTable) -> Result<()> {
    recompute_checksums(table.as_bytes(), header);

    let mut primary = Vec::with_capacity((1 + GPT_ENTRIES_SECTORS as usize) * SECTOR_SIZE);
    primary.extend_from_slice(&header.to_bytes());
    primary.extend_from_slice(table.as_bytes());
    write_sectors(io, header.current_lba, &primary)?;

    if header.backup_lba < sector_count(io)? {
        let backup = header.mirrored();
        write_sectors(io, backup.current_lba, &backup.to_bytes())?;
    } else {
        log::warn!("backup GPT header LBA {} is past end of disk", header.backup_lba);
    }

    flush(io)
}

/// Initialise an empty GPT: protective MBR, primary header and blank
/// entry array at LBA 0..=33, backup header at the last sector
pub fn create_gpt<B: BlockIo, G: GuidSource>(io: &mut B, guids: &mut G) -> Result<()> {
    check_block_size(io)?;
    if is_gpt(io)? {
        return Err(DiskError::AlreadyGpt);
    }

    let disk_size = sector_count(io)?;
    if disk_size <= 2 * GPT_REGION_SECTORS {
        log::error!("disk of {} sectors is too small for GPT", disk_size);
        return Err(DiskError::InsufficientSpace);
    }

    write_sectors(io, 0, &MbrTable::protective(disk_size).to_bytes())?;

    let mut header = GptHeader::new(disk_size, guids.next_guid());
    write_gpt(io, &mut header, &EntryTable::new())?;

    log::info!("created GPT on {} sectors, disk GUID {}", disk_size, header.disk_guid);
    Ok(())
}

/// Create a Linux filesystem partition of `size_mb` MiB at `start_lba`.
///
/// Returns the entry index (slot) that was filled.
pub fn create_partition<B: BlockIo, G: GuidSource>(
    io: &mut B,
    start_lba: u64,
    size_mb: u64,
    guids: &mut G,
) -> Result<usize> {
    if size_mb == 0 {
        return Err(DiskError::InvalidArgument);
    }
    let end_lba = start_lba
        .checked_add(mb_to_lba(size_mb) - 1)
        .ok_or(DiskError::OutOfRange)?;
    create_partition_range(io, start_lba, end_lba, guids)
}

/// Create a Linux filesystem partition spanning `[start_lba, end_lba]`
pub fn create_partition_range<B: BlockIo, G: GuidSource>(
    io: &mut B,
    start_lba: u64,
    end_lba: u64,
    guids: &mut G,
) -> Result<usize> {
    if end_lba < start_lba {
        return Err(DiskError::InvalidArgument);
    }
    if !is_gpt(io)? {
        return Err(DiskError::NotGpt);
    }

    let (mut header, mut table) = read_gpt(io)?;
    if table.used_count() >= GPT_ENTRY_COUNT {
        return Err(DiskError::TableFull);
    }

    let disk_size = sector_count(io)?;
    if start_lba < FIRST_USABLE_LBA || start_lba > disk_size {
        return Err(DiskError::OutOfRange);
    }
    if end_lba > header.last_usable_lba {
        return Err(DiskError::InsufficientSpace);
    }

    if let Some((slot, existing)) = table
        .used()
        .find(|(_, e)| overlaps(start_lba, end_lba, e.first_lba, e.last_lba))
    {
        log::warn!(
            "range {}..={} overlaps slot {} ({}..={})",
            start_lba,
            end_lba,
            slot,
            existing.first_lba,
            existing.last_lba
        );
        return Err(DiskError::Overlap);
    }

    // Unreachable while the used count check above holds
    let slot = find_free_slot(&table).ok_or(DiskError::Corrupt)?;

    let entry = GptEntry::new(GUID_LINUX_FILESYSTEM, guids.next_guid(), start_lba, end_lba);
    table.set_entry(slot, &entry)?;
    write_gpt(io, &mut header, &table)?;

    log::info!("created partition in slot {}: LBA {}..={}", slot, start_lba, end_lba);
    Ok(slot)
}

/// Blank entry `slot` by zeroing its GUIDs; LBA fields stay as they were
pub fn delete_partition<B: BlockIo>(io: &mut B, slot: usize) -> Result<()> {
    if !is_gpt(io)? {
        return Err(DiskError::NotGpt);
    }
    if slot >= GPT_ENTRY_COUNT {
        return Err(DiskError::OutOfRange);
    }

    let (mut header, mut table) = read_gpt(io)?;
    if table.is_blank(slot)? {
        return Err(DiskError::EmptySlot);
    }

    table.clear_guids(slot)?;
    write_gpt(io, &mut header, &table)?;

    log::info!("deleted partition in slot {}", slot);
    Ok(())
}

/// Replace the GPT with an MBR holding the same (at most four) ranges
pub fn gpt_to_mbr<B: BlockIo, G: GuidSource>(io: &mut B, guids: &mut G) -> Result<()> {
    if !is_gpt(io)? {
        return Err(DiskError::NotGpt);
    }

    let (_, table) = read_gpt(io)?;
    let used: Vec<GptEntry> = table.used().map(|(_, e)| e).collect();
    if used.len() > MBR_RECORD_COUNT {
        return Err(DiskError::TooManyPartitions);
    }

    let mut mbr = MbrTable::new();
    for (record, entry) in mbr.records.iter_mut().zip(&used) {
        let start = u32::try_from(entry.first_lba).map_err(|_| DiskError::OutOfRange)?;
        let span = entry
            .last_lba
            .checked_sub(entry.first_lba)
            .ok_or(DiskError::Corrupt)?;
        let count = u32::try_from(span + 1).map_err(|_| DiskError::OutOfRange)?;
        *record = MbrRecord::new(TYPE_FAT32_LBA, start, count);
    }
    mbr.boot_code[..BOOT_STUB.len()].copy_from_slice(&BOOT_STUB);
    mbr.disk_signature
        .copy_from_slice(&guids.next_guid().to_bytes()[..4]);

    let disk_size = sector_count(io)?;
    let backup_region = 1 + GPT_ENTRIES_SECTORS;
    let backup_start = disk_size
        .checked_sub(backup_region)
        .ok_or(DiskError::Corrupt)?;
    zero_sectors(io, backup_start, backup_region)?;
    write_sectors(io, 0, &mbr.to_bytes())?;
    zero_sectors(io, 1, backup_region)?;
    flush(io)?;

    log::info!("converted GPT to MBR with {} partitions", used.len());
    Ok(())
}

/// Replace an MBR with a GPT holding the same ranges
pub fn mbr_to_gpt<B: BlockIo, G: GuidSource>(io: &mut B, guids: &mut G) -> Result<()> {
    let mbr = read_mbr(io)?;
    if is_gpt(io)? {
        return Err(DiskError::AlreadyGpt);
    }
    if mbr.has_extended() {
        return Err(DiskError::ExtendedPartitionsUnsupported);
    }

    let disk_size = sector_count(io)?;
    let last_usable = disk_size.saturating_sub(GPT_REGION_SECTORS);
    let ranges: Vec<(u64, u64)> = mbr
        .used_records()
        .map(|r| (r.start_lba as u64, r.end_lba()))
        .collect();

    for (i, &(start, end)) in ranges.iter().enumerate() {
        if start < FIRST_USABLE_LBA || end > last_usable {
            log::error!("MBR record {}..={} leaves no room for GPT", start, end);
            return Err(DiskError::InsufficientSpace);
        }
        let collides = ranges[..i]
            .iter()
            .any(|&(s, e)| overlaps(start, end, s, e) || overlaps(s, e, start, end));
        if collides {
            return Err(DiskError::Overlap);
        }
    }

    create_gpt(io, guids)?;
    for &(start, end) in &ranges {
        create_partition_range(io, start, end, guids)?;
    }

    log::info!("converted MBR to GPT with {} partitions", ranges.len());
    Ok(())
}
