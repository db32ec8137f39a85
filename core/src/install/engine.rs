//! Install Engine
//!
//! Streams a raw image into a GPT partition in 64 KiB (128-sector) chunks.
//! [`InstallEngine::install`] writes everything in one call;
//! [`InstallEngine::partial_install`] writes one chunk per call and keeps
//! its position in an [`InstallSession`], so the caller can yield between
//! chunks and resume.
//!
//! A resumed session is tied to its image by the CRC32 of the whole
//! buffer. Passing different bytes while a session is running fails with
//! [`DiskError::DataMismatch`] and writes nothing.
//!
//! The trailing chunk shorter than 64 KiB is written too, zero-padded to a
//! whole sector, so every byte of the image reaches the partition.

use super::metadata::{tag_install_path, write_sidecar, InstallPath, OsInfo, SIDECAR_LEN};
use super::{CHUNK_SECTORS, CHUNK_SIZE, SAFETY_MARGIN};
use crate::checksum::crc32;
use crate::disk::device::PartitionView;
use crate::disk::{is_gpt, partition_info, PartitionInfo, SECTOR_SIZE};
use crate::error::{DiskError, Result};
use alloc::vec;
use gpt_disk_io::BlockIo;

/// Per-call install switches
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Call the memory hint hook between chunks
    pub use_memory_hint: bool,
    /// Write the staged sidecar into the partition when done
    pub embed_metadata: bool,
}

/// Result of one `partial_install` call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
    /// Bytes written so far as a percentage of the image (0-99)
    Percent(u8),
    /// Every byte is on disk
    Complete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    InProgress,
    Done,
}

/// Position of a resumable install
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstallSession {
    /// CRC32 of the whole image
    pub fingerprint: u32,
    pub total_length: u64,
    pub bytes_written: u64,
    /// Partition-relative sector the next chunk goes to
    pub next_sector_offset: u64,
    pub state: SessionState,
    /// Target partition, pinned when the session starts
    pub start_lba: u64,
    pub end_lba: u64,
}

impl InstallSession {
    pub const fn idle() -> Self {
        Self {
            fingerprint: 0,
            total_length: 0,
            bytes_written: 0,
            next_sector_offset: 0,
            state: SessionState::Idle,
            start_lba: 0,
            end_lba: 0,
        }
    }

    /// Progress percentage (0-100)
    pub fn progress_percent(&self) -> u8 {
        match self.state {
            SessionState::Idle => 0,
            SessionState::Done => 100,
            SessionState::InProgress if self.total_length == 0 => 0,
            SessionState::InProgress => ((self.bytes_written * 100) / self.total_length) as u8,
        }
    }
}

impl Default for InstallSession {
    fn default() -> Self {
        Self::idle()
    }
}

/// Hook asking the host to compact working memory
pub type MemoryHintFn = fn();

pub struct InstallEngine {
    session: InstallSession,
    staged_metadata: Option<[u8; SIDECAR_LEN]>,
    memory_hint: Option<MemoryHintFn>,
}

impl InstallEngine {
    pub const fn new() -> Self {
        Self {
            session: InstallSession::idle(),
            staged_metadata: None,
            memory_hint: None,
        }
    }

    pub fn set_memory_hint(&mut self, hint: Option<MemoryHintFn>) {
        self.memory_hint = hint;
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    pub fn session(&self) -> &InstallSession {
        &self.session
    }

    pub fn progress_percent(&self) -> u8 {
        self.session.progress_percent()
    }

    /// Abandon the current session
    pub fn reset(&mut self) {
        if self.session.state == SessionState::InProgress {
            log::warn!(
                "abandoning install at {}/{} bytes",
                self.session.bytes_written,
                self.session.total_length
            );
        }
        self.session = InstallSession::idle();
    }

    /// Stage the sidecar written by the next completed install
    pub fn store_metadata(&mut self, info: &OsInfo) -> Result<()> {
        self.staged_metadata = Some(info.encode()?);
        Ok(())
    }

    /// Stage a pre-encoded sidecar as-is
    pub fn store_raw_metadata(&mut self, raw: &[u8; SIDECAR_LEN]) {
        self.staged_metadata = Some(*raw);
    }

    pub fn staged_metadata(&self) -> Option<&[u8; SIDECAR_LEN]> {
        self.staged_metadata.as_ref()
    }

    fn hint(&self, options: InstallOptions) {
        if options.use_memory_hint {
            if let Some(hint) = self.memory_hint {
                hint();
            }
        }
    }

    /// Checks shared by both install paths
    fn validate<B: BlockIo>(image: &[u8], io: &mut B, index: usize) -> Result<PartitionInfo> {
        if image.is_empty() {
            return Err(DiskError::InvalidArgument);
        }
        if !is_gpt(io)? {
            return Err(DiskError::NotGpt);
        }

        let target = partition_info(io, index)?;
        if target.size_bytes() < image.len() as u64 + SAFETY_MARGIN {
            log::error!(
                "partition {} holds {} bytes, image needs {} plus {} margin",
                index,
                target.size_bytes(),
                image.len(),
                SAFETY_MARGIN
            );
            return Err(DiskError::InsufficientSpace);
        }
        Ok(target)
    }

    fn embed_sidecar<B: BlockIo>(
        &self,
        view: &mut PartitionView<'_, B>,
        path: InstallPath,
    ) -> Result<()> {
        match self.staged_metadata {
            Some(mut sidecar) => {
                tag_install_path(&mut sidecar, path);
                write_sidecar(view, &sidecar)
            }
            None => {
                log::warn!("metadata embedding requested but nothing is staged");
                Ok(())
            }
        }
    }

    /// Write the whole image in one call
    pub fn install<B: BlockIo>(
        &mut self,
        image: &[u8],
        io: &mut B,
        index: usize,
        options: InstallOptions,
    ) -> Result<()> {
        if self.session.state == SessionState::InProgress {
            return Err(DiskError::Busy);
        }
        let target = Self::validate(image, io, index)?;

        log::info!(
            "installing {} bytes to partition {} (LBA {})",
            image.len(),
            index,
            target.start_lba
        );

        let mut view = PartitionView::new(io, target.start_lba, target.end_lba)?;
        let chunk_count = image.len().div_ceil(CHUNK_SIZE);
        for (i, chunk) in image.chunks(CHUNK_SIZE).enumerate() {
            write_chunk(&mut view, i as u64 * CHUNK_SECTORS, chunk)?;
            if i + 1 < chunk_count {
                self.hint(options);
            }
        }

        if options.embed_metadata {
            self.embed_sidecar(&mut view, InstallPath::Install)?;
        }
        view.flush()?;

        log::info!("install complete ({} chunks)", chunk_count);
        Ok(())
    }

    /// Write the next chunk of `image`, starting a session if none is running
    pub fn partial_install<B: BlockIo>(
        &mut self,
        image: &[u8],
        io: &mut B,
        index: usize,
        options: InstallOptions,
    ) -> Result<Progress> {
        let fingerprint = crc32(image);

        match self.session.state {
            SessionState::Done if fingerprint == self.session.fingerprint => {
                return Ok(Progress::Complete);
            }
            SessionState::Done => {
                log::info!("new image (crc {:08x}), starting over", fingerprint);
                self.session = InstallSession::idle();
            }
            SessionState::InProgress
                if fingerprint != self.session.fingerprint
                    || image.len() as u64 != self.session.total_length =>
            {
                log::error!(
                    "image crc {:08x} does not match session crc {:08x}",
                    fingerprint,
                    self.session.fingerprint
                );
                return Err(DiskError::DataMismatch);
            }
            _ => {}
        }

        if self.session.state == SessionState::Idle {
            let target = Self::validate(image, io, index)?;
            self.session = InstallSession {
                fingerprint,
                total_length: image.len() as u64,
                bytes_written: 0,
                next_sector_offset: 0,
                state: SessionState::InProgress,
                start_lba: target.start_lba,
                end_lba: target.end_lba,
            };
            log::info!(
                "starting resumable install of {} bytes to partition {} (crc {:08x})",
                image.len(),
                index,
                fingerprint
            );
        }

        let session = self.session;
        let offset = session.bytes_written as usize;
        let end = (offset + CHUNK_SIZE).min(image.len());

        let mut view = PartitionView::new(io, session.start_lba, session.end_lba)?;
        write_chunk(&mut view, session.next_sector_offset, &image[offset..end])?;

        // The session only advances once the whole step has reached the device,
        // so a failed step is retried from the same chunk.
        if end == image.len() {
            if options.embed_metadata {
                self.embed_sidecar(&mut view, InstallPath::PartialInstall)?;
            }
            view.flush()?;
            self.session.bytes_written = end as u64;
            self.session.next_sector_offset += CHUNK_SECTORS;
            self.session.state = SessionState::Done;
            log::info!("resumable install complete");
            return Ok(Progress::Complete);
        }

        view.flush()?;
        self.session.bytes_written = end as u64;
        self.session.next_sector_offset += CHUNK_SECTORS;
        self.hint(options);
        Ok(Progress::Percent(self.session.progress_percent()))
    }
}

impl Default for InstallEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Write one chunk at partition-relative `sector`, zero-padding a short tail
fn write_chunk<B: BlockIo>(view: &mut PartitionView<'_, B>, sector: u64, data: &[u8]) -> Result<()> {
    log::debug!("chunk: {} bytes at sector {}", data.len(), sector);
    if data.len() % SECTOR_SIZE == 0 {
        return view.write(sector, data);
    }

    let mut padded = vec![0u8; data.len().div_ceil(SECTOR_SIZE) * SECTOR_SIZE];
    padded[..data.len()].copy_from_slice(data);
    view.write(sector, &padded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_percent() {
        let mut session = InstallSession::idle();
        assert_eq!(session.progress_percent(), 0);

        session.state = SessionState::InProgress;
        session.total_length = 3 * CHUNK_SIZE as u64;
        session.bytes_written = CHUNK_SIZE as u64;
        assert_eq!(session.progress_percent(), 33);

        session.state = SessionState::Done;
        assert_eq!(session.progress_percent(), 100);
    }

    #[test]
    fn test_new_engine_is_idle() {
        let engine = InstallEngine::new();
        assert_eq!(engine.state(), SessionState::Idle);
        assert!(engine.staged_metadata().is_none());
    }
}
