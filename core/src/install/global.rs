// Process-wide install engine
//
// Only one install may run at a time. Every entry point takes the engine
// lock without spinning; a lock that is already held means another caller
// is inside the engine and the call fails with `Busy`.

use super::engine::{InstallEngine, InstallOptions, InstallSession, MemoryHintFn, Progress};
use super::metadata::{OsInfo, SIDECAR_LEN};
use crate::error::{DiskError, Result};
use gpt_disk_io::BlockIo;
use spin::{Mutex, MutexGuard};

static ENGINE: Mutex<InstallEngine> = Mutex::new(InstallEngine::new());

fn lock() -> Result<MutexGuard<'static, InstallEngine>> {
    ENGINE.try_lock().ok_or(DiskError::Busy)
}

/// The shared engine, for callers that need several steps under one lock
pub fn engine() -> &'static Mutex<InstallEngine> {
    &ENGINE
}

pub fn install<B: BlockIo>(
    image: &[u8],
    io: &mut B,
    index: usize,
    options: InstallOptions,
) -> Result<()> {
    lock()?.install(image, io, index, options)
}

pub fn partial_install<B: BlockIo>(
    image: &[u8],
    io: &mut B,
    index: usize,
    options: InstallOptions,
) -> Result<Progress> {
    lock()?.partial_install(image, io, index, options)
}

pub fn store_metadata(info: &OsInfo) -> Result<()> {
    lock()?.store_metadata(info)
}

pub fn store_raw_metadata(raw: &[u8; SIDECAR_LEN]) -> Result<()> {
    lock()?.store_raw_metadata(raw);
    Ok(())
}

pub fn set_memory_hint(hint: Option<MemoryHintFn>) -> Result<()> {
    lock()?.set_memory_hint(hint);
    Ok(())
}

/// Snapshot of the shared session
pub fn session() -> Result<InstallSession> {
    Ok(*lock()?.session())
}

pub fn reset() -> Result<()> {
    lock()?.reset();
    Ok(())
}
