// Raw image installation

pub mod engine;
pub mod global;
pub mod metadata;

pub use engine::{
    InstallEngine, InstallOptions, InstallSession, MemoryHintFn, Progress, SessionState,
};
pub use global::{
    engine, install, partial_install, reset, session, set_memory_hint, store_metadata,
    store_raw_metadata,
};
pub use metadata::{read_metadata, read_raw_metadata, DevStage, InstallPath, OsInfo, Version};

/// Sectors written per chunk
pub const CHUNK_SECTORS: u64 = 128;

/// Bytes written per chunk (64 KiB)
pub const CHUNK_SIZE: usize = CHUNK_SECTORS as usize * crate::disk::SECTOR_SIZE;

/// Free space a partition must have beyond the image itself
pub const SAFETY_MARGIN: u64 = 65536;
