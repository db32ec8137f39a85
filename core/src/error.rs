//! Error types for partition table and install operations

use core::fmt;

/// Result type for disk operations
pub type Result<T> = core::result::Result<T, DiskError>;

/// Errors that can occur while editing partition tables or installing images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskError {
    /// Block device read or write failed
    Io,

    /// Empty image, zero size, unsupported block size or malformed input
    InvalidArgument,

    /// Disk has no GPT header at LBA 1
    NotGpt,

    /// Disk has no MBR boot signature
    NotMbr,

    /// Disk already carries a GPT
    AlreadyGpt,

    /// Partition or entry index out of range
    OutOfRange,

    /// Partition or disk too small for the request
    InsufficientSpace,

    /// Another install is in progress
    Busy,

    /// Resumed install was given different bytes than the active session
    DataMismatch,

    /// Requested range collides with an existing partition
    Overlap,

    /// All 128 GPT entries are in use
    TableFull,

    /// Entry to delete is already blank
    EmptySlot,

    /// MBR contains an extended partition
    ExtendedPartitionsUnsupported,

    /// GPT has more partitions than an MBR can describe
    TooManyPartitions,

    /// Metadata author or OS name exceeds the sidecar limits
    FieldTooLong,

    /// Partition has no metadata sidecar
    NoMetadata,

    /// Table contents contradict an earlier check
    Corrupt,
}

impl DiskError {
    /// Get a human-readable description of the error
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Io => "Block I/O operation failed",
            Self::InvalidArgument => "Invalid argument",
            Self::NotGpt => "The disk is not GPT",
            Self::NotMbr => "The disk is not MBR",
            Self::AlreadyGpt => "The disk is already GPT",
            Self::OutOfRange => "Index out of range",
            Self::InsufficientSpace => "Not enough space",
            Self::Busy => "Another system is being installed",
            Self::DataMismatch => "Image differs from the one being installed",
            Self::Overlap => "Partition overlaps an existing one",
            Self::TableFull => "The partition entries are full",
            Self::EmptySlot => "The partition entry is empty",
            Self::ExtendedPartitionsUnsupported => "Extended partitions are not supported",
            Self::TooManyPartitions => "Too many partitions for MBR",
            Self::FieldTooLong => "Metadata field too long",
            Self::NoMetadata => "No OS metadata in partition",
            Self::Corrupt => "Partition table corrupted",
        }
    }
}

impl fmt::Display for DiskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
