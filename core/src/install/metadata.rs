//! OS Metadata Sidecar
//!
//! 300-byte descriptor embedded at the start of an installed partition's
//! first sector, identifying the OS that was written there.
//!
//! # Binary Format
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0x00    8     Magic "Cosmares"
//! 0x08    1     Install path (0 = unset, 1 = install, 2 = partial_install)
//! 0x09    4     Version major (little-endian u32)
//! 0x0D    4     Version minor
//! 0x11    4     Version patch
//! 0x15    4     Build day
//! 0x19    4     Build month
//! 0x1D    4     Build year
//! 0x21    1     Development stage
//! 0x22    1+N   Author (length byte, UTF-8 bytes)
//! ...     1+M   OS name (length byte, UTF-8 bytes)
//! ...           Zero padding up to 300 bytes
//! ```

use crate::disk::device::PartitionView;
use crate::disk::partition_info;
use crate::error::{DiskError, Result};
use alloc::string::String;
use gpt_disk_io::BlockIo;

pub const SIDECAR_MAGIC: [u8; 8] = *b"Cosmares";

/// Encoded sidecar size
pub const SIDECAR_LEN: usize = 300;

/// Longest author or OS name accepted, in bytes
pub const MAX_FIELD_LEN: usize = 136;

const PATH_OFFSET: usize = 0x08;
const VERSION_OFFSET: usize = 0x09;
const STAGE_OFFSET: usize = 0x21;
const STRINGS_OFFSET: usize = 0x22;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DevStage {
    Alpha = 0,
    Beta = 1,
    ReleaseCandidate = 2,
    Release = 3,
    PostReleaseFixes = 4,
}

impl DevStage {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(DevStage::Alpha),
            1 => Some(DevStage::Beta),
            2 => Some(DevStage::ReleaseCandidate),
            3 => Some(DevStage::Release),
            4 => Some(DevStage::PostReleaseFixes),
            _ => None,
        }
    }
}

/// Which install call wrote the sidecar
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InstallPath {
    #[default]
    Unset = 0,
    Install = 1,
    PartialInstall = 2,
}

impl InstallPath {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(InstallPath::Unset),
            1 => Some(InstallPath::Install),
            2 => Some(InstallPath::PartialInstall),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub day: u32,
    pub month: u32,
    pub year: u32,
}

impl Version {
    fn fields(&self) -> [u32; 6] {
        [self.major, self.minor, self.patch, self.day, self.month, self.year]
    }
}

/// Decoded sidecar
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OsInfo {
    pub version: Version,
    pub stage: DevStage,
    pub author: String,
    pub name: String,
    pub install_path: InstallPath,
}

impl OsInfo {
    pub fn new(name: &str, author: &str, version: Version, stage: DevStage) -> Self {
        Self {
            version,
            stage,
            author: String::from(author),
            name: String::from(name),
            install_path: InstallPath::Unset,
        }
    }

    /// Encode into the fixed-size sidecar.
    ///
    /// Fails with `FieldTooLong` if either string exceeds `MAX_FIELD_LEN`
    /// or both together do not fit.
    pub fn encode(&self) -> Result<[u8; SIDECAR_LEN]> {
        let author = self.author.as_bytes();
        let name = self.name.as_bytes();
        if author.len() > MAX_FIELD_LEN || name.len() > MAX_FIELD_LEN {
            return Err(DiskError::FieldTooLong);
        }
        if STRINGS_OFFSET + 2 + author.len() + name.len() > SIDECAR_LEN {
            return Err(DiskError::FieldTooLong);
        }

        let mut buffer = [0u8; SIDECAR_LEN];
        buffer[0..8].copy_from_slice(&SIDECAR_MAGIC);
        buffer[PATH_OFFSET] = self.install_path as u8;

        for (i, field) in self.version.fields().iter().enumerate() {
            let offset = VERSION_OFFSET + i * 4;
            buffer[offset..offset + 4].copy_from_slice(&field.to_le_bytes());
        }
        buffer[STAGE_OFFSET] = self.stage as u8;

        let mut offset = STRINGS_OFFSET;
        for field in [author, name] {
            buffer[offset] = field.len() as u8;
            buffer[offset + 1..offset + 1 + field.len()].copy_from_slice(field);
            offset += 1 + field.len();
        }

        Ok(buffer)
    }

    /// Decode a sidecar. Fails with `NoMetadata` if the magic is absent.
    pub fn decode(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < SIDECAR_LEN {
            return Err(DiskError::InvalidArgument);
        }
        if buffer[0..8] != SIDECAR_MAGIC {
            return Err(DiskError::NoMetadata);
        }

        let install_path = InstallPath::from_u8(buffer[PATH_OFFSET]).ok_or(DiskError::Corrupt)?;
        let mut fields = [0u32; 6];
        for (i, field) in fields.iter_mut().enumerate() {
            let offset = VERSION_OFFSET + i * 4;
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&buffer[offset..offset + 4]);
            *field = u32::from_le_bytes(bytes);
        }
        let stage = DevStage::from_u8(buffer[STAGE_OFFSET]).ok_or(DiskError::Corrupt)?;

        let mut offset = STRINGS_OFFSET;
        let author = read_string(buffer, &mut offset)?;
        let name = read_string(buffer, &mut offset)?;

        Ok(Self {
            version: Version {
                major: fields[0],
                minor: fields[1],
                patch: fields[2],
                day: fields[3],
                month: fields[4],
                year: fields[5],
            },
            stage,
            author,
            name,
            install_path,
        })
    }
}

fn read_string(buffer: &[u8], offset: &mut usize) -> Result<String> {
    let len = buffer[*offset] as usize;
    let start = *offset + 1;
    if len > MAX_FIELD_LEN || start + len > SIDECAR_LEN {
        return Err(DiskError::Corrupt);
    }
    let text = core::str::from_utf8(&buffer[start..start + len]).map_err(|_| DiskError::Corrupt)?;
    *offset = start + len;
    Ok(String::from(text))
}

/// Set the install path byte of an encoded sidecar
pub fn tag_install_path(sidecar: &mut [u8; SIDECAR_LEN], path: InstallPath) {
    sidecar[PATH_OFFSET] = path as u8;
}

/// Overwrite the first 300 bytes of the partition's first sector
pub(crate) fn write_sidecar<B: BlockIo>(
    view: &mut PartitionView<'_, B>,
    sidecar: &[u8; SIDECAR_LEN],
) -> Result<()> {
    let mut sector = view.read(0, 1)?;
    sector[..SIDECAR_LEN].copy_from_slice(sidecar);
    view.write(0, &sector)
}

/// First 300 bytes of the `index`-th used partition
pub fn read_raw_metadata<B: BlockIo>(io: &mut B, index: usize) -> Result<[u8; SIDECAR_LEN]> {
    let info = partition_info(io, index)?;
    let mut view = PartitionView::new(io, info.start_lba, info.end_lba)?;
    let sector = view.read(0, 1)?;

    let mut raw = [0u8; SIDECAR_LEN];
    raw.copy_from_slice(&sector[..SIDECAR_LEN]);
    Ok(raw)
}

/// Decode the sidecar of the `index`-th used partition
pub fn read_metadata<B: BlockIo>(io: &mut B, index: usize) -> Result<OsInfo> {
    OsInfo::decode(&read_raw_metadata(io, index)?)
}
