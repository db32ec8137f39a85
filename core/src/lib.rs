//! Cosmares Core Library
//!
//! Partition table management and resumable raw image installation.
//! Designed to be no_std compatible (needs `alloc`).
//!
//! # Overview
//!
//! - **Codec** - bit-exact GPT header/entry and MBR layouts with the GPT
//!   dual CRC32 checksums ([`disk::gpt`], [`disk::mbr`])
//! - **Allocator** - create/delete GPT partitions, build a fresh GPT,
//!   convert between GPT and MBR ([`disk::allocator`])
//! - **Sniffer** - classify a partition by its filesystem magic ([`fs`])
//! - **Installer** - stream a bootable image into a partition in 64 KiB
//!   chunks, all at once or resumable across calls, and embed a 300-byte
//!   OS metadata sidecar ([`install`])
//!
//! Every operation works against a [`gpt_disk_io::BlockIo`] with 512-byte
//! sectors.
//!
//! # Usage
//!
//! ```ignore
//! use cosmares_core::disk::{allocator, RandomGuids};
//! use cosmares_core::install::{self, InstallOptions, Progress};
//!
//! allocator::create_gpt(&mut disk, &mut RandomGuids)?;
//! allocator::create_partition(&mut disk, 2048, 64, &mut RandomGuids)?;
//!
//! let options = InstallOptions { embed_metadata: true, ..Default::default() };
//! while install::partial_install(&image, &mut disk, 0, options)? != Progress::Complete {
//!     // yield to the rest of the system between chunks
//! }
//! ```

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![allow(clippy::result_unit_err)]

extern crate alloc;

pub mod checksum;
pub mod disk;
pub mod error;
pub mod fs;
pub mod install;
pub mod logger;

pub use error::{DiskError, Result};
