// Filesystem identification

pub mod detect;

pub use detect::{classify, detect_at, detect_filesystem, FsKind};
