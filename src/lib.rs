//! A small in-memory file system with a flat, single-directory namespace,
//! shared by many threads through handles.

pub mod disk;
pub mod fs;
pub mod server;

pub use fs::config::FsParams;
pub use fs::error::{FsError, Result};
pub use fs::{FileStat, FileSystem, OpenFlags, Usage};
