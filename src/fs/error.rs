use thiserror::Error;

use crate::disk::BlockId;

/// Fixed-capacity resources an allocation can run out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Inodes,
    Blocks,
    OpenFiles,
    Sessions,
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Resource::Inodes => "inode table",
            Resource::Blocks => "block pool",
            Resource::OpenFiles => "open file table",
            Resource::Sessions => "session table",
        };
        f.write_str(name)
    }
}

/// File system error type.
///
/// Everything here is an ordinary, recoverable outcome. Broken internal
/// invariants never surface as an `FsError`, they abort the process.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FsError {
    #[error("no free slot left in the {0}")]
    Exhausted(Resource),
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("invalid file handle: {0}")]
    InvalidHandle(usize),
    #[error("invalid inode number: {0}")]
    InvalidInumber(usize),
    #[error("invalid block number: {0}")]
    InvalidBlock(BlockId),
    #[error("inode {0} is not a directory")]
    NotADirectory(usize),
    #[error("directory entry names must not be empty")]
    BadName,
    #[error("invalid path: {0:?}")]
    InvalidPath(String),
    #[error("directory has no free entries left")]
    DirectoryFull,
    #[error("too many open files")]
    TooManyOpenFiles,
    #[error("file reached its maximum size")]
    SizeLimitExceeded,
    #[error("file system is shutting down")]
    ShuttingDown,
    #[error("invalid file system parameters: {0}")]
    InvalidParams(String),
    #[error("host I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt on-block record: {0}")]
    Corrupt(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, FsError>;
