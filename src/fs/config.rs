use crate::disk::{BLOCK_ID_SIZE, BLOCK_SIZE};
use crate::fs::error::{FsError, Result};

/// Inode number of the root directory.
pub const ROOT_DIR_INUM: usize = 0;

// Default table capacities.
pub const DATA_BLOCKS: usize = 1024;
pub const INODE_TABLE_SIZE: usize = 50;
pub const MAX_OPEN_FILES: usize = 20;
pub const MAX_SESSIONS: usize = 20;

/// Longest stored file name, including the terminating NUL.
pub const MAX_FILE_NAME: usize = 40;

/// Block pointers held directly by every inode.
pub const DIRECT_BLOCKS: usize = 10;

/// Block ids that fit in one indirect block.
pub const INDIRECT_ENTRIES: usize = BLOCK_SIZE / BLOCK_ID_SIZE;

/// Highest number of data blocks a single file can own.
pub const MAX_FILE_BLOCKS: usize = DIRECT_BLOCKS + INDIRECT_ENTRIES;

pub const MAX_FILE_SIZE: usize = MAX_FILE_BLOCKS * BLOCK_SIZE;

// A directory entry is a NUL padded name followed by a 4 byte inode number.
pub const DIR_ENTRY_SIZE: usize = MAX_FILE_NAME + 4;
pub const MAX_DIR_ENTRIES: usize = BLOCK_SIZE / DIR_ENTRY_SIZE;

/// Runtime table capacities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsParams {
    pub data_blocks: usize,
    pub inode_table_size: usize,
    pub max_open_files: usize,
}

impl Default for FsParams {
    fn default() -> Self {
        Self {
            data_blocks: DATA_BLOCKS,
            inode_table_size: INODE_TABLE_SIZE,
            max_open_files: MAX_OPEN_FILES,
        }
    }
}

impl FsParams {
    pub fn validate(&self) -> Result<()> {
        if self.data_blocks == 0 {
            return Err(FsError::InvalidParams(
                "the root directory needs at least one data block".to_string(),
            ));
        }
        // Block ids must stay below the on-block sentinel.
        if self.data_blocks >= crate::disk::UNALLOCATED as usize {
            return Err(FsError::InvalidParams(format!(
                "at most {} data blocks are addressable",
                crate::disk::UNALLOCATED
            )));
        }
        if self.inode_table_size == 0 {
            return Err(FsError::InvalidParams(
                "the root directory needs an inode".to_string(),
            ));
        }
        if self.inode_table_size > i32::MAX as usize {
            return Err(FsError::InvalidParams(
                "inode numbers must fit in a directory entry".to_string(),
            ));
        }
        if self.max_open_files == 0 {
            return Err(FsError::InvalidParams(
                "the open file table must hold at least one entry".to_string(),
            ));
        }
        Ok(())
    }
}
