use std::sync::Mutex;

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::disk::{Block, BlockId, BlockPool};
use crate::fs::codec::{self, PathName};
use crate::fs::config::{DIR_ENTRY_SIZE, MAX_DIR_ENTRIES, MAX_FILE_NAME};
use crate::fs::error::{FsError, Result};
use crate::fs::inode_table::{InodeKind, InodeTable};
use crate::fs::sync;

/// Inode number stored in unused entries.
const EMPTY_ENTRY: i32 = -1;

/// One live directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub inumber: usize,
}

/// On-block form of one entry slot: a NUL padded name followed by the
/// inode number. Slot `i` sits at `i * DIR_ENTRY_SIZE`.
#[derive(Debug, Serialize, Deserialize)]
struct RawDirEntry {
    name: PathName,
    inumber: i32,
}

impl RawDirEntry {
    fn empty() -> Self {
        Self {
            name: PathName::default(),
            inumber: EMPTY_ENTRY,
        }
    }

    fn inumber(&self) -> Option<usize> {
        usize::try_from(self.inumber).ok()
    }
}

fn load(block: &Block, slot: usize) -> Result<RawDirEntry> {
    let start = slot * DIR_ENTRY_SIZE;
    Ok(codec::options().deserialize(&block[start..start + DIR_ENTRY_SIZE])?)
}

fn store(block: &mut Block, slot: usize, entry: &RawDirEntry) -> Result<()> {
    let start = slot * DIR_ENTRY_SIZE;
    codec::options().serialize_into(&mut block[start..start + DIR_ENTRY_SIZE], entry)?;
    Ok(())
}

/// Stored form of `name`: at most `MAX_FILE_NAME - 1` bytes so the entry
/// always keeps its terminating NUL. Lookups truncate the same way, so a
/// long name keeps finding the entry it created.
fn stored_name(name: &str) -> &[u8] {
    let bytes = name.as_bytes();
    &bytes[..bytes.len().min(MAX_FILE_NAME - 1)]
}

/// Marks every entry of a fresh directory block as empty.
pub fn format_block(block: &mut Block) -> Result<()> {
    block.fill(0);
    let empty = RawDirEntry::empty();
    for slot in 0..MAX_DIR_ENTRIES {
        store(block, slot, &empty)?;
    }
    Ok(())
}

/// The flat namespace stored in a directory inode's single data block.
///
/// Entries are only ever appended or scrubbed, never compacted. Names are
/// not checked for duplicates; `find` returns the first match in slot order.
#[derive(Debug, Default)]
pub struct Directory {
    lock: Mutex<()>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the directory's entry block under the inode's read lock, so a
    /// deleted or reinitialized inode is never mistaken for a directory.
    fn entry_block(&self, inodes: &InodeTable, dir: usize) -> Result<BlockId> {
        let inode = inodes.read(dir)?;
        if inode.kind != InodeKind::Directory {
            return Err(FsError::NotADirectory(dir));
        }
        inode.direct_blocks[0].ok_or(FsError::NotADirectory(dir))
    }

    pub fn add_entry(
        &self,
        inodes: &InodeTable,
        pool: &BlockPool,
        dir: usize,
        child: usize,
        name: &str,
    ) -> Result<()> {
        if child >= inodes.total() {
            return Err(FsError::InvalidInumber(child));
        }
        let block = self.entry_block(inodes, dir)?;
        if name.is_empty() || name.contains('\0') {
            return Err(FsError::BadName);
        }
        let entry = RawDirEntry {
            name: PathName::from_bytes(stored_name(name)).ok_or(FsError::BadName)?,
            inumber: i32::try_from(child).map_err(|_| FsError::InvalidInumber(child))?,
        };

        let _guard = sync::lock(&self.lock, "directory");
        let mut entries = pool.block_mut(block)?;
        for slot in 0..MAX_DIR_ENTRIES {
            if load(&entries, slot)?.inumber().is_none() {
                store(&mut entries, slot, &entry)?;
                log::debug!("directory {dir}: slot {slot} -> inode {child}");
                return Ok(());
            }
        }
        Err(FsError::DirectoryFull)
    }

    pub fn find(&self, inodes: &InodeTable, pool: &BlockPool, dir: usize, name: &str) -> Result<usize> {
        let block = self.entry_block(inodes, dir)?;
        let wanted = stored_name(name);

        let _guard = sync::lock(&self.lock, "directory");
        let entries = pool.block(block)?;
        for slot in 0..MAX_DIR_ENTRIES {
            let entry = load(&entries, slot)?;
            match entry.inumber() {
                Some(inumber) if entry.name.as_bytes() == wanted => return Ok(inumber),
                _ => {}
            }
        }
        Err(FsError::NotFound(name.to_string()))
    }

    /// Empties every entry pointing at `child`, returning how many there were.
    pub fn clear_entry(
        &self,
        inodes: &InodeTable,
        pool: &BlockPool,
        dir: usize,
        child: usize,
    ) -> Result<usize> {
        let block = self.entry_block(inodes, dir)?;

        let _guard = sync::lock(&self.lock, "directory");
        let mut entries = pool.block_mut(block)?;
        let mut cleared = 0;
        for slot in 0..MAX_DIR_ENTRIES {
            if load(&entries, slot)?.inumber() == Some(child) {
                store(&mut entries, slot, &RawDirEntry::empty())?;
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    /// Snapshot of all used entries in slot order.
    pub fn entries(&self, inodes: &InodeTable, pool: &BlockPool, dir: usize) -> Result<Vec<DirEntry>> {
        let block = self.entry_block(inodes, dir)?;

        let _guard = sync::lock(&self.lock, "directory");
        let entries = pool.block(block)?;
        let mut live = Vec::new();
        for slot in 0..MAX_DIR_ENTRIES {
            let entry = load(&entries, slot)?;
            if let Some(inumber) = entry.inumber() {
                live.push(DirEntry {
                    name: entry.name.as_str().into_owned(),
                    inumber,
                });
            }
        }
        Ok(live)
    }
}
