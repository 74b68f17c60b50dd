use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::disk::{BlockId, BlockPool, BLOCK_SIZE};
use crate::fs::addressing;
use crate::fs::bitmap::Bitmap;
use crate::fs::config::DIRECT_BLOCKS;
use crate::fs::directory;
use crate::fs::error::{FsError, Resource, Result};
use crate::fs::sync;

/// Lifecycle of an inode slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    /// Never used since the table was created.
    Free,
    File,
    Directory,
    /// Was allocated and has been deleted since. Anyone still holding the
    /// inode number sees this instead of a reinitialized slot until the
    /// slot is handed out again.
    Deleted,
}

impl InodeKind {
    pub fn is_live(self) -> bool {
        matches!(self, InodeKind::File | InodeKind::Directory)
    }
}

#[derive(Debug, Clone)]
pub struct Inode {
    pub kind: InodeKind,
    /// File size in bytes.
    pub size: usize,

    // block index area
    pub direct_blocks: [Option<BlockId>; DIRECT_BLOCKS],
    pub indirect_block: Option<BlockId>,
}

impl Inode {
    pub fn new(kind: InodeKind) -> Self {
        Self {
            kind,
            size: 0,
            direct_blocks: [None; DIRECT_BLOCKS],
            indirect_block: None,
        }
    }

    pub fn empty() -> Self {
        Self::new(InodeKind::Free)
    }

    /// Number of data blocks the current size occupies. The engine keeps
    /// exactly this many blocks allocated at all times.
    pub fn blocks_allocated(&self) -> usize {
        (self.size + BLOCK_SIZE - 1) / BLOCK_SIZE
    }

    fn reset_blocks(&mut self) {
        self.direct_blocks = [None; DIRECT_BLOCKS];
        self.indirect_block = None;
    }
}

/// Fixed table of inodes, one reader/writer lock per slot plus one mutex
/// around the allocation bitmap.
///
/// The table never locks a slot on behalf of its callers when they read
/// or modify an inode: they pick `read` or `write` themselves according to
/// what they are about to do with it.
#[derive(Debug)]
pub struct InodeTable {
    bitmap: Mutex<Bitmap>,
    inodes: Box<[RwLock<Inode>]>,
}

impl InodeTable {
    pub fn new(total_inodes: usize) -> Self {
        let inodes = (0..total_inodes)
            .map(|_| RwLock::new(Inode::empty()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            bitmap: Mutex::new(Bitmap::new(total_inodes)),
            inodes,
        }
    }

    /// Allocates the lowest free inode and initializes it as `kind`.
    ///
    /// Directories get their single entry block right away. If the pool has
    /// no block left for it the inode slot is handed back.
    pub fn create(&self, kind: InodeKind, pool: &BlockPool) -> Result<usize> {
        debug_assert!(kind.is_live());
        let inumber = sync::lock(&self.bitmap, "inode bitmap")
            .alloc()
            .ok_or(FsError::Exhausted(Resource::Inodes))?;

        let mut inode = sync::write(&self.inodes[inumber], "inode");
        *inode = Inode::new(kind);

        if kind == InodeKind::Directory {
            let block = match pool.allocate() {
                Ok(block) => block,
                Err(e) => {
                    *inode = Inode::empty();
                    sync::lock(&self.bitmap, "inode bitmap").free(inumber);
                    return Err(e);
                }
            };
            directory::format_block(&mut *pool.block_mut(block)?)?;
            inode.direct_blocks[0] = Some(block);
            inode.size = BLOCK_SIZE;
        }

        log::debug!("created {kind:?} inode {inumber}");
        Ok(inumber)
    }

    /// Releases every block owned by `inumber` and frees its slot, leaving
    /// the `Deleted` tombstone behind.
    pub fn delete(&self, inumber: usize, pool: &BlockPool) -> Result<()> {
        let slot = self
            .inodes
            .get(inumber)
            .ok_or(FsError::InvalidInumber(inumber))?;
        let mut inode = sync::write(slot, "inode");
        if !inode.kind.is_live() {
            return Err(FsError::NotFound(format!("inode {inumber}")));
        }

        addressing::release_all(&mut inode, pool)?;
        inode.kind = InodeKind::Deleted;
        inode.size = 0;
        inode.reset_blocks();

        sync::lock(&self.bitmap, "inode bitmap").free(inumber);
        log::debug!("deleted inode {inumber}");
        Ok(())
    }

    pub fn read(&self, inumber: usize) -> Result<RwLockReadGuard<'_, Inode>> {
        let slot = self
            .inodes
            .get(inumber)
            .ok_or(FsError::InvalidInumber(inumber))?;
        Ok(sync::read(slot, "inode"))
    }

    pub fn write(&self, inumber: usize) -> Result<RwLockWriteGuard<'_, Inode>> {
        let slot = self
            .inodes
            .get(inumber)
            .ok_or(FsError::InvalidInumber(inumber))?;
        Ok(sync::write(slot, "inode"))
    }

    pub fn total(&self) -> usize {
        self.inodes.len()
    }

    pub fn free_count(&self) -> usize {
        sync::lock(&self.bitmap, "inode bitmap").free_count()
    }
}
