use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::disk::types::{Block, BlockId, BLOCK_SIZE};
use crate::fs::bitmap::Bitmap;
use crate::fs::error::{FsError, Resource, Result};
use crate::fs::sync;

/// Fixed pool of in-memory blocks plus the bitmap that tracks which of
/// them are owned by some inode.
///
/// The bitmap sits behind one pool-wide mutex held for exactly one scan or
/// flip per call. Block contents are guarded separately, one lock per
/// block, so copying data never contends on the allocation lock. Those
/// content locks are the innermost level of the lock order: callers already
/// hold the owning inode's lock when they touch a block.
#[derive(Debug)]
pub struct BlockPool {
    bitmap: Mutex<Bitmap>,
    blocks: Box<[RwLock<Block>]>,
}

impl BlockPool {
    pub fn new(total_blocks: usize) -> Self {
        let blocks = (0..total_blocks)
            .map(|_| RwLock::new([0u8; BLOCK_SIZE]))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            bitmap: Mutex::new(Bitmap::new(total_blocks)),
            blocks,
        }
    }

    /// Takes the lowest free block.
    pub fn allocate(&self) -> Result<BlockId> {
        let mut bitmap = sync::lock(&self.bitmap, "block pool");
        match bitmap.alloc() {
            Some(index) => {
                log::trace!("allocated block {index}");
                Ok(index as BlockId)
            }
            None => {
                log::debug!("block pool exhausted");
                Err(FsError::Exhausted(Resource::Blocks))
            }
        }
    }

    /// Allocates a block and clears its previous contents.
    pub fn allocate_zeroed(&self) -> Result<BlockId> {
        let id = self.allocate()?;
        self.block_mut(id)?.fill(0);
        Ok(id)
    }

    /// Returns `id` to the pool.
    pub fn release(&self, id: BlockId) -> Result<()> {
        let mut bitmap = sync::lock(&self.bitmap, "block pool");
        if (id as usize) >= bitmap.total() {
            return Err(FsError::InvalidBlock(id));
        }
        if !bitmap.free(id as usize) {
            // Releasing a free block means two owners thought they held it.
            log::warn!("block {id} released while already free");
        }
        log::trace!("released block {id}");
        Ok(())
    }

    pub fn block(&self, id: BlockId) -> Result<RwLockReadGuard<'_, Block>> {
        let slot = self
            .blocks
            .get(id as usize)
            .ok_or(FsError::InvalidBlock(id))?;
        Ok(sync::read(slot, "block"))
    }

    pub fn block_mut(&self, id: BlockId) -> Result<RwLockWriteGuard<'_, Block>> {
        let slot = self
            .blocks
            .get(id as usize)
            .ok_or(FsError::InvalidBlock(id))?;
        Ok(sync::write(slot, "block"))
    }

    pub fn total(&self) -> usize {
        self.blocks.len()
    }

    pub fn free_count(&self) -> usize {
        sync::lock(&self.bitmap, "block pool").free_count()
    }

    #[cfg(test)]
    pub(crate) fn is_allocated(&self, id: BlockId) -> bool {
        sync::lock(&self.bitmap, "block pool").is_taken(id as usize)
    }
}
