//! Maps a file's logical block index to a block in the pool.
//!
//! Logical blocks `0..DIRECT_BLOCKS` live in the inode's direct pointer
//! array. Everything above goes through the single indirect block, whose
//! contents are `INDIRECT_ENTRIES` little-endian block ids with
//! `UNALLOCATED` marking empty slots:
//!
//! ```text
//! inode.direct_blocks  [ d0 | d1 | ... | d9 ]        logical 0..=9
//! inode.indirect_block ──> [ i0 | i1 | ... | i255 ]  logical 10..=265
//! ```
//!
//! Callers hold the inode lock matching what they do: read for `resolve`,
//! write for the rest.

use crate::disk::{Block, BlockId, BlockPool, BLOCK_ID_SIZE, UNALLOCATED};
use crate::fs::config::{DIRECT_BLOCKS, INDIRECT_ENTRIES, MAX_FILE_BLOCKS};
use crate::fs::error::{FsError, Result};
use crate::fs::inode_table::Inode;

fn read_slot(block: &Block, slot: usize) -> Option<BlockId> {
    let start = slot * BLOCK_ID_SIZE;
    let mut raw = [0u8; BLOCK_ID_SIZE];
    raw.copy_from_slice(&block[start..start + BLOCK_ID_SIZE]);
    match BlockId::from_le_bytes(raw) {
        UNALLOCATED => None,
        id => Some(id),
    }
}

fn write_slot(block: &mut Block, slot: usize, id: Option<BlockId>) {
    let start = slot * BLOCK_ID_SIZE;
    let raw = id.unwrap_or(UNALLOCATED).to_le_bytes();
    block[start..start + BLOCK_ID_SIZE].copy_from_slice(&raw);
}

fn format_indirect(block: &mut Block) {
    for slot in 0..INDIRECT_ENTRIES {
        write_slot(block, slot, None);
    }
}

/// Looks up logical block `index` without allocating anything.
pub fn resolve(inode: &Inode, pool: &BlockPool, index: usize) -> Result<Option<BlockId>> {
    if index >= MAX_FILE_BLOCKS {
        return Ok(None);
    }
    if index < DIRECT_BLOCKS {
        return Ok(inode.direct_blocks[index]);
    }
    match inode.indirect_block {
        Some(indirect) => Ok(read_slot(&*pool.block(indirect)?, index - DIRECT_BLOCKS)),
        None => Ok(None),
    }
}

/// Returns the block backing logical block `index`, allocating it (and the
/// indirect block, if the index needs it) when missing. New data blocks
/// come back zeroed.
pub fn ensure_allocated(inode: &mut Inode, pool: &BlockPool, index: usize) -> Result<BlockId> {
    if index >= MAX_FILE_BLOCKS {
        return Err(FsError::SizeLimitExceeded);
    }

    if index < DIRECT_BLOCKS {
        if let Some(block) = inode.direct_blocks[index] {
            return Ok(block);
        }
        let block = pool.allocate_zeroed()?;
        inode.direct_blocks[index] = Some(block);
        return Ok(block);
    }

    let indirect = match inode.indirect_block {
        Some(indirect) => indirect,
        None => {
            let indirect = pool.allocate()?;
            format_indirect(&mut *pool.block_mut(indirect)?);
            inode.indirect_block = Some(indirect);
            log::trace!("allocated indirect block {indirect}");
            indirect
        }
    };

    let slot = index - DIRECT_BLOCKS;
    if let Some(block) = read_slot(&*pool.block(indirect)?, slot) {
        return Ok(block);
    }
    let block = pool.allocate_zeroed()?;
    write_slot(&mut *pool.block_mut(indirect)?, slot, Some(block));
    Ok(block)
}

/// Releases every data block at logical index `first` and above, highest
/// first. The indirect block goes too once none of its slots can be in use.
pub fn release_from(inode: &mut Inode, pool: &BlockPool, first: usize) -> Result<()> {
    if let Some(indirect) = inode.indirect_block {
        let first_slot = first.saturating_sub(DIRECT_BLOCKS);
        // Collect under the block lock, release after dropping it: the pool
        // bitmap sits above block contents in the lock order.
        let doomed = {
            let mut table = pool.block_mut(indirect)?;
            let mut doomed = Vec::new();
            for slot in (first_slot..INDIRECT_ENTRIES).rev() {
                if let Some(block) = read_slot(&table, slot) {
                    doomed.push(block);
                    write_slot(&mut table, slot, None);
                }
            }
            doomed
        };
        for block in doomed {
            pool.release(block)?;
        }
    }

    for index in (first.min(DIRECT_BLOCKS)..DIRECT_BLOCKS).rev() {
        if let Some(block) = inode.direct_blocks[index].take() {
            pool.release(block)?;
        }
    }

    if first <= DIRECT_BLOCKS {
        if let Some(indirect) = inode.indirect_block.take() {
            pool.release(indirect)?;
        }
    }
    Ok(())
}

/// Releases every block the inode owns, indirect block included.
pub fn release_all(inode: &mut Inode, pool: &BlockPool) -> Result<()> {
    release_from(inode, pool, 0)
}
