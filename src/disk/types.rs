/// Size of one simulated disk block in bytes.
/// Every read and write in the engine is split along block boundaries.
pub const BLOCK_SIZE: usize = 1024;

/// A single block of simulated storage.
pub type Block = [u8; BLOCK_SIZE];

/// Index of a block inside the block pool.
pub type BlockId = u32;

/// Marker stored inside indirect blocks for slots that point nowhere.
pub const UNALLOCATED: BlockId = BlockId::MAX;

/// Width of one block id as stored inside an indirect block.
pub const BLOCK_ID_SIZE: usize = std::mem::size_of::<BlockId>();
