pub mod block_pool;
pub mod types;

pub use block_pool::BlockPool;
pub use types::{Block, BlockId, BLOCK_ID_SIZE, BLOCK_SIZE, UNALLOCATED};
