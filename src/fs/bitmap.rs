/// Allocation state of a single slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Free,
    Taken,
}

/// Fixed-capacity allocation bitmap, one bit per slot.
///
/// Allocation is first-fit: the lowest free index always wins, which keeps
/// slot numbers deterministic for a given sequence of calls.
#[derive(Debug, Clone)]
pub struct Bitmap {
    bits: Vec<u8>,
    total: usize,
    free: usize,
}

impl Bitmap {
    pub fn new(total: usize) -> Self {
        let byte_len = (total + 7) / 8;
        Self {
            bits: vec![0; byte_len],
            total,
            free: total,
        }
    }

    /// Takes the first free slot and returns its index.
    pub fn alloc(&mut self) -> Option<usize> {
        for (byte_index, byte) in self.bits.iter_mut().enumerate() {
            if *byte == 0xFF {
                continue;
            }
            for bit in 0..8 {
                let index = byte_index * 8 + bit;
                if index >= self.total {
                    return None;
                }
                if *byte & (1 << bit) == 0 {
                    *byte |= 1 << bit;
                    self.free -= 1;
                    return Some(index);
                }
            }
        }
        None
    }

    /// Marks `index` free again. Returns `false` if it was out of range or
    /// already free.
    pub fn free(&mut self, index: usize) -> bool {
        if index >= self.total {
            return false;
        }
        let (byte_index, mask) = Self::locate(index);
        if self.bits[byte_index] & mask == 0 {
            return false;
        }
        self.bits[byte_index] &= !mask;
        self.free += 1;
        true
    }

    pub fn state(&self, index: usize) -> Option<SlotState> {
        if index >= self.total {
            return None;
        }
        let (byte_index, mask) = Self::locate(index);
        if self.bits[byte_index] & mask != 0 {
            Some(SlotState::Taken)
        } else {
            Some(SlotState::Free)
        }
    }

    pub fn is_taken(&self, index: usize) -> bool {
        self.state(index) == Some(SlotState::Taken)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn free_count(&self) -> usize {
        self.free
    }

    pub fn taken_count(&self) -> usize {
        self.total - self.free
    }

    fn locate(index: usize) -> (usize, u8) {
        (index / 8, 1 << (index % 8))
    }
}
