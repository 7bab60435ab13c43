//! Fixed-block memory pool.
//!
//! A single arena is carved into `count` blocks of `block_size` bytes. Free
//! blocks form an intrusive singly-linked list through their headers; an
//! allocated block's header holds [`USED`], which no valid index can equal.

use log::{debug, trace};
use rust_tinyndn_common::{Error, Result};

/// Header marker for an allocated block.
const USED: u32 = u32::MAX;

/// Header marker for the last free block.
const END: u32 = u32::MAX - 1;

/// Handle to an allocated block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    index: u32,
    offset: usize,
}

impl Block {
    /// Byte offset of the block inside the pool arena.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Block index inside the pool.
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// Uniform-block allocator with O(1) alloc and free.
#[derive(Debug)]
pub struct MemoryPool {
    arena: Vec<u8>,
    headers: Vec<u32>,
    block_size: usize,
    free_head: u32,
    available: usize,
}

impl MemoryPool {
    /// Create a pool of `count` blocks of `block_size` bytes each.
    pub fn new(count: usize, block_size: usize) -> Self {
        let count = count.min(END as usize);
        let headers = (0..count)
            .map(|i| if i + 1 < count { (i + 1) as u32 } else { END })
            .collect();
        Self {
            arena: vec![0; count * block_size],
            headers,
            block_size,
            free_head: if count > 0 { 0 } else { END },
            available: count,
        }
    }

    /// Pop the head of the free list, or `None` when every block is in use.
    pub fn alloc(&mut self) -> Option<Block> {
        if self.free_head == END {
            debug!("[Pool] exhausted ({} blocks)", self.capacity());
            return None;
        }
        let index = self.free_head;
        self.free_head = self.headers[index as usize];
        self.headers[index as usize] = USED;
        self.available -= 1;
        trace!("[Pool] alloc block {}", index);
        Some(Block {
            index,
            offset: index as usize * self.block_size,
        })
    }

    /// Return the block containing arena offset `offset` to the free list.
    ///
    /// Any offset inside the block identifies it. Offsets outside the arena
    /// and blocks that are not currently allocated are rejected.
    pub fn free(&mut self, offset: usize) -> Result<()> {
        if self.block_size == 0 || offset >= self.arena.len() {
            return Err(Error::InvalidFree(offset));
        }
        let index = offset / self.block_size;
        if self.headers[index] != USED {
            return Err(Error::InvalidFree(offset));
        }
        self.headers[index] = self.free_head;
        self.free_head = index as u32;
        self.available += 1;
        trace!("[Pool] free block {}", index);
        Ok(())
    }

    /// Free a block by handle.
    pub fn free_block(&mut self, block: Block) -> Result<()> {
        self.free(block.offset)
    }

    /// Whether `block` is currently allocated.
    pub fn is_allocated(&self, block: Block) -> bool {
        self.headers.get(block.index()) == Some(&USED)
    }

    /// Read access to an allocated block.
    pub fn block(&self, block: Block) -> &[u8] {
        &self.arena[block.offset..block.offset + self.block_size]
    }

    /// Write access to an allocated block.
    pub fn block_mut(&mut self, block: Block) -> &mut [u8] {
        &mut self.arena[block.offset..block.offset + self.block_size]
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn capacity(&self) -> usize {
        self.headers.len()
    }

    pub fn available(&self) -> usize {
        self.available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_until_exhausted() {
        let mut pool = MemoryPool::new(4, 32);
        let blocks: Vec<Block> = (0..4).map(|_| pool.alloc().unwrap()).collect();
        assert!(pool.alloc().is_none());
        assert_eq!(pool.available(), 0);

        pool.free_block(blocks[2]).unwrap();
        let again = pool.alloc().unwrap();
        assert_eq!(again, blocks[2]);
    }

    #[test]
    fn test_blocks_do_not_overlap() {
        let mut pool = MemoryPool::new(3, 16);
        let a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();
        pool.block_mut(a).fill(0xAA);
        pool.block_mut(b).fill(0xBB);
        assert!(pool.block(a).iter().all(|&x| x == 0xAA));
        assert!(pool.block(b).iter().all(|&x| x == 0xBB));
        assert_eq!(b.offset() - a.offset(), 16);
    }

    #[test]
    fn test_free_by_interior_offset() {
        let mut pool = MemoryPool::new(2, 64);
        let _a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();
        pool.free(b.offset() + 17).unwrap();
        assert!(!pool.is_allocated(b));
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_double_free_rejected() {
        let mut pool = MemoryPool::new(2, 8);
        let a = pool.alloc().unwrap();
        pool.free_block(a).unwrap();
        assert!(matches!(pool.free_block(a), Err(Error::InvalidFree(_))));
        // Free list is intact: both blocks still allocatable exactly once.
        assert!(pool.alloc().is_some());
        assert!(pool.alloc().is_some());
        assert!(pool.alloc().is_none());
    }

    #[test]
    fn test_free_out_of_range_rejected() {
        let mut pool = MemoryPool::new(2, 8);
        assert!(matches!(pool.free(16), Err(Error::InvalidFree(16))));
        assert!(matches!(pool.free(0), Err(Error::InvalidFree(0))));
    }

    #[test]
    fn test_empty_pool() {
        let mut pool = MemoryPool::new(0, 8);
        assert!(pool.alloc().is_none());
        assert!(pool.free(0).is_err());
    }
}
