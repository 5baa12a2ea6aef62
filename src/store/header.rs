use crate::error::{Result, StoreError};

/// Per-store metadata participating in record-size computation. Immutable
/// for the life of a store generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreHeader {
    data_block_size: u32,
}

impl StoreHeader {
    pub const DEFAULT_BLOCK_SIZE: u32 = 120;
    pub const MAX_BLOCK_SIZE: u32 = 32 * 1024;

    pub fn new(data_block_size: u32) -> Result<Self> {
        if data_block_size == 0 || data_block_size > Self::MAX_BLOCK_SIZE {
            return Err(StoreError::InvalidArgument(format!(
                "data block size must be in 1..={}, got {data_block_size}",
                Self::MAX_BLOCK_SIZE
            )));
        }
        Ok(Self { data_block_size })
    }

    /// Configured payload bytes per dynamic block.
    pub fn data_block_size(&self) -> u32 {
        self.data_block_size
    }
}

impl Default for StoreHeader {
    fn default() -> Self {
        Self {
            data_block_size: Self::DEFAULT_BLOCK_SIZE,
        }
    }
}
