//! # Fixed-Size Pool
//!
//! Block-growing allocator for objects that are created and destroyed on the
//! producer side and referenced from other threads by a 32-bit key.
//!
//! ## Key Layouts
//!
//! ```text
//! Bounded { maximum_block_count: 27 }
//!
//!   31      27 26                              0
//!   ┌─────────┬─────────────────────────────────┐
//!   │  block  │          slot in block          │
//!   └─────────┴─────────────────────────────────┘
//!     mask 0xf8000000, shift 27
//!
//! Unbounded
//!
//!   key = index_offset(block) + slot   (resolved by walking blocks)
//! ```
//!
//! Blocks double in size until `maximum_block_capacity` and are never moved
//! once created, so a key stays valid until its slot is freed.

use bytemuck::{Pod, Zeroable};
use stagecraft_shared::constants::{
    DEFAULT_POOL_INITIAL_CAPACITY, DEFAULT_POOL_MAXIMUM_BLOCK_CAPACITY,
};

use crate::error::{CoreError, CoreResult};

/// Sentinel for an empty free list.
const NO_SLOT: u32 = u32::MAX;

/// How a pool encodes block and slot into the 32-bit raw key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyLayout {
    /// Key is the global slot ordinal. Any number of blocks may exist.
    Unbounded,
    /// Block index lives in the high bits. Lookups are O(1) but the pool
    /// panics once `maximum_block_count` blocks are full.
    Bounded {
        /// Upper bound on the number of blocks.
        maximum_block_count: u32,
    },
}

/// Sizing parameters for a [`FixedSizePool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Slots in the first block.
    pub initial_capacity: u32,
    /// Block sizes double until they reach this many slots.
    pub maximum_block_capacity: u32,
    /// Key encoding.
    pub key_layout: KeyLayout,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_POOL_INITIAL_CAPACITY,
            maximum_block_capacity: DEFAULT_POOL_MAXIMUM_BLOCK_CAPACITY,
            key_layout: KeyLayout::Unbounded,
        }
    }
}

impl PoolConfig {
    /// Checks that the sizes are usable with the chosen key layout.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidKeyLayout`] if a capacity is zero or the
    /// slot bits left by a bounded layout cannot address a full block.
    pub fn validate(&self) -> CoreResult<()> {
        if self.initial_capacity == 0 || self.maximum_block_capacity == 0 {
            return Err(CoreError::InvalidKeyLayout(
                "pool capacities must be greater than zero".into(),
            ));
        }
        if self.initial_capacity > self.maximum_block_capacity {
            return Err(CoreError::InvalidKeyLayout(format!(
                "initial capacity {} exceeds maximum block capacity {}",
                self.initial_capacity, self.maximum_block_capacity
            )));
        }
        if let KeyLayout::Bounded { maximum_block_count } = self.key_layout {
            if maximum_block_count == 0 {
                return Err(CoreError::InvalidKeyLayout(
                    "maximum block count must be greater than zero".into(),
                ));
            }
            let codec = KeyCodec::bounded(maximum_block_count);
            if !codec.is_bounded() {
                return Err(CoreError::InvalidKeyLayout(format!(
                    "maximum block count {maximum_block_count} leaves no slot bits"
                )));
            }
            if u64::from(self.maximum_block_capacity) > u64::from(codec.index_mask) + 1 {
                return Err(CoreError::InvalidKeyLayout(format!(
                    "{} slot bits cannot address blocks of {} slots",
                    codec.shift, self.maximum_block_capacity
                )));
            }
        }
        Ok(())
    }
}

/// Stable reference to a pooled object.
///
/// The low 32 bits are the raw key, the high 32 bits the slot generation.
/// A key whose slot has been freed and reused no longer resolves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable)]
#[repr(transparent)]
pub struct PoolKey(u64);

impl PoolKey {
    /// Key that never resolves.
    pub const NULL: Self = Self(u64::MAX);

    #[inline]
    const fn new(raw: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | raw as u64)
    }

    /// The 32-bit block/slot encoding.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0 as u32
    }

    /// Reuse counter of the slot at allocation time.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Returns `true` for [`PoolKey::NULL`].
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }

    /// Packed representation.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Rebuilds a key from [`PoolKey::to_bits`].
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }
}

impl Default for PoolKey {
    fn default() -> Self {
        Self::NULL
    }
}

#[derive(Clone, Copy, Debug)]
struct KeyCodec {
    /// Bit position of the block index. Zero means unbounded.
    shift: u32,
    block_mask: u32,
    index_mask: u32,
}

impl KeyCodec {
    const UNBOUNDED: Self = Self {
        shift: 0,
        block_mask: 0,
        index_mask: u32::MAX,
    };

    fn bounded(maximum_block_count: u32) -> Self {
        // floor(log2(n)) + 1 bits for the block index
        let bit_count = u32::BITS - maximum_block_count.leading_zeros();
        let shift = u32::BITS - bit_count;
        let block_mask = if bit_count >= u32::BITS {
            u32::MAX
        } else {
            ((1u32 << bit_count) - 1) << shift
        };
        Self {
            shift,
            block_mask,
            index_mask: !block_mask,
        }
    }

    #[inline]
    const fn is_bounded(self) -> bool {
        self.shift != 0
    }
}

enum Slot<T> {
    /// Never handed out.
    Unused,
    Occupied { generation: u32, value: T },
    Free { generation: u32, next: u32 },
}

struct Block<T> {
    slots: Box<[Slot<T>]>,
    /// Ordinal of the first slot across all blocks.
    index_offset: u32,
}

/// A growing pool of `T` addressed by [`PoolKey`].
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Wrap it in a
/// [`ThreadSafePool`](super::ThreadSafePool) when keys are allocated on one
/// thread and freed on another.
///
/// # Example
///
/// ```rust
/// use stagecraft_core::memory::{FixedSizePool, PoolConfig};
///
/// let mut pool = FixedSizePool::new(PoolConfig::default());
/// let key = pool.allocate(42_u32);
/// assert_eq!(pool.get(key), Some(&42));
/// assert_eq!(pool.free(key), Some(42));
/// assert_eq!(pool.get(key), None);
/// ```
pub struct FixedSizePool<T> {
    blocks: Vec<Block<T>>,
    /// Slots handed out from the newest block.
    current_block_size: u32,
    maximum_block_capacity: u32,
    key_layout: KeyLayout,
    codec: KeyCodec,
    free_head: u32,
    len: usize,
}

impl<T> FixedSizePool<T> {
    /// Creates a pool and its first block.
    ///
    /// # Panics
    ///
    /// Panics if `config` fails [`PoolConfig::validate`].
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        match Self::try_new(config) {
            Ok(pool) => pool,
            Err(error) => panic!("{error}"),
        }
    }

    /// Creates a pool, reporting an unusable configuration as an error.
    ///
    /// # Errors
    ///
    /// See [`PoolConfig::validate`].
    pub fn try_new(config: PoolConfig) -> CoreResult<Self> {
        config.validate()?;
        let codec = match config.key_layout {
            KeyLayout::Unbounded => KeyCodec::UNBOUNDED,
            KeyLayout::Bounded { maximum_block_count } => KeyCodec::bounded(maximum_block_count),
        };
        Ok(Self {
            blocks: vec![Block {
                slots: new_block(config.initial_capacity),
                index_offset: 0,
            }],
            current_block_size: 0,
            maximum_block_capacity: config.maximum_block_capacity,
            key_layout: config.key_layout,
            codec,
            free_head: NO_SLOT,
            len: 0,
        })
    }

    /// Number of live objects.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no objects are live.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total slots across all blocks.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.blocks.iter().map(|block| block.slots.len()).sum()
    }

    /// Number of blocks created so far.
    #[inline]
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// The key encoding in use.
    #[inline]
    #[must_use]
    pub const fn key_layout(&self) -> KeyLayout {
        self.key_layout
    }

    /// Stores `value` and returns its key.
    ///
    /// Freed slots are reused first (most recently freed first).
    ///
    /// # Panics
    ///
    /// Panics if a bounded pool needs more than `maximum_block_count` blocks,
    /// or an unbounded pool exceeds `u32::MAX` slots.
    pub fn allocate(&mut self, value: T) -> PoolKey {
        if self.free_head != NO_SLOT {
            let raw = self.free_head;
            let Some((block, slot)) = self.decode(raw) else {
                panic!("pool free list references key {raw:#x} outside the pool");
            };
            let entry = &mut self.blocks[block].slots[slot];
            let Slot::Free { generation, next } = *entry else {
                panic!("pool free list references a slot that is not free");
            };
            *entry = Slot::Occupied { generation, value };
            self.free_head = next;
            self.len += 1;
            return PoolKey::new(raw, generation);
        }

        let newest_capacity = self.blocks.last().map_or(0, |block| block.slots.len());
        if self.current_block_size as usize >= newest_capacity {
            self.grow();
        }
        let block = self.blocks.len() - 1;
        let slot = self.current_block_size as usize;
        self.current_block_size += 1;
        self.blocks[block].slots[slot] = Slot::Occupied {
            generation: 0,
            value,
        };
        self.len += 1;
        PoolKey::new(self.encode(block, slot), 0)
    }

    /// Releases the object behind `key` and returns it.
    ///
    /// Freeing a key that is outside the pool, already free, or stale is a
    /// programming error: it asserts in debug builds and returns `None`
    /// in release builds.
    pub fn free(&mut self, key: PoolKey) -> Option<T> {
        let Some((block, slot)) = self.decode(key.raw()) else {
            debug_assert!(false, "freeing key {:#x} that does not exist in pool", key.raw());
            return None;
        };
        let generation = match &self.blocks[block].slots[slot] {
            Slot::Occupied { generation, .. } if *generation == key.generation() => *generation,
            _ => {
                debug_assert!(false, "double free of pool key {:#x}", key.raw());
                return None;
            }
        };
        let released = std::mem::replace(
            &mut self.blocks[block].slots[slot],
            Slot::Free {
                generation: generation.wrapping_add(1),
                next: self.free_head,
            },
        );
        self.free_head = key.raw();
        self.len -= 1;
        match released {
            Slot::Occupied { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Resolves a key to its object.
    #[inline]
    #[must_use]
    pub fn get(&self, key: PoolKey) -> Option<&T> {
        let (block, slot) = self.decode(key.raw())?;
        match &self.blocks[block].slots[slot] {
            Slot::Occupied { generation, value } if *generation == key.generation() => Some(value),
            _ => None,
        }
    }

    /// Resolves a key to its object mutably.
    #[inline]
    pub fn get_mut(&mut self, key: PoolKey) -> Option<&mut T> {
        let (block, slot) = self.decode(key.raw())?;
        match &mut self.blocks[block].slots[slot] {
            Slot::Occupied { generation, value } if *generation == key.generation() => Some(value),
            _ => None,
        }
    }

    /// Returns `true` if `key` resolves.
    #[inline]
    #[must_use]
    pub fn contains(&self, key: PoolKey) -> bool {
        self.get(key).is_some()
    }

    /// Iterates over live objects in block order.
    pub fn iter(&self) -> impl Iterator<Item = (PoolKey, &T)> {
        self.blocks.iter().enumerate().flat_map(move |(block_index, block)| {
            block
                .slots
                .iter()
                .enumerate()
                .filter_map(move |(slot_index, slot)| match slot {
                    Slot::Occupied { generation, value } => Some((
                        PoolKey::new(self.encode(block_index, slot_index), *generation),
                        value,
                    )),
                    _ => None,
                })
        })
    }

    fn grow(&mut self) {
        if let KeyLayout::Bounded { maximum_block_count } = self.key_layout {
            assert!(
                (self.blocks.len() as u64) < u64::from(maximum_block_count),
                "memory pool exhausted: all {maximum_block_count} blocks are full"
            );
        }
        let (previous_capacity, previous_offset) = self
            .blocks
            .last()
            .map_or((0, 0), |block| (block.slots.len() as u32, block.index_offset));
        let capacity = previous_capacity
            .saturating_mul(2)
            .min(self.maximum_block_capacity)
            .max(1);
        let index_offset = previous_offset
            .checked_add(previous_capacity)
            .filter(|offset| offset.checked_add(capacity).is_some_and(|end| end < NO_SLOT))
            .unwrap_or_else(|| panic!("memory pool exhausted: key space is full"));

        tracing::debug!(
            blocks = self.blocks.len() + 1,
            capacity,
            "pool allocated new block"
        );
        self.blocks.push(Block {
            slots: new_block(capacity),
            index_offset,
        });
        self.current_block_size = 0;
    }

    #[inline]
    fn encode(&self, block: usize, slot: usize) -> u32 {
        if self.codec.is_bounded() {
            ((block as u32) << self.codec.shift) | slot as u32
        } else {
            self.blocks[block].index_offset + slot as u32
        }
    }

    fn decode(&self, raw: u32) -> Option<(usize, usize)> {
        if self.codec.is_bounded() {
            let block = ((raw & self.codec.block_mask) >> self.codec.shift) as usize;
            let slot = (raw & self.codec.index_mask) as usize;
            let entries = self.blocks.get(block)?;
            return (slot < entries.slots.len()).then_some((block, slot));
        }
        // Newer blocks are larger, so search from the back.
        self.blocks
            .iter()
            .enumerate()
            .rev()
            .find(|(_, block)| raw >= block.index_offset)
            .and_then(|(index, block)| {
                let slot = (raw - block.index_offset) as usize;
                (slot < block.slots.len()).then_some((index, slot))
            })
    }
}

fn new_block<T>(capacity: u32) -> Box<[Slot<T>]> {
    (0..capacity).map(|_| Slot::Unused).collect()
}
