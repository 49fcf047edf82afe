// z_zone.rs — tagged zone memory allocator
//
// Blocks are addressed by `ZoneId` handles instead of owner pointers. A
// holder must re-validate its handle (`get`/`is_valid`) before every use:
// anything tagged at or above PU_PURGELEVEL can disappear whenever another
// allocation needs room, and `free_tags` drops whole tag classes at once.

use std::collections::BTreeMap;

use crate::common::{com_dprintf, com_error, ErrorLevel};

/// Purge tags. Numeric order matters: `free_tags` works on inclusive
/// ranges and everything >= `PU_PURGELEVEL` is reclaimable under pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum PuTag {
    /// Static for the whole program run.
    Static = 1,
    /// Converted hardware pixels, locked while in use.
    HwrCache = 48,
    /// Freed on level exit.
    Level = 50,
    /// Purgeable at any time.
    Cache = 101,
    /// Converted hardware pixels already handed to the driver.
    HwrCacheUnlocked = 102,
}

pub const PU_PURGELEVEL: i32 = 100;

impl PuTag {
    #[inline]
    pub fn is_purgeable(self) -> bool {
        self as i32 >= PU_PURGELEVEL
    }
}

/// Handle to a zone block. Ids are never reused within one `Zone`, so a
/// stale handle can only miss, never alias a newer block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ZoneId(u64);

#[derive(Debug)]
struct MemBlock {
    data: Vec<u8>,
    tag: PuTag,
}

#[derive(Debug, Default)]
pub struct Zone {
    blocks: BTreeMap<ZoneId, MemBlock>,
    next_id: u64,
    used: usize,
    /// Heap budget in bytes, 0 = unlimited.
    limit: usize,
    purged_blocks: u64,
}

impl Zone {
    pub fn new() -> Self {
        Self::default()
    }

    /// A zone that purges before growing past `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Zone { limit, ..Self::default() }
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Bytes currently allocated.
    pub fn used(&self) -> usize {
        self.used
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Number of blocks reclaimed by memory pressure so far.
    pub fn purged_blocks(&self) -> u64 {
        self.purged_blocks
    }

    /// Reclaims purgeable blocks, oldest first, until `size` more bytes fit.
    fn make_room(&mut self, size: usize) -> bool {
        if self.limit == 0 || self.used + size <= self.limit {
            return true;
        }

        let victims: Vec<ZoneId> = self
            .blocks
            .iter()
            .filter(|(_, b)| b.tag.is_purgeable())
            .map(|(id, _)| *id)
            .collect();

        for id in victims {
            if self.used + size <= self.limit {
                break;
            }
            if let Some(block) = self.blocks.remove(&id) {
                self.used -= block.data.len();
                self.purged_blocks += 1;
            }
        }

        self.used + size <= self.limit
    }

    fn insert(&mut self, data: Vec<u8>, tag: PuTag) -> ZoneId {
        if !self.make_room(data.len()) {
            com_error(
                ErrorLevel::Fatal,
                &format!("z_malloc: failed on allocation of {} bytes", data.len()),
            );
        }
        let id = ZoneId(self.next_id);
        self.next_id += 1;
        self.used += data.len();
        self.blocks.insert(id, MemBlock { data, tag });
        id
    }

    /// Allocates a zero-filled block. Running out of budget is fatal.
    pub fn malloc(&mut self, size: usize, tag: PuTag) -> ZoneId {
        self.insert(vec![0u8; size], tag)
    }

    /// Takes ownership of an already filled buffer.
    pub fn malloc_from(&mut self, data: Vec<u8>, tag: PuTag) -> ZoneId {
        self.insert(data, tag)
    }

    /// Frees a block. Freeing a stale handle is a no-op.
    pub fn free(&mut self, id: ZoneId) -> bool {
        match self.blocks.remove(&id) {
            Some(block) => {
                self.used -= block.data.len();
                true
            }
            None => false,
        }
    }

    /// Retags a block. A stale handle is ignored: the block was purged and
    /// there is nothing left to lock or unlock.
    pub fn change_tag(&mut self, id: ZoneId, tag: PuTag) -> bool {
        match self.blocks.get_mut(&id) {
            Some(block) => {
                block.tag = tag;
                true
            }
            None => false,
        }
    }

    /// Frees every block whose tag lies in `[low, high]`.
    pub fn free_tags(&mut self, low: PuTag, high: PuTag) {
        let (lo, hi) = (low as i32, high as i32);
        let before = self.blocks.len();
        let mut released = 0usize;
        self.blocks.retain(|_, b| {
            let t = b.tag as i32;
            if t >= lo && t <= hi {
                released += b.data.len();
                false
            } else {
                true
            }
        });
        self.used -= released;
        let count = before - self.blocks.len();
        if count > 0 {
            com_dprintf(&format!("z_free_tags: released {} blocks ({} bytes)\n", count, released));
        }
    }

    #[inline]
    pub fn is_valid(&self, id: ZoneId) -> bool {
        self.blocks.contains_key(&id)
    }

    pub fn tag_of(&self, id: ZoneId) -> Option<PuTag> {
        self.blocks.get(&id).map(|b| b.tag)
    }

    pub fn get(&self, id: ZoneId) -> Option<&[u8]> {
        self.blocks.get(&id).map(|b| b.data.as_slice())
    }

    pub fn get_mut(&mut self, id: ZoneId) -> Option<&mut [u8]> {
        self.blocks.get_mut(&id).map(|b| b.data.as_mut_slice())
    }

    /// Bytes held under `tag`.
    pub fn tag_usage(&self, tag: PuTag) -> usize {
        self.blocks.values().filter(|b| b.tag == tag).map(|b| b.data.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malloc_and_free() {
        let mut zone = Zone::new();
        let id = zone.malloc(64, PuTag::HwrCache);
        assert_eq!(zone.used(), 64);
        assert_eq!(zone.get(id).unwrap().len(), 64);
        assert!(zone.free(id));
        assert!(!zone.is_valid(id));
        assert!(!zone.free(id));
        assert_eq!(zone.used(), 0);
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut zone = Zone::new();
        let a = zone.malloc(4, PuTag::Static);
        zone.free(a);
        let b = zone.malloc(4, PuTag::Static);
        assert_ne!(a, b);
        assert!(zone.get(a).is_none());
    }

    #[test]
    fn test_change_tag_and_free_tags() {
        let mut zone = Zone::new();
        let locked = zone.malloc(16, PuTag::HwrCache);
        let unlocked = zone.malloc(16, PuTag::HwrCache);
        let level = zone.malloc(16, PuTag::Level);
        assert!(zone.change_tag(unlocked, PuTag::HwrCacheUnlocked));
        assert_eq!(zone.tag_of(unlocked), Some(PuTag::HwrCacheUnlocked));

        zone.free_tags(PuTag::HwrCacheUnlocked, PuTag::HwrCacheUnlocked);
        assert!(zone.is_valid(locked));
        assert!(!zone.is_valid(unlocked));
        assert!(zone.is_valid(level));

        zone.free_tags(PuTag::HwrCache, PuTag::Level);
        assert_eq!(zone.block_count(), 0);
        assert_eq!(zone.used(), 0);
        assert!(!zone.change_tag(locked, PuTag::Static));
    }

    #[test]
    fn test_pressure_purges_only_purgeable_oldest_first() {
        let mut zone = Zone::with_limit(100);
        let locked = zone.malloc(40, PuTag::HwrCache);
        let old = zone.malloc(30, PuTag::HwrCacheUnlocked);
        let newer = zone.malloc(30, PuTag::Cache);
        assert_eq!(zone.used(), 100);

        let fresh = zone.malloc(20, PuTag::HwrCache);
        assert!(zone.is_valid(locked));
        assert!(!zone.is_valid(old));
        assert!(zone.is_valid(newer));
        assert!(zone.is_valid(fresh));
        assert_eq!(zone.purged_blocks(), 1);
        assert_eq!(zone.used(), 90);
    }

    #[test]
    #[should_panic(expected = "z_malloc: failed on allocation of 80 bytes")]
    fn test_out_of_memory_is_fatal() {
        let mut zone = Zone::with_limit(100);
        zone.malloc(40, PuTag::Static);
        zone.malloc(80, PuTag::HwrCache);
    }

    #[test]
    fn test_malloc_from_keeps_contents() {
        let mut zone = Zone::new();
        let id = zone.malloc_from(vec![1, 2, 3], PuTag::Level);
        zone.get_mut(id).unwrap()[1] = 9;
        assert_eq!(zone.get(id).unwrap(), &[1, 9, 3]);
        assert_eq!(zone.tag_usage(PuTag::Level), 3);
        assert!(PuTag::HwrCacheUnlocked.is_purgeable());
        assert!(!PuTag::HwrCache.is_purgeable());
    }
}
