//! The cache index: which variants of which resources are cached, how much
//! they weigh, and which cached copy best serves a request.
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::eviction::{select_victims, EvictionStrategy, ItemGroups};
use crate::size::{Axis, CacheCapacity, CapacityUnit, Size};

/// One cached variant of one resource.
///
/// Identity is the `(key, image_size)` pair; the index never holds two
/// entries with the same identity.
#[derive(Debug, Clone)]
pub struct CacheItem {
    /// Derived, storage-stable identifier of the resource.
    pub key: String,
    /// Pixel size of this variant.
    pub image_size: Size,
    /// Byte size of the stored blob.
    pub size_bytes: u64,
    /// When this variant was last served or written.
    pub last_access: SystemTime,
}

impl CacheItem {
    pub fn new(key: impl Into<String>, image_size: Size, size_bytes: u64) -> CacheItem {
        CacheItem {
            key: key.into(),
            image_size,
            size_bytes,
            last_access: SystemTime::now(),
        }
    }
}

/// Candidates for a request, best first, plus the axis they were ranked
/// along.  The same axis decides whether a served size is final.
pub struct Ranked {
    pub axis: Axis,
    pub items: Vec<CacheItem>,
}

struct IndexState {
    groups: ItemGroups,
    total_weight: u64,
    capacity: Option<CacheCapacity>,
}

impl IndexState {
    fn unit(&self) -> CapacityUnit {
        self.capacity.map(|c| c.unit).unwrap_or(CapacityUnit::Bytes)
    }
}

/// Tracks cached variants per resource and drives eviction.
///
/// One mutex guards the per-key lists and the aggregate weight counter; it is
/// held only for in-memory reads and mutations, never across blob or codec
/// I/O.  Deleting the bytes of a removed entry is the caller's best-effort
/// follow-up.
pub struct CacheIndex {
    state: Mutex<IndexState>,
    strategy: Arc<dyn EvictionStrategy>,
}

impl CacheIndex {
    pub fn new(capacity: Option<CacheCapacity>, strategy: Arc<dyn EvictionStrategy>) -> CacheIndex {
        CacheIndex {
            state: Mutex::new(IndexState {
                groups: Default::default(),
                total_weight: 0,
                capacity,
            }),
            strategy,
        }
    }

    /// Replace the capacity.  Switching the unit re-weighs every entry from
    /// scratch.
    pub fn set_capacity(&self, capacity: CacheCapacity) {
        let mut state = self.state.lock().unwrap();
        let unit_changed = state.unit() != capacity.unit;
        state.capacity = Some(capacity);

        if unit_changed {
            let unit = capacity.unit;
            state.total_weight = state
                .groups
                .values()
                .flatten()
                .map(|item| unit.weight_of(item.size_bytes))
                .sum();
        }
    }

    /// The weight a blob of `size_bytes` would cost under the active unit.
    pub fn weight_of(&self, size_bytes: u64) -> u64 {
        self.state.lock().unwrap().unit().weight_of(size_bytes)
    }

    /// Rank the cached variants of `key` by how well they serve `desired`.
    ///
    /// At most one exact match comes first, then all strictly larger variants
    /// closest-first, then all strictly smaller variants largest-first.
    /// Comparison runs along the dominant axis of the first variant cached
    /// for the key.
    pub fn rank_candidates(&self, key: &str, desired: Size) -> Ranked {
        let state = self.state.lock().unwrap();
        let mut ranked = Ranked {
            axis: desired.dominant_axis(),
            items: Vec::new(),
        };

        let group = match state.groups.get(key) {
            Some(group) if !group.is_empty() => group,
            _ => return ranked,
        };

        let axis = group[0].image_size.dominant_axis();
        ranked.axis = axis;
        let want = axis.of(desired);

        let mut exact = None;
        let mut larger = Vec::new();
        let mut smaller = Vec::new();
        for item in group {
            let have = axis.of(item.image_size);
            if have == want {
                exact = Some(item.clone());
            } else if have > want {
                larger.push(item.clone());
            } else {
                smaller.push(item.clone());
            }
        }

        larger.sort_by_key(|item| axis.of(item.image_size));
        smaller.sort_by_key(|item| std::cmp::Reverse(axis.of(item.image_size)));

        ranked.items.extend(exact);
        ranked.items.extend(larger);
        ranked.items.extend(smaller);
        ranked
    }

    /// Add one variant, keeping its key's list ascending by width.
    ///
    /// A duplicate `(key, image_size)` is rejected as a no-op and the method
    /// returns false.
    pub fn insert_one(&self, item: CacheItem) -> bool {
        let mut state = self.state.lock().unwrap();
        Self::insert_locked(&mut state, item)
    }

    /// Bulk insert, as used by index bootstrap.  Returns how many items were
    /// accepted.
    pub fn insert(&self, items: impl IntoIterator<Item = CacheItem>) -> usize {
        let mut state = self.state.lock().unwrap();
        items
            .into_iter()
            .filter(|item| Self::insert_locked(&mut state, item.clone()))
            .count()
    }

    fn insert_locked(state: &mut IndexState, item: CacheItem) -> bool {
        let unit = state.unit();
        let weight = unit.weight_of(item.size_bytes);

        let group = state.groups.entry(item.key.clone()).or_insert_with(Vec::new);
        if group.iter().any(|e| e.image_size == item.image_size) {
            return false;
        }

        let position = group
            .iter()
            .position(|e| e.image_size.width >= item.image_size.width)
            .unwrap_or_else(|| group.len());
        group.insert(position, item);

        state.total_weight += weight;
        true
    }

    /// Remove a variant by identity, flooring the aggregate weight at zero.
    pub fn remove(&self, item: &CacheItem) -> bool {
        let mut state = self.state.lock().unwrap();
        let unit = state.unit();

        let mut removed_bytes = None;
        let mut group_empty = false;
        if let Some(group) = state.groups.get_mut(&item.key) {
            if let Some(position) = group
                .iter()
                .position(|e| e.image_size == item.image_size)
            {
                removed_bytes = Some(group.remove(position).size_bytes);
                group_empty = group.is_empty();
            }
        }

        if group_empty {
            state.groups.remove(&item.key);
        }

        match removed_bytes {
            Some(bytes) => {
                state.total_weight = state.total_weight.saturating_sub(unit.weight_of(bytes));
                true
            }
            None => false,
        }
    }

    /// Refresh a variant's last-access time.
    pub fn touch(&self, item: &CacheItem) {
        let mut state = self.state.lock().unwrap();
        if let Some(group) = state.groups.get_mut(&item.key) {
            if let Some(entry) = group.iter_mut().find(|e| e.image_size == item.image_size) {
                entry.last_access = SystemTime::now();
            }
        }
    }

    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.groups.clear();
        state.total_weight = 0;
    }

    /// Make room for `incoming_weight` of new data.
    ///
    /// When a capacity is set and would be exceeded, the eviction strategy
    /// picks victims over a snapshot and every victim is removed from the
    /// index.  The removed items are returned so the caller can delete their
    /// blobs.  This check-then-evict is deliberately not atomic with the
    /// insert that follows; the capacity is a non-strict bound.
    pub fn reserve(&self, incoming_weight: u64) -> Vec<CacheItem> {
        let victims = {
            let state = self.state.lock().unwrap();
            let capacity = match state.capacity {
                Some(capacity) => capacity,
                None => return Vec::new(),
            };

            let projected = state.total_weight + incoming_weight;
            if projected <= capacity.magnitude {
                return Vec::new();
            }

            let to_free = projected - capacity.magnitude;
            select_victims(self.strategy.as_ref(), &state.groups, capacity.unit, to_free)
                .unwrap_or_default()
        };

        let mut removed = Vec::with_capacity(victims.len());
        for victim in victims {
            if self.remove(&victim) {
                removed.push(victim);
            }
        }
        removed
    }

    /// Aggregate weight of all entries under the active unit.
    pub fn total_weight(&self) -> u64 {
        self.state.lock().unwrap().total_weight
    }

    /// Number of cached variants across all resources.
    pub fn entry_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.groups.values().map(|group| group.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eviction::{LargestFirst, RarelyUsedFirst};

    fn index(capacity: Option<CacheCapacity>) -> CacheIndex {
        CacheIndex::new(capacity, Arc::new(RarelyUsedFirst))
    }

    fn item(key: &str, w: u32, h: u32, bytes: u64) -> CacheItem {
        CacheItem::new(key, Size::new(w, h), bytes)
    }

    fn sizes(ranked: &Ranked) -> Vec<Size> {
        ranked.items.iter().map(|i| i.image_size).collect()
    }

    #[test]
    fn insert_keeps_ascending_width_order() {
        let idx = index(None);
        idx.insert(vec![
            item("a", 20, 40, 1),
            item("a", 5, 10, 1),
            item("a", 10, 20, 1),
        ]);

        let ranked = idx.rank_candidates("a", Size::new(1, 2));
        // Everything is larger than 1x2, so rank order is ascending size.
        assert_eq!(
            sizes(&ranked),
            vec![Size::new(5, 10), Size::new(10, 20), Size::new(20, 40)]
        );
    }

    #[test]
    fn duplicate_variant_is_rejected() {
        let idx = index(None);
        assert!(idx.insert_one(item("a", 10, 20, 100)));
        assert!(!idx.insert_one(item("a", 10, 20, 999)));

        assert_eq!(idx.entry_count(), 1);
        assert_eq!(idx.total_weight(), 100);
    }

    #[test]
    fn rank_puts_exact_then_larger_then_smaller() {
        let idx = index(None);
        idx.insert(vec![
            item("a", 5, 10, 1),
            item("a", 10, 20, 1),
            item("a", 15, 30, 1),
            item("a", 20, 40, 1),
            item("a", 30, 60, 1),
        ]);

        // First entry is 5x10, portrait, so ranking runs along height.
        let ranked = idx.rank_candidates("a", Size::new(99, 30));
        assert_eq!(ranked.axis, Axis::Height);
        assert_eq!(
            sizes(&ranked),
            vec![
                Size::new(15, 30),
                Size::new(20, 40),
                Size::new(30, 60),
                Size::new(10, 20),
                Size::new(5, 10),
            ]
        );
    }

    #[test]
    fn rank_axis_follows_first_entry_shape() {
        let idx = index(None);
        idx.insert(vec![item("wide", 40, 10, 1), item("wide", 80, 20, 1)]);

        let ranked = idx.rank_candidates("wide", Size::new(60, 999));
        assert_eq!(ranked.axis, Axis::Width);
        assert_eq!(sizes(&ranked), vec![Size::new(80, 20), Size::new(40, 10)]);
    }

    #[test]
    fn rank_of_unknown_key_is_empty() {
        let idx = index(None);
        assert!(idx.rank_candidates("nope", Size::new(10, 10)).items.is_empty());
    }

    #[test]
    fn remove_updates_weight_and_drops_empty_groups() {
        let idx = index(None);
        let a = item("a", 10, 20, 70);
        idx.insert_one(a.clone());
        idx.insert_one(item("a", 20, 40, 30));

        assert!(idx.remove(&a));
        assert!(!idx.remove(&a));
        assert_eq!(idx.total_weight(), 30);
        assert_eq!(idx.entry_count(), 1);

        idx.clear();
        assert_eq!(idx.entry_count(), 0);
        assert_eq!(idx.total_weight(), 0);
    }

    #[test]
    fn switching_capacity_unit_recomputes_weight() {
        let idx = index(Some(CacheCapacity::bytes(1000)));
        idx.insert(vec![item("a", 10, 10, 100), item("b", 10, 10, 300)]);
        assert_eq!(idx.total_weight(), 400);

        idx.set_capacity(CacheCapacity::items(10));
        assert_eq!(idx.total_weight(), 2);

        idx.set_capacity(CacheCapacity::bytes(1000));
        assert_eq!(idx.total_weight(), 400);
    }

    #[test]
    fn reserve_without_capacity_never_evicts() {
        let idx = index(None);
        idx.insert(vec![item("a", 10, 10, 100)]);
        assert!(idx.reserve(u64::MAX / 2).is_empty());
    }

    #[test]
    fn reserve_evicts_just_enough() {
        let idx = CacheIndex::new(Some(CacheCapacity::items(2)), Arc::new(LargestFirst));
        idx.insert(vec![item("a", 10, 10, 1), item("a", 20, 20, 1)]);

        // A third entry would overflow the two-item budget; the largest
        // variant goes.
        let removed = idx.reserve(1);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].image_size, Size::new(20, 20));
        assert_eq!(idx.total_weight(), 1);
    }

    #[test]
    fn reserve_within_capacity_is_a_no_op() {
        let idx = CacheIndex::new(Some(CacheCapacity::items(2)), Arc::new(LargestFirst));
        idx.insert_one(item("a", 10, 10, 1));
        assert!(idx.reserve(1).is_empty());
        assert_eq!(idx.entry_count(), 1);
    }
}
