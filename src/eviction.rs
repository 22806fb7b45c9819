//! Eviction strategies: pure policies that pick which cached variants to drop
//! once the cache would exceed its capacity.
//!
//! A strategy sees a snapshot of the whole index (key to variants, each list
//! ascending by size), the active capacity unit, and the amount of weight to
//! free; it returns victims and has no side effects.  Removal, blob deletion,
//! and bookkeeping stay with the [`CacheIndex`](crate::CacheIndex).
use std::collections::HashMap;

use crate::error::LoadError;
use crate::index::CacheItem;
use crate::size::CapacityUnit;

/// The index snapshot handed to a strategy: resource key to its cached
/// variants, ascending by size.
pub type ItemGroups = HashMap<String, Vec<CacheItem>, ahash::RandomState>;

/// A victim-selection policy.
pub trait EvictionStrategy: Send + Sync + 'static {
    /// Select victims whose accumulated weight reaches `to_free`.
    ///
    /// Inputs arrive validated through [`select_victims`]; `to_free` is
    /// always positive here.
    fn pick(&self, groups: &ItemGroups, unit: CapacityUnit, to_free: u64) -> Vec<CacheItem>;
}

/// The validating entry point shared by all strategies.
///
/// Rejects a non-positive amount before any policy runs; an empty snapshot
/// short-circuits to an empty victim list.
pub fn select_victims(
    strategy: &dyn EvictionStrategy,
    groups: &ItemGroups,
    unit: CapacityUnit,
    to_free: u64,
) -> Result<Vec<CacheItem>, LoadError> {
    if to_free == 0 {
        return Err(LoadError::InvalidArgument(
            "amount to free must be greater than zero",
        ));
    }

    if groups.is_empty() {
        return Ok(Vec::new());
    }

    Ok(strategy.pick(groups, unit, to_free))
}

/// Removes the least recently used variants first, regardless of which
/// resource they belong to.
pub struct RarelyUsedFirst;

impl EvictionStrategy for RarelyUsedFirst {
    fn pick(&self, groups: &ItemGroups, unit: CapacityUnit, to_free: u64) -> Vec<CacheItem> {
        let mut all: Vec<CacheItem> = groups.values().flatten().cloned().collect();
        // Stable, so items with equal timestamps keep their snapshot order.
        all.sort_by_key(|item| item.last_access);

        let mut victims = Vec::new();
        let mut freed = 0u64;
        for item in all {
            freed += unit.weight_of(item.size_bytes);
            victims.push(item);
            if freed >= to_free {
                break;
            }
        }

        victims
    }
}

/// Removes the largest cached copy of every resource before touching the
/// second-largest of any, sweeping size ranks from the top down.
///
/// This trims all resources evenly, starting from their biggest variants.
pub struct LargestFirst;

impl EvictionStrategy for LargestFirst {
    fn pick(&self, groups: &ItemGroups, unit: CapacityUnit, to_free: u64) -> Vec<CacheItem> {
        let mut victims = Vec::new();
        let mut freed = 0u64;

        let mut rank = groups.values().map(|group| group.len()).max().unwrap_or(0);
        while rank > 0 && freed < to_free {
            for group in groups.values().filter(|group| group.len() >= rank) {
                let item = group[rank - 1].clone();
                freed += unit.weight_of(item.size_bytes);
                victims.push(item);

                if freed >= to_free {
                    break;
                }
            }

            rank -= 1;
        }

        victims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::size::Size;

    use std::time::{Duration, SystemTime};

    use proptest::prelude::*;

    fn item(key: &str, size: Size, bytes: u64, age_days: u64) -> CacheItem {
        CacheItem {
            key: key.to_string(),
            image_size: size,
            size_bytes: bytes,
            last_access: SystemTime::now() - Duration::from_secs(age_days * 24 * 60 * 60),
        }
    }

    fn groups_of(items: Vec<CacheItem>) -> ItemGroups {
        let mut groups = ItemGroups::default();
        for it in items {
            groups.entry(it.key.clone()).or_insert_with(Vec::new).push(it);
        }
        groups
    }

    fn idents(items: &[CacheItem]) -> Vec<(String, Size)> {
        let mut out: Vec<_> = items
            .iter()
            .map(|i| (i.key.clone(), i.image_size))
            .collect();
        out.sort_by(|a, b| (&a.0, a.1.width, a.1.height).cmp(&(&b.0, b.1.width, b.1.height)));
        out
    }

    #[test]
    fn rejects_zero_amount() {
        let groups = groups_of(vec![item("a", Size::new(10, 10), 10, 1)]);
        let result = select_victims(&RarelyUsedFirst, &groups, CapacityUnit::Bytes, 0);
        assert!(matches!(result, Err(LoadError::InvalidArgument(_))));
    }

    #[test]
    fn empty_snapshot_yields_no_victims() {
        let groups = ItemGroups::default();
        assert!(select_victims(&RarelyUsedFirst, &groups, CapacityUnit::Bytes, 10)
            .unwrap()
            .is_empty());
        assert!(select_victims(&LargestFirst, &groups, CapacityUnit::Bytes, 10)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn rarely_used_takes_oldest_until_threshold() {
        let groups = groups_of(vec![
            item("mclaren", Size::new(100, 100), 100, 5),
            item("mclaren", Size::new(50, 50), 50, 3),
            item("mclaren", Size::new(10, 10), 10, 2),
            item("mu", Size::new(50, 50), 50, 4),
            item("mu", Size::new(10, 10), 10, 2),
            item("mu", Size::new(12, 12), 10, 2),
        ]);

        let victims = select_victims(&RarelyUsedFirst, &groups, CapacityUnit::Bytes, 200).unwrap();

        // Oldest first: 100 bytes at 5 days, 50 at 4, 50 at 3, and stop at
        // exactly 200 freed.
        assert_eq!(
            idents(&victims),
            idents(&[
                item("mclaren", Size::new(100, 100), 100, 5),
                item("mclaren", Size::new(50, 50), 50, 3),
                item("mu", Size::new(50, 50), 50, 4),
            ])
        );
        assert_eq!(victims.iter().map(|v| v.size_bytes).sum::<u64>(), 200);
    }

    #[test]
    fn largest_first_sweeps_rank_by_rank() {
        let groups = groups_of(vec![
            item("mclaren", Size::new(10, 10), 10, 0),
            item("mclaren", Size::new(50, 50), 50, 0),
            item("mclaren", Size::new(100, 100), 100, 0),
            item("mu", Size::new(10, 10), 10, 0),
            item("mu", Size::new(50, 50), 50, 0),
            item("rooney", Size::new(70, 70), 70, 0),
            item("magnussen", Size::new(20, 20), 20, 0),
            item("magnussen", Size::new(80, 80), 80, 0),
        ]);

        let victims = select_victims(&LargestFirst, &groups, CapacityUnit::Bytes, 280).unwrap();

        // Rank 3 holds only mclaren's 100x100; rank 2 then takes the largest
        // variant of every remaining multi-tier resource.
        assert_eq!(
            idents(&victims),
            idents(&[
                item("mclaren", Size::new(100, 100), 100, 0),
                item("mclaren", Size::new(50, 50), 50, 0),
                item("mu", Size::new(50, 50), 50, 0),
                item("magnussen", Size::new(80, 80), 80, 0),
            ])
        );
    }

    #[test]
    fn largest_first_stops_within_a_rank() {
        let groups = groups_of(vec![
            item("a", Size::new(10, 10), 10, 0),
            item("a", Size::new(90, 90), 90, 0),
            item("a", Size::new(100, 100), 100, 0),
            item("b", Size::new(10, 10), 10, 0),
        ]);

        let victims = select_victims(&LargestFirst, &groups, CapacityUnit::Bytes, 100).unwrap();

        assert_eq!(idents(&victims), idents(&[item("a", Size::new(100, 100), 100, 0)]));
    }

    #[test]
    fn item_count_unit_counts_entries_not_bytes() {
        let groups = groups_of(vec![
            item("a", Size::new(10, 10), 999, 3),
            item("b", Size::new(10, 10), 1, 2),
            item("c", Size::new(10, 10), 1, 1),
        ]);

        let victims = select_victims(&RarelyUsedFirst, &groups, CapacityUnit::Items, 2).unwrap();
        assert_eq!(victims.len(), 2);
    }

    proptest! {
        // Rarely-used-first frees no more items than necessary: every victim
        // list is the shortest oldest-first prefix reaching the threshold.
        #[test]
        fn rarely_used_frees_a_minimal_oldest_prefix(
            weights in prop::collection::vec(1..100u64, 1..20),
            to_free in 1..500u64,
        ) {
            let epoch = SystemTime::UNIX_EPOCH;
            let mut groups = ItemGroups::default();
            for (i, bytes) in weights.iter().enumerate() {
                let entry = CacheItem {
                    key: format!("k{}", i),
                    image_size: Size::new(10, 10),
                    size_bytes: *bytes,
                    last_access: epoch + Duration::from_secs(i as u64),
                };
                groups.entry(entry.key.clone()).or_insert_with(Vec::new).push(entry);
            }

            let victims =
                select_victims(&RarelyUsedFirst, &groups, CapacityUnit::Bytes, to_free).unwrap();

            let total: u64 = weights.iter().sum();
            let freed: u64 = victims.iter().map(|v| v.size_bytes).sum();

            if to_free <= total {
                prop_assert!(freed >= to_free);
                let without_last = freed - victims.last().unwrap().size_bytes;
                prop_assert!(without_last < to_free);
            } else {
                prop_assert_eq!(victims.len(), weights.len());
            }

            for pair in victims.windows(2) {
                prop_assert!(pair[0].last_access <= pair[1].last_access);
            }
        }
    }
}
