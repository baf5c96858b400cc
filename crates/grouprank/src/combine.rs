//! The sequential barrier between the two partition scans.

use crate::key::KeyMap;

/// Turn per-partition counts into cumulative counts, in place.
///
/// Partitions are folded in index order. Afterwards `maps[p]` holds, for every group seen in
/// partitions `0..=p`, the number of qualifying rows of that group across those partitions.
/// Groups seen earlier but absent from `p` are carried into `maps[p]` with their running total,
/// so the rank scan of partition `p + 1` only ever needs `maps[p]` to find its starting offsets.
///
/// Returns the number of distinct groups across all partitions.
pub fn combine_cumulative(maps: &mut [KeyMap]) -> usize {
    let mut running = KeyMap::default();

    for map in maps.iter_mut() {
        for (key, count) in map.iter_mut() {
            match running.get_mut(key) {
                Some(total) => {
                    *total += *count;
                    *count = *total;
                }
                None => {
                    running.insert(key.clone(), *count);
                }
            }
        }

        for (key, total) in &running {
            if !map.contains_key(key) {
                map.insert(key.clone(), *total);
            }
        }
    }

    running.len()
}
