//! Buffer capacity policies
//!
//! Capacity problems are never errors: buffers grow before a dispatch would
//! overflow them. Visibility buffers track the registry's high water in steps
//! of 64 slots and shrink back when mostly idle; region buffers double.

use crate::constants::visibility::{MIN_VISIBILITY_CAPACITY, SHRINK_DIVISOR};

/// Round up to the next multiple of the visibility granularity
pub fn round_to_granularity(slots: u32) -> u32 {
    let step = MIN_VISIBILITY_CAPACITY;
    slots.max(1).div_ceil(step) * step
}

/// New visibility capacity for `high_water` live slots, or `None` to keep
/// the current one.
///
/// Grows to the next multiple of 64 that fits. Shrinks only when the slots in
/// use fall below a quarter of the capacity and the capacity is above the
/// minimum.
pub fn visibility_capacity(current: u32, high_water: u32) -> Option<u32> {
    if high_water > current {
        return Some(round_to_granularity(high_water));
    }

    if current > MIN_VISIBILITY_CAPACITY && high_water < current / SHRINK_DIVISOR {
        let shrunk = round_to_granularity(high_water).max(MIN_VISIBILITY_CAPACITY);
        if shrunk < current {
            return Some(shrunk);
        }
    }
    None
}

/// Geometric growth: double until `required` fits
pub fn grown_capacity(current: u64, required: u64) -> Option<u64> {
    if required <= current {
        return None;
    }
    let mut capacity = current.max(1);
    while capacity < required {
        capacity *= 2;
    }
    Some(capacity)
}
