//! The serial timeline (spec §3, §4.5): a monotonic per-queue counter and
//! an ordered multimap keyed by it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// A GPU submission's position on the queue's timeline. `0` means "never
/// submitted" (nothing has run yet); the first real submission is `1`.
pub type Serial = u64;

/// `completedSerial`/`lastSubmittedSerial` pair from spec §4.5, with the
/// invariant `completed <= last_submitted` enforced by construction: the
/// only way to move `completed` forward is [`AtomicSerialPair::bump_completed_to`],
/// which clamps to `last_submitted`.
#[derive(Debug)]
pub struct AtomicSerialPair {
    last_submitted: AtomicU64,
    completed: AtomicU64,
}

impl Default for AtomicSerialPair {
    fn default() -> Self {
        Self {
            last_submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
        }
    }
}

impl AtomicSerialPair {
    pub fn last_submitted(&self) -> Serial {
        self.last_submitted.load(Ordering::Acquire)
    }

    pub fn completed(&self) -> Serial {
        self.completed.load(Ordering::Acquire)
    }

    /// The serial any about-to-be-submitted work will bear (spec §4.5).
    pub fn pending_submit(&self) -> Serial {
        self.last_submitted() + 1
    }

    /// Assign `pending_submit()` to a new submission and return it.
    pub fn advance_last_submitted(&self) -> Serial {
        self.last_submitted.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Promote `completed` to `reported`, clamped to `last_submitted` and
    /// monotonically (never moves backwards), via a CAS loop — spec §5:
    /// "`CheckAndUpdateCompletedSerial` uses a CAS loop to promote the
    /// queried completed value monotonically."
    pub fn bump_completed_to(&self, reported: Serial) -> Serial {
        let last_submitted = self.last_submitted();
        let reported = reported.min(last_submitted);
        let mut current = self.completed.load(Ordering::Acquire);
        loop {
            if reported <= current {
                return current;
            }
            match self.completed.compare_exchange_weak(
                current,
                reported,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return reported,
                Err(observed) => current = observed,
            }
        }
    }
}

/// An ordered multimap keyed by monotonically increasing serials, with
/// range-iteration up to a bound and prefix draining (spec §9's
/// `SerialMap`).
///
/// Serials handed to [`SerialMap::push`] must never decrease; a `BTreeMap`
/// keyed by serial gives ordered iteration and efficient prefix removal
/// without requiring that invariant to be checked here (callers already
/// only ever push at `pending_submit_serial`, which is itself monotonic).
#[derive(Debug)]
pub struct SerialMap<V> {
    entries: BTreeMap<Serial, Vec<V>>,
}

impl<V> Default for SerialMap<V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<V> SerialMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, serial: Serial, value: V) {
        self.entries.entry(serial).or_default().push(value);
    }

    /// Remove and return every entry filed at a serial `<= bound`, in
    /// ascending serial order.
    pub fn drain_up_to(&mut self, bound: Serial) -> Vec<V> {
        let tail = self.entries.split_off(&(bound + 1));
        let drained = std::mem::replace(&mut self.entries, tail);
        drained.into_values().flatten().collect()
    }

    /// Iterate every entry filed at a serial `<= bound` without removing
    /// them.
    pub fn iter_up_to(&self, bound: Serial) -> impl Iterator<Item = (Serial, &V)> {
        self.entries
            .range(..=bound)
            .flat_map(|(&serial, values)| values.iter().map(move |v| (serial, v)))
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_pair_starts_at_zero_and_stays_ordered() {
        let pair = AtomicSerialPair::default();
        assert_eq!(pair.completed(), 0);
        assert_eq!(pair.last_submitted(), 0);
        assert_eq!(pair.pending_submit(), 1);

        assert_eq!(pair.advance_last_submitted(), 1);
        assert_eq!(pair.pending_submit(), 2);
        assert!(pair.completed() <= pair.last_submitted());
    }

    #[test]
    fn bump_completed_never_exceeds_last_submitted() {
        let pair = AtomicSerialPair::default();
        pair.advance_last_submitted();
        let bumped = pair.bump_completed_to(100);
        assert_eq!(bumped, 1);
        assert_eq!(pair.completed(), 1);
    }

    #[test]
    fn bump_completed_is_monotonic() {
        let pair = AtomicSerialPair::default();
        pair.advance_last_submitted();
        pair.advance_last_submitted();
        pair.bump_completed_to(2);
        pair.bump_completed_to(1); // stale report, must not regress
        assert_eq!(pair.completed(), 2);
    }

    #[test]
    fn serial_map_drains_in_order_up_to_bound() {
        let mut map = SerialMap::new();
        map.push(1, "a");
        map.push(1, "b");
        map.push(3, "c");
        map.push(5, "d");

        let drained = map.drain_up_to(3);
        assert_eq!(drained, vec!["a", "b", "c"]);
        assert_eq!(map.len(), 1);

        let remaining = map.drain_up_to(10);
        assert_eq!(remaining, vec!["d"]);
        assert!(map.is_empty());
    }
}
