//! Real-time Parameter Store
//!
//! Parameters are exchanged between the control thread and the audio thread
//! through two structures:
//!
//! ```text
//!  control thread                          audio thread
//!  ──────────────                          ────────────
//!  set / batch_set ──▶ RwLock<HashMap>      (never touched in the hot path)
//!          │
//!          └─────────▶ slot table ◀──────── get_atomic / get_smoothed
//!                      (ArcSwap, immutable, republished on registration)
//! ```
//!
//! The locked map is the record of truth for bookkeeping and snapshots.
//! Parameters the audio thread reads every buffer get a dedicated
//! [`AtomicCell`] slot via [`ParameterStore::register_atomic`]; reading one is
//! wait-free. Which keys get slots is the caller's choice.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::RwLock;
use tracing::debug;

use crate::atomic::AtomicCell;

/// Distance below which a smoother snaps onto its target
pub const SMOOTHING_THRESHOLD: f64 = 1e-4;

/// Smallest accepted smoothing rate; anything lower would never converge
const MIN_SMOOTHING_RATE: f64 = 1e-6;

/// One-pole exponential smoother for a single parameter
///
/// The control thread only ever moves `target`; the audio thread is the only
/// caller of [`Smoother::next`] and therefore the only writer of `current`.
/// Inactive implies `current == target`.
#[derive(Debug)]
pub struct Smoother {
    current: AtomicCell<f64>,
    target: AtomicCell<f64>,
    rate: f64,
    active: AtomicCell<bool>,
}

impl Smoother {
    /// Create a converged smoother resting at `initial`
    ///
    /// `rate` is clamped into `(0, 1]`.
    pub fn new(initial: f64, rate: f64) -> Self {
        let rate = if rate.is_finite() {
            rate.clamp(MIN_SMOOTHING_RATE, 1.0)
        } else {
            1.0
        };

        Self {
            current: AtomicCell::new(initial),
            target: AtomicCell::new(initial),
            rate,
            active: AtomicCell::new(false),
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn current(&self) -> f64 {
        self.current.load()
    }

    pub fn target(&self) -> f64 {
        self.target.load_seq_cst()
    }

    pub fn is_active(&self) -> bool {
        self.active.load_seq_cst()
    }

    /// Move the target and wake the smoother (control thread)
    pub fn retarget(&self, target: f64) {
        // Target must be visible before the flag; `next` relies on this order.
        self.target.store_seq_cst(target);
        self.active.store_seq_cst(true);
    }

    /// Advance one step and return the new value (audio thread only)
    ///
    /// Call at most once per sample position; every call is one step.
    #[inline]
    pub fn next(&self) -> f64 {
        if !self.active.load_seq_cst() {
            return self.current.load();
        }

        let target = self.target.load_seq_cst();
        let mut current = self.current.load();
        current += (target - current) * self.rate;

        if (target - current).abs() < SMOOTHING_THRESHOLD {
            current = target;
            self.current.store(current);
            self.active.store_seq_cst(false);

            // A retarget that landed after our read must not be lost.
            if self.target.load_seq_cst().to_bits() != target.to_bits() {
                self.active.store_seq_cst(true);
            }
        } else {
            self.current.store(current);
        }

        current
    }
}

/// Immutable lookup table published to the audio thread
#[derive(Default, Clone)]
struct SlotTable {
    atomics: HashMap<String, Arc<AtomicCell<f64>>>,
    smoothers: HashMap<String, Arc<Smoother>>,
}

/// Thread-safe parameter store shared by the control and audio threads
pub struct ParameterStore {
    values: RwLock<HashMap<String, f64>>,
    slots: ArcSwap<SlotTable>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
            slots: ArcSwap::from_pointee(SlotTable::default()),
        }
    }

    /// Update a parameter (control thread)
    ///
    /// Writes the primary record, the lock-free slot if one is registered,
    /// and retargets the smoother if one is attached.
    pub fn set(&self, key: &str, value: f64) {
        let mut values = self.values.write();
        Self::write_record(&mut values, key, value);
        self.publish(key, value);
    }

    /// Apply several updates under a single critical section
    ///
    /// Readers of the primary map see either none or all of the updates.
    pub fn batch_set<I, K>(&self, updates: I)
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let mut values = self.values.write();
        for (key, value) in updates {
            let key = key.as_ref();
            Self::write_record(&mut values, key, value);
            self.publish(key, value);
        }
    }

    /// Read from the primary (locked) map
    ///
    /// Not for the audio thread: use [`get_atomic`](Self::get_atomic).
    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.read().get(key).copied()
    }

    pub fn get_with_default(&self, key: &str, default: f64) -> f64 {
        self.get(key).unwrap_or(default)
    }

    /// Create a lock-free slot for `key`, seeded with `initial`
    ///
    /// Registering an existing slot just overwrites its value.
    pub fn register_atomic(&self, key: &str, initial: f64) {
        let mut values = self.values.write();
        Self::write_record(&mut values, key, initial);

        let current = self.slots.load();
        if let Some(slot) = current.atomics.get(key) {
            slot.store(initial);
            return;
        }

        let mut table = SlotTable::clone(&current);
        table
            .atomics
            .insert(key.to_owned(), Arc::new(AtomicCell::new(initial)));
        self.slots.store(Arc::new(table));

        debug!("Registered atomic parameter '{}' = {}", key, initial);
    }

    /// Wait-free read of a registered slot
    #[inline]
    pub fn get_atomic(&self, key: &str) -> Option<f64> {
        self.slots.load().atomics.get(key).map(|slot| slot.load())
    }

    /// Attach a smoother to `key`, seeded at the key's current value
    ///
    /// Replaces any smoother already attached to the key.
    pub fn enable_smoothing(&self, key: &str, rate: f64) {
        let values = self.values.write();
        let initial = values.get(key).copied().unwrap_or(0.0);

        let mut table = SlotTable::clone(&self.slots.load());
        let smoother = Arc::new(Smoother::new(initial, rate));
        debug!(
            "Enabled smoothing on '{}' (rate {}, start {})",
            key,
            smoother.rate(),
            initial
        );
        table.smoothers.insert(key.to_owned(), smoother);
        self.slots.store(Arc::new(table));
    }

    /// Step the smoother for `key` once and return its value
    ///
    /// Must be called at most once per logical sample position, otherwise
    /// the ramp runs faster than intended. Keys without a smoother fall back
    /// to the lock-free slot, then `default`. The locked map is never read
    /// here, so a key that only lives in the map yields `default`.
    ///
    /// # Real-time Safety
    /// Wait-free: one slot-table load and a hash lookup.
    #[inline]
    pub fn get_smoothed(&self, key: &str, default: f64) -> f64 {
        let table = self.slots.load();
        if let Some(smoother) = table.smoothers.get(key) {
            return smoother.next();
        }
        table
            .atomics
            .get(key)
            .map_or(default, |slot| slot.load())
    }

    pub fn is_smoothing(&self, key: &str) -> bool {
        self.slots
            .load()
            .smoothers
            .get(key)
            .is_some_and(|smoother| smoother.is_active())
    }

    /// Independent copy of every parameter, for diagnostics and UI
    pub fn get_all(&self) -> HashMap<String, f64> {
        self.values.read().clone()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    fn write_record(values: &mut HashMap<String, f64>, key: &str, value: f64) {
        match values.get_mut(key) {
            Some(existing) => *existing = value,
            None => {
                values.insert(key.to_owned(), value);
            }
        }
    }

    fn publish(&self, key: &str, value: f64) {
        let table = self.slots.load();
        if let Some(slot) = table.atomics.get(key) {
            slot.store(value);
        }
        if let Some(smoother) = table.smoothers.get(key) {
            smoother.retarget(value);
        }
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_set_and_get() {
        let store = ParameterStore::new();
        assert_eq!(store.get("osc1_frequency"), None);

        store.set("osc1_frequency", 440.0);
        assert_eq!(store.get("osc1_frequency"), Some(440.0));

        store.set("osc1_frequency", 660.0);
        assert_eq!(store.get("osc1_frequency"), Some(660.0));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unknown_key_uses_default() {
        let store = ParameterStore::new();
        assert_eq!(store.get_with_default("missing", 0.7), 0.7);
        assert_eq!(store.get_smoothed("missing", 0.3), 0.3);
        assert_eq!(store.get_atomic("missing"), None);
    }

    #[test]
    fn test_get_smoothed_skips_locked_map() {
        let store = ParameterStore::new();
        store.set("level", 0.8);
        // Map-only keys are not visible to the audio-thread reader
        assert_eq!(store.get_smoothed("level", 0.1), 0.1);

        store.register_atomic("level", 0.6);
        assert_eq!(store.get_smoothed("level", 0.1), 0.6);

        // Holding the write lock must not stall the reader
        let _guard = store.values.write();
        assert_eq!(store.get_smoothed("level", 0.1), 0.6);
        assert_eq!(store.get_smoothed("other", 0.2), 0.2);
    }

    #[test]
    fn test_atomic_slot_follows_set() {
        let store = ParameterStore::new();
        store.register_atomic("filter_frequency", 1000.0);

        assert_eq!(store.get_atomic("filter_frequency"), Some(1000.0));
        assert_eq!(store.get("filter_frequency"), Some(1000.0));

        store.set("filter_frequency", 2500.0);
        assert_eq!(store.get_atomic("filter_frequency"), Some(2500.0));
    }

    #[test]
    fn test_plain_set_creates_no_slot() {
        let store = ParameterStore::new();
        store.set("drive", 5.0);
        assert_eq!(store.get_atomic("drive"), None);
    }

    #[test]
    fn test_reregister_keeps_slot() {
        let store = ParameterStore::new();
        store.register_atomic("filter_resonance", 0.7);
        store.register_atomic("filter_resonance", 2.0);
        assert_eq!(store.get_atomic("filter_resonance"), Some(2.0));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_smoothing_converges_monotonically() {
        let store = ParameterStore::new();
        let rate = 0.1;
        store.set("level", 0.0);
        store.enable_smoothing("level", rate);
        store.set("level", 1.0);
        assert!(store.is_smoothing("level"));

        // (1 - r)^n < 1e-4  =>  n > ln(1e-4) / ln(1 - r)
        let bound = (SMOOTHING_THRESHOLD.ln() / (1.0 - rate).ln()).ceil() as usize + 1;

        let mut previous = 0.0;
        let mut reached_at = None;
        for step in 1..=bound * 2 {
            let value = store.get_smoothed("level", 0.0);
            assert!(value >= previous, "smoothing must not move backwards");
            previous = value;
            if value == 1.0 {
                reached_at = Some(step);
                break;
            }
        }

        let reached_at = reached_at.expect("smoother never reached its target");
        assert!(reached_at <= bound, "took {} steps, bound {}", reached_at, bound);
        assert!(!store.is_smoothing("level"));
    }

    #[test]
    fn test_smoother_seeded_from_current_value() {
        let store = ParameterStore::new();
        store.set("time", 0.25);
        store.enable_smoothing("time", 0.5);

        // No pending change: the seeded value comes straight back
        assert_eq!(store.get_smoothed("time", 0.0), 0.25);
        assert!(!store.is_smoothing("time"));
    }

    #[test]
    fn test_smoother_rate_is_clamped() {
        assert_eq!(Smoother::new(0.0, 4.0).rate(), 1.0);
        assert!(Smoother::new(0.0, 0.0).rate() > 0.0);

        // Rate 1 lands on the target in one step
        let smoother = Smoother::new(0.0, 1.0);
        smoother.retarget(3.0);
        assert_eq!(smoother.next(), 3.0);
        assert!(!smoother.is_active());
    }

    #[test]
    fn test_inactive_smoother_rests_on_target() {
        let smoother = Smoother::new(0.0, 0.5);
        smoother.retarget(1.0);
        while smoother.is_active() {
            smoother.next();
        }
        assert_eq!(smoother.current(), smoother.target());
    }

    #[test]
    fn test_retarget_during_stepping_is_not_lost() {
        let store = Arc::new(ParameterStore::new());
        store.set("depth", 0.0);
        store.enable_smoothing("depth", 0.3);

        let writer = Arc::clone(&store);
        let control = thread::spawn(move || {
            for i in 0..2000 {
                writer.set("depth", (i % 7) as f64);
            }
            writer.set("depth", 42.0);
        });

        while !control.is_finished() {
            store.get_smoothed("depth", 0.0);
        }
        control.join().unwrap();

        let mut value = 0.0;
        for _ in 0..1000 {
            value = store.get_smoothed("depth", 0.0);
        }
        assert_eq!(value, 42.0);
        assert!(!store.is_smoothing("depth"));
    }

    #[test]
    fn test_batch_set_is_all_or_nothing() {
        let store = Arc::new(ParameterStore::new());
        store.batch_set([("time", 0.0), ("feedback", 0.0)]);

        let writer = Arc::clone(&store);
        let control = thread::spawn(move || {
            for i in 1..500 {
                let v = i as f64;
                writer.batch_set([("time", v), ("feedback", v)]);
            }
        });

        while !control.is_finished() {
            let snapshot = store.get_all();
            assert_eq!(snapshot["time"], snapshot["feedback"]);
        }
        control.join().unwrap();
    }

    #[test]
    fn test_batch_set_updates_slots_and_smoothers() {
        let store = ParameterStore::new();
        store.register_atomic("osc1_frequency", 440.0);
        store.enable_smoothing("level", 1.0);

        let updates: HashMap<String, f64> =
            [("osc1_frequency".to_string(), 880.0), ("level".to_string(), 0.5)]
                .into_iter()
                .collect();
        store.batch_set(updates);

        assert_eq!(store.get_atomic("osc1_frequency"), Some(880.0));
        assert_eq!(store.get_smoothed("level", 0.0), 0.5);
    }

    #[test]
    fn test_get_all_is_a_snapshot() {
        let store = ParameterStore::new();
        store.set("bits", 8.0);

        let mut snapshot = store.get_all();
        snapshot.insert("bits".to_string(), 4.0);
        store.set("rate", 0.5);

        assert_eq!(store.get("bits"), Some(8.0));
        assert!(!snapshot.contains_key("rate"));
    }
}
