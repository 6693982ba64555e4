//! Deferred transition scheduling on a virtual clock.
//!
//! [`DeferredScheduler`] keeps at most one pending action per key. Time only
//! moves when the owner asks for due entries with [`DeferredScheduler::pop_due`]
//! or calls [`DeferredScheduler::advance_to`], which keeps every test
//! deterministic and free of wall-clock sleeps.
//!
//! Schedulers that share a [`Sequence`] order equal due times across all of
//! them by the moment each entry was scheduled.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Scheduling order counter, shareable between schedulers.
pub type Sequence = Arc<AtomicU64>;

/// Ticket for one scheduled entry. Stale once the entry fires or is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredHandle {
    seq: u64,
    due: Duration,
}

impl DeferredHandle {
    /// Virtual time at which the entry fires.
    pub fn due(&self) -> Duration {
        self.due
    }
}

/// A due entry removed from the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<K, A> {
    pub key: K,
    pub action: A,
    pub due: Duration,
}

#[derive(Debug)]
struct Entry<K, A> {
    key: K,
    action: A,
}

/// Per-key delayed actions ordered by due time, then by scheduling order.
#[derive(Debug)]
pub struct DeferredScheduler<K, A> {
    now: Duration,
    sequence: Sequence,
    queue: BTreeMap<(Duration, u64), Entry<K, A>>,
    pending: HashMap<K, (Duration, u64)>,
}

impl<K, A> Default for DeferredScheduler<K, A> {
    fn default() -> Self {
        Self {
            now: Duration::ZERO,
            sequence: Sequence::default(),
            queue: BTreeMap::new(),
            pending: HashMap::new(),
        }
    }
}

impl<K, A> DeferredScheduler<K, A>
where
    K: Eq + Hash + Clone,
    A: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw scheduling order from `sequence` instead of a private counter.
    pub fn with_sequence(mut self, sequence: Sequence) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn set_sequence(&mut self, sequence: Sequence) {
        self.sequence = sequence;
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Arm `action` for `key` after `delay`, replacing anything already pending
    /// for that key.
    pub fn schedule(&mut self, key: K, delay: Duration, action: A) -> DeferredHandle {
        self.cancel(&key);

        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let due = self.now.saturating_add(delay);

        self.queue.insert((due, seq), Entry {
            key: key.clone(),
            action,
        });
        self.pending.insert(key, (due, seq));

        DeferredHandle { seq, due }
    }

    /// Drop the pending entry for `key`. Returns false when nothing was pending.
    pub fn cancel(&mut self, key: &K) -> bool {
        match self.pending.remove(key) {
            Some(slot) => {
                self.queue.remove(&slot);
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    /// Action currently armed for `key`.
    pub fn pending_action(&self, key: &K) -> Option<A> {
        self.pending
            .get(key)
            .and_then(|slot| self.queue.get(slot))
            .map(|entry| entry.action.clone())
    }

    /// Whether the entry behind `handle` can still fire.
    pub fn is_live(&self, handle: &DeferredHandle) -> bool {
        self.queue.contains_key(&(handle.due, handle.seq))
    }

    /// Due time of the earliest pending entry.
    pub fn next_due(&self) -> Option<Duration> {
        self.next_slot().map(|(due, _)| due)
    }

    /// Due time and scheduling order of the earliest pending entry.
    pub fn next_slot(&self) -> Option<(Duration, u64)> {
        self.queue.keys().next().copied()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Remove and return the earliest entry due at or before `deadline`.
    ///
    /// The key's registration is cleared and the clock moved to the entry's due
    /// time before returning, so the caller may schedule the same key again
    /// relative to the moment it fired.
    pub fn pop_due(&mut self, deadline: Duration) -> Option<Fired<K, A>> {
        let (&(due, seq), _) = self.queue.first_key_value()?;
        if due > deadline {
            return None;
        }

        let entry = self.queue.remove(&(due, seq))?;
        self.pending.remove(&entry.key);
        self.now = self.now.max(due);

        Some(Fired {
            key: entry.key,
            action: entry.action,
            due,
        })
    }

    /// Move the clock forward to `instant`. Never moves backwards.
    ///
    /// Entries due before `instant` are left in place; drain them with
    /// [`pop_due`](Self::pop_due) first.
    pub fn advance_to(&mut self, instant: Duration) {
        self.now = self.now.max(instant);
    }
}
