//! Reference-count bookkeeping for cached resources.
//!
//! [`CacheLedger`] is the pure core of the resource cache: an indexed slot
//! table plus a descriptor → handle memo, tracking two counts per entry:
//!
//! - `users`: outstanding `acquire` minus `release` calls
//! - `in_flight`: pending submissions that referenced the entry and whose
//!   fences have not been observed signaled
//!
//! An entry is destroyed only by [`retire`](CacheLedger::retire), at a
//! completed frame boundary, and only once both counts are zero. The
//! ledger is generic over the payload so every invariant here is testable
//! without a GPU; the real cache stores GPU resources in it.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use tracing::debug;

use crate::error::CacheError;

/// Opaque reference to a cached resource: slot index plus generation.
///
/// Handles are `Copy` and may be stored anywhere; a handle to a destroyed
/// resource is detected by its stale generation rather than dereferencing
/// freed state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    index: u32,
    generation: u32,
}

impl ResourceHandle {
    /// Slot index, for diagnostics.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Slot generation, for diagnostics.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

struct Entry<K, T> {
    key: K,
    payload: T,
    users: u32,
    in_flight: u32,
    /// Destruction requested; happens at the next frame boundary once
    /// `in_flight` reaches zero.
    zombie: bool,
}

struct Slot<K, T> {
    generation: u32,
    entry: Option<Entry<K, T>>,
}

/// Slot table + memo + per-submission reference lists.
pub struct CacheLedger<K, T> {
    slots: Vec<Slot<K, T>>,
    free: Vec<u32>,
    lookup: HashMap<K, ResourceHandle>,
    /// Handles referenced by each pending submission, oldest first.
    pending: VecDeque<(u64, Vec<ResourceHandle>)>,
}

impl<K: Hash + Eq + Clone, T> CacheLedger<K, T> {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            lookup: HashMap::new(),
            pending: VecDeque::new(),
        }
    }

    /// Number of live entries (including zombies awaiting destruction).
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.entry.is_some()).count()
    }

    /// Whether the ledger holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up `key` and, on a hit, takes a user reference on the entry.
    ///
    /// A zombie hit is resurrected: the entry was released but not yet
    /// destroyed, so the original resource is simply handed back.
    pub fn acquire_existing(&mut self, key: &K) -> Option<ResourceHandle> {
        let handle = *self.lookup.get(key)?;
        let entry = self.slots[handle.index as usize]
            .entry
            .as_mut()
            .expect("lookup points at empty slot");

        entry.users += 1;
        entry.zombie = false;
        Some(handle)
    }

    /// Inserts a freshly built payload under `key` with one user
    /// reference.
    ///
    /// The caller must have checked [`acquire_existing`](Self::acquire_existing)
    /// first; inserting a duplicate key replaces the memo entry and orphans
    /// the old one (it still destructs normally through its handle).
    pub fn insert(&mut self, key: K, payload: T) -> ResourceHandle {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: None,
                });
                (self.slots.len() - 1) as u32
            }
        };

        let slot = &mut self.slots[index as usize];
        let handle = ResourceHandle {
            index,
            generation: slot.generation,
        };

        slot.entry = Some(Entry {
            key: key.clone(),
            payload,
            users: 1,
            in_flight: 0,
            zombie: false,
        });
        self.lookup.insert(key, handle);

        handle
    }

    /// Borrow of the payload behind `handle`, if still alive.
    pub fn get(&self, handle: ResourceHandle) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_ref().map(|entry| &entry.payload)
    }

    /// Drops one user reference.
    ///
    /// When the count reaches zero the entry becomes a zombie: destruction
    /// is scheduled for the next completed frame boundary, never
    /// performed here. Re-acquiring the same key before that boundary
    /// resurrects the entry.
    pub fn release(&mut self, handle: ResourceHandle) -> Result<(), CacheError> {
        let entry = self.entry_mut(handle)?;

        entry.users = entry.users.saturating_sub(1);
        if entry.users == 0 {
            entry.zombie = true;
        }
        Ok(())
    }

    /// Marks every entry whose key matches `predicate` for destruction,
    /// regardless of user count, and retires their memo entries so new
    /// acquires rebuild fresh resources.
    ///
    /// Destruction itself is still deferred past in-flight frames. Returns
    /// the number of entries marked.
    pub fn evict<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&K) -> bool,
    {
        let mut marked = 0;

        for slot in &mut self.slots {
            let Some(entry) = slot.entry.as_mut() else {
                continue;
            };
            if entry.zombie || !predicate(&entry.key) {
                continue;
            }

            entry.users = 0;
            entry.zombie = true;
            self.lookup.remove(&entry.key);
            marked += 1;
        }

        marked
    }

    /// Records that the submission stamped `serial` references `handle`.
    ///
    /// The in-flight count holds the entry alive until
    /// [`retire`](Self::retire) sees `serial` completed.
    pub fn mark_used(&mut self, handle: ResourceHandle, serial: u64) -> Result<(), CacheError> {
        let entry = self.entry_mut(handle)?;
        entry.in_flight += 1;

        match self.pending.back_mut() {
            Some((last_serial, handles)) if *last_serial == serial => handles.push(handle),
            _ => self.pending.push_back((serial, vec![handle])),
        }

        Ok(())
    }

    /// Observes that all submissions up to `completed_serial` finished,
    /// drops their in-flight references, and destroys everything that
    /// became unreferenced.
    ///
    /// Returns the destroyed payloads; dropping them is what actually
    /// frees the GPU objects.
    pub fn retire(&mut self, completed_serial: u64) -> Vec<T> {
        while let Some((serial, _)) = self.pending.front() {
            if *serial > completed_serial {
                break;
            }
            let (_, handles) = self.pending.pop_front().expect("front checked above");
            for handle in handles {
                if let Some(entry) = self.slots[handle.index as usize].entry.as_mut() {
                    entry.in_flight = entry.in_flight.saturating_sub(1);
                }
            }
        }

        self.sweep()
    }

    /// Destroys every zombie whose in-flight count has reached zero.
    fn sweep(&mut self) -> Vec<T> {
        let mut destroyed = Vec::new();

        for index in 0..self.slots.len() {
            let slot = &mut self.slots[index];
            let ready = slot
                .entry
                .as_ref()
                .is_some_and(|e| e.zombie && e.users == 0 && e.in_flight == 0);
            if !ready {
                continue;
            }

            let entry = slot.entry.take().expect("checked above");
            let handle = ResourceHandle {
                index: index as u32,
                generation: slot.generation,
            };

            // The memo may already point elsewhere (evict or replacement).
            if self.lookup.get(&entry.key) == Some(&handle) {
                self.lookup.remove(&entry.key);
            }

            slot.generation += 1;
            self.free.push(index as u32);
            destroyed.push(entry.payload);
        }

        if !destroyed.is_empty() {
            debug!("Ledger destroyed {} entries", destroyed.len());
        }

        destroyed
    }

    /// User reference count of `handle`; test and diagnostic hook.
    pub fn user_count(&self, handle: ResourceHandle) -> Option<u32> {
        self.entry_ref(handle).map(|e| e.users)
    }

    /// In-flight reference count of `handle`; test and diagnostic hook.
    pub fn in_flight_count(&self, handle: ResourceHandle) -> Option<u32> {
        self.entry_ref(handle).map(|e| e.in_flight)
    }

    fn entry_ref(&self, handle: ResourceHandle) -> Option<&Entry<K, T>> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    fn entry_mut(&mut self, handle: ResourceHandle) -> Result<&mut Entry<K, T>, CacheError> {
        let stale = CacheError::StaleHandle {
            index: handle.index,
            generation: handle.generation,
        };

        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .ok_or(stale)?;
        if slot.generation != handle.generation {
            return Err(CacheError::StaleHandle {
                index: handle.index,
                generation: handle.generation,
            });
        }
        slot.entry.as_mut().ok_or(CacheError::StaleHandle {
            index: handle.index,
            generation: handle.generation,
        })
    }
}

impl<K: Hash + Eq + Clone, T> Default for CacheLedger<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_is_memoized() {
        let mut ledger: CacheLedger<&str, u32> = CacheLedger::new();

        assert!(ledger.acquire_existing(&"a").is_none());
        let handle = ledger.insert("a", 7);

        // Identical key, identical handle.
        assert_eq!(ledger.acquire_existing(&"a"), Some(handle));
        assert_eq!(ledger.acquire_existing(&"a"), Some(handle));
        assert_eq!(ledger.user_count(handle), Some(3));
        assert_eq!(ledger.get(handle), Some(&7));
    }

    #[test]
    fn test_release_defers_destruction_to_boundary() {
        let mut ledger: CacheLedger<&str, u32> = CacheLedger::new();
        let handle = ledger.insert("a", 7);

        ledger.release(handle).unwrap();
        // Released to zero, but still alive until a frame boundary.
        assert_eq!(ledger.get(handle), Some(&7));

        let destroyed = ledger.retire(0);
        assert_eq!(destroyed, vec![7]);
        assert_eq!(ledger.get(handle), None);
    }

    #[test]
    fn test_in_flight_references_prevent_destruction() {
        // Two frames in flight referencing the resource: no free until both
        // serials are observed complete.
        let mut ledger: CacheLedger<&str, u32> = CacheLedger::new();
        let handle = ledger.insert("a", 7);

        ledger.mark_used(handle, 1).unwrap();
        ledger.mark_used(handle, 2).unwrap();
        ledger.release(handle).unwrap();

        assert!(ledger.retire(0).is_empty());
        assert_eq!(ledger.in_flight_count(handle), Some(2));

        assert!(ledger.retire(1).is_empty());
        assert_eq!(ledger.in_flight_count(handle), Some(1));
        assert_eq!(ledger.get(handle), Some(&7));

        let destroyed = ledger.retire(2);
        assert_eq!(destroyed, vec![7]);
        assert_eq!(ledger.get(handle), None);
    }

    #[test]
    fn test_zombie_resurrection_before_boundary() {
        let mut ledger: CacheLedger<&str, u32> = CacheLedger::new();
        let handle = ledger.insert("a", 7);

        ledger.release(handle).unwrap();
        // Re-acquired before any boundary: same handle, back to one user.
        assert_eq!(ledger.acquire_existing(&"a"), Some(handle));
        assert!(ledger.retire(10).is_empty());
        assert_eq!(ledger.get(handle), Some(&7));
    }

    #[test]
    fn test_evict_is_deferred_past_in_flight_frames() {
        let mut ledger: CacheLedger<&str, u32> = CacheLedger::new();
        let handle = ledger.insert("extent-sized", 7);
        ledger.mark_used(handle, 3).unwrap();

        let marked = ledger.evict(|key| *key == "extent-sized");
        assert_eq!(marked, 1);

        // The memo entry is gone immediately: a new acquire rebuilds.
        assert!(ledger.acquire_existing(&"extent-sized").is_none());
        // But the resource lives until serial 3 retires.
        assert!(ledger.retire(2).is_empty());
        assert_eq!(ledger.get(handle), Some(&7));
        assert_eq!(ledger.retire(3), vec![7]);
    }

    #[test]
    fn test_stale_handles_are_detected_after_slot_reuse() {
        let mut ledger: CacheLedger<&str, u32> = CacheLedger::new();
        let old = ledger.insert("a", 7);
        ledger.release(old).unwrap();
        ledger.retire(0);

        // The slot is reused under a new generation.
        let new = ledger.insert("b", 8);
        assert_eq!(new.index(), old.index());
        assert_ne!(new.generation(), old.generation());

        assert_eq!(ledger.get(old), None);
        assert!(matches!(
            ledger.release(old),
            Err(CacheError::StaleHandle { .. })
        ));
        assert_eq!(ledger.get(new), Some(&8));
    }

    #[test]
    fn test_retire_handles_interleaved_serials() {
        let mut ledger: CacheLedger<&str, u32> = CacheLedger::new();
        let a = ledger.insert("a", 1);
        let b = ledger.insert("b", 2);

        ledger.mark_used(a, 1).unwrap();
        ledger.mark_used(b, 1).unwrap();
        ledger.mark_used(a, 2).unwrap();

        ledger.release(a).unwrap();
        ledger.release(b).unwrap();

        // Serial 1 completes: b is free, a still held by serial 2.
        let destroyed = ledger.retire(1);
        assert_eq!(destroyed, vec![2]);
        assert_eq!(ledger.get(a), Some(&1));

        let destroyed = ledger.retire(2);
        assert_eq!(destroyed, vec![1]);
        assert!(ledger.is_empty());
    }
}
