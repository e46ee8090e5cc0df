//! Persistent contract storage.
//!
//! Storage is a sparse `slot -> word` mapping addressed by `global.get` and
//! `global.set`. Writes are buffered in a changes overlay on top of the
//! committed slots: reads see pending writes first, and the overlay can be
//! externalized as a coalesced byte diff, committed, or discarded by the caller.

use std::collections::BTreeMap;

/// Width in bytes of one storage slot.
pub const SLOT_SIZE: u64 = 8;

/// One contiguous run of written storage, addressed by byte offset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageDiff {
    /// Byte offset of the first slot in the run (`slot * SLOT_SIZE`).
    pub offset: u64,
    /// Little-endian words of every slot in the run, in slot order.
    pub bytes: Vec<u8>,
}

/// Slot storage with a pending-changes overlay.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Storage {
    /// Committed slot values.
    slots: BTreeMap<u32, u64>,
    /// Values read for slots that were never written (global initializers).
    defaults: BTreeMap<u32, u64>,
    /// Slots written since the last commit or discard.
    changes: BTreeMap<u32, u64>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates storage whose committed slots are `slots`.
    pub fn with_slots(slots: impl IntoIterator<Item = (u32, u64)>) -> Self {
        Self {
            slots: slots.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Sets the value an unwritten slot reads as.
    pub fn set_default(&mut self, slot: u32, word: u64) {
        self.defaults.insert(slot, word);
    }

    /// Reads a slot: pending write, then committed value, then default, then zero.
    pub fn read(&self, slot: u32) -> u64 {
        self.changes
            .get(&slot)
            .or_else(|| self.slots.get(&slot))
            .or_else(|| self.defaults.get(&slot))
            .copied()
            .unwrap_or(0)
    }

    /// Writes a slot and records it in the changes overlay.
    pub fn write(&mut self, slot: u32, word: u64) {
        self.changes.insert(slot, word);
    }

    /// Slots written since the last commit or discard.
    pub fn changes(&self) -> &BTreeMap<u32, u64> {
        &self.changes
    }

    /// Returns the pending changes as coalesced byte runs.
    pub fn diff(&self) -> Vec<StorageDiff> {
        coalesce(&self.changes)
    }

    /// Folds pending changes into the committed slots and returns their diff.
    pub fn commit(&mut self) -> Vec<StorageDiff> {
        let diff = self.diff();
        self.slots.append(&mut self.changes);
        diff
    }

    /// Drops pending changes.
    pub fn discard(&mut self) {
        self.changes.clear();
    }
}

/// Merges writes to consecutive slots into single runs.
///
/// The result is ordered by offset; a gap of one or more unwritten slots
/// starts a new run.
pub fn coalesce(changes: &BTreeMap<u32, u64>) -> Vec<StorageDiff> {
    let mut runs: Vec<StorageDiff> = Vec::new();
    let mut next_slot: Option<u64> = None;

    for (&slot, &word) in changes {
        let slot = slot as u64;
        match runs.last_mut() {
            Some(run) if next_slot == Some(slot) => {
                run.bytes.extend_from_slice(&word.to_le_bytes());
            }
            _ => runs.push(StorageDiff {
                offset: slot * SLOT_SIZE,
                bytes: word.to_le_bytes().to_vec(),
            }),
        }
        next_slot = Some(slot + 1);
    }
    runs
}
