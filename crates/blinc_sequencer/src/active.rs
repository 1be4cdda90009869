//! Active list
//!
//! Ordered slots of live calls. Unlinking leaves a tombstone so indices stay
//! stable while a traversal is running; the scheduler compacts once no pass
//! is in flight. Calls appended since the last absorb form the staging
//! region starting at `first_new`.

use crate::call::CallId;

#[derive(Debug, Default)]
pub(crate) struct ActiveList {
    slots: Vec<Option<CallId>>,
    live: usize,
    first_new: Option<usize>,
}

impl ActiveList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a call; it joins the staging region
    pub(crate) fn push(&mut self, call: CallId) -> usize {
        let index = self.slots.len();
        self.slots.push(Some(call));
        self.live += 1;
        if self.first_new.is_none() {
            self.first_new = Some(index);
        }
        index
    }

    /// Tombstone a slot, returning the call it held
    pub(crate) fn unlink(&mut self, index: usize) -> Option<CallId> {
        let call = self.slots.get_mut(index)?.take()?;
        self.live -= 1;
        if self.first_new == Some(index) {
            self.first_new = self.next_live(index + 1);
        }
        Some(call)
    }

    /// A staged call was validated: move the boundary past it if it leads
    pub(crate) fn absorb(&mut self, index: usize) {
        if self.first_new == Some(index) {
            self.first_new = self.next_live(index + 1);
        }
    }

    pub(crate) fn get(&self, index: usize) -> Option<CallId> {
        self.slots.get(index).copied().flatten()
    }

    /// Number of slots including tombstones (the traversal bound)
    pub(crate) fn slot_len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub(crate) fn first_new(&self) -> Option<usize> {
        self.first_new
    }

    /// First staged call, if any
    pub(crate) fn first_new_call(&self) -> Option<CallId> {
        self.first_new.and_then(|index| self.get(index))
    }

    /// Whether `index` lies in the staging region
    pub(crate) fn is_staged(&self, index: usize) -> bool {
        self.first_new.is_some_and(|first| index >= first)
    }

    /// Live calls in list order
    pub(crate) fn iter(&self) -> impl Iterator<Item = CallId> + '_ {
        self.slots.iter().filter_map(|slot| *slot)
    }

    /// Drop tombstones, returning `(call, new_index)` for every moved call
    pub(crate) fn compact(&mut self) -> Vec<(CallId, usize)> {
        if self.live == self.slots.len() {
            return Vec::new();
        }
        let first_new_call = self.first_new_call();
        self.slots.retain(Option::is_some);
        self.first_new = first_new_call.and_then(|call| self.position(call));
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.map(|call| (call, index)))
            .collect()
    }

    fn position(&self, call: CallId) -> Option<usize> {
        self.slots.iter().position(|slot| *slot == Some(call))
    }

    fn next_live(&self, from: usize) -> Option<usize> {
        (from..self.slots.len()).find(|&index| self.slots[index].is_some())
    }
}
