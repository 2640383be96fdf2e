//! Bounded undo/redo over immutable state snapshots.

use crate::model::MemeState;

/// Maximum number of undo steps retained.
pub const HISTORY_CAPACITY: usize = 50;

/// Undo/redo stacks around a current value.
#[derive(Clone, Debug, PartialEq)]
pub struct History {
    past: Vec<MemeState>,
    present: MemeState,
    future: Vec<MemeState>,
    capacity: usize,
}

impl History {
    pub fn new(present: MemeState) -> Self {
        Self::with_capacity(present, HISTORY_CAPACITY)
    }

    pub fn with_capacity(present: MemeState, capacity: usize) -> Self {
        Self {
            past: Vec::new(),
            present,
            future: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn present(&self) -> &MemeState {
        &self.present
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Record `next` as the new present. Clears the redo stack.
    pub fn push(&mut self, next: MemeState) {
        if next == self.present {
            return;
        }
        let previous = core::mem::replace(&mut self.present, next);
        self.past.push(previous);
        if self.past.len() > self.capacity {
            let overflow = self.past.len() - self.capacity;
            self.past.drain(..overflow);
        }
        self.future.clear();
    }

    /// Replace the present without recording an undo step (live drags).
    pub fn replace_present(&mut self, next: MemeState) {
        self.present = next;
    }

    pub fn undo(&mut self) -> Option<&MemeState> {
        let previous = self.past.pop()?;
        let current = core::mem::replace(&mut self.present, previous);
        self.future.insert(0, current);
        Some(&self.present)
    }

    pub fn redo(&mut self) -> Option<&MemeState> {
        if self.future.is_empty() {
            return None;
        }
        let next = self.future.remove(0);
        let current = core::mem::replace(&mut self.present, next);
        self.past.push(current);
        Some(&self.present)
    }
}
