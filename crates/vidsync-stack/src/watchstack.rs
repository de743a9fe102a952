use serde::{Deserialize, Serialize};

use crate::item::StackItem;

/// LIFO of watched videos. Indexes are counted from the top, 0-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchStack {
    pub id: String,
    pub name: String,
    /// bottom first
    items: Vec<StackItem>,
}

impl WatchStack {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            items: Vec::new(),
        }
    }

    pub fn create_from_copy(new_id: impl Into<String>, original: &WatchStack) -> Self {
        Self {
            id: new_id.into(),
            name: original.name.clone(),
            items: original.items.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, item: StackItem) {
        self.items.push(item);
    }

    pub fn peek(&self, idx: usize) -> Option<&StackItem> {
        let pos = self.position(idx)?;
        self.items.get(pos)
    }

    /// Remove the item at `idx` and everything above it. Returns the item at `idx`.
    pub fn pop(&mut self, idx: usize) -> Option<StackItem> {
        let pos = self.position(idx)?;
        self.items.drain(pos..).next()
    }

    /// Insert `item` so it ends up at `idx`. Indexes past the bottom insert at the bottom.
    pub fn add(&mut self, item: StackItem, idx: usize) {
        let idx = idx.min(self.items.len());
        let pos = self.items.len() - idx;
        self.items.insert(pos, item);
    }

    pub fn remove(&mut self, idx: usize) -> Option<StackItem> {
        let pos = self.position(idx)?;
        Some(self.items.remove(pos))
    }

    /// Swap the item at `idx` for `item`. Returns the old item.
    pub fn replace(&mut self, item: StackItem, idx: usize) -> Option<StackItem> {
        let pos = self.position(idx)?;
        Some(std::mem::replace(&mut self.items[pos], item))
    }

    /// The items, top first.
    pub fn to_vec(&self) -> Vec<StackItem> {
        self.items.iter().rev().cloned().collect()
    }

    /// The items, bottom first.
    pub fn items(&self) -> &[StackItem] {
        &self.items
    }

    fn position(&self, idx: usize) -> Option<usize> {
        (idx < self.items.len()).then(|| self.items.len() - idx - 1)
    }
}
