use crate::core::account::AccountId;
use crate::core::fixed_point::SortKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors arising from heap handle misuse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapError {
    #[error("heap slot {slot} out of range (len {len})")]
    SlotOutOfRange { slot: usize, len: usize },
}

/// Receives slot changes for every node the heap moves.
///
/// The heap never owns the back-references itself: whoever stores the
/// handles (the position registry) is told about each move, so a handle
/// read after any heap operation always points at its own node.
pub trait SlotIndex {
    fn set_slot(&mut self, account: &AccountId, slot: Option<usize>);
}

/// An entry of a [`LeverageHeap`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapNode {
    pub account: AccountId,
    pub key: SortKey,
}

/// Array-backed binary max-heap of positions ranked by [`SortKey`].
///
/// The root is the most leveraged position on its side. Slots are plain
/// indices into the backing vector; they change as nodes are sifted and
/// are reported through [`SlotIndex`].
///
/// # Examples
///
/// ```
/// use margin_engine::core::account::AccountId;
/// use margin_engine::core::fixed_point::SortKey;
/// use margin_engine::heap::leverage_heap::{LeverageHeap, SlotIndex};
/// use primitive_types::U256;
/// use std::collections::HashMap;
///
/// #[derive(Default)]
/// struct Slots(HashMap<AccountId, Option<usize>>);
/// impl SlotIndex for Slots {
///     fn set_slot(&mut self, account: &AccountId, slot: Option<usize>) {
///         self.0.insert(account.clone(), slot);
///     }
/// }
///
/// let mut slots = Slots::default();
/// let mut heap = LeverageHeap::new();
/// heap.insert(AccountId::new("a"), SortKey::from_raw(U256::from(5)), &mut slots);
/// heap.insert(AccountId::new("b"), SortKey::from_raw(U256::from(9)), &mut slots);
/// assert_eq!(heap.peek_max().unwrap().account, AccountId::new("b"));
/// assert_eq!(slots.0[&AccountId::new("b")], Some(0));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeverageHeap {
    nodes: Vec<HeapNode>,
}

impl LeverageHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn peek_max(&self) -> Option<&HeapNode> {
        self.nodes.first()
    }

    pub fn get(&self, slot: usize) -> Option<&HeapNode> {
        self.nodes.get(slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeapNode> {
        self.nodes.iter()
    }

    /// Adds a node and returns its final slot.
    pub fn insert(&mut self, account: AccountId, key: SortKey, index: &mut impl SlotIndex) -> usize {
        self.nodes.push(HeapNode { account, key });
        self.sift_up(self.nodes.len() - 1, index)
    }

    /// Changes the key of the node at `slot`, re-sifting it in whichever
    /// direction restores heap order. Returns the node's new slot.
    pub fn update_key(
        &mut self,
        slot: usize,
        key: SortKey,
        index: &mut impl SlotIndex,
    ) -> Result<usize, HeapError> {
        self.check_slot(slot)?;
        let old = self.nodes[slot].key;
        self.nodes[slot].key = key;
        if key > old {
            Ok(self.sift_up(slot, index))
        } else {
            Ok(self.sift_down(slot, index))
        }
    }

    pub fn remove_max(&mut self, index: &mut impl SlotIndex) -> Option<HeapNode> {
        if self.nodes.is_empty() {
            return None;
        }
        self.remove(0, index).ok()
    }

    /// Removes the node at `slot`; its back-reference is cleared.
    pub fn remove(&mut self, slot: usize, index: &mut impl SlotIndex) -> Result<HeapNode, HeapError> {
        self.check_slot(slot)?;
        let removed = self.nodes.swap_remove(slot);
        index.set_slot(&removed.account, None);
        if slot < self.nodes.len() {
            let moved_to = self.sift_down(slot, index);
            if moved_to == slot {
                self.sift_up(slot, index);
            }
        }
        Ok(removed)
    }

    /// Checks the max-heap property over every parent/child pair.
    pub fn is_valid(&self) -> bool {
        (1..self.nodes.len()).all(|i| self.nodes[(i - 1) / 2].key >= self.nodes[i].key)
    }

    fn check_slot(&self, slot: usize) -> Result<(), HeapError> {
        if slot >= self.nodes.len() {
            return Err(HeapError::SlotOutOfRange {
                slot,
                len: self.nodes.len(),
            });
        }
        Ok(())
    }

    fn sift_up(&mut self, mut slot: usize, index: &mut impl SlotIndex) -> usize {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if self.nodes[slot].key <= self.nodes[parent].key {
                break;
            }
            self.nodes.swap(slot, parent);
            index.set_slot(&self.nodes[slot].account, Some(slot));
            slot = parent;
        }
        index.set_slot(&self.nodes[slot].account, Some(slot));
        slot
    }

    fn sift_down(&mut self, mut slot: usize, index: &mut impl SlotIndex) -> usize {
        let len = self.nodes.len();
        loop {
            let left = 2 * slot + 1;
            let right = left + 1;
            let mut largest = slot;
            if left < len && self.nodes[left].key > self.nodes[largest].key {
                largest = left;
            }
            if right < len && self.nodes[right].key > self.nodes[largest].key {
                largest = right;
            }
            if largest == slot {
                break;
            }
            self.nodes.swap(slot, largest);
            index.set_slot(&self.nodes[slot].account, Some(slot));
            slot = largest;
        }
        index.set_slot(&self.nodes[slot].account, Some(slot));
        slot
    }
}
