use crate::core::account::AccountId;
use crate::core::position::{Position, PositionType};
use crate::heap::leverage_heap::SlotIndex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Positions keyed by account.
///
/// Accounts without an entry are Uninitialized. The registry also serves
/// as the back-reference table of both leverage heaps through
/// [`SlotIndex`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionRegistry {
    positions: BTreeMap<AccountId, Position>,
}

impl PositionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, account: &AccountId) -> Option<&Position> {
        self.positions.get(account)
    }

    pub fn get_mut(&mut self, account: &AccountId) -> Option<&mut Position> {
        self.positions.get_mut(account)
    }

    /// Returns the position of `account`, creating an Uninitialized one.
    pub fn entry(&mut self, account: &AccountId) -> &mut Position {
        self.positions.entry(account.clone()).or_default()
    }

    pub fn position_type(&self, account: &AccountId) -> PositionType {
        self.positions
            .get(account)
            .map(|p| p.position_type)
            .unwrap_or_default()
    }

    pub fn remove(&mut self, account: &AccountId) -> Option<Position> {
        self.positions.remove(account)
    }

    /// Drops the entry of a non-leveraged position whose amounts are both zero.
    pub fn prune(&mut self, account: &AccountId) -> bool {
        let prunable = self
            .positions
            .get(account)
            .map(|p| !p.is_leveraged() && p.is_empty())
            .unwrap_or(false);
        if prunable {
            self.positions.remove(account);
        }
        prunable
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AccountId, &Position)> {
        self.positions.iter()
    }
}

impl SlotIndex for PositionRegistry {
    fn set_slot(&mut self, account: &AccountId, slot: Option<usize>) {
        if let Some(position) = self.positions.get_mut(account) {
            position.heap_slot = slot;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_account_is_uninitialized() {
        let registry = PositionRegistry::new();
        assert_eq!(
            registry.position_type(&AccountId::new("nobody")),
            PositionType::Uninitialized
        );
        assert!(registry.get(&AccountId::new("nobody")).is_none());
    }

    #[test]
    fn test_prune_only_empty_lend() {
        let mut registry = PositionRegistry::new();
        let alice = AccountId::new("alice");
        let pos = registry.entry(&alice);
        pos.position_type = PositionType::Lend;
        pos.discounted_base_amount = 5;
        assert!(!registry.prune(&alice));

        registry.entry(&alice).discounted_base_amount = 0;
        assert!(registry.prune(&alice));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_set_slot_back_reference() {
        let mut registry = PositionRegistry::new();
        let bob = AccountId::new("bob");
        registry.entry(&bob).position_type = PositionType::Short;
        registry.set_slot(&bob, Some(3));
        assert_eq!(registry.get(&bob).unwrap().heap_slot, Some(3));
        registry.set_slot(&bob, None);
        assert_eq!(registry.get(&bob).unwrap().heap_slot, None);
    }
}
