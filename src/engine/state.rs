use crate::core::account::AccountId;
use crate::core::error::PoolError;
use crate::core::fixed_point::{Fp96, MathError, SortKey};
use crate::core::ledger::Ledger;
use crate::core::position::{Position, PositionType};
use crate::core::registry::PositionRegistry;
use crate::core::token::Token;
use crate::heap::leverage_heap::LeverageHeap;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// True when `collateral / (collateral − debt)` exceeds `max_leverage`,
/// both values in the same unit. Evaluated without division.
pub fn leverage_exceeded(collateral_value: u128, debt_value: u128, max_leverage: u32) -> bool {
    if debt_value == 0 {
        return false;
    }
    if collateral_value <= debt_value {
        return true;
    }
    let lhs = U256::from(debt_value) * U256::from(max_leverage);
    let rhs = U256::from(collateral_value) * U256::from(max_leverage.saturating_sub(1));
    lhs > rhs
}

/// Everything a call may mutate. Cloned before each call and restored if
/// the call fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolState {
    pub ledger: Ledger,
    pub registry: PositionRegistry,
    pub short_heap: LeverageHeap,
    pub long_heap: LeverageHeap,
}

impl PoolState {
    pub fn new(created_at: u64) -> Self {
        Self {
            ledger: Ledger::new(created_at),
            registry: PositionRegistry::new(),
            short_heap: LeverageHeap::new(),
            long_heap: LeverageHeap::new(),
        }
    }

    pub fn position(&self, account: &AccountId) -> Option<&Position> {
        self.registry.get(account)
    }

    pub(crate) fn require_position(&self, account: &AccountId) -> Result<Position, PoolError> {
        match self.registry.get(account) {
            Some(p) if p.position_type != PositionType::Uninitialized => Ok(p.clone()),
            _ => Err(PoolError::UninitializedPosition(account.clone())),
        }
    }

    pub fn real_collateral_of(&self, account: &AccountId, token: Token) -> Result<u128, PoolError> {
        match self.registry.get(account) {
            Some(p) => Ok(self.ledger.position_collateral(p, token)?),
            None => Ok(0),
        }
    }

    pub fn real_debt_of(&self, account: &AccountId, token: Token) -> Result<u128, PoolError> {
        match self.registry.get(account) {
            Some(p) => Ok(self.ledger.position_debt(p, token)?),
            None => Ok(0),
        }
    }

    /// Collateral and debt of a position, both valued in quote at `price`.
    pub(crate) fn position_values(
        &self,
        position: &Position,
        price: Fp96,
    ) -> Result<(u128, u128), PoolError> {
        let ledger = &self.ledger;
        let values = match position.position_type {
            PositionType::Short => (
                ledger.position_collateral(position, Token::Quote)?,
                price.mul_int(ledger.position_debt(position, Token::Base)?)?,
            ),
            PositionType::Long => (
                price.mul_int(ledger.position_collateral(position, Token::Base)?)?,
                ledger.position_debt(position, Token::Quote)?,
            ),
            _ => (0, 0),
        };
        Ok(values)
    }

    pub(crate) fn credit_collateral(
        &mut self,
        account: &AccountId,
        token: Token,
        real: u128,
    ) -> Result<(), PoolError> {
        let discounted = self.ledger.deposit_collateral(token, real)?;
        let position = self.registry.entry(account);
        if position.position_type == PositionType::Uninitialized {
            position.position_type = PositionType::Lend;
        }
        let slot = position.amount_mut(token);
        *slot = slot.checked_add(discounted).ok_or(MathError::Overflow)?;
        Ok(())
    }

    pub(crate) fn debit_collateral(
        &mut self,
        account: &AccountId,
        token: Token,
        real: u128,
    ) -> Result<(), PoolError> {
        let available = self
            .registry
            .get(account)
            .map(|p| p.amount(token))
            .unwrap_or(0);
        let discounted = self.ledger.withdraw_collateral(token, real, available)?;
        if let Some(position) = self.registry.get_mut(account) {
            *position.amount_mut(token) -= discounted;
        }
        Ok(())
    }

    /// Books new debt; the debtor's discounted collateral is topped up so
    /// that the existing deleveraging haircut does not reach the new debt.
    pub(crate) fn add_debt(
        &mut self,
        account: &AccountId,
        token: Token,
        real: u128,
    ) -> Result<(), PoolError> {
        let discounted = self.ledger.borrow(token, real)?;
        let compensation = self.ledger.delev_compensation(token, discounted)?;
        let collateral_token = token.other();
        let book = self.ledger.book_mut(collateral_token);
        book.discounted_collateral = book
            .discounted_collateral
            .checked_add(compensation)
            .ok_or(MathError::Overflow)?;

        let position = self.registry.entry(account);
        let debt = position.amount_mut(token);
        *debt = debt.checked_add(discounted).ok_or(MathError::Overflow)?;
        let collateral = position.amount_mut(collateral_token);
        *collateral = collateral.checked_add(compensation).ok_or(MathError::Overflow)?;
        Ok(())
    }

    /// Repays up to `real` of debt, releasing the matching haircut.
    pub(crate) fn repay_debt(
        &mut self,
        account: &AccountId,
        token: Token,
        real: u128,
    ) -> Result<(), PoolError> {
        let owed = self
            .registry
            .get(account)
            .map(|p| p.amount(token))
            .unwrap_or(0);
        let cleared = self.ledger.repay(token, real, owed)?;
        let compensation = self.ledger.delev_compensation(token, cleared)?;
        let collateral_token = token.other();

        let Some(position) = self.registry.get_mut(account) else {
            return Ok(());
        };
        *position.amount_mut(token) -= cleared;
        let released = compensation.min(position.amount(collateral_token));
        *position.amount_mut(collateral_token) -= released;

        let book = self.ledger.book_mut(collateral_token);
        book.discounted_collateral = book.discounted_collateral.saturating_sub(released);
        Ok(())
    }

    /// Changes a position's type, leaving the heap of its previous type.
    pub(crate) fn set_position_type(
        &mut self,
        account: &AccountId,
        new_type: PositionType,
    ) -> Result<(), PoolError> {
        let (old_type, slot) = self
            .registry
            .get(account)
            .map(|p| (p.position_type, p.heap_slot))
            .unwrap_or_default();
        if old_type == new_type {
            return Ok(());
        }
        if let Some(slot) = slot {
            match old_type {
                PositionType::Short => {
                    self.short_heap.remove(slot, &mut self.registry)?;
                }
                PositionType::Long => {
                    self.long_heap.remove(slot, &mut self.registry)?;
                }
                _ => {}
            }
        }
        self.registry.entry(account).position_type = new_type;
        Ok(())
    }

    /// Pushes the current sort key of a Short or Long position into its heap.
    pub(crate) fn refresh_heap(
        &mut self,
        account: &AccountId,
        initial_price: Fp96,
    ) -> Result<(), PoolError> {
        let Some(position) = self.registry.get(account) else {
            return Ok(());
        };
        let base = position.discounted_base_amount;
        let quote = position.discounted_quote_amount;
        let slot = position.heap_slot;
        let (heap, key) = match position.position_type {
            PositionType::Short => (&mut self.short_heap, SortKey::short(initial_price, base, quote)?),
            PositionType::Long => (&mut self.long_heap, SortKey::long(initial_price, base, quote)?),
            _ => return Ok(()),
        };
        match slot {
            Some(slot) => {
                heap.update_key(slot, key, &mut self.registry)?;
            }
            None => {
                heap.insert(account.clone(), key, &mut self.registry);
            }
        }
        Ok(())
    }

    /// Deletes a position, taking its discounted amounts out of the
    /// aggregates and its node out of the heap.
    pub(crate) fn remove_position(&mut self, account: &AccountId) -> Result<Option<Position>, PoolError> {
        let Some(position) = self.registry.get(account).cloned() else {
            return Ok(None);
        };
        if let Some(slot) = position.heap_slot {
            match position.position_type {
                PositionType::Short => {
                    self.short_heap.remove(slot, &mut self.registry)?;
                }
                PositionType::Long => {
                    self.long_heap.remove(slot, &mut self.registry)?;
                }
                _ => {}
            }
        }
        for token in Token::ALL {
            let amount = position.amount(token);
            let is_debt = position.is_debt(token);
            let book = self.ledger.book_mut(token);
            if is_debt {
                book.discounted_debt = book.discounted_debt.saturating_sub(amount);
            } else {
                book.discounted_collateral = book.discounted_collateral.saturating_sub(amount);
            }
        }
        Ok(self.registry.remove(account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leverage_exceeded_boundaries() {
        // 1100 / (1100 - 1000) = 11
        assert!(!leverage_exceeded(1_100, 1_000, 11));
        assert!(leverage_exceeded(1_100, 1_000, 10));
        assert!(leverage_exceeded(100, 100, 1_000));
        assert!(!leverage_exceeded(0, 0, 1));
        assert!(leverage_exceeded(100, 1, 1));
    }

    #[test]
    fn test_credit_then_debit_round_trip() {
        let mut state = PoolState::new(0);
        let alice = AccountId::new("alice");
        state.credit_collateral(&alice, Token::Base, 1_000).unwrap();
        assert_eq!(state.registry.position_type(&alice), PositionType::Lend);
        state.debit_collateral(&alice, Token::Base, 1_000).unwrap();
        assert!(state.registry.get(&alice).unwrap().is_empty());
        assert_eq!(state.ledger.base.discounted_collateral, 0);
    }

    #[test]
    fn test_debt_keeps_real_collateral_under_haircut() {
        let mut state = PoolState::new(0);
        let bob = AccountId::new("bob");
        state.credit_collateral(&bob, Token::Quote, 1_000).unwrap();
        state.set_position_type(&bob, PositionType::Short).unwrap();
        state.ledger.quote.delev_coeff = Fp96::from_int(2);

        state.add_debt(&bob, Token::Base, 50).unwrap();
        assert_eq!(state.real_collateral_of(&bob, Token::Quote).unwrap(), 1_000);
        assert_eq!(state.real_debt_of(&bob, Token::Base).unwrap(), 50);

        state.repay_debt(&bob, Token::Base, 50).unwrap();
        assert_eq!(state.real_debt_of(&bob, Token::Base).unwrap(), 0);
        assert_eq!(state.real_collateral_of(&bob, Token::Quote).unwrap(), 1_000);
    }

    #[test]
    fn test_type_change_leaves_heap() {
        let mut state = PoolState::new(0);
        let carol = AccountId::new("carol");
        state.credit_collateral(&carol, Token::Quote, 1_000).unwrap();
        state.set_position_type(&carol, PositionType::Short).unwrap();
        state.add_debt(&carol, Token::Base, 10).unwrap();
        state.refresh_heap(&carol, Fp96::ONE).unwrap();
        assert_eq!(state.short_heap.len(), 1);
        assert_eq!(state.registry.get(&carol).unwrap().heap_slot, Some(0));

        state.set_position_type(&carol, PositionType::Lend).unwrap();
        assert!(state.short_heap.is_empty());
        assert_eq!(state.registry.get(&carol).unwrap().heap_slot, None);
    }

    #[test]
    fn test_remove_position_updates_aggregates() {
        let mut state = PoolState::new(0);
        let dave = AccountId::new("dave");
        state.credit_collateral(&dave, Token::Base, 500).unwrap();
        state.set_position_type(&dave, PositionType::Long).unwrap();
        state.add_debt(&dave, Token::Quote, 200).unwrap();
        state.refresh_heap(&dave, Fp96::ONE).unwrap();

        let removed = state.remove_position(&dave).unwrap().unwrap();
        assert_eq!(removed.discounted_base_amount, 500);
        assert_eq!(state.ledger.base.discounted_collateral, 0);
        assert_eq!(state.ledger.quote.discounted_debt, 0);
        assert!(state.long_heap.is_empty());
        assert!(state.registry.is_empty());
    }
}
