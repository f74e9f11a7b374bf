use crate::core::account::AccountId;
use crate::core::error::PoolError;
use crate::core::fixed_point::{mul_div, Fp96, MathError};
use crate::core::params::MarginlyParams;
use crate::core::position::PositionType;
use crate::core::token::Token;
use crate::engine::state::PoolState;
use log::{info, warn};

/// How much of a position the counterparty side took over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absorbed {
    /// The whole position; it no longer exists.
    Full,
    /// Part of it, until the counterparty debt ran out.
    Partial,
}

impl PoolState {
    /// Unwinds the most leveraged positions of any side whose system
    /// leverage exceeds `max_leverage`, shorts first.
    ///
    /// Each unwind hands the position to the opposite side (see
    /// [`PoolState::transfer_to_counterparty`]). The loop for a side ends
    /// when its leverage is back in bounds, its heap is empty, or the
    /// opposite side has no debt left to absorb it.
    pub fn deleverage(
        &mut self,
        params: &MarginlyParams,
        price: Fp96,
        initial_price: Fp96,
    ) -> Result<Vec<AccountId>, PoolError> {
        let max = params.max_leverage_x96();
        let mut deleveraged = Vec::new();

        for side in [PositionType::Short, PositionType::Long] {
            loop {
                let leverage = self.ledger.compute_system_leverage(price)?;
                let (current, heap) = match side {
                    PositionType::Short => (leverage.short_x96, &self.short_heap),
                    _ => (leverage.long_x96, &self.long_heap),
                };
                if current <= max {
                    break;
                }
                let Some(root) = heap.peek_max().map(|n| n.account.clone()) else {
                    warn!("{} leverage {} above {} with no {} positions", side, current, max, side);
                    break;
                };
                match self.transfer_to_counterparty(&root, initial_price)? {
                    None => {
                        warn!("cannot deleverage {}: no counterparty debt", root);
                        break;
                    }
                    Some(Absorbed::Full) => {
                        info!("deleveraged {} position of {}", side, root);
                        deleveraged.push(root);
                    }
                    Some(Absorbed::Partial) => {
                        info!("partially deleveraged {} position of {}", side, root);
                        deleveraged.push(root);
                        break;
                    }
                }
            }
        }
        Ok(deleveraged)
    }

    /// Moves a leveraged position onto the debtors of the opposite side,
    /// without any swap.
    ///
    /// For a Long `L` the counterparties are the shorts, who owe base and
    /// hold quote. With `α = min(1, shorts' base debt / L's base collateral)`:
    ///
    /// - `baseDebtCoeff -= α · collateral(L) / discountedBaseDebt`: the
    ///   shorts' base debt is settled with L's base collateral;
    /// - `quoteDelevCoeff += α · debt(L) / discountedBaseDebt`: the shorts'
    ///   quote collateral takes over L's quote debt, pro rata to their
    ///   base debt.
    ///
    /// Collateral and debt of each token fall by the same real amount, so
    /// the gap between them is unchanged. A Short is handled symmetrically
    /// with the longs as counterparty. Returns `None` when the
    /// counterparty side holds no debt.
    pub fn transfer_to_counterparty(
        &mut self,
        account: &AccountId,
        initial_price: Fp96,
    ) -> Result<Option<Absorbed>, PoolError> {
        let position = self.require_position(account)?;
        let debt_token = position.debt_token().ok_or(PoolError::WrongPositionType)?;
        let collateral_token = debt_token.other();

        let collateral = self.ledger.position_collateral(&position, collateral_token)?;
        let debt = self.ledger.position_debt(&position, debt_token)?;
        let counter_debt = self.ledger.real_debt(collateral_token)?;
        let counter_discounted = self.ledger.book(collateral_token).discounted_debt;
        if counter_debt == 0 || counter_discounted == 0 {
            return Ok(None);
        }

        let full = counter_debt >= collateral;
        let (moved_collateral, moved_debt) = if full {
            (collateral, debt)
        } else {
            (counter_debt, mul_div(debt, counter_debt, collateral)?)
        };

        let settled = Fp96::from_ratio(moved_collateral, counter_discounted)?;
        let counter_book = self.ledger.book_mut(collateral_token);
        counter_book.debt_coeff = counter_book.debt_coeff.checked_sub(settled)?;
        let haircut = Fp96::from_ratio(moved_debt, counter_discounted)?;
        let debt_book = self.ledger.book_mut(debt_token);
        debt_book.delev_coeff = debt_book.delev_coeff.checked_add(haircut)?;

        let exhausted = moved_collateral == counter_debt;
        if full {
            self.remove_position(account)?;
            if exhausted {
                self.retire_settled_debt(collateral_token)?;
            }
            return Ok(Some(Absorbed::Full));
        }

        let removed_collateral = mul_div(position.amount(collateral_token), moved_collateral, collateral)?;
        let removed_debt = mul_div(position.amount(debt_token), moved_collateral, collateral)?;
        if let Some(p) = self.registry.get_mut(account) {
            *p.amount_mut(collateral_token) -= removed_collateral.min(p.amount(collateral_token));
            *p.amount_mut(debt_token) -= removed_debt.min(p.amount(debt_token));
        }
        let book = self.ledger.book_mut(collateral_token);
        book.discounted_collateral = book
            .discounted_collateral
            .checked_sub(removed_collateral)
            .ok_or(MathError::Underflow)?;
        let book = self.ledger.book_mut(debt_token);
        book.discounted_debt = book
            .discounted_debt
            .checked_sub(removed_debt)
            .ok_or(MathError::Underflow)?;
        self.refresh_heap(account, initial_price)?;
        self.retire_settled_debt(collateral_token)?;
        Ok(Some(Absorbed::Partial))
    }

    /// Turns every debtor of `token` into a Lend position once deleveraging
    /// has settled that side's whole debt, then resets the token's debt
    /// coefficient and the haircut on the debtors' collateral.
    fn retire_settled_debt(&mut self, token: Token) -> Result<(), PoolError> {
        let collateral_token = token.other();
        let debtors: Vec<AccountId> = match token {
            Token::Base => self.short_heap.iter(),
            Token::Quote => self.long_heap.iter(),
        }
        .map(|n| n.account.clone())
        .collect();

        for account in &debtors {
            let real = self.real_collateral_of(account, collateral_token)?;
            self.remove_position(account)?;
            if real > 0 {
                self.credit_collateral(account, collateral_token, real)?;
            }
        }

        let book = self.ledger.book_mut(token);
        book.debt_coeff = Fp96::ONE;
        book.discounted_debt = 0;
        self.ledger.book_mut(collateral_token).delev_coeff = Fp96::ZERO;
        info!("{} debt fully settled; {} debtors converted to lenders", token, debtors.len());
        Ok(())
    }
}
