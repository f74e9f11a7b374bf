use crate::core::token::Token;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionType {
    /// No funds; the account has never deposited or has withdrawn everything.
    #[default]
    Uninitialized,
    /// Collateral only, in either or both tokens.
    Lend,
    /// Base debt against quote collateral.
    Short,
    /// Quote debt against base collateral.
    Long,
}

impl fmt::Display for PositionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PositionType::Uninitialized => "uninitialized",
            PositionType::Lend => "lend",
            PositionType::Short => "short",
            PositionType::Long => "long",
        };
        write!(f, "{}", name)
    }
}

/// Per-account record of discounted amounts.
///
/// Each amount is collateral or debt depending on `position_type`:
/// a Short's base amount and a Long's quote amount are debt, everything
/// else is collateral. Real values are obtained through the
/// [`Ledger`](crate::core::ledger::Ledger) coefficients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub position_type: PositionType,
    pub discounted_base_amount: u128,
    pub discounted_quote_amount: u128,
    /// Slot in the heap matching `position_type`; `None` for Lend and
    /// Uninitialized positions.
    pub heap_slot: Option<usize>,
}

impl Position {
    pub fn amount(&self, token: Token) -> u128 {
        match token {
            Token::Base => self.discounted_base_amount,
            Token::Quote => self.discounted_quote_amount,
        }
    }

    pub fn amount_mut(&mut self, token: Token) -> &mut u128 {
        match token {
            Token::Base => &mut self.discounted_base_amount,
            Token::Quote => &mut self.discounted_quote_amount,
        }
    }

    /// The token this position owes, if leveraged.
    pub fn debt_token(&self) -> Option<Token> {
        match self.position_type {
            PositionType::Short => Some(Token::Base),
            PositionType::Long => Some(Token::Quote),
            _ => None,
        }
    }

    pub fn is_debt(&self, token: Token) -> bool {
        self.debt_token() == Some(token)
    }

    pub fn is_leveraged(&self) -> bool {
        matches!(self.position_type, PositionType::Short | PositionType::Long)
    }

    pub fn is_empty(&self) -> bool {
        self.discounted_base_amount == 0 && self.discounted_quote_amount == 0
    }
}
