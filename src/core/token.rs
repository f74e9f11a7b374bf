use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two tokens of a pool.
///
/// Prices are always quoted as units of `Quote` per unit of `Base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Token {
    Base,
    Quote,
}

impl Token {
    pub const ALL: [Token; 2] = [Token::Base, Token::Quote];

    /// The counterpart token of the pair.
    pub fn other(self) -> Token {
        match self {
            Token::Base => Token::Quote,
            Token::Quote => Token::Base,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Base => write!(f, "base"),
            Token::Quote => write!(f, "quote"),
        }
    }
}
