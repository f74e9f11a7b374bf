use crate::core::account::AccountId;
use crate::core::error::PoolError;
use crate::core::params::MarginlyParams;
use crate::core::token::Token;
use crate::engine::call::CallReceipt;
use crate::engine::pool::MarginlyPool;
use crate::venue::Venue;
use log::info;

impl MarginlyPool {
    fn require_admin(&self, caller: &AccountId) -> Result<(), PoolError> {
        if *caller != self.admin {
            return Err(PoolError::Unauthorized(caller.clone()));
        }
        Ok(())
    }

    /// Sends the admin every token held in custody beyond what the ledger
    /// owes (`collateral − debt`): swap fees and stray transfers.
    pub(crate) fn sweep<V: Venue>(
        &mut self,
        venue: &mut V,
        caller: &AccountId,
        receipt: &mut CallReceipt,
    ) -> Result<(), PoolError> {
        self.require_admin(caller)?;
        for token in Token::ALL {
            let ledger = &self.state.ledger;
            let owed = ledger.real_collateral(token)?.saturating_sub(ledger.real_debt(token)?);
            let surplus = venue.balance_of(token).saturating_sub(owed);
            if surplus > 0 {
                let admin = self.admin.clone();
                Self::pay(venue, receipt, &admin, token, surplus, false)?;
                info!("swept {} {} to {}", surplus, token, admin);
            }
        }
        Ok(())
    }

    pub(crate) fn set_parameters(&mut self, caller: &AccountId, params: MarginlyParams) -> Result<(), PoolError> {
        self.require_admin(caller)?;
        params.validate()?;
        info!("parameters updated by {}: {:?}", caller, params);
        self.params = params;
        Ok(())
    }
}
