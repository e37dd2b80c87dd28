//! Community Issuance
//!
//! Releases the Stability Pool's LOAN allocation on a fixed time schedule:
//! cumulative issuance after t minutes is `cap * (1 - F^t)` where F gives
//! a one-year half-life. Each state-changing pool operation pulls the
//! increment since the previous pull; if the pool is empty the increment
//! is dropped and simply stays in the vault.

use crate::constants::schedule::{ISSUANCE_FACTOR, LOAN_SUPPLY_CAP, SECONDS_IN_ONE_MINUTE};
use crate::errors::{FurUsdError, FurUsdResult};
use crate::events::{EventLog, ProtocolEvent};
use crate::loan_token::LoanToken;
use crate::math;
use crate::types::{Address, AddressBook};
use crate::vesting::VestingRegistry;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// The issuance vault state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityIssuance {
    book: AddressBook,
    deployment_time: u64,
    total_loan_issued: U256,
}

impl CommunityIssuance {
    /// Creates the issuance schedule anchored at deployment time
    pub fn new(book: AddressBook, deployment_time: u64) -> Self {
        Self {
            book,
            deployment_time,
            total_loan_issued: U256::zero(),
        }
    }

    /// Cumulative LOAN issued so far
    pub fn total_loan_issued(&self) -> U256 {
        self.total_loan_issued
    }

    /// Advance the schedule to `now` and return the newly issuable LOAN.
    /// Stability Pool only.
    pub fn issue_loan(
        &mut self,
        events: &mut EventLog,
        caller: Address,
        now: u64,
    ) -> FurUsdResult<U256> {
        if caller != self.book.stability_pool {
            return Err(FurUsdError::Unauthorized {
                expected: self.book.stability_pool,
                actual: caller,
            });
        }

        let cumulative = self.cumulative_issuance(now)?;
        let increment = math::checked_sub(cumulative, self.total_loan_issued)?;
        self.total_loan_issued = cumulative;

        events.emit(ProtocolEvent::LoanIssued {
            increment,
            total_issued: self.total_loan_issued,
        });
        Ok(increment)
    }

    /// Pay an earned LOAN gain out of the vault. Stability Pool only.
    pub fn send_loan(
        &self,
        events: &mut EventLog,
        caller: Address,
        registry: &VestingRegistry,
        loan: &mut LoanToken,
        to: Address,
        amount: U256,
        now: u64,
    ) -> FurUsdResult<()> {
        if caller != self.book.stability_pool {
            return Err(FurUsdError::Unauthorized {
                expected: self.book.stability_pool,
                actual: caller,
            });
        }
        loan.transfer(events, registry, self.book.community_issuance, to, amount, now)
    }

    /// `cap * (1 - F^minutes) / ONE`, monotone in `now`
    fn cumulative_issuance(&self, now: u64) -> FurUsdResult<U256> {
        let elapsed = now.saturating_sub(self.deployment_time);
        let minutes = elapsed / SECONDS_IN_ONE_MINUTE;

        let decay = math::dec_pow(U256::from(ISSUANCE_FACTOR), minutes)?;
        let fraction = math::checked_sub(math::one(), decay)?;
        let raw = math::checked_mul(U256::from(LOAN_SUPPLY_CAP), fraction)?;
        Ok(raw / math::one())
    }
}
