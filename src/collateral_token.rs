//! FURFI Collateral Ledger
//!
//! Minimal fungible ledger for the collateral asset. The protocol pools
//! mirror their holdings with internal counters; this ledger is the
//! settlement layer those counters reconcile against when collateral
//! actually moves between protocol addresses and users.

use crate::errors::{FurUsdError, FurUsdResult};
use crate::math;
use crate::types::Address;
use crate::BTreeMap;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// FURFI balance ledger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralToken {
    #[serde(with = "crate::types::serde_address_map")]
    balances: BTreeMap<Address, U256>,
}

impl CollateralToken {
    /// Creates an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of an address
    pub fn balance_of(&self, who: &Address) -> U256 {
        self.balances.get(who).copied().unwrap_or_default()
    }

    /// Credit collateral entering the system (test fixtures, deposits
    /// arriving from outside)
    pub fn deposit(&mut self, to: Address, amount: U256) -> FurUsdResult<()> {
        let entry = self.balances.entry(to).or_default();
        *entry = math::checked_add(*entry, amount)?;
        Ok(())
    }

    /// Move collateral between addresses
    pub fn transfer(&mut self, from: Address, to: Address, amount: U256) -> FurUsdResult<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let balance = self.balance_of(&from);
        if balance < amount {
            return Err(FurUsdError::InsufficientBalance {
                available_lo: math::lo(balance),
                requested_lo: math::lo(amount),
            });
        }
        self.balances.insert(from, balance - amount);
        let entry = self.balances.entry(to).or_default();
        *entry = math::checked_add(*entry, amount)?;
        Ok(())
    }
}
