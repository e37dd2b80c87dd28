//! FURUSD Stablecoin Ledger
//!
//! Transferable balance ledger for the debt unit with privileged entry
//! points for the wired protocol collaborators:
//!
//! - **Mint**: Borrower Operations only
//! - **Burn**: Borrower Operations, Trove Manager or Stability Pool
//! - **Pool moves**: Stability Pool pulls deposits in and returns them out
//! - **Recipient validation**: direct transfers into protocol pools are
//!   rejected; deposits must use the dedicated entry points

use crate::errors::{FurUsdError, FurUsdResult};
use crate::events::{EventLog, ProtocolEvent, TokenKind};
use crate::math;
use crate::types::{Address, AddressBook};
use crate::BTreeMap;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// FURUSD balance ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StableCoin {
    #[serde(with = "crate::types::serde_address_map")]
    balances: BTreeMap<Address, U256>,
    total_supply: U256,
    book: AddressBook,
}

impl StableCoin {
    /// Creates an empty ledger wired to the collaborator registry
    pub fn new(book: AddressBook) -> Self {
        Self {
            balances: BTreeMap::new(),
            total_supply: U256::zero(),
            book,
        }
    }

    /// Balance of an address
    pub fn balance_of(&self, who: &Address) -> U256 {
        self.balances.get(who).copied().unwrap_or_default()
    }

    /// Total FURUSD in circulation
    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    /// Mint new FURUSD against freshly drawn debt. Borrower Operations only.
    pub fn mint(
        &mut self,
        events: &mut EventLog,
        caller: Address,
        to: Address,
        amount: U256,
    ) -> FurUsdResult<()> {
        if caller != self.book.borrower_operations {
            return Err(FurUsdError::Unauthorized {
                expected: self.book.borrower_operations,
                actual: caller,
            });
        }
        self.credit(to, amount)?;
        self.total_supply = math::checked_add(self.total_supply, amount)?;
        events.emit(ProtocolEvent::TokenMint {
            kind: TokenKind::Stablecoin,
            to,
            amount,
            new_total_supply: self.total_supply,
        });
        Ok(())
    }

    /// Burn FURUSD out of an account (repayment or liquidation offset)
    pub fn burn(
        &mut self,
        events: &mut EventLog,
        caller: Address,
        from: Address,
        amount: U256,
    ) -> FurUsdResult<()> {
        if caller != self.book.borrower_operations
            && caller != self.book.trove_manager
            && caller != self.book.stability_pool
        {
            return Err(FurUsdError::Unauthorized {
                expected: self.book.trove_manager,
                actual: caller,
            });
        }
        self.debit(from, amount)?;
        self.total_supply = math::checked_sub(self.total_supply, amount)?;
        events.emit(ProtocolEvent::TokenBurn {
            kind: TokenKind::Stablecoin,
            from,
            amount,
            new_total_supply: self.total_supply,
        });
        Ok(())
    }

    /// Debit a depositor, credit the Stability Pool. Stability Pool only.
    pub fn send_to_pool(
        &mut self,
        events: &mut EventLog,
        caller: Address,
        from: Address,
        pool: Address,
        amount: U256,
    ) -> FurUsdResult<()> {
        if caller != self.book.stability_pool {
            return Err(FurUsdError::Unauthorized {
                expected: self.book.stability_pool,
                actual: caller,
            });
        }
        self.move_balance(events, from, pool, amount)
    }

    /// Debit the Stability Pool, credit a depositor
    pub fn return_from_pool(
        &mut self,
        events: &mut EventLog,
        caller: Address,
        pool: Address,
        to: Address,
        amount: U256,
    ) -> FurUsdResult<()> {
        if caller != self.book.stability_pool && caller != self.book.trove_manager {
            return Err(FurUsdError::Unauthorized {
                expected: self.book.stability_pool,
                actual: caller,
            });
        }
        self.move_balance(events, pool, to, amount)
    }

    /// User-facing transfer with recipient validation
    pub fn transfer(
        &mut self,
        events: &mut EventLog,
        from: Address,
        to: Address,
        amount: U256,
    ) -> FurUsdResult<()> {
        if to == self.book.stablecoin
            || to == self.book.active_pool
            || to == self.book.default_pool
            || to == self.book.stability_pool
        {
            return Err(FurUsdError::InvalidRecipient { to });
        }
        self.move_balance(events, from, to, amount)
    }

    fn move_balance(
        &mut self,
        events: &mut EventLog,
        from: Address,
        to: Address,
        amount: U256,
    ) -> FurUsdResult<()> {
        if amount.is_zero() {
            return Err(FurUsdError::ZeroAmount);
        }
        self.debit(from, amount)?;
        self.credit(to, amount)?;
        events.emit(ProtocolEvent::TokenTransfer {
            kind: TokenKind::Stablecoin,
            from,
            to,
            amount,
        });
        Ok(())
    }

    fn credit(&mut self, who: Address, amount: U256) -> FurUsdResult<()> {
        let entry = self.balances.entry(who).or_default();
        *entry = math::checked_add(*entry, amount)?;
        Ok(())
    }

    fn debit(&mut self, who: Address, amount: U256) -> FurUsdResult<()> {
        let balance = self.balance_of(&who);
        if balance < amount {
            return Err(FurUsdError::InsufficientBalance {
                available_lo: math::lo(balance),
                requested_lo: math::lo(amount),
            });
        }
        self.balances.insert(who, balance - amount);
        Ok(())
    }
}
