//! Ledger Pools
//!
//! Pure accumulators with gated mutators. Each pool mirrors the collateral
//! it controls with an internal counter; external credits to a pool's
//! token address are deliberately ignored by the accounting, so a forced
//! send can never poison protocol totals.
//!
//! - **ActivePool**: collateral and debt of all active troves
//! - **DefaultPool**: redistributed-but-unapplied amounts
//! - **CollSurplusPool**: per-address claimable leftovers after
//!   liquidation with surplus

use crate::collateral_token::CollateralToken;
use crate::errors::{FurUsdError, FurUsdResult};
use crate::events::{EventLog, ProtocolEvent};
use crate::math;
use crate::types::{Address, AddressBook};
use crate::BTreeMap;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

// ============================================================================
// Active Pool
// ============================================================================

/// Tracks the collateral and debt backing all active troves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePool {
    furfi: U256,
    furusd_debt: U256,
    book: AddressBook,
}

impl ActivePool {
    /// Creates an empty pool wired to the collaborator registry
    pub fn new(book: AddressBook) -> Self {
        Self {
            furfi: U256::zero(),
            furusd_debt: U256::zero(),
            book,
        }
    }

    /// Mirrored FURFI under this pool's control
    pub fn furfi(&self) -> U256 {
        self.furfi
    }

    /// Aggregate FURUSD debt of active troves
    pub fn furusd_debt(&self) -> U256 {
        self.furusd_debt
    }

    /// Record collateral arriving from Borrower Operations or the
    /// Default Pool. The token-ledger move is the sender's responsibility.
    pub fn receive_furfi(&mut self, caller: Address, amount: U256) -> FurUsdResult<()> {
        if caller != self.book.borrower_operations && caller != self.book.default_pool {
            return Err(FurUsdError::Unauthorized {
                expected: self.book.borrower_operations,
                actual: caller,
            });
        }
        self.furfi = math::checked_add(self.furfi, amount)?;
        Ok(())
    }

    /// Release collateral toward `to`, moving both the internal counter
    /// and the underlying token balance
    pub fn send_furfi(
        &mut self,
        caller: Address,
        to: Address,
        amount: U256,
        token: &mut CollateralToken,
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
        self.furfi = math::checked_sub(self.furfi, amount)?;
        token.transfer(self.book.active_pool, to, amount)
    }

    /// Record freshly drawn debt. Borrower Operations only.
    pub fn increase_furusd_debt(&mut self, caller: Address, amount: U256) -> FurUsdResult<()> {
        if caller != self.book.borrower_operations {
            return Err(FurUsdError::Unauthorized {
                expected: self.book.borrower_operations,
                actual: caller,
            });
        }
        self.furusd_debt = math::checked_add(self.furusd_debt, amount)?;
        Ok(())
    }

    /// Record debt cancelled by repayment or a Stability Pool offset
    pub fn decrease_furusd_debt(&mut self, caller: Address, amount: U256) -> FurUsdResult<()> {
        if caller != self.book.borrower_operations
            && caller != self.book.trove_manager
            && caller != self.book.stability_pool
        {
            return Err(FurUsdError::Unauthorized {
                expected: self.book.stability_pool,
                actual: caller,
            });
        }
        self.furusd_debt = math::checked_sub(self.furusd_debt, amount)?;
        Ok(())
    }
}

// ============================================================================
// Default Pool
// ============================================================================

/// Holds debt and collateral redistributed by liquidations until troves
/// apply their pending portions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultPool {
    furfi: U256,
    furusd_debt: U256,
    book: AddressBook,
}

impl DefaultPool {
    /// Creates an empty pool wired to the collaborator registry
    pub fn new(book: AddressBook) -> Self {
        Self {
            furfi: U256::zero(),
            furusd_debt: U256::zero(),
            book,
        }
    }

    /// Mirrored FURFI pending redistribution
    pub fn furfi(&self) -> U256 {
        self.furfi
    }

    /// FURUSD debt pending redistribution
    pub fn furusd_debt(&self) -> U256 {
        self.furusd_debt
    }

    /// Record collateral arriving from the Active Pool. Trove Manager only.
    pub fn receive_furfi(&mut self, caller: Address, amount: U256) -> FurUsdResult<()> {
        if caller != self.book.trove_manager {
            return Err(FurUsdError::Unauthorized {
                expected: self.book.trove_manager,
                actual: caller,
            });
        }
        self.furfi = math::checked_add(self.furfi, amount)?;
        Ok(())
    }

    /// Return collateral to the Active Pool as troves apply their pending
    /// redistribution. Trove Manager only.
    pub fn send_furfi_to_active(
        &mut self,
        caller: Address,
        amount: U256,
        active: &mut ActivePool,
        token: &mut CollateralToken,
    ) -> FurUsdResult<()> {
        if caller != self.book.trove_manager {
            return Err(FurUsdError::Unauthorized {
                expected: self.book.trove_manager,
                actual: caller,
            });
        }
        self.furfi = math::checked_sub(self.furfi, amount)?;
        active.receive_furfi(self.book.default_pool, amount)?;
        token.transfer(self.book.default_pool, self.book.active_pool, amount)
    }

    /// Record redistributed debt. Trove Manager only.
    pub fn increase_furusd_debt(&mut self, caller: Address, amount: U256) -> FurUsdResult<()> {
        if caller != self.book.trove_manager {
            return Err(FurUsdError::Unauthorized {
                expected: self.book.trove_manager,
                actual: caller,
            });
        }
        self.furusd_debt = math::checked_add(self.furusd_debt, amount)?;
        Ok(())
    }

    /// Record applied redistribution. Trove Manager only.
    pub fn decrease_furusd_debt(&mut self, caller: Address, amount: U256) -> FurUsdResult<()> {
        if caller != self.book.trove_manager {
            return Err(FurUsdError::Unauthorized {
                expected: self.book.trove_manager,
                actual: caller,
            });
        }
        self.furusd_debt = math::checked_sub(self.furusd_debt, amount)?;
        Ok(())
    }
}

// ============================================================================
// Collateral Surplus Pool
// ============================================================================

/// Per-address claimable collateral left over when a liquidation seizes
/// less than the full trove collateral
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollSurplusPool {
    furfi: U256,
    #[serde(with = "crate::types::serde_address_map")]
    claimable: BTreeMap<Address, U256>,
    book: AddressBook,
}

impl CollSurplusPool {
    /// Creates an empty pool wired to the collaborator registry
    pub fn new(book: AddressBook) -> Self {
        Self {
            furfi: U256::zero(),
            claimable: BTreeMap::new(),
            book,
        }
    }

    /// Mirrored FURFI held for claimants
    pub fn furfi(&self) -> U256 {
        self.furfi
    }

    /// Claimable surplus recorded for an address
    pub fn claimable(&self, owner: &Address) -> U256 {
        self.claimable.get(owner).copied().unwrap_or_default()
    }

    /// Record a liquidation surplus for its former trove owner.
    /// Trove Manager only.
    pub fn account_surplus(
        &mut self,
        events: &mut EventLog,
        caller: Address,
        owner: Address,
        amount: U256,
    ) -> FurUsdResult<()> {
        if caller != self.book.trove_manager {
            return Err(FurUsdError::Unauthorized {
                expected: self.book.trove_manager,
                actual: caller,
            });
        }
        let entry = self.claimable.entry(owner).or_default();
        *entry = math::checked_add(*entry, amount)?;
        self.furfi = math::checked_add(self.furfi, amount)?;
        events.emit(ProtocolEvent::SurplusAccrued {
            owner,
            amount: *entry,
        });
        Ok(())
    }

    /// Pay out and clear an address's surplus record
    pub fn claim(
        &mut self,
        events: &mut EventLog,
        owner: Address,
        token: &mut CollateralToken,
    ) -> FurUsdResult<U256> {
        let amount = self
            .claimable
            .remove(&owner)
            .ok_or(FurUsdError::SurplusNotFound { owner })?;
        self.furfi = math::checked_sub(self.furfi, amount)?;
        token.transfer(self.book.coll_surplus_pool, owner, amount)?;
        events.emit(ProtocolEvent::SurplusClaimed { owner, amount });
        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::token::ONE;

    fn book() -> AddressBook {
        AddressBook {
            stablecoin: [10u8; 32],
            loan_token: [11u8; 32],
            community_issuance: [12u8; 32],
            stability_pool: [13u8; 32],
            trove_manager: [14u8; 32],
            borrower_operations: [15u8; 32],
            active_pool: [16u8; 32],
            default_pool: [17u8; 32],
            coll_surplus_pool: [18u8; 32],
            multisig: [19u8; 32],
        }
    }

    fn dec(n: u128) -> U256 {
        U256::from(n) * U256::from(ONE)
    }

    #[test]
    fn test_active_pool_counters_are_gated() {
        let b = book();
        let mut pool = ActivePool::new(b);

        let err = pool.increase_furusd_debt([1u8; 32], dec(10));
        assert!(matches!(err, Err(FurUsdError::Unauthorized { .. })));

        pool.increase_furusd_debt(b.borrower_operations, dec(10)).unwrap();
        pool.decrease_furusd_debt(b.stability_pool, dec(4)).unwrap();
        assert_eq!(pool.furusd_debt(), dec(6));

        let err = pool.decrease_furusd_debt(b.trove_manager, dec(100));
        assert!(matches!(err, Err(FurUsdError::Underflow)));
    }

    #[test]
    fn test_active_pool_send_moves_counter_and_token() {
        let b = book();
        let mut pool = ActivePool::new(b);
        let mut token = CollateralToken::new();
        token.deposit(b.active_pool, dec(5)).unwrap();
        pool.receive_furfi(b.borrower_operations, dec(5)).unwrap();

        pool.send_furfi(b.stability_pool, b.stability_pool, dec(2), &mut token)
            .unwrap();
        assert_eq!(pool.furfi(), dec(3));
        assert_eq!(token.balance_of(&b.stability_pool), dec(2));
        assert_eq!(token.balance_of(&b.active_pool), dec(3));
    }

    #[test]
    fn test_default_pool_round_trip() {
        let b = book();
        let mut active = ActivePool::new(b);
        let mut default_pool = DefaultPool::new(b);
        let mut token = CollateralToken::new();
        token.deposit(b.default_pool, dec(4)).unwrap();

        default_pool.receive_furfi(b.trove_manager, dec(4)).unwrap();
        default_pool.increase_furusd_debt(b.trove_manager, dec(100)).unwrap();

        default_pool
            .send_furfi_to_active(b.trove_manager, dec(4), &mut active, &mut token)
            .unwrap();
        default_pool
            .decrease_furusd_debt(b.trove_manager, dec(100))
            .unwrap();

        assert!(default_pool.furfi().is_zero());
        assert!(default_pool.furusd_debt().is_zero());
        assert_eq!(active.furfi(), dec(4));
        assert_eq!(token.balance_of(&b.active_pool), dec(4));
    }

    #[test]
    fn test_surplus_accrue_and_claim() {
        let b = book();
        let mut surplus = CollSurplusPool::new(b);
        let mut token = CollateralToken::new();
        let mut events = EventLog::new();
        let owner = [1u8; 32];
        token.deposit(b.coll_surplus_pool, dec(3)).unwrap();

        surplus
            .account_surplus(&mut events, b.trove_manager, owner, dec(3))
            .unwrap();
        assert_eq!(surplus.claimable(&owner), dec(3));

        let claimed = surplus.claim(&mut events, owner, &mut token).unwrap();
        assert_eq!(claimed, dec(3));
        assert_eq!(token.balance_of(&owner), dec(3));
        assert!(surplus.claimable(&owner).is_zero());

        let err = surplus.claim(&mut events, owner, &mut token);
        assert!(matches!(err, Err(FurUsdError::SurplusNotFound { .. })));
    }
}
