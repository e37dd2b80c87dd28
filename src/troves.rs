//! Trove Records and the Seams Around Them
//!
//! Trove lifecycle, interest and liquidation *selection* live outside this
//! crate. What the Stability Pool core needs from that world is small: a
//! record of collateral/debt per owner, the lowest collateral ratio in the
//! system (the withdrawal gate), a price to evaluate it at, and a way for
//! Borrower Operations to fold a rerouted collateral gain into a trove.

use crate::collateral_token::CollateralToken;
use crate::constants::ratios::MCR;
use crate::errors::{FurUsdError, FurUsdResult};
use crate::events::EventLog;
use crate::math;
use crate::pools::ActivePool;
use crate::stablecoin::StableCoin;
use crate::types::{Address, AddressBook, Trove, TroveStatus};
use crate::BTreeMap;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

// ============================================================================
// Price Feed
// ============================================================================

/// The price fetch seam. Oracle aggregation, staleness and deviation
/// policy are out of scope; operations consume whatever the feed last saw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceFeed {
    price: U256,
}

impl PriceFeed {
    /// Creates a feed with an initial FURFI/FURUSD price (18 decimals)
    pub fn new(price: U256) -> Self {
        Self { price }
    }

    /// Latest price
    pub fn fetch_price(&self) -> U256 {
        self.price
    }

    /// Push a new price
    pub fn set_price(&mut self, price: U256) {
        self.price = price;
    }
}

// ============================================================================
// Trove Manager
// ============================================================================

/// Registry of trove records. The real manager also owns redemption and
/// liquidation sequencing; here it carries exactly the read surface the
/// Stability Pool consumes plus the record mutators its collaborators use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TroveManager {
    #[serde(with = "crate::types::serde_address_map")]
    troves: BTreeMap<Address, Trove>,
    book: AddressBook,
}

impl TroveManager {
    /// Creates an empty registry wired to the collaborator registry
    pub fn new(book: AddressBook) -> Self {
        Self {
            troves: BTreeMap::new(),
            book,
        }
    }

    /// Look up a trove record
    pub fn trove(&self, owner: &Address) -> Option<&Trove> {
        self.troves.get(owner)
    }

    /// True if the owner has an open trove
    pub fn has_active_trove(&self, owner: &Address) -> bool {
        self.troves.get(owner).map(Trove::is_active).unwrap_or(false)
    }

    /// Record a freshly opened trove. Borrower Operations only.
    pub fn open_trove_record(
        &mut self,
        caller: Address,
        owner: Address,
        collateral: U256,
        debt: U256,
    ) -> FurUsdResult<()> {
        if caller != self.book.borrower_operations {
            return Err(FurUsdError::Unauthorized {
                expected: self.book.borrower_operations,
                actual: caller,
            });
        }
        self.troves.insert(owner, Trove::new(owner, collateral, debt));
        Ok(())
    }

    /// Fold collateral into an open trove. Borrower Operations only.
    pub fn add_collateral(
        &mut self,
        caller: Address,
        owner: Address,
        amount: U256,
    ) -> FurUsdResult<()> {
        if caller != self.book.borrower_operations {
            return Err(FurUsdError::Unauthorized {
                expected: self.book.borrower_operations,
                actual: caller,
            });
        }
        let trove = self
            .troves
            .get_mut(&owner)
            .filter(|t| t.is_active())
            .ok_or(FurUsdError::NoTrove { owner })?;
        trove.collateral = math::checked_add(trove.collateral, amount)?;
        Ok(())
    }

    /// Mark a trove closed, zeroing its totals. Used by the liquidation
    /// driver under the Trove Manager's own authority.
    pub fn close_trove_record(
        &mut self,
        caller: Address,
        owner: Address,
        status: TroveStatus,
    ) -> FurUsdResult<()> {
        if caller != self.book.trove_manager && caller != self.book.borrower_operations {
            return Err(FurUsdError::Unauthorized {
                expected: self.book.trove_manager,
                actual: caller,
            });
        }
        let trove = self
            .troves
            .get_mut(&owner)
            .ok_or(FurUsdError::NoTrove { owner })?;
        trove.collateral = U256::zero();
        trove.debt = U256::zero();
        trove.status = status;
        Ok(())
    }

    /// ICR of the riskiest active trove, if any. This is the sorted-list
    /// tail read; withdrawal gating only needs the minimum.
    pub fn lowest_icr(&self, price: U256) -> FurUsdResult<Option<U256>> {
        let mut lowest: Option<U256> = None;
        for trove in self.troves.values().filter(|t| t.is_active()) {
            let icr = math::compute_icr(trove.collateral, trove.debt, price)?;
            lowest = Some(match lowest {
                Some(current) if current <= icr => current,
                _ => icr,
            });
        }
        Ok(lowest)
    }

    /// True if any active trove sits below MCR at the given price
    pub fn has_undercollateralized_trove(&self, price: U256) -> FurUsdResult<bool> {
        Ok(match self.lowest_icr(price)? {
            Some(icr) => icr < U256::from(MCR),
            None => false,
        })
    }
}

// ============================================================================
// Borrower Operations
// ============================================================================

/// The slice of Borrower Operations the core interacts with: opening a
/// bare trove record (fees, hints and recovery-mode policy are out of
/// scope) and receiving rerouted collateral gains from the Stability Pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowerOperations {
    book: AddressBook,
}

impl BorrowerOperations {
    /// Creates the component wired to the collaborator registry
    pub fn new(book: AddressBook) -> Self {
        Self { book }
    }

    /// Open a trove: move collateral in, record the position, draw debt
    pub fn open_trove(
        &self,
        events: &mut EventLog,
        caller: Address,
        collateral: U256,
        debt: U256,
        price: U256,
        troves: &mut TroveManager,
        active_pool: &mut ActivePool,
        stablecoin: &mut StableCoin,
        token: &mut CollateralToken,
    ) -> FurUsdResult<()> {
        if collateral.is_zero() || debt.is_zero() {
            return Err(FurUsdError::ZeroAmount);
        }
        let icr = math::compute_icr(collateral, debt, price)?;
        if icr < U256::from(MCR) {
            return Err(FurUsdError::IcrBelowMcr {
                icr_lo: math::lo(icr),
            });
        }

        token.transfer(caller, self.book.active_pool, collateral)?;
        troves.open_trove_record(self.book.borrower_operations, caller, collateral, debt)?;
        active_pool.receive_furfi(self.book.borrower_operations, collateral)?;
        active_pool.increase_furusd_debt(self.book.borrower_operations, debt)?;
        stablecoin.mint(events, self.book.borrower_operations, caller, debt)
    }

    /// Fold a depositor's collateral gain into their trove. Stability
    /// Pool only. The hints locate the trove's new position in the sorted
    /// list; reinsertion ordering is out of scope here, so they are
    /// accepted and unused.
    pub fn move_furfi_gain_to_trove(
        &self,
        caller: Address,
        depositor: Address,
        amount: U256,
        _upper_hint: Address,
        _lower_hint: Address,
        troves: &mut TroveManager,
        active_pool: &mut ActivePool,
        token: &mut CollateralToken,
    ) -> FurUsdResult<()> {
        if caller != self.book.stability_pool {
            return Err(FurUsdError::Unauthorized {
                expected: self.book.stability_pool,
                actual: caller,
            });
        }
        if !troves.has_active_trove(&depositor) {
            return Err(FurUsdError::NoTrove { owner: depositor });
        }
        troves.add_collateral(self.book.borrower_operations, depositor, amount)?;
        active_pool.receive_furfi(self.book.borrower_operations, amount)?;
        token.transfer(self.book.stability_pool, self.book.active_pool, amount)
    }
}
