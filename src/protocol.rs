//! Protocol Wiring and Dispatch
//!
//! One long-lived value owns every component, wired exactly once at
//! genesis. Entry points run under a commit-or-rollback discipline: the
//! state is checkpointed, the operation executes, and any error restores
//! the checkpoint, so a fault in any collaborator can never leave a
//! partial commit behind. Requests are strictly serialized because every
//! entry point takes `&mut self`; no operation can re-enter another
//! mid-flight.

use crate::collateral_token::CollateralToken;
use crate::constants::ratios::MCR;
use crate::errors::{FurUsdError, FurUsdResult};
use crate::events::EventLog;
use crate::issuance::CommunityIssuance;
use crate::loan_token::LoanToken;
use crate::math;
use crate::pools::{ActivePool, CollSurplusPool, DefaultPool};
use crate::stability_pool::{SpContext, StabilityPool};
use crate::stablecoin::StableCoin;
use crate::troves::{BorrowerOperations, PriceFeed, TroveManager};
use crate::types::{Address, AddressBook, Trove, TroveStatus};
use crate::vesting::VestingRegistry;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Everything the system needs to come to life
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisConfig {
    /// Collaborator identities
    pub book: AddressBook,
    /// Deployment timestamp; anchors issuance and the LOAN transfer lock
    pub deployment_time: u64,
    /// Initial FURFI/FURUSD price
    pub initial_price: U256,
}

/// The wired protocol: all components plus the shared event log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protocol {
    book: AddressBook,
    stablecoin: StableCoin,
    collateral: CollateralToken,
    loan: LoanToken,
    issuance: CommunityIssuance,
    registry: VestingRegistry,
    active_pool: ActivePool,
    default_pool: DefaultPool,
    coll_surplus_pool: CollSurplusPool,
    trove_manager: TroveManager,
    borrower_operations: BorrowerOperations,
    price_feed: PriceFeed,
    stability_pool: StabilityPool,
    events: EventLog,
}

impl Protocol {
    /// Build and wire every component. The Stability Pool's collaborator
    /// registry is wired here, exactly once.
    pub fn new(genesis: GenesisConfig) -> FurUsdResult<Self> {
        let book = genesis.book;
        let mut stability_pool = StabilityPool::new();
        stability_pool.wire(book)?;

        Ok(Self {
            book,
            stablecoin: StableCoin::new(book),
            collateral: CollateralToken::new(),
            loan: LoanToken::new(book, genesis.deployment_time),
            issuance: CommunityIssuance::new(book, genesis.deployment_time),
            registry: VestingRegistry::new(genesis.deployment_time),
            active_pool: ActivePool::new(book),
            default_pool: DefaultPool::new(book),
            coll_surplus_pool: CollSurplusPool::new(book),
            trove_manager: TroveManager::new(book),
            borrower_operations: BorrowerOperations::new(book),
            price_feed: PriceFeed::new(genesis.initial_price),
            stability_pool,
            events: EventLog::new(),
        })
    }

    /// Checkpoint, run, and roll back on error. The whole state is the
    /// unit of atomicity.
    fn transact<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> FurUsdResult<T>,
    ) -> FurUsdResult<T> {
        let checkpoint = self.clone();
        match op(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                *self = checkpoint;
                Err(err)
            }
        }
    }

    fn split(&mut self, caller: Address, now: u64) -> (&mut StabilityPool, SpContext<'_>) {
        (
            &mut self.stability_pool,
            SpContext {
                caller,
                now,
                stablecoin: &mut self.stablecoin,
                collateral: &mut self.collateral,
                loan: &mut self.loan,
                issuance: &mut self.issuance,
                registry: &self.registry,
                active_pool: &mut self.active_pool,
                trove_manager: &mut self.trove_manager,
                borrower_operations: &self.borrower_operations,
                price_feed: &self.price_feed,
                events: &mut self.events,
            },
        )
    }

    // ========================================================================
    // Stability Pool entry points
    // ========================================================================

    /// Deposit FURUSD into the Stability Pool
    pub fn provide_to_stability_pool(
        &mut self,
        caller: Address,
        amount: U256,
        front_end_tag: Option<Address>,
        now: u64,
    ) -> FurUsdResult<()> {
        self.transact(|p| {
            let (pool, mut ctx) = p.split(caller, now);
            pool.provide_to_stability_pool(&mut ctx, amount, front_end_tag)
        })
    }

    /// Withdraw FURUSD from the Stability Pool; zero claims gains only
    pub fn withdraw_from_stability_pool(
        &mut self,
        caller: Address,
        amount: U256,
        now: u64,
    ) -> FurUsdResult<()> {
        self.transact(|p| {
            let (pool, mut ctx) = p.split(caller, now);
            pool.withdraw_from_stability_pool(&mut ctx, amount)
        })
    }

    /// Reroute the caller's collateral gain into their trove
    pub fn withdraw_furfi_gain_to_trove(
        &mut self,
        caller: Address,
        upper_hint: Address,
        lower_hint: Address,
        now: u64,
    ) -> FurUsdResult<()> {
        self.transact(|p| {
            let (pool, mut ctx) = p.split(caller, now);
            pool.withdraw_furfi_gain_to_trove(&mut ctx, upper_hint, lower_hint)
        })
    }

    /// Register the caller as a front end with an immutable kickback rate
    pub fn register_front_end(
        &mut self,
        caller: Address,
        kickback_rate: U256,
    ) -> FurUsdResult<()> {
        self.transact(|p| {
            p.stability_pool
                .register_front_end(&mut p.events, caller, kickback_rate)
        })
    }

    /// Offset liquidated debt against the pool. The caller must present
    /// the Trove Manager's identity.
    pub fn offset(
        &mut self,
        caller: Address,
        debt_to_offset: U256,
        coll_to_add: U256,
        now: u64,
    ) -> FurUsdResult<()> {
        self.transact(|p| {
            let (pool, mut ctx) = p.split(caller, now);
            pool.offset(&mut ctx, debt_to_offset, coll_to_add)
        })
    }

    // ========================================================================
    // Trove entry points
    // ========================================================================

    /// Open a trove for the caller: collateral in, FURUSD out
    pub fn open_trove(
        &mut self,
        caller: Address,
        collateral: U256,
        debt: U256,
    ) -> FurUsdResult<()> {
        self.transact(|p| {
            let price = p.price_feed.fetch_price();
            p.borrower_operations.open_trove(
                &mut p.events,
                caller,
                collateral,
                debt,
                price,
                &mut p.trove_manager,
                &mut p.active_pool,
                &mut p.stablecoin,
                &mut p.collateral,
            )
        })
    }

    /// Liquidate one under-collateralized trove: offset as much debt as
    /// the pool can absorb, redistribute the remainder to the Default
    /// Pool's ledger.
    pub fn liquidate(&mut self, owner: Address, now: u64) -> FurUsdResult<()> {
        self.transact(|p| {
            let price = p.price_feed.fetch_price();
            let trove = p
                .trove_manager
                .trove(&owner)
                .filter(|t| t.is_active())
                .cloned()
                .ok_or(FurUsdError::NoTrove { owner })?;

            let icr = math::compute_icr(trove.collateral, trove.debt, price)?;
            if icr >= U256::from(MCR) {
                return Err(FurUsdError::TroveNotLiquidatable {
                    icr_lo: math::lo(icr),
                });
            }

            let total_deposits = p.stability_pool.total_furusd_deposits();
            let debt_to_offset = trove.debt.min(total_deposits);
            let coll_to_offset = if trove.debt.is_zero() {
                U256::zero()
            } else {
                math::checked_mul(trove.collateral, debt_to_offset)? / trove.debt
            };
            let debt_to_redistribute = math::checked_sub(trove.debt, debt_to_offset)?;
            let coll_to_redistribute = math::checked_sub(trove.collateral, coll_to_offset)?;

            let tm = p.book.trove_manager;
            p.trove_manager
                .close_trove_record(tm, owner, TroveStatus::Liquidated)?;

            if !debt_to_offset.is_zero() {
                let (pool, mut ctx) = p.split(tm, now);
                pool.offset(&mut ctx, debt_to_offset, coll_to_offset)?;
            }

            if !debt_to_redistribute.is_zero() || !coll_to_redistribute.is_zero() {
                p.active_pool.decrease_furusd_debt(tm, debt_to_redistribute)?;
                p.default_pool.increase_furusd_debt(tm, debt_to_redistribute)?;
                p.active_pool.send_furfi(
                    tm,
                    p.book.default_pool,
                    coll_to_redistribute,
                    &mut p.collateral,
                )?;
                p.default_pool.receive_furfi(tm, coll_to_redistribute)?;
            }
            Ok(())
        })
    }

    /// Claim a liquidation surplus recorded for the caller
    pub fn claim_surplus(&mut self, caller: Address) -> FurUsdResult<U256> {
        self.transact(|p| {
            p.coll_surplus_pool
                .claim(&mut p.events, caller, &mut p.collateral)
        })
    }

    // ========================================================================
    // Token, vesting and fixture entry points
    // ========================================================================

    /// User-facing FURUSD transfer
    pub fn transfer_furusd(
        &mut self,
        from: Address,
        to: Address,
        amount: U256,
    ) -> FurUsdResult<()> {
        self.transact(|p| p.stablecoin.transfer(&mut p.events, from, to, amount))
    }

    /// User-facing LOAN transfer, subject to the first-year admin rules
    pub fn transfer_loan(
        &mut self,
        from: Address,
        to: Address,
        amount: U256,
        now: u64,
    ) -> FurUsdResult<()> {
        self.transact(|p| {
            p.loan
                .transfer(&mut p.events, &p.registry, from, to, amount, now)
        })
    }

    /// Deploy a vesting lock through the registry
    pub fn deploy_vesting_lock(
        &mut self,
        deployer: Address,
        beneficiary: Address,
        unlock_time: u64,
    ) -> FurUsdResult<Address> {
        self.transact(|p| {
            p.registry
                .deploy_lock(&mut p.events, deployer, beneficiary, unlock_time)
        })
    }

    /// Release a due vesting lock to its beneficiary
    pub fn withdraw_from_lock(
        &mut self,
        caller: Address,
        lock: Address,
        now: u64,
    ) -> FurUsdResult<U256> {
        self.transact(|p| {
            p.registry
                .withdraw_from_lock(&mut p.events, caller, lock, now, &mut p.loan)
        })
    }

    /// Credit FURFI arriving from outside the system (exchange
    /// withdrawals, bridge inflows); the seam tests seed balances through
    pub fn fund_collateral(&mut self, to: Address, amount: U256) -> FurUsdResult<()> {
        self.transact(|p| p.collateral.deposit(to, amount))
    }

    /// Push a new collateral price
    pub fn set_price(&mut self, price: U256) {
        self.price_feed.set_price(price);
    }

    // ========================================================================
    // Views
    // ========================================================================

    /// Collaborator identities
    pub fn book(&self) -> &AddressBook {
        &self.book
    }

    /// The Stability Pool state (all pool views hang off this)
    pub fn stability_pool(&self) -> &StabilityPool {
        &self.stability_pool
    }

    /// FURUSD ledger
    pub fn stablecoin(&self) -> &StableCoin {
        &self.stablecoin
    }

    /// FURFI ledger
    pub fn collateral(&self) -> &CollateralToken {
        &self.collateral
    }

    /// LOAN ledger
    pub fn loan(&self) -> &LoanToken {
        &self.loan
    }

    /// Issuance schedule state
    pub fn issuance(&self) -> &CommunityIssuance {
        &self.issuance
    }

    /// Lock registry
    pub fn registry(&self) -> &VestingRegistry {
        &self.registry
    }

    /// Active Pool ledger
    pub fn active_pool(&self) -> &ActivePool {
        &self.active_pool
    }

    /// Default Pool ledger
    pub fn default_pool(&self) -> &DefaultPool {
        &self.default_pool
    }

    /// Surplus ledger
    pub fn coll_surplus_pool(&self) -> &CollSurplusPool {
        &self.coll_surplus_pool
    }

    /// Trove records
    pub fn trove(&self, owner: &Address) -> Option<&Trove> {
        self.trove_manager.trove(owner)
    }

    /// Latest price
    pub fn price(&self) -> U256 {
        self.price_feed.fetch_price()
    }

    /// Everything emitted so far
    pub fn events(&self) -> &EventLog {
        &self.events
    }
}
