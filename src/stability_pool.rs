//! Stability Pool
//!
//! The liquidation accounting engine. Depositors pool FURUSD; the Trove
//! Manager offsets liquidated debt against the pool, which cancels the
//! debt pro rata across deposits and distributes the seized FURFI as a
//! gain. A time-scheduled LOAN stream is distributed the same way, split
//! between depositors and their front-end referrers.
//!
//! ## The product-sum accumulator
//!
//! Per-depositor results derive in O(1) from a running product `P` and
//! per-(epoch, scale) running sums `S` (collateral) and `G` (LOAN). For a
//! deposit of `d0` snapshotted at `(P0, S0, G0)`:
//!
//! - compounded deposit: `d0 * P / P0`
//! - collateral gain:    `d0 * (S - S0) / P0 / ONE`
//! - LOAN gain:          `d0 * (G - G0) / P0 / ONE`
//!
//! `scale` increments whenever an offset would push `P` below 1e9,
//! multiplying `P` back up by `SCALE_FACTOR`; `epoch` increments when the
//! pool is emptied outright, invalidating every older stake. Integer
//! division residues feed back into the next offset through the three
//! error trackers, so precision loss never compounds.

use crate::collateral_token::CollateralToken;
use crate::constants::stability_pool::SCALE_FACTOR;
use crate::errors::{FurUsdError, FurUsdResult};
use crate::events::{EventLog, ProtocolEvent};
use crate::issuance::CommunityIssuance;
use crate::loan_token::LoanToken;
use crate::math;
use crate::pools::ActivePool;
use crate::stablecoin::StableCoin;
use crate::troves::{BorrowerOperations, PriceFeed, TroveManager};
use crate::types::{Address, AddressBook, Deposit, FrontEnd, Snapshots};
use crate::vesting::VestingRegistry;
use crate::BTreeMap;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Mutable view of every collaborator a pool operation may touch, plus
/// the caller identity and timestamp of the request being served
pub struct SpContext<'a> {
    /// Account the request is executing for
    pub caller: Address,
    /// Request timestamp (drives the issuance schedule)
    pub now: u64,
    /// FURUSD ledger
    pub stablecoin: &'a mut StableCoin,
    /// FURFI ledger
    pub collateral: &'a mut CollateralToken,
    /// LOAN ledger
    pub loan: &'a mut LoanToken,
    /// Issuance schedule and vault
    pub issuance: &'a mut CommunityIssuance,
    /// Lock registry the LOAN ledger consults
    pub registry: &'a VestingRegistry,
    /// Active collateral/debt ledger
    pub active_pool: &'a mut ActivePool,
    /// Trove records
    pub trove_manager: &'a mut TroveManager,
    /// Gain-reroute seam
    pub borrower_operations: &'a BorrowerOperations,
    /// Price seam for the withdrawal gate
    pub price_feed: &'a PriceFeed,
    /// Event sink
    pub events: &'a mut EventLog,
}

/// The Stability Pool core state. Exclusively owns every mapping below;
/// collateral under its control is mirrored in `furfi_balance` and
/// external credits to its token address are ignored by the accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilityPool {
    /// Collaborator registry, wired exactly once before the first operation
    wiring: Option<AddressBook>,

    #[serde(with = "crate::types::serde_address_map")]
    deposits: BTreeMap<Address, Deposit>,
    #[serde(with = "crate::types::serde_address_map")]
    deposit_snapshots: BTreeMap<Address, Snapshots>,

    #[serde(with = "crate::types::serde_address_map")]
    front_ends: BTreeMap<Address, FrontEnd>,
    #[serde(with = "crate::types::serde_address_map")]
    front_end_stakes: BTreeMap<Address, U256>,
    #[serde(with = "crate::types::serde_address_map")]
    front_end_snapshots: BTreeMap<Address, Snapshots>,

    /// Running product; starts at ONE and stays in (0, ONE]
    p: U256,
    current_scale: u128,
    current_epoch: u128,
    epoch_to_scale_to_s: BTreeMap<u128, BTreeMap<u128, U256>>,
    epoch_to_scale_to_g: BTreeMap<u128, BTreeMap<u128, U256>>,

    total_furusd_deposits: U256,
    furfi_balance: U256,

    last_loan_error: U256,
    last_furfi_error_offset: U256,
    last_furusd_loss_error_offset: U256,
}

impl StabilityPool {
    /// Creates the genesis pool state, not yet wired
    pub fn new() -> Self {
        Self {
            wiring: None,
            deposits: BTreeMap::new(),
            deposit_snapshots: BTreeMap::new(),
            front_ends: BTreeMap::new(),
            front_end_stakes: BTreeMap::new(),
            front_end_snapshots: BTreeMap::new(),
            p: math::one(),
            current_scale: 0,
            current_epoch: 0,
            epoch_to_scale_to_s: BTreeMap::new(),
            epoch_to_scale_to_g: BTreeMap::new(),
            total_furusd_deposits: U256::zero(),
            furfi_balance: U256::zero(),
            last_loan_error: U256::zero(),
            last_furfi_error_offset: U256::zero(),
            last_furusd_loss_error_offset: U256::zero(),
        }
    }

    /// Record the collaborator identities. Callable exactly once.
    pub fn wire(&mut self, book: AddressBook) -> FurUsdResult<()> {
        if self.wiring.is_some() {
            return Err(FurUsdError::AlreadyWired);
        }
        self.wiring = Some(book);
        Ok(())
    }

    fn wired(&self) -> FurUsdResult<AddressBook> {
        self.wiring.ok_or(FurUsdError::NotWired)
    }

    // ========================================================================
    // Views
    // ========================================================================

    /// Total pooled FURUSD
    pub fn total_furusd_deposits(&self) -> U256 {
        self.total_furusd_deposits
    }

    /// Mirrored FURFI under the pool's control
    pub fn furfi_balance(&self) -> U256 {
        self.furfi_balance
    }

    /// Running product P
    pub fn p(&self) -> U256 {
        self.p
    }

    /// Current scale counter
    pub fn current_scale(&self) -> u128 {
        self.current_scale
    }

    /// Current epoch counter
    pub fn current_epoch(&self) -> u128 {
        self.current_epoch
    }

    /// A depositor's principal record, if any
    pub fn deposit(&self, depositor: &Address) -> Option<&Deposit> {
        self.deposits.get(depositor)
    }

    /// A registered front end, if any
    pub fn front_end(&self, front_end: &Address) -> Option<&FrontEnd> {
        self.front_ends.get(front_end)
    }

    /// A front end's recorded stake
    pub fn front_end_stake(&self, front_end: &Address) -> U256 {
        self.front_end_stakes.get(front_end).copied().unwrap_or_default()
    }

    /// FURFI gain accrued to a depositor since their last snapshot
    pub fn depositor_collateral_gain(&self, depositor: &Address) -> FurUsdResult<U256> {
        let initial = self.initial_deposit(depositor);
        if initial.is_zero() {
            return Ok(U256::zero());
        }
        let snapshots = self.deposit_snapshots.get(depositor).cloned().unwrap_or_default();
        self.collateral_gain_from_snapshots(initial, &snapshots)
    }

    /// LOAN gain accrued to a depositor, after their front end's cut
    pub fn depositor_loan_gain(&self, depositor: &Address) -> FurUsdResult<U256> {
        let initial = self.initial_deposit(depositor);
        if initial.is_zero() {
            return Ok(U256::zero());
        }
        let kickback_rate = match self.deposits.get(depositor).and_then(|d| d.front_end_tag) {
            Some(tag) => {
                self.front_ends
                    .get(&tag)
                    .map(|f| f.kickback_rate)
                    .unwrap_or_else(math::one)
            }
            None => math::one(),
        };
        let snapshots = self.deposit_snapshots.get(depositor).cloned().unwrap_or_default();
        let raw_gain = self.loan_gain_from_snapshots(initial, &snapshots)?;
        Ok(math::checked_mul(kickback_rate, raw_gain)? / math::one())
    }

    /// LOAN gain accrued to a front end from its tagged deposits
    pub fn front_end_loan_gain(&self, front_end: &Address) -> FurUsdResult<U256> {
        let stake = self.front_end_stake(front_end);
        if stake.is_zero() {
            return Ok(U256::zero());
        }
        let kickback_rate = self
            .front_ends
            .get(front_end)
            .map(|f| f.kickback_rate)
            .unwrap_or_else(math::one);
        let front_end_share = math::checked_sub(math::one(), kickback_rate)?;
        let snapshots = self
            .front_end_snapshots
            .get(front_end)
            .cloned()
            .unwrap_or_default();
        let raw_gain = self.loan_gain_from_snapshots(stake, &snapshots)?;
        Ok(math::checked_mul(front_end_share, raw_gain)? / math::one())
    }

    /// A deposit's current value after all offsets since its snapshot
    pub fn compounded_furusd_deposit(&self, depositor: &Address) -> FurUsdResult<U256> {
        let initial = self.initial_deposit(depositor);
        if initial.is_zero() {
            return Ok(U256::zero());
        }
        let snapshots = self.deposit_snapshots.get(depositor).cloned().unwrap_or_default();
        self.compounded_stake_from_snapshots(initial, &snapshots)
    }

    /// A front-end stake's current value after all offsets since its
    /// snapshot
    pub fn compounded_front_end_stake(&self, front_end: &Address) -> FurUsdResult<U256> {
        let stake = self.front_end_stake(front_end);
        if stake.is_zero() {
            return Ok(U256::zero());
        }
        let snapshots = self
            .front_end_snapshots
            .get(front_end)
            .cloned()
            .unwrap_or_default();
        self.compounded_stake_from_snapshots(stake, &snapshots)
    }

    // ========================================================================
    // Depositor operations
    // ========================================================================

    /// Deposit FURUSD. A first-time depositor may name a front-end tag;
    /// on later deposits the recorded tag is kept and the argument is
    /// ignored. Pays out all accrued LOAN and FURFI gains.
    pub fn provide_to_stability_pool(
        &mut self,
        ctx: &mut SpContext<'_>,
        amount: U256,
        front_end_tag: Option<Address>,
    ) -> FurUsdResult<()> {
        let book = self.wired()?;
        if amount.is_zero() {
            return Err(FurUsdError::ZeroAmount);
        }
        if let Some(tag) = front_end_tag {
            if !self.is_registered_front_end(&tag) {
                return Err(FurUsdError::FrontEndNotRegistered { tag });
            }
        }
        let depositor = ctx.caller;
        if self.is_registered_front_end(&depositor) {
            return Err(FurUsdError::CallerIsFrontEnd {
                front_end: depositor,
            });
        }

        let initial_deposit = self.initial_deposit(&depositor);
        self.trigger_loan_issuance(ctx, &book)?;

        let tag_in_effect = if initial_deposit.is_zero() {
            if let Some(tag) = front_end_tag {
                ctx.events.emit(ProtocolEvent::FrontEndTagSet {
                    depositor,
                    front_end: tag,
                });
            }
            front_end_tag
        } else {
            self.deposits.get(&depositor).and_then(|d| d.front_end_tag)
        };

        let depositor_furfi_gain = self.depositor_collateral_gain(&depositor)?;
        let compounded_deposit = self.compounded_furusd_deposit(&depositor)?;
        let furusd_loss = math::checked_sub(initial_deposit, compounded_deposit)?;

        self.pay_out_loan_gains(ctx, &book, depositor, tag_in_effect)?;

        if let Some(front_end) = tag_in_effect {
            let compounded_stake = self.compounded_front_end_stake(&front_end)?;
            let new_stake = math::checked_add(compounded_stake, amount)?;
            self.update_front_end_stake_and_snapshots(ctx.events, front_end, new_stake, depositor);
        }

        self.send_furusd_to_pool(ctx, &book, depositor, amount)?;

        let new_deposit = math::checked_add(compounded_deposit, amount)?;
        self.update_deposit_and_snapshots(ctx.events, depositor, new_deposit, tag_in_effect);
        ctx.events.emit(ProtocolEvent::DepositChanged {
            depositor,
            new_deposit,
        });
        ctx.events.emit(ProtocolEvent::CollateralGainWithdrawn {
            depositor,
            furfi_gain: depositor_furfi_gain,
            furusd_loss,
        });

        self.send_furfi_gain_to_depositor(ctx, &book, depositor, depositor_furfi_gain)
    }

    /// Withdraw up to `amount` FURUSD (capped at the compounded deposit)
    /// and pay out all accrued gains. A zero amount claims gains without
    /// touching principal and skips the under-collateralization gate.
    pub fn withdraw_from_stability_pool(
        &mut self,
        ctx: &mut SpContext<'_>,
        amount: U256,
    ) -> FurUsdResult<()> {
        let book = self.wired()?;
        if !amount.is_zero() {
            let price = ctx.price_feed.fetch_price();
            if ctx.trove_manager.has_undercollateralized_trove(price)? {
                return Err(FurUsdError::UnderCollateralizedTrovePresent);
            }
        }
        let depositor = ctx.caller;
        let initial_deposit = self.initial_deposit(&depositor);
        if initial_deposit.is_zero() {
            return Err(FurUsdError::NoDeposit { depositor });
        }

        self.trigger_loan_issuance(ctx, &book)?;

        let depositor_furfi_gain = self.depositor_collateral_gain(&depositor)?;
        let compounded_deposit = self.compounded_furusd_deposit(&depositor)?;
        let furusd_to_withdraw = amount.min(compounded_deposit);
        let furusd_loss = math::checked_sub(initial_deposit, compounded_deposit)?;

        let tag = self.deposits.get(&depositor).and_then(|d| d.front_end_tag);
        self.pay_out_loan_gains(ctx, &book, depositor, tag)?;

        if let Some(front_end) = tag {
            let compounded_stake = self.compounded_front_end_stake(&front_end)?;
            let new_stake = math::checked_sub(compounded_stake, furusd_to_withdraw)?;
            self.update_front_end_stake_and_snapshots(ctx.events, front_end, new_stake, depositor);
        }

        self.send_furusd_to_depositor(ctx, &book, depositor, furusd_to_withdraw)?;

        let new_deposit = math::checked_sub(compounded_deposit, furusd_to_withdraw)?;
        self.update_deposit_and_snapshots(ctx.events, depositor, new_deposit, tag);
        ctx.events.emit(ProtocolEvent::DepositChanged {
            depositor,
            new_deposit,
        });
        ctx.events.emit(ProtocolEvent::CollateralGainWithdrawn {
            depositor,
            furfi_gain: depositor_furfi_gain,
            furusd_loss,
        });

        self.send_furfi_gain_to_depositor(ctx, &book, depositor, depositor_furfi_gain)
    }

    /// Reroute the accrued FURFI gain into the caller's trove instead of
    /// paying it out. Principal stays in the pool; the snapshot refreshes.
    pub fn withdraw_furfi_gain_to_trove(
        &mut self,
        ctx: &mut SpContext<'_>,
        upper_hint: Address,
        lower_hint: Address,
    ) -> FurUsdResult<()> {
        let book = self.wired()?;
        let depositor = ctx.caller;
        let initial_deposit = self.initial_deposit(&depositor);
        if initial_deposit.is_zero() {
            return Err(FurUsdError::NoDeposit { depositor });
        }
        if !ctx.trove_manager.has_active_trove(&depositor) {
            return Err(FurUsdError::NoTrove { owner: depositor });
        }
        let depositor_furfi_gain = self.depositor_collateral_gain(&depositor)?;
        if depositor_furfi_gain.is_zero() {
            return Err(FurUsdError::NoCollateralGain { depositor });
        }

        self.trigger_loan_issuance(ctx, &book)?;

        let compounded_deposit = self.compounded_furusd_deposit(&depositor)?;
        let furusd_loss = math::checked_sub(initial_deposit, compounded_deposit)?;

        let tag = self.deposits.get(&depositor).and_then(|d| d.front_end_tag);
        self.pay_out_loan_gains(ctx, &book, depositor, tag)?;

        if let Some(front_end) = tag {
            let compounded_stake = self.compounded_front_end_stake(&front_end)?;
            self.update_front_end_stake_and_snapshots(
                ctx.events,
                front_end,
                compounded_stake,
                depositor,
            );
        }

        self.update_deposit_and_snapshots(ctx.events, depositor, compounded_deposit, tag);
        ctx.events.emit(ProtocolEvent::DepositChanged {
            depositor,
            new_deposit: compounded_deposit,
        });
        ctx.events.emit(ProtocolEvent::CollateralGainWithdrawn {
            depositor,
            furfi_gain: depositor_furfi_gain,
            furusd_loss,
        });

        self.furfi_balance = math::checked_sub(self.furfi_balance, depositor_furfi_gain)?;
        ctx.events.emit(ProtocolEvent::PoolCollateralUpdated {
            balance: self.furfi_balance,
        });
        ctx.borrower_operations.move_furfi_gain_to_trove(
            book.stability_pool,
            depositor,
            depositor_furfi_gain,
            upper_hint,
            lower_hint,
            ctx.trove_manager,
            ctx.active_pool,
            ctx.collateral,
        )
    }

    /// Register the caller as a front end with an immutable kickback rate
    pub fn register_front_end(
        &mut self,
        events: &mut EventLog,
        caller: Address,
        kickback_rate: U256,
    ) -> FurUsdResult<()> {
        self.wired()?;
        if self.is_registered_front_end(&caller) {
            return Err(FurUsdError::FrontEndAlreadyRegistered { front_end: caller });
        }
        if !self.initial_deposit(&caller).is_zero() {
            return Err(FurUsdError::DepositorHasDeposit { depositor: caller });
        }
        if kickback_rate > math::one() {
            return Err(FurUsdError::KickbackRateOutOfRange {
                rate_lo: math::lo(kickback_rate),
            });
        }

        self.front_ends.insert(
            caller,
            FrontEnd {
                kickback_rate,
                registered: true,
            },
        );
        events.emit(ProtocolEvent::FrontEndRegistered {
            front_end: caller,
            kickback_rate,
        });
        Ok(())
    }

    // ========================================================================
    // Liquidation offset (Trove Manager only)
    // ========================================================================

    /// Cancel `debt_to_offset` against the pooled deposits and take
    /// `coll_to_add` from the Active Pool as the depositors' gain
    pub fn offset(
        &mut self,
        ctx: &mut SpContext<'_>,
        debt_to_offset: U256,
        coll_to_add: U256,
    ) -> FurUsdResult<()> {
        let book = self.wired()?;
        if ctx.caller != book.trove_manager {
            return Err(FurUsdError::Unauthorized {
                expected: book.trove_manager,
                actual: ctx.caller,
            });
        }
        let total_furusd = self.total_furusd_deposits;
        if total_furusd.is_zero() || debt_to_offset.is_zero() {
            return Ok(());
        }
        if debt_to_offset > total_furusd {
            return Err(FurUsdError::InvariantBreached {
                what: "offset debt exceeds pooled deposits",
            });
        }

        self.trigger_loan_issuance(ctx, &book)?;

        let (furfi_gain_per_unit, furusd_loss_per_unit) =
            self.compute_rewards_per_unit_staked(coll_to_add, debt_to_offset, total_furusd)?;

        self.update_reward_sum_and_product(ctx.events, furfi_gain_per_unit, furusd_loss_per_unit)?;

        self.move_offset_coll_and_debt(ctx, &book, coll_to_add, debt_to_offset)?;

        ctx.events.emit(ProtocolEvent::LiquidationOffset {
            debt_offset: debt_to_offset,
            collateral_added: coll_to_add,
            new_total_deposits: self.total_furusd_deposits,
        });
        Ok(())
    }

    // ========================================================================
    // LOAN issuance
    // ========================================================================

    fn trigger_loan_issuance(
        &mut self,
        ctx: &mut SpContext<'_>,
        book: &AddressBook,
    ) -> FurUsdResult<()> {
        let issued = ctx
            .issuance
            .issue_loan(ctx.events, book.stability_pool, ctx.now)?;
        self.update_g(ctx.events, issued)
    }

    /// Fold a LOAN issuance increment into G at the current (epoch, scale).
    /// Issuance arriving while the pool is empty is dropped.
    fn update_g(&mut self, events: &mut EventLog, loan_issued: U256) -> FurUsdResult<()> {
        let total_furusd = self.total_furusd_deposits;
        if total_furusd.is_zero() || loan_issued.is_zero() {
            return Ok(());
        }

        let numerator = math::checked_add(
            math::checked_mul(loan_issued, math::one())?,
            self.last_loan_error,
        )?;
        let loan_per_unit = numerator / total_furusd;
        self.last_loan_error =
            math::checked_sub(numerator, math::checked_mul(loan_per_unit, total_furusd)?)?;

        let marginal_gain = math::checked_mul(loan_per_unit, self.p)?;
        let current = self.g_cell(self.current_epoch, self.current_scale);
        let new_g = math::checked_add(current, marginal_gain)?;
        self.epoch_to_scale_to_g
            .entry(self.current_epoch)
            .or_default()
            .insert(self.current_scale, new_g);

        events.emit(ProtocolEvent::GainSumUpdated {
            g: new_g,
            epoch: self.current_epoch,
            scale: self.current_scale,
        });
        Ok(())
    }

    fn pay_out_loan_gains(
        &mut self,
        ctx: &mut SpContext<'_>,
        book: &AddressBook,
        depositor: Address,
        front_end_tag: Option<Address>,
    ) -> FurUsdResult<()> {
        if let Some(front_end) = front_end_tag {
            let front_end_gain = self.front_end_loan_gain(&front_end)?;
            if !front_end_gain.is_zero() {
                ctx.issuance.send_loan(
                    ctx.events,
                    book.stability_pool,
                    ctx.registry,
                    ctx.loan,
                    front_end,
                    front_end_gain,
                    ctx.now,
                )?;
                ctx.events.emit(ProtocolEvent::LoanPaidToFrontEnd {
                    front_end,
                    amount: front_end_gain,
                });
            }
        }

        let depositor_gain = self.depositor_loan_gain(&depositor)?;
        if !depositor_gain.is_zero() {
            ctx.issuance.send_loan(
                ctx.events,
                book.stability_pool,
                ctx.registry,
                ctx.loan,
                depositor,
                depositor_gain,
                ctx.now,
            )?;
            ctx.events.emit(ProtocolEvent::LoanPaidToDepositor {
                depositor,
                amount: depositor_gain,
            });
        }
        Ok(())
    }

    // ========================================================================
    // Accumulator updates
    // ========================================================================

    /// Per-unit collateral gain and FURUSD loss for one offset, with the
    /// feedback error correction. The loss rounds up (in the pool's
    /// favor), the gain rounds down, and both residues carry forward.
    fn compute_rewards_per_unit_staked(
        &mut self,
        coll_to_add: U256,
        debt_to_offset: U256,
        total_furusd: U256,
    ) -> FurUsdResult<(U256, U256)> {
        let furfi_numerator = math::checked_add(
            math::checked_mul(coll_to_add, math::one())?,
            self.last_furfi_error_offset,
        )?;
        let furfi_gain_per_unit = furfi_numerator / total_furusd;
        self.last_furfi_error_offset = math::checked_sub(
            furfi_numerator,
            math::checked_mul(furfi_gain_per_unit, total_furusd)?,
        )?;

        let furusd_loss_per_unit = if debt_to_offset == total_furusd {
            self.last_furusd_loss_error_offset = U256::zero();
            math::one()
        } else {
            let loss_numerator = math::checked_sub(
                math::checked_mul(debt_to_offset, math::one())?,
                self.last_furusd_loss_error_offset,
            )?;
            let per_unit = math::checked_add(loss_numerator / total_furusd, U256::from(1u8))?;
            self.last_furusd_loss_error_offset = math::checked_sub(
                math::checked_mul(per_unit, total_furusd)?,
                loss_numerator,
            )?;
            per_unit
        };

        Ok((furfi_gain_per_unit, furusd_loss_per_unit))
    }

    fn update_reward_sum_and_product(
        &mut self,
        events: &mut EventLog,
        furfi_gain_per_unit: U256,
        furusd_loss_per_unit: U256,
    ) -> FurUsdResult<U256> {
        if furusd_loss_per_unit > math::one() {
            return Err(FurUsdError::InvariantBreached {
                what: "loss per unit exceeds ONE",
            });
        }
        let product_factor = math::checked_sub(math::one(), furusd_loss_per_unit)?;

        let marginal_furfi_gain = math::checked_mul(furfi_gain_per_unit, self.p)?;
        let current_s = self.s_cell(self.current_epoch, self.current_scale);
        let new_s = math::checked_add(current_s, marginal_furfi_gain)?;
        self.epoch_to_scale_to_s
            .entry(self.current_epoch)
            .or_default()
            .insert(self.current_scale, new_s);
        events.emit(ProtocolEvent::SumUpdated {
            s: new_s,
            epoch: self.current_epoch,
            scale: self.current_scale,
        });

        let new_p = if product_factor.is_zero() {
            // Pool emptied: all stakes annihilated, fresh epoch
            self.current_epoch += 1;
            events.emit(ProtocolEvent::EpochUpdated {
                epoch: self.current_epoch,
            });
            self.current_scale = 0;
            events.emit(ProtocolEvent::ScaleUpdated {
                scale: self.current_scale,
            });
            math::one()
        } else {
            let p_times_factor = math::checked_mul(self.p, product_factor)? / math::one();
            if p_times_factor < U256::from(SCALE_FACTOR) {
                self.current_scale += 1;
                events.emit(ProtocolEvent::ScaleUpdated {
                    scale: self.current_scale,
                });
                math::checked_mul(p_times_factor, U256::from(SCALE_FACTOR))?
            } else {
                p_times_factor
            }
        };

        if new_p.is_zero() {
            return Err(FurUsdError::InvariantBreached {
                what: "P must remain positive",
            });
        }
        self.p = new_p;
        events.emit(ProtocolEvent::ProductUpdated { p: new_p });
        Ok(new_p)
    }

    fn move_offset_coll_and_debt(
        &mut self,
        ctx: &mut SpContext<'_>,
        book: &AddressBook,
        coll_to_add: U256,
        debt_to_offset: U256,
    ) -> FurUsdResult<()> {
        ctx.active_pool
            .decrease_furusd_debt(book.stability_pool, debt_to_offset)?;
        self.decrease_furusd(ctx.events, debt_to_offset)?;
        ctx.stablecoin.burn(
            ctx.events,
            book.stability_pool,
            book.stability_pool,
            debt_to_offset,
        )?;

        ctx.active_pool.send_furfi(
            book.stability_pool,
            book.stability_pool,
            coll_to_add,
            ctx.collateral,
        )?;
        self.furfi_balance = math::checked_add(self.furfi_balance, coll_to_add)?;
        ctx.events.emit(ProtocolEvent::PoolCollateralUpdated {
            balance: self.furfi_balance,
        });
        Ok(())
    }

    // ========================================================================
    // Deposit and front-end bookkeeping
    // ========================================================================

    fn update_deposit_and_snapshots(
        &mut self,
        events: &mut EventLog,
        depositor: Address,
        new_value: U256,
        front_end_tag: Option<Address>,
    ) {
        if new_value.is_zero() {
            self.deposits.remove(&depositor);
            self.deposit_snapshots.remove(&depositor);
            events.emit(ProtocolEvent::DepositSnapshotUpdated {
                depositor,
                p: U256::zero(),
                s: U256::zero(),
                g: U256::zero(),
            });
            return;
        }

        let snapshots = Snapshots {
            s: self.s_cell(self.current_epoch, self.current_scale),
            p: self.p,
            g: self.g_cell(self.current_epoch, self.current_scale),
            scale: self.current_scale,
            epoch: self.current_epoch,
        };
        self.deposits.insert(
            depositor,
            Deposit {
                initial_value: new_value,
                front_end_tag,
            },
        );
        events.emit(ProtocolEvent::DepositSnapshotUpdated {
            depositor,
            p: snapshots.p,
            s: snapshots.s,
            g: snapshots.g,
        });
        self.deposit_snapshots.insert(depositor, snapshots);
    }

    fn update_front_end_stake_and_snapshots(
        &mut self,
        events: &mut EventLog,
        front_end: Address,
        new_stake: U256,
        depositor: Address,
    ) {
        if new_stake.is_zero() {
            self.front_end_stakes.remove(&front_end);
            self.front_end_snapshots.remove(&front_end);
            events.emit(ProtocolEvent::FrontEndSnapshotUpdated {
                front_end,
                p: U256::zero(),
                g: U256::zero(),
            });
        } else {
            // Front ends earn no collateral, so S stays out of their snapshot
            let snapshots = Snapshots {
                s: U256::zero(),
                p: self.p,
                g: self.g_cell(self.current_epoch, self.current_scale),
                scale: self.current_scale,
                epoch: self.current_epoch,
            };
            self.front_end_stakes.insert(front_end, new_stake);
            events.emit(ProtocolEvent::FrontEndSnapshotUpdated {
                front_end,
                p: snapshots.p,
                g: snapshots.g,
            });
            self.front_end_snapshots.insert(front_end, snapshots);
        }
        events.emit(ProtocolEvent::FrontEndStakeChanged {
            front_end,
            new_stake,
            depositor,
        });
    }

    // ========================================================================
    // Token movements
    // ========================================================================

    fn send_furusd_to_pool(
        &mut self,
        ctx: &mut SpContext<'_>,
        book: &AddressBook,
        from: Address,
        amount: U256,
    ) -> FurUsdResult<()> {
        ctx.stablecoin.send_to_pool(
            ctx.events,
            book.stability_pool,
            from,
            book.stability_pool,
            amount,
        )?;
        self.total_furusd_deposits = math::checked_add(self.total_furusd_deposits, amount)?;
        ctx.events.emit(ProtocolEvent::PoolDepositsUpdated {
            total: self.total_furusd_deposits,
        });
        Ok(())
    }

    fn send_furusd_to_depositor(
        &mut self,
        ctx: &mut SpContext<'_>,
        book: &AddressBook,
        depositor: Address,
        amount: U256,
    ) -> FurUsdResult<()> {
        if amount.is_zero() {
            return Ok(());
        }
        ctx.stablecoin.return_from_pool(
            ctx.events,
            book.stability_pool,
            book.stability_pool,
            depositor,
            amount,
        )?;
        self.decrease_furusd(ctx.events, amount)
    }

    fn decrease_furusd(&mut self, events: &mut EventLog, amount: U256) -> FurUsdResult<()> {
        self.total_furusd_deposits = math::checked_sub(self.total_furusd_deposits, amount)?;
        events.emit(ProtocolEvent::PoolDepositsUpdated {
            total: self.total_furusd_deposits,
        });
        Ok(())
    }

    fn send_furfi_gain_to_depositor(
        &mut self,
        ctx: &mut SpContext<'_>,
        book: &AddressBook,
        depositor: Address,
        gain: U256,
    ) -> FurUsdResult<()> {
        if gain.is_zero() {
            return Ok(());
        }
        self.furfi_balance = math::checked_sub(self.furfi_balance, gain)?;
        ctx.events.emit(ProtocolEvent::PoolCollateralUpdated {
            balance: self.furfi_balance,
        });
        ctx.collateral.transfer(book.stability_pool, depositor, gain)
    }

    // ========================================================================
    // Snapshot math
    // ========================================================================

    fn initial_deposit(&self, depositor: &Address) -> U256 {
        self.deposits
            .get(depositor)
            .map(|d| d.initial_value)
            .unwrap_or_default()
    }

    fn is_registered_front_end(&self, address: &Address) -> bool {
        self.front_ends.get(address).map(|f| f.registered).unwrap_or(false)
    }

    fn s_cell(&self, epoch: u128, scale: u128) -> U256 {
        self.epoch_to_scale_to_s
            .get(&epoch)
            .and_then(|m| m.get(&scale))
            .copied()
            .unwrap_or_default()
    }

    fn g_cell(&self, epoch: u128, scale: u128) -> U256 {
        self.epoch_to_scale_to_g
            .get(&epoch)
            .and_then(|m| m.get(&scale))
            .copied()
            .unwrap_or_default()
    }

    /// Gain = initial * (S - S0) / P0 / ONE over the snapshot's epoch.
    /// If one scale boundary was crossed, the next scale's portion is
    /// scaled down by SCALE_FACTOR; beyond that everything rounds to zero.
    fn collateral_gain_from_snapshots(
        &self,
        initial: U256,
        snapshots: &Snapshots,
    ) -> FurUsdResult<U256> {
        if snapshots.p.is_zero() {
            return Ok(U256::zero());
        }
        let first_portion = math::checked_sub(
            self.s_cell(snapshots.epoch, snapshots.scale),
            snapshots.s,
        )?;
        let second_portion =
            self.s_cell(snapshots.epoch, snapshots.scale + 1) / U256::from(SCALE_FACTOR);

        let portions = math::checked_add(first_portion, second_portion)?;
        let gain = math::checked_mul(initial, portions)? / snapshots.p / math::one();
        Ok(gain)
    }

    /// Same two-term formula as the collateral gain, over G
    fn loan_gain_from_snapshots(
        &self,
        initial: U256,
        snapshots: &Snapshots,
    ) -> FurUsdResult<U256> {
        if snapshots.p.is_zero() {
            return Ok(U256::zero());
        }
        let first_portion = math::checked_sub(
            self.g_cell(snapshots.epoch, snapshots.scale),
            snapshots.g,
        )?;
        let second_portion =
            self.g_cell(snapshots.epoch, snapshots.scale + 1) / U256::from(SCALE_FACTOR);

        let portions = math::checked_add(first_portion, second_portion)?;
        let gain = math::checked_mul(initial, portions)? / snapshots.p / math::one();
        Ok(gain)
    }

    /// Compounded stake = initial * P / P0, adjusted one step across a
    /// scale boundary. A stake from an earlier epoch, or more than one
    /// scale behind, has been fully annihilated. Remainders below one
    /// part in 1e9 of the initial stake collapse to zero, bounding the
    /// error a single boundary crossing can leave behind.
    fn compounded_stake_from_snapshots(
        &self,
        initial: U256,
        snapshots: &Snapshots,
    ) -> FurUsdResult<U256> {
        if snapshots.epoch < self.current_epoch || snapshots.p.is_zero() {
            return Ok(U256::zero());
        }

        let scale_diff = self.current_scale - snapshots.scale;
        let compounded = if scale_diff == 0 {
            math::checked_mul(initial, self.p)? / snapshots.p
        } else if scale_diff == 1 {
            math::checked_mul(initial, self.p)? / snapshots.p / U256::from(SCALE_FACTOR)
        } else {
            U256::zero()
        };

        if compounded < initial / U256::from(SCALE_FACTOR) {
            return Ok(U256::zero());
        }
        Ok(compounded)
    }
}

impl Default for StabilityPool {
    fn default() -> Self {
        Self::new()
    }
}
