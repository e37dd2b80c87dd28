//! Protocol Events
//!
//! Events are collected during operation execution and can be indexed
//! off-process for UIs, analytics and audit trails. The Stability Pool
//! accumulator updates (P, S, G, epoch, scale) are all event-logged so an
//! indexer can reconstruct every depositor's position history.

use crate::types::Address;
use crate::Vec;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Token ledgers that emit transfer/mint/burn events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    /// FURUSD stablecoin
    Stablecoin,
    /// LOAN incentive token
    Incentive,
}

/// Event types for indexing and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventType {
    // Stability Pool events (0x01 - 0x1F)
    DepositChanged = 0x01,
    FrontEndRegistered = 0x02,
    FrontEndTagSet = 0x03,
    FrontEndStakeChanged = 0x04,
    DepositSnapshotUpdated = 0x05,
    FrontEndSnapshotUpdated = 0x06,
    CollateralGainWithdrawn = 0x07,
    LoanPaidToDepositor = 0x08,
    LoanPaidToFrontEnd = 0x09,
    LiquidationOffset = 0x0A,
    PoolDepositsUpdated = 0x0B,
    PoolCollateralUpdated = 0x0C,

    // Accumulator events (0x20 - 0x2F)
    ProductUpdated = 0x20,
    SumUpdated = 0x21,
    GainSumUpdated = 0x22,
    EpochUpdated = 0x23,
    ScaleUpdated = 0x24,

    // Token events (0x40 - 0x4F)
    TokenTransfer = 0x40,
    TokenMint = 0x41,
    TokenBurn = 0x42,

    // Issuance and vesting events (0x60 - 0x6F)
    LoanIssued = 0x60,
    LockDeployed = 0x61,
    LockWithdrawal = 0x62,

    // Ledger pool events (0x80 - 0x8F)
    SurplusAccrued = 0x80,
    SurplusClaimed = 0x81,
}

/// Main event enum containing all protocol events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolEvent {
    // ============ Stability Pool Events ============

    /// A deposit's recorded principal changed (provide, withdraw, reroute)
    DepositChanged {
        depositor: Address,
        new_deposit: U256,
    },

    /// A front end registered with its immutable kickback rate
    FrontEndRegistered {
        front_end: Address,
        kickback_rate: U256,
    },

    /// A first-time depositor chose a front-end tag
    FrontEndTagSet {
        depositor: Address,
        front_end: Address,
    },

    /// A front end's recorded stake changed because a tagged depositor moved
    FrontEndStakeChanged {
        front_end: Address,
        new_stake: U256,
        depositor: Address,
    },

    /// A depositor's snapshot was refreshed
    DepositSnapshotUpdated {
        depositor: Address,
        p: U256,
        s: U256,
        g: U256,
    },

    /// A front end's snapshot was refreshed
    FrontEndSnapshotUpdated {
        front_end: Address,
        p: U256,
        g: U256,
    },

    /// Collateral gain left the pool toward a depositor or their trove.
    /// The FURUSD loss is informational: principal consumed by offsets
    /// since the last touch.
    CollateralGainWithdrawn {
        depositor: Address,
        furfi_gain: U256,
        furusd_loss: U256,
    },

    /// LOAN gain paid out to a depositor
    LoanPaidToDepositor {
        depositor: Address,
        amount: U256,
    },

    /// LOAN gain paid out to a front end
    LoanPaidToFrontEnd {
        front_end: Address,
        amount: U256,
    },

    /// The pool absorbed liquidated debt against its deposits
    LiquidationOffset {
        debt_offset: U256,
        collateral_added: U256,
        new_total_deposits: U256,
    },

    /// Total pooled FURUSD changed
    PoolDepositsUpdated { total: U256 },

    /// The pool's mirrored FURFI balance changed
    PoolCollateralUpdated { balance: U256 },

    // ============ Accumulator Events ============

    /// Running product P after an offset
    ProductUpdated { p: U256 },

    /// Collateral sum S at its (epoch, scale) cell
    SumUpdated { s: U256, epoch: u128, scale: u128 },

    /// LOAN sum G at its (epoch, scale) cell
    GainSumUpdated { g: U256, epoch: u128, scale: u128 },

    /// Pool fully depleted; epoch advanced, scale reset
    EpochUpdated { epoch: u128 },

    /// P crossed the precision threshold; scale advanced
    ScaleUpdated { scale: u128 },

    // ============ Token Events ============

    /// Emitted on token transfer
    TokenTransfer {
        kind: TokenKind,
        from: Address,
        to: Address,
        amount: U256,
    },

    /// Emitted when tokens are minted
    TokenMint {
        kind: TokenKind,
        to: Address,
        amount: U256,
        new_total_supply: U256,
    },

    /// Emitted when tokens are burned
    TokenBurn {
        kind: TokenKind,
        from: Address,
        amount: U256,
        new_total_supply: U256,
    },

    // ============ Issuance and Vesting Events ============

    /// Community issuance released a new LOAN increment to the pool
    LoanIssued { increment: U256, total_issued: U256 },

    /// The registry deployed a new vesting lock
    LockDeployed {
        lock: Address,
        beneficiary: Address,
        unlock_time: u64,
    },

    /// A vesting lock released its balance to the beneficiary
    LockWithdrawal {
        lock: Address,
        beneficiary: Address,
        amount: U256,
    },

    // ============ Ledger Pool Events ============

    /// Liquidation surplus recorded as claimable
    SurplusAccrued { owner: Address, amount: U256 },

    /// Claimable surplus paid out and cleared
    SurplusClaimed { owner: Address, amount: U256 },
}

impl ProtocolEvent {
    /// Get the event type for filtering
    pub fn event_type(&self) -> EventType {
        match self {
            Self::DepositChanged { .. } => EventType::DepositChanged,
            Self::FrontEndRegistered { .. } => EventType::FrontEndRegistered,
            Self::FrontEndTagSet { .. } => EventType::FrontEndTagSet,
            Self::FrontEndStakeChanged { .. } => EventType::FrontEndStakeChanged,
            Self::DepositSnapshotUpdated { .. } => EventType::DepositSnapshotUpdated,
            Self::FrontEndSnapshotUpdated { .. } => EventType::FrontEndSnapshotUpdated,
            Self::CollateralGainWithdrawn { .. } => EventType::CollateralGainWithdrawn,
            Self::LoanPaidToDepositor { .. } => EventType::LoanPaidToDepositor,
            Self::LoanPaidToFrontEnd { .. } => EventType::LoanPaidToFrontEnd,
            Self::LiquidationOffset { .. } => EventType::LiquidationOffset,
            Self::PoolDepositsUpdated { .. } => EventType::PoolDepositsUpdated,
            Self::PoolCollateralUpdated { .. } => EventType::PoolCollateralUpdated,
            Self::ProductUpdated { .. } => EventType::ProductUpdated,
            Self::SumUpdated { .. } => EventType::SumUpdated,
            Self::GainSumUpdated { .. } => EventType::GainSumUpdated,
            Self::EpochUpdated { .. } => EventType::EpochUpdated,
            Self::ScaleUpdated { .. } => EventType::ScaleUpdated,
            Self::TokenTransfer { .. } => EventType::TokenTransfer,
            Self::TokenMint { .. } => EventType::TokenMint,
            Self::TokenBurn { .. } => EventType::TokenBurn,
            Self::LoanIssued { .. } => EventType::LoanIssued,
            Self::LockDeployed { .. } => EventType::LockDeployed,
            Self::LockWithdrawal { .. } => EventType::LockWithdrawal,
            Self::SurplusAccrued { .. } => EventType::SurplusAccrued,
            Self::SurplusClaimed { .. } => EventType::SurplusClaimed,
        }
    }
}

/// Event log for collecting events during execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<ProtocolEvent>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Emit an event (add to log)
    pub fn emit(&mut self, event: ProtocolEvent) {
        self.events.push(event);
    }

    /// Get all events
    pub fn events(&self) -> &[ProtocolEvent] {
        &self.events
    }

    /// Filter events by type
    pub fn filter_by_type(&self, event_type: EventType) -> Vec<&ProtocolEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Clear all events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}
