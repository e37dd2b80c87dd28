//! Error Types for the FURUSD Protocol
//!
//! Typed errors with stable string codes for debugging and indexing.
//! Every error aborts the enclosing operation; the dispatch layer rolls
//! the whole state back so no partial commit is observable.

/// Result type alias for protocol operations
pub type FurUsdResult<T> = Result<T, FurUsdError>;

/// Main error enum for all protocol errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FurUsdError {
    // ============ Authorization Errors ============
    /// Caller is not the collaborator wired for this entry point
    Unauthorized { expected: [u8; 32], actual: [u8; 32] },

    /// Operation attempted before the collaborator registry was wired
    NotWired,

    /// The collaborator registry can only be wired once
    AlreadyWired,

    // ============ Pre-condition Errors ============
    /// Zero amount not allowed
    ZeroAmount,

    /// Front-end tag does not name a registered front end
    FrontEndNotRegistered { tag: [u8; 32] },

    /// Address is already a registered front end
    FrontEndAlreadyRegistered { front_end: [u8; 32] },

    /// A registered front end cannot hold a deposit of its own
    CallerIsFrontEnd { front_end: [u8; 32] },

    /// Cannot register as a front end while holding a deposit
    DepositorHasDeposit { depositor: [u8; 32] },

    /// Caller has no recorded deposit
    NoDeposit { depositor: [u8; 32] },

    /// Caller has no active trove
    NoTrove { owner: [u8; 32] },

    /// Caller has no collateral gain to reroute
    NoCollateralGain { depositor: [u8; 32] },

    /// Kickback rate must lie in [0, DECIMAL_PRECISION]
    KickbackRateOutOfRange { rate_lo: u128 },

    /// A trove below MCR exists; non-zero withdrawals are blocked
    UnderCollateralizedTrovePresent,

    /// Insufficient balance for operation
    InsufficientBalance { available_lo: u128, requested_lo: u128 },

    /// Vesting lock cannot release funds before its unlock time
    VestingNotDue { unlock_time: u64, now: u64 },

    /// Target of a restricted transfer is not a registered lock
    LockNotRegistered { target: [u8; 32] },

    /// The admin account's LOAN transfers are locked for the first year
    TransfersLocked { until: u64 },

    /// Transfer recipient is an address the token refuses (itself or a
    /// protocol pool that must be funded through its dedicated entry point)
    InvalidRecipient { to: [u8; 32] },

    /// No claimable collateral surplus recorded for this address
    SurplusNotFound { owner: [u8; 32] },

    /// Lock unlock time precedes the minimum vesting horizon
    LockHorizonTooShort { unlock_time: u64, minimum: u64 },

    /// A trove's collateral ratio is below the system minimum
    IcrBelowMcr { icr_lo: u128 },

    /// Liquidation attempted on a trove at or above the system minimum
    TroveNotLiquidatable { icr_lo: u128 },

    // ============ Arithmetic Errors ============
    /// Arithmetic overflow occurred
    Overflow,

    /// Arithmetic underflow occurred
    Underflow,

    /// Division by zero
    DivisionByZero,

    // ============ Invariant Assertions ============
    /// A structural invariant was breached; indicates a bug
    InvariantBreached { what: &'static str },
}

impl FurUsdError {
    /// Returns a stable error code for logging/debugging
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "E001_UNAUTHORIZED",
            Self::NotWired => "E002_NOT_WIRED",
            Self::AlreadyWired => "E003_ALREADY_WIRED",
            Self::ZeroAmount => "E010_ZERO_AMOUNT",
            Self::FrontEndNotRegistered { .. } => "E011_FRONT_END_NOT_REGISTERED",
            Self::FrontEndAlreadyRegistered { .. } => "E012_FRONT_END_REGISTERED",
            Self::CallerIsFrontEnd { .. } => "E013_CALLER_IS_FRONT_END",
            Self::DepositorHasDeposit { .. } => "E014_DEPOSITOR_HAS_DEPOSIT",
            Self::NoDeposit { .. } => "E015_NO_DEPOSIT",
            Self::NoTrove { .. } => "E016_NO_TROVE",
            Self::NoCollateralGain { .. } => "E017_NO_COLLATERAL_GAIN",
            Self::KickbackRateOutOfRange { .. } => "E018_KICKBACK_OUT_OF_RANGE",
            Self::UnderCollateralizedTrovePresent => "E019_UNDERCOLLATERALIZED_TROVE",
            Self::InsufficientBalance { .. } => "E020_INSUFFICIENT_BALANCE",
            Self::VestingNotDue { .. } => "E021_VESTING_NOT_DUE",
            Self::LockNotRegistered { .. } => "E022_LOCK_NOT_REGISTERED",
            Self::TransfersLocked { .. } => "E023_TRANSFERS_LOCKED",
            Self::InvalidRecipient { .. } => "E024_INVALID_RECIPIENT",
            Self::SurplusNotFound { .. } => "E025_SURPLUS_NOT_FOUND",
            Self::LockHorizonTooShort { .. } => "E026_LOCK_HORIZON_TOO_SHORT",
            Self::IcrBelowMcr { .. } => "E027_ICR_BELOW_MCR",
            Self::TroveNotLiquidatable { .. } => "E028_TROVE_NOT_LIQUIDATABLE",
            Self::Overflow => "E080_OVERFLOW",
            Self::Underflow => "E081_UNDERFLOW",
            Self::DivisionByZero => "E082_DIV_ZERO",
            Self::InvariantBreached { .. } => "E090_INVARIANT_BREACHED",
        }
    }

    /// Returns true if this error is recoverable (the caller can fix it
    /// and retry later)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::InsufficientBalance { .. } => true,
            Self::UnderCollateralizedTrovePresent => true,
            Self::VestingNotDue { .. } => true,
            Self::TransfersLocked { .. } => true,
            _ => false,
        }
    }
}
