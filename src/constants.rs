//! Protocol Constants
//!
//! All magic numbers and configuration values for the FURUSD protocol.
//! Ratio and schedule values follow the battle-tested Liquity parameters
//! the system was designed around.

/// Stablecoin metadata
pub mod token {
    /// Token name
    pub const NAME: &str = "FURUSD";
    /// Token symbol
    pub const SYMBOL: &str = "FURUSD";
    /// Decimal places
    pub const DECIMALS: u8 = 18;
    /// One unit with decimals (1 FURUSD = 10^18 base units)
    pub const ONE: u128 = 1_000_000_000_000_000_000;
}

/// Collateral asset metadata
pub mod collateral {
    /// Token name
    pub const NAME: &str = "FurFi";
    /// Token symbol
    pub const SYMBOL: &str = "FURFI";
    /// Decimal places
    pub const DECIMALS: u8 = 18;
}

/// Incentive token metadata
pub mod incentive {
    /// Token name
    pub const NAME: &str = "LOAN";
    /// Token symbol
    pub const SYMBOL: &str = "LOAN";
    /// Decimal places
    pub const DECIMALS: u8 = 18;
    /// Fixed total supply, minted once at genesis
    pub const TOTAL_SUPPLY: u128 = 100_000_000 * super::token::ONE;
}

/// Precision constants
pub mod precision {
    /// 18-decimal fixed-point unit
    pub const DECIMAL_PRECISION: u128 = 1_000_000_000_000_000_000;

    /// Half of the fixed-point unit, used for round-half-up multiplication
    pub const HALF_PRECISION: u128 = 500_000_000_000_000_000;
}

/// Collateralization ratios (18-decimal fixed point; 1.1e18 = 110%)
pub mod ratios {
    /// Minimum Collateral Ratio - below this, a trove can be liquidated
    /// and non-zero Stability Pool withdrawals are blocked
    pub const MCR: u128 = 1_100_000_000_000_000_000;
}

/// Stability Pool configuration
pub mod stability_pool {
    /// Factor applied to the running product P when it would fall below
    /// this value; P stays in [SCALE_FACTOR, DECIMAL_PRECISION] within an
    /// epoch
    pub const SCALE_FACTOR: u128 = 1_000_000_000;
}

/// LOAN issuance schedule
pub mod schedule {
    use super::token::ONE;

    /// Total LOAN routed to the Stability Pool community issuance vault
    pub const LOAN_SUPPLY_CAP: u128 = 32_000_000 * ONE;

    /// Per-minute decay factor: cumulative issuance is
    /// cap * (1 - ISSUANCE_FACTOR^minutes), giving a one-year half-life
    pub const ISSUANCE_FACTOR: u128 = 999_998_681_227_695_000;

    /// Seconds per issuance tick
    pub const SECONDS_IN_ONE_MINUTE: u64 = 60;
}

/// Vesting configuration
pub mod lockup {
    /// Seconds in a (non-leap) year; the LOAN admin transfer restriction
    /// and the minimum lock horizon are both one year from deployment
    pub const ONE_YEAR_SECONDS: u64 = 31_536_000;
}

/// Time-related constants
pub mod time {
    /// Minutes in 1000 years; exponent cap for the issuance schedule so
    /// dec_pow stays bounded for any timestamp
    pub const MINUTES_IN_1000_YEARS: u64 = 525_600_000;
}
