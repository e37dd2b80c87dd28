//! FURUSD Protocol Core Library
//!
//! Accounting core for a FURFI-collateralized stablecoin (FURUSD) with a
//! LOAN incentive stream, centered on the Stability Pool liquidation engine.
//!
//! ## Core Modules
//!
//! - **constants**: Protocol parameters
//! - **types**: Core data structures (Deposit, Snapshots, Trove, etc.)
//! - **errors**: Error handling
//! - **events**: Event logging
//! - **math**: 18-decimal fixed-point arithmetic on 256-bit integers
//! - **stablecoin**: FURUSD minting/burning and pool transfers
//! - **collateral_token**: FURFI settlement ledger
//! - **loan_token**: LOAN incentive token with first-year transfer lock
//! - **vesting**: Time locks and the registry that deploys them
//! - **issuance**: Time-scheduled LOAN issuance to the Stability Pool
//! - **pools**: Active/Default/Surplus collateral ledgers
//! - **troves**: Trove records, price feed seam, borrower operations
//! - **stability_pool**: Debt absorption and gain distribution
//! - **protocol**: Wiring and serialized, all-or-nothing dispatch

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(not(feature = "std"))]
pub use alloc::collections::{BTreeMap, BTreeSet};
#[cfg(not(feature = "std"))]
pub use alloc::string::String;
#[cfg(not(feature = "std"))]
pub use alloc::vec::Vec;
#[cfg(feature = "std")]
pub use std::collections::{BTreeMap, BTreeSet};
#[cfg(feature = "std")]
pub use std::string::String;
#[cfg(feature = "std")]
pub use std::vec::Vec;

// Core modules
pub mod collateral_token;
pub mod constants;
pub mod errors;
pub mod events;
pub mod issuance;
pub mod loan_token;
pub mod math;
pub mod pools;
pub mod protocol;
pub mod stability_pool;
pub mod stablecoin;
pub mod troves;
pub mod types;
pub mod vesting;

#[cfg(test)]
mod tests;

// Re-exports
pub use collateral_token::*;
pub use constants::*;
pub use errors::*;
pub use events::*;
pub use issuance::*;
pub use loan_token::*;
pub use math::*;
pub use pools::*;
pub use protocol::*;
pub use stability_pool::*;
pub use stablecoin::*;
pub use troves::*;
pub use types::*;
pub use vesting::*;
