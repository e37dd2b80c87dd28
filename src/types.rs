//! Core Types for the FURUSD Protocol
//!
//! Fundamental data structures shared across the protocol modules. All
//! monetary fields are 18-decimal fixed point in 256-bit integers; scale
//! and epoch counters are 128-bit.

use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Type alias for addresses (32-byte hash)
pub type Address = [u8; 32];

/// JSON-safe encoding for address-keyed maps. JSON object keys must be
/// strings, so every `BTreeMap<Address, V>` in persisted state serializes
/// as a sequence of pairs instead.
pub mod serde_address_map {
    use super::Address;
    use crate::{BTreeMap, Vec};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize the map as a sequence of `(address, value)` pairs
    pub fn serialize<S, V>(map: &BTreeMap<Address, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize,
    {
        let entries: Vec<(&Address, &V)> = map.iter().collect();
        entries.serialize(serializer)
    }

    /// Deserialize a sequence of pairs back into the map
    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<BTreeMap<Address, V>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        let entries: Vec<(Address, V)> = Vec::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}

/// Identities of every wired collaborator. Built once at genesis and
/// copied into each component for its caller checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBook {
    /// FURUSD stablecoin ledger
    pub stablecoin: Address,
    /// LOAN incentive token ledger
    pub loan_token: Address,
    /// Community issuance vault
    pub community_issuance: Address,
    /// Stability Pool core
    pub stability_pool: Address,
    /// Trove Manager (sole caller of offset)
    pub trove_manager: Address,
    /// Borrower Operations
    pub borrower_operations: Address,
    /// Active collateral/debt ledger
    pub active_pool: Address,
    /// Redistribution ledger
    pub default_pool: Address,
    /// Liquidation surplus ledger
    pub coll_surplus_pool: Address,
    /// Admin account subject to the first-year LOAN transfer lock
    pub multisig: Address,
}

// ============ Stability Pool Types ============

/// A depositor's principal record
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Deposit {
    /// FURUSD recorded at the last touch of this deposit
    pub initial_value: U256,
    /// Referring front end, fixed on first provide; None for untagged
    pub front_end_tag: Option<Address>,
}

/// A registered front end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontEnd {
    /// Fraction of a tagged depositor's LOAN gain paid to the depositor,
    /// in [0, DECIMAL_PRECISION]; the complement goes to the front end.
    /// Immutable after registration.
    pub kickback_rate: U256,
    /// Set once by register_front_end and never cleared
    pub registered: bool,
}

/// Accumulator snapshot taken whenever a deposit or front-end stake is
/// updated. Front ends track P and G only; S stays zero for them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Snapshots {
    /// Collateral-gain sum at the snapshot's (epoch, scale)
    pub s: U256,
    /// Running product at the snapshot
    pub p: U256,
    /// LOAN-gain sum at the snapshot's (epoch, scale)
    pub g: U256,
    /// Scale at the snapshot
    pub scale: u128,
    /// Epoch at the snapshot
    pub epoch: u128,
}

// ============ Trove Types ============

/// Status of a trove
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TroveStatus {
    /// No record exists
    #[default]
    NonExistent,
    /// Trove is open and can receive collateral
    Active,
    /// Closed by its owner
    Closed,
    /// Closed by liquidation
    Liquidated,
}

/// A collateralized debt position. Creation and interest accrual live
/// outside this crate; the core reads status and collateral/debt totals
/// and reroutes gains into the collateral field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trove {
    /// Owner's address
    pub owner: Address,
    /// FURFI collateral backing the position
    pub collateral: U256,
    /// FURUSD debt drawn against it
    pub debt: U256,
    /// Current status
    pub status: TroveStatus,
}

impl Trove {
    /// Creates an active trove record
    pub fn new(owner: Address, collateral: U256, debt: U256) -> Self {
        Self {
            owner,
            collateral,
            debt,
            status: TroveStatus::Active,
        }
    }

    /// Returns true if the trove is open
    pub fn is_active(&self) -> bool {
        self.status == TroveStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trove_status() {
        let trove = Trove::new([1u8; 32], U256::from(10), U256::from(5));
        assert!(trove.is_active());

        let mut closed = trove.clone();
        closed.status = TroveStatus::Liquidated;
        assert!(!closed.is_active());
    }

    #[test]
    fn test_default_deposit_is_empty() {
        let d = Deposit::default();
        assert!(d.initial_value.is_zero());
        assert!(d.front_end_tag.is_none());
    }
}
