//! Vesting Locks and the Deploying Registry
//!
//! A lock holds LOAN for a single beneficiary until its unlock time. The
//! registry is the factory that creates locks and records their addresses;
//! that record is the authenticity check the LOAN token consults when the
//! admin multisig moves funds during its first-year restriction window.

use crate::constants::lockup::ONE_YEAR_SECONDS;
use crate::errors::{FurUsdError, FurUsdResult};
use crate::events::{EventLog, ProtocolEvent};
use crate::loan_token::LoanToken;
use crate::types::Address;
use crate::BTreeMap;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single-beneficiary time lock. The locked balance lives in the LOAN
/// ledger under the lock's derived address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingLock {
    /// Derived address holding the locked balance
    pub address: Address,
    /// The only account allowed to withdraw
    pub beneficiary: Address,
    /// Timestamp after which withdrawal is allowed
    pub unlock_time: u64,
}

/// Factory and registry of deployed vesting locks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingRegistry {
    #[serde(with = "crate::types::serde_address_map")]
    locks: BTreeMap<Address, VestingLock>,
    #[serde(with = "crate::types::serde_address_map")]
    deployer_nonces: BTreeMap<Address, u64>,
    deployment_time: u64,
}

impl VestingRegistry {
    /// Creates an empty registry anchored at the system deployment time
    pub fn new(deployment_time: u64) -> Self {
        Self {
            locks: BTreeMap::new(),
            deployer_nonces: BTreeMap::new(),
            deployment_time,
        }
    }

    /// Deploys a new lock and records its address.
    ///
    /// The unlock time must lie at least one year past system deployment,
    /// matching the admin transfer restriction the locks exist to serve.
    pub fn deploy_lock(
        &mut self,
        events: &mut EventLog,
        deployer: Address,
        beneficiary: Address,
        unlock_time: u64,
    ) -> FurUsdResult<Address> {
        let minimum = self.deployment_time.saturating_add(ONE_YEAR_SECONDS);
        if unlock_time < minimum {
            return Err(FurUsdError::LockHorizonTooShort {
                unlock_time,
                minimum,
            });
        }

        let nonce = self.deployer_nonces.entry(deployer).or_insert(0);
        let address = derive_lock_address(&deployer, &beneficiary, *nonce);
        *nonce += 1;

        self.locks.insert(
            address,
            VestingLock {
                address,
                beneficiary,
                unlock_time,
            },
        );
        events.emit(ProtocolEvent::LockDeployed {
            lock: address,
            beneficiary,
            unlock_time,
        });
        Ok(address)
    }

    /// Authenticity check consumed by the LOAN token
    pub fn is_registered_lock(&self, address: &Address) -> bool {
        self.locks.contains_key(address)
    }

    /// Look up a deployed lock
    pub fn lock(&self, address: &Address) -> Option<&VestingLock> {
        self.locks.get(address)
    }

    /// Releases a lock's entire LOAN balance to its beneficiary
    pub fn withdraw_from_lock(
        &self,
        events: &mut EventLog,
        caller: Address,
        lock_address: Address,
        now: u64,
        loan: &mut LoanToken,
    ) -> FurUsdResult<U256> {
        let lock = self
            .locks
            .get(&lock_address)
            .ok_or(FurUsdError::LockNotRegistered {
                target: lock_address,
            })?;

        if caller != lock.beneficiary {
            return Err(FurUsdError::Unauthorized {
                expected: lock.beneficiary,
                actual: caller,
            });
        }
        if now < lock.unlock_time {
            return Err(FurUsdError::VestingNotDue {
                unlock_time: lock.unlock_time,
                now,
            });
        }

        let amount = loan.balance_of(&lock_address);
        loan.transfer(events, self, lock_address, lock.beneficiary, amount, now)?;
        events.emit(ProtocolEvent::LockWithdrawal {
            lock: lock_address,
            beneficiary: lock.beneficiary,
            amount,
        });
        Ok(amount)
    }
}

/// Lock addresses are derived from the deployer, the beneficiary and a
/// per-deployer nonce, so repeat deployments never collide.
fn derive_lock_address(deployer: &Address, beneficiary: &Address, nonce: u64) -> Address {
    let mut hasher = Sha256::new();
    hasher.update(deployer);
    hasher.update(beneficiary);
    hasher.update(nonce.to_le_bytes());
    hasher.finalize().into()
}
