//! LOAN Incentive Token Ledger
//!
//! Fixed-supply token distributed to Stability Pool participants and their
//! front ends. The full supply is minted once at genesis: the community
//! issuance vault receives its cap and the admin multisig holds the rest.
//!
//! During the first year after deployment the multisig may move LOAN only
//! into vesting locks deployed by the registry, and no account may move
//! LOAN to the multisig. Both restrictions lapse after one year.

use crate::constants::incentive::TOTAL_SUPPLY;
use crate::constants::lockup::ONE_YEAR_SECONDS;
use crate::constants::schedule::LOAN_SUPPLY_CAP;
use crate::errors::{FurUsdError, FurUsdResult};
use crate::events::{EventLog, ProtocolEvent, TokenKind};
use crate::math;
use crate::types::{Address, AddressBook};
use crate::vesting::VestingRegistry;
use crate::BTreeMap;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// LOAN balance ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanToken {
    #[serde(with = "crate::types::serde_address_map")]
    balances: BTreeMap<Address, U256>,
    total_supply: U256,
    book: AddressBook,
    deployment_time: u64,
}

impl LoanToken {
    /// Creates the ledger and mints the genesis allocation: the issuance
    /// cap to the community issuance vault, the remainder to the multisig.
    pub fn new(book: AddressBook, deployment_time: u64) -> Self {
        let cap = U256::from(LOAN_SUPPLY_CAP);
        let total = U256::from(TOTAL_SUPPLY);
        let mut balances = BTreeMap::new();
        balances.insert(book.community_issuance, cap);
        balances.insert(book.multisig, total - cap);
        Self {
            balances,
            total_supply: total,
            book,
            deployment_time,
        }
    }

    /// Balance of an address
    pub fn balance_of(&self, who: &Address) -> U256 {
        self.balances.get(who).copied().unwrap_or_default()
    }

    /// Total LOAN supply (constant after genesis)
    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    /// End of the admin restriction window
    pub fn transfer_lock_end(&self) -> u64 {
        self.deployment_time.saturating_add(ONE_YEAR_SECONDS)
    }

    /// Transfer LOAN, applying the first-year admin restrictions
    pub fn transfer(
        &mut self,
        events: &mut EventLog,
        registry: &VestingRegistry,
        from: Address,
        to: Address,
        amount: U256,
        now: u64,
    ) -> FurUsdResult<()> {
        if amount.is_zero() {
            return Err(FurUsdError::ZeroAmount);
        }
        if to == self.book.loan_token {
            return Err(FurUsdError::InvalidRecipient { to });
        }

        if now < self.transfer_lock_end() {
            if from == self.book.multisig && !registry.is_registered_lock(&to) {
                return Err(FurUsdError::LockNotRegistered { target: to });
            }
            if to == self.book.multisig {
                return Err(FurUsdError::InvalidRecipient { to });
            }
        }

        let balance = self.balance_of(&from);
        if balance < amount {
            return Err(FurUsdError::InsufficientBalance {
                available_lo: math::lo(balance),
                requested_lo: math::lo(amount),
            });
        }
        self.balances.insert(from, balance - amount);
        let entry = self.balances.entry(to).or_default();
        *entry = math::checked_add(*entry, amount)?;

        events.emit(ProtocolEvent::TokenTransfer {
            kind: TokenKind::Incentive,
            from,
            to,
            amount,
        });
        Ok(())
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

    const DEPLOY: u64 = 1_000_000;

    #[test]
    fn test_genesis_allocation() {
        let b = book();
        let token = LoanToken::new(b, DEPLOY);
        assert_eq!(token.balance_of(&b.community_issuance), dec(32_000_000));
        assert_eq!(token.balance_of(&b.multisig), dec(68_000_000));
        assert_eq!(token.total_supply(), dec(100_000_000));
    }

    #[test]
    fn test_multisig_locked_to_unregistered_targets() {
        let b = book();
        let mut token = LoanToken::new(b, DEPLOY);
        let mut events = EventLog::new();
        let registry = VestingRegistry::new(DEPLOY);

        let err = token.transfer(
            &mut events,
            &registry,
            b.multisig,
            [1u8; 32],
            dec(100),
            DEPLOY + 100,
        );
        assert!(matches!(err, Err(FurUsdError::LockNotRegistered { .. })));
    }

    #[test]
    fn test_multisig_may_fund_registered_lock() {
        let b = book();
        let mut token = LoanToken::new(b, DEPLOY);
        let mut events = EventLog::new();
        let mut registry = VestingRegistry::new(DEPLOY);

        let lock = registry
            .deploy_lock(
                &mut events,
                b.multisig,
                [1u8; 32],
                DEPLOY + ONE_YEAR_SECONDS,
            )
            .unwrap();

        token
            .transfer(&mut events, &registry, b.multisig, lock, dec(100), DEPLOY + 100)
            .unwrap();
        assert_eq!(token.balance_of(&lock), dec(100));
    }

    #[test]
    fn test_no_transfers_to_multisig_in_first_year() {
        let b = book();
        let mut token = LoanToken::new(b, DEPLOY);
        let mut events = EventLog::new();
        let registry = VestingRegistry::new(DEPLOY);

        // seed a user balance from the issuance vault
        token
            .transfer(
                &mut events,
                &registry,
                b.community_issuance,
                [1u8; 32],
                dec(50),
                DEPLOY + 100,
            )
            .unwrap();

        let err = token.transfer(
            &mut events,
            &registry,
            [1u8; 32],
            b.multisig,
            dec(10),
            DEPLOY + 200,
        );
        assert!(matches!(err, Err(FurUsdError::InvalidRecipient { .. })));
    }

    #[test]
    fn test_restrictions_lapse_after_one_year() {
        let b = book();
        let mut token = LoanToken::new(b, DEPLOY);
        let mut events = EventLog::new();
        let registry = VestingRegistry::new(DEPLOY);
        let later = DEPLOY + ONE_YEAR_SECONDS + 1;

        token
            .transfer(&mut events, &registry, b.multisig, [1u8; 32], dec(100), later)
            .unwrap();
        token
            .transfer(&mut events, &registry, [1u8; 32], b.multisig, dec(40), later)
            .unwrap();
        assert_eq!(token.balance_of(&[1u8; 32]), dec(60));
    }
}
