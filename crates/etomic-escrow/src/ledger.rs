use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use etomic_core::{Address, Amount, Asset, Call, EscrowError};

/// Moves assets in and out of escrow on the hosting ledger.
///
/// A transfer either completes or fails as a whole; implementations never
/// split or retry.
pub trait AssetLedger: Send + Sync {
    /// Take `amount` of `asset` from the caller into escrow.
    ///
    /// Native: the value attached to the call must equal `amount` exactly.
    /// Token: no native value may be attached and the escrow account pulls
    /// `amount` against the caller's allowance.
    fn lock(&self, asset: Asset, amount: Amount, call: &Call) -> Result<(), EscrowError>;

    /// Pay `amount` of `asset` out of escrow to `to`.
    fn release(&self, asset: Asset, amount: Amount, to: Address) -> Result<(), EscrowError>;
}

#[derive(Debug, Default)]
struct Books {
    balances: HashMap<(Asset, Address), Amount>,
    /// (token, owner, spender) -> remaining allowance.
    allowances: HashMap<(Address, Address, Address), Amount>,
    rejecting: HashSet<(Asset, Address)>,
}

impl Books {
    fn balance(&self, asset: Asset, account: Address) -> Amount {
        self.balances.get(&(asset, account)).copied().unwrap_or(0)
    }

    fn check_accepts(&self, asset: Asset, account: Address) -> Result<(), EscrowError> {
        if self.rejecting.contains(&(asset, account)) {
            return Err(EscrowError::AssetTransferFailed(format!(
                "{} transfers involving {} are rejected",
                asset, account
            )));
        }
        Ok(())
    }

    /// Move funds between two accounts. Nothing changes unless every check
    /// passes.
    fn transfer(
        &mut self,
        asset: Asset,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), EscrowError> {
        self.check_accepts(asset, from)?;
        self.check_accepts(asset, to)?;
        let from_balance = self.balance(asset, from);
        if from_balance < amount {
            return Err(EscrowError::AssetTransferFailed(format!(
                "insufficient {} balance for {}: has {}, needs {}",
                asset, from, from_balance, amount
            )));
        }
        if from == to {
            return Ok(());
        }
        let to_balance = self.balance(asset, to).checked_add(amount).ok_or_else(|| {
            EscrowError::AssetTransferFailed(format!("{} balance of {} overflows", asset, to))
        })?;
        self.balances.insert((asset, from), from_balance - amount);
        self.balances.insert((asset, to), to_balance);
        Ok(())
    }
}

/// One non-zero balance in a [`LedgerSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub asset: Asset,
    pub account: Address,
    pub amount: Amount,
}

/// One non-zero allowance in a [`LedgerSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceEntry {
    pub token: Address,
    pub owner: Address,
    pub spender: Address,
    pub amount: Amount,
}

/// Balances and allowances of a [`MemoryLedger`], for persisting it.
///
/// Entries are sorted so equal books give equal snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub balances: Vec<BalanceEntry>,
    pub allowances: Vec<AllowanceEntry>,
}

/// In-memory reference ledger holding native and token balances.
///
/// All bookkeeping for a transfer happens under one lock, so a failed
/// transfer leaves every balance and allowance untouched.
#[derive(Debug)]
pub struct MemoryLedger {
    escrow_account: Address,
    books: Mutex<Books>,
}

impl MemoryLedger {
    pub fn new(escrow_account: Address) -> Self {
        Self {
            escrow_account,
            books: Mutex::new(Books::default()),
        }
    }

    fn books(&self) -> MutexGuard<'_, Books> {
        self.books.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn escrow_account(&self) -> Address {
        self.escrow_account
    }

    /// Credit `amount` of `asset` to `to` out of thin air.
    pub fn mint(&self, asset: Asset, to: Address, amount: Amount) -> Result<(), EscrowError> {
        let mut books = self.books();
        let balance = books.balance(asset, to);
        let updated = balance.checked_add(amount).ok_or_else(|| {
            EscrowError::AssetTransferFailed(format!("{} balance of {} overflows", asset, to))
        })?;
        books.balances.insert((asset, to), updated);
        Ok(())
    }

    pub fn balance_of(&self, asset: Asset, account: Address) -> Amount {
        self.books().balance(asset, account)
    }

    /// Set the amount of `token` that `spender` may pull from `owner`.
    pub fn approve(&self, token: Address, owner: Address, spender: Address, amount: Amount) {
        self.books()
            .allowances
            .insert((token, owner, spender), amount);
        tracing::debug!(token = %token, owner = %owner, spender = %spender, amount = %amount, "allowance set");
    }

    pub fn allowance(&self, token: Address, owner: Address, spender: Address) -> Amount {
        self.books()
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or(0)
    }

    /// Copy of every non-zero balance and allowance.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let books = self.books();
        let mut balances: Vec<BalanceEntry> = books
            .balances
            .iter()
            .filter(|(_, amount)| **amount != 0)
            .map(|(&(asset, account), &amount)| BalanceEntry {
                asset,
                account,
                amount,
            })
            .collect();
        balances.sort_by_key(|entry| (entry.asset, entry.account));
        let mut allowances: Vec<AllowanceEntry> = books
            .allowances
            .iter()
            .filter(|(_, amount)| **amount != 0)
            .map(|(&(token, owner, spender), &amount)| AllowanceEntry {
                token,
                owner,
                spender,
                amount,
            })
            .collect();
        allowances.sort_by_key(|entry| (entry.token, entry.owner, entry.spender));
        LedgerSnapshot {
            balances,
            allowances,
        }
    }

    /// Replace every balance and allowance with the ones in `snapshot`.
    pub fn restore(&self, snapshot: LedgerSnapshot) {
        let mut books = self.books();
        books.balances = snapshot
            .balances
            .into_iter()
            .map(|entry| ((entry.asset, entry.account), entry.amount))
            .collect();
        books.allowances = snapshot
            .allowances
            .into_iter()
            .map(|entry| ((entry.token, entry.owner, entry.spender), entry.amount))
            .collect();
    }

    /// Make every transfer of `asset` to or from `account` fail.
    pub fn set_rejecting(&self, asset: Asset, account: Address, rejecting: bool) {
        let mut books = self.books();
        if rejecting {
            books.rejecting.insert((asset, account));
        } else {
            books.rejecting.remove(&(asset, account));
        }
    }
}

impl AssetLedger for MemoryLedger {
    fn lock(&self, asset: Asset, amount: Amount, call: &Call) -> Result<(), EscrowError> {
        let mut books = self.books();
        match asset {
            Asset::Native => {
                if call.value != amount {
                    return Err(EscrowError::AmountMismatch {
                        expected: amount,
                        actual: call.value,
                    });
                }
                books.transfer(asset, call.caller, self.escrow_account, amount)
            }
            Asset::Token(token) => {
                if call.value != 0 {
                    return Err(EscrowError::AmountMismatch {
                        expected: 0,
                        actual: call.value,
                    });
                }
                let key = (token, call.caller, self.escrow_account);
                let allowance = books.allowances.get(&key).copied().unwrap_or(0);
                if allowance < amount {
                    return Err(EscrowError::AssetTransferFailed(format!(
                        "allowance of {} for {} is {}, needs {}",
                        token, call.caller, allowance, amount
                    )));
                }
                books.transfer(asset, call.caller, self.escrow_account, amount)?;
                books.allowances.insert(key, allowance - amount);
                Ok(())
            }
        }
    }

    fn release(&self, asset: Asset, amount: Amount, to: Address) -> Result<(), EscrowError> {
        self.books().transfer(asset, self.escrow_account, to, amount)
    }
}
