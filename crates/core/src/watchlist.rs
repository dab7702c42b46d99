//! Ranked shortlist of the accounts closest to liquidation.
//!
//! The list is kept ascending by ratio and bounded to a small capacity, so
//! it lives in an `ArrayVec` and every operation is a linear scan over a
//! handful of entries.

use arrayvec::ArrayVec;
use parking_lot::RwLock;
use serde::Serialize;

/// Hard upper bound on the shortlist size.
pub const MAX_WATCHLIST_CAPACITY: usize = 64;

/// An account and its collateralization ratio as reported by the contract.
/// A ratio of zero means the account has no debt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountRatio {
    pub account_id: String,
    pub ratio: u128,
}

impl AccountRatio {
    pub fn new(account_id: impl Into<String>, ratio: u128) -> Self {
        Self {
            account_id: account_id.into(),
            ratio,
        }
    }
}

/// Bounded list of accounts, ascending by ratio, without duplicates.
#[derive(Debug, Clone)]
pub struct Watchlist {
    entries: ArrayVec<AccountRatio, MAX_WATCHLIST_CAPACITY>,
    capacity: usize,
}

impl Watchlist {
    /// Create an empty list. `capacity` is clamped to `1..=MAX_WATCHLIST_CAPACITY`.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: ArrayVec::new(),
            capacity: capacity.clamp(1, MAX_WATCHLIST_CAPACITY),
        }
    }

    /// Build a list by offering every candidate in arrival order.
    pub fn from_candidates<I>(capacity: usize, candidates: I) -> Self
    where
        I: IntoIterator<Item = AccountRatio>,
    {
        let mut list = Self::new(capacity);
        for candidate in candidates {
            list.offer(candidate);
        }
        list
    }

    /// Offer an account to the list. Returns true if it was inserted.
    ///
    /// Zero ratios and ids already present are ignored. When the list is
    /// full the candidate must be strictly better than the current last
    /// entry, which is then evicted. Equal ratios keep arrival order.
    pub fn offer(&mut self, candidate: AccountRatio) -> bool {
        if candidate.ratio == 0 || self.contains(&candidate.account_id) {
            return false;
        }

        if self.is_full() {
            match self.entries.last() {
                Some(last) if candidate.ratio < last.ratio => {
                    self.entries.pop();
                }
                _ => return false,
            }
        }

        let mut pos = self.entries.len();
        while pos > 0 && self.entries[pos - 1].ratio > candidate.ratio {
            pos -= 1;
        }
        self.entries.insert(pos, candidate);
        true
    }

    /// Remove an account, returning its entry if it was present.
    pub fn remove(&mut self, account_id: &str) -> Option<AccountRatio> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.account_id == account_id)?;
        Some(self.entries.remove(pos))
    }

    pub fn contains(&self, account_id: &str) -> bool {
        self.entries.iter().any(|e| e.account_id == account_id)
    }

    pub fn get(&self, account_id: &str) -> Option<&AccountRatio> {
        self.entries.iter().find(|e| e.account_id == account_id)
    }

    pub fn entries(&self) -> &[AccountRatio] {
        &self.entries
    }

    pub fn account_ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.account_id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Watchlist shared between the refresh and decision tasks.
///
/// The list and the liquidation line it was built against live under one
/// lock. Every account claimed for liquidation bumps `epoch`; a refresh
/// that started under an older epoch read pre-liquidation state and is
/// refused by `publish`.
#[derive(Debug)]
pub struct SharedWatchlist {
    inner: RwLock<Published>,
}

#[derive(Debug)]
struct Published {
    list: Watchlist,
    min_ratio: Option<u128>,
    epoch: u64,
}

impl SharedWatchlist {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Published {
                list: Watchlist::new(capacity),
                min_ratio: None,
                epoch: 0,
            }),
        }
    }

    /// Claim counter; capture it before reading anything a refresh publishes.
    pub fn epoch(&self) -> u64 {
        self.inner.read().epoch
    }

    /// Replace list and line wholesale, unless an account was claimed
    /// since `epoch` was taken. Returns whether the list was installed.
    pub fn publish(&self, list: Watchlist, min_ratio: u128, epoch: u64) -> bool {
        let mut inner = self.inner.write();
        if inner.epoch != epoch {
            return false;
        }
        inner.list = list;
        inner.min_ratio = Some(min_ratio);
        true
    }

    /// Unknown until the first refresh is published.
    pub fn min_ratio(&self) -> Option<u128> {
        self.inner.read().min_ratio
    }

    /// Line and account ids (worst ratio first) from the same publish.
    pub fn view(&self) -> (Option<u128>, Vec<String>) {
        let inner = self.inner.read();
        (inner.min_ratio, inner.list.account_ids())
    }

    /// Account ids currently on the list, worst ratio first.
    pub fn snapshot(&self) -> Vec<String> {
        self.inner.read().list.account_ids()
    }

    /// Copy of the current list.
    pub fn current(&self) -> Watchlist {
        self.inner.read().list.clone()
    }

    /// Remove-if-present. Only the caller that gets `Some` may act on the
    /// account, and the claim invalidates refreshes already in flight.
    pub fn remove(&self, account_id: &str) -> Option<AccountRatio> {
        let mut inner = self.inner.write();
        let removed = inner.list.remove(account_id)?;
        inner.epoch += 1;
        Some(removed)
    }

    /// Put an account back, ranked by `ratio`.
    pub fn restore(&self, account_id: &str, ratio: u128) -> bool {
        self.inner
            .write()
            .list
            .offer(AccountRatio::new(account_id, ratio))
    }

    pub fn len(&self) -> usize {
        self.inner.read().list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().list.is_empty()
    }
}
