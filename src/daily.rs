//! Deterministic "quote of the day" selection.
//!
//! The index for a day is derived from the SHA-256 digest of the UTC date
//! (`YYYY-MM-DD`): the first four digest bytes are read as a big-endian
//! `u32` and reduced modulo the collection length. No state is kept, every
//! process that knows the date and the collection picks the same token.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sha2::{Digest, Sha256};

use crate::quote_store::{QuoteStore, StoreError};

/// Supplies the current calendar date.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Reads the host's system clock in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Returns the index selected for `date` in a collection of `len` tokens,
/// or [`None`] for an empty collection.
pub fn daily_index(date: NaiveDate, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }

    let date_str = date.format("%Y-%m-%d").to_string();
    let digest = Sha256::digest(date_str.as_bytes());
    let num = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);

    Some((u64::from(num) % len as u64) as usize)
}

pub fn select_for_date<T>(date: NaiveDate, items: &[T]) -> Option<&T> {
    daily_index(date, items.len()).map(|idx| &items[idx])
}

/// Picks today's token from the store.
#[derive(Clone)]
pub struct QuoteOfTheDay {
    store: QuoteStore,
    clock: Arc<dyn Clock>,
}

impl QuoteOfTheDay {
    pub fn new(store: QuoteStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &QuoteStore {
        &self.store
    }

    /// Returns today's token, [`None`] when no quote has been added yet.
    pub async fn today(&self) -> Result<Option<String>, StoreError> {
        let mut quotes = self.store.load().await?;
        let date = self.clock.today();
        Ok(daily_index(date, quotes.len()).map(|idx| quotes.swap_remove(idx)))
    }
}
