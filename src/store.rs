//! Window-scoped aggregation of per-identity activity.
//!
//! One `WindowStore` lives for exactly one ingestion window. Fetch workers
//! mutate it concurrently; updates are read-check-create-or-increment, so
//! every mutation holds the map lock. Export happens only after the fetch
//! stage has fully joined, so readers never race writers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::model::{AccountType, ActivityRecord, ActivityRow, Identity};

#[derive(Debug, Default)]
pub struct WindowStore {
    records: Mutex<HashMap<Identity, ActivityRecord>>,
    failures: AtomicU32,
}

impl WindowStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a post for `identity`, creating its record on first contact.
    pub fn record_post(&self, identity: Identity, account_type: AccountType, nickname: &str) {
        self.upsert(identity, account_type, nickname, |record| {
            record.post_count += 1;
        });
    }

    /// Count a comment for `identity`, creating its record on first contact.
    pub fn record_comment(&self, identity: Identity, account_type: AccountType, nickname: &str) {
        self.upsert(identity, account_type, nickname, |record| {
            record.comment_count += 1;
        });
    }

    fn upsert(
        &self,
        identity: Identity,
        account_type: AccountType,
        nickname: &str,
        bump: impl FnOnce(&mut ActivityRecord),
    ) {
        let mut records = self.records.lock().expect("aggregation lock poisoned");
        let record = records
            .entry(identity)
            .or_insert_with(|| ActivityRecord::new(account_type, nickname));
        // First classification observed for an identity is kept.
        record.observe_nickname(nickname);
        bump(record);
    }

    /// Record one exhausted-retry fetch failure; returns the running total.
    pub fn note_failure(&self) -> u32 {
        self.failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.failures.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn identity_count(&self) -> usize {
        self.records.lock().expect("aggregation lock poisoned").len()
    }

    /// Snapshot the aggregation as export rows, sorted by identity so the
    /// artifact is deterministic for a given set of observations.
    #[must_use]
    pub fn export_rows(&self, window_label: &str) -> Vec<ActivityRow> {
        let records = self.records.lock().expect("aggregation lock poisoned");
        let mut rows: Vec<ActivityRow> = records
            .iter()
            .map(|(identity, record)| ActivityRow {
                window_label: window_label.to_string(),
                nickname: record.latest_nickname.clone(),
                identity: identity.as_str().to_string(),
                account_type: record.account_type,
                post_count: record.post_count,
                comment_count: record.comment_count,
                total_activity: record.post_count + record.comment_count,
            })
            .collect();
        rows.sort_by(|a, b| a.identity.cmp(&b.identity));
        rows
    }
}
