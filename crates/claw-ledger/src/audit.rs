//! Append-only audit journal
//!
//! Every voucher event is appended as an entry whose hash covers the previous
//! entry's hash, so rewriting history breaks the chain.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use claw_types::{VoucherEvent, VoucherId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::clock::{Clock, SystemClock};
use crate::sink::EventSink;

/// Hash that precedes the first entry
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// An audit journal entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the journal, starting at 0
    pub sequence: u64,
    /// Hash of the preceding entry
    pub previous_hash: String,
    /// Hash of this entry
    pub hash: String,
    pub recorded_at: DateTime<Utc>,
    pub event: VoucherEvent,
}

impl AuditEntry {
    /// Compute hash of this entry
    pub fn compute_hash(&self) -> String {
        let content = format!(
            "{}:{}:{}:{:?}",
            self.sequence,
            self.previous_hash,
            self.recorded_at.timestamp_micros(),
            self.event
        );
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Verify the entry hash
    pub fn verify(&self) -> bool {
        self.hash == self.compute_hash()
    }
}

/// Hash-chained, append-only journal of voucher events
#[derive(Debug, Clone)]
pub struct AuditJournal {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
    clock: Arc<dyn Clock>,
}

impl Default for AuditJournal {
    fn default() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            clock: Arc::new(SystemClock),
        }
    }
}

impl AuditJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp entries from `clock`; share the ledger's clock so entries agree
    /// with the voucher timestamps they describe
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Append an event. Returns the new entry's sequence number.
    pub fn append(&self, event: VoucherEvent) -> u64 {
        let mut entries = self.entries.lock();
        let sequence = entries.len() as u64;
        let previous_hash = entries
            .last()
            .map(|e| e.hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());

        let mut entry = AuditEntry {
            sequence,
            previous_hash,
            hash: String::new(),
            recorded_at: self.clock.now(),
            event,
        };
        entry.hash = entry.compute_hash();
        entries.push(entry);
        sequence
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Every entry, oldest first
    pub fn export(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    /// Entries concerning one voucher
    pub fn entries_for(&self, id: VoucherId) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.event.voucher_id() == id)
            .cloned()
            .collect()
    }

    /// Verify every hash and every back-link
    pub fn verify_chain(&self) -> bool {
        verify_entries(&self.entries.lock())
    }
}

impl EventSink for AuditJournal {
    fn record(&self, event: &VoucherEvent) {
        self.append(event.clone());
    }
}

/// Verify an exported chain
pub fn verify_entries(entries: &[AuditEntry]) -> bool {
    let mut previous = GENESIS_HASH;
    for (index, entry) in entries.iter().enumerate() {
        if entry.sequence != index as u64 || entry.previous_hash != previous || !entry.verify() {
            return false;
        }
        previous = entry.hash.as_str();
    }
    true
}
