//! OTP record storage.
//!
//! One record per canonical phone number; issuing a new code replaces the
//! previous record wholesale. [`OtpStore::update`] runs its closure under
//! the store's own lock, which is what makes verification's
//! read-check-mutate sequence atomic.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// A single pending or verified code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpRecord {
    /// Canonical phone number, the record key.
    pub phone_number: String,
    /// The six-digit code.
    pub code: String,
    /// Whether a matching code was submitted.
    pub verified: bool,
    /// Failed verification attempts so far.
    pub attempts: u32,
    /// Issuance time.
    pub created_at: SystemTime,
    /// End of the validity window.
    pub expires_at: SystemTime,
    /// Time of successful verification, if any.
    pub verified_at: Option<SystemTime>,
}

impl OtpRecord {
    /// Creates a fresh record for a just-issued code.
    pub fn issue(phone_number: String, code: String, now: SystemTime, ttl: Duration) -> Self {
        Self {
            phone_number,
            code,
            verified: false,
            attempts: 0,
            created_at: now,
            expires_at: now + ttl,
            verified_at: None,
        }
    }
}

/// Aggregate counters over the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpStats {
    /// Records currently held.
    pub total: u64,
    /// Verified records.
    pub verified: u64,
    /// Unverified records.
    pub pending: u64,
    /// Records created within the last 24 hours.
    #[serde(rename = "last24Hours")]
    pub last_24_hours: u64,
}

/// What an [`OtpStore::update`] closure wants done with the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreDisposition {
    /// Keep the (possibly mutated) record.
    Retain,
    /// Drop the record.
    Remove,
}

/// Keyed storage of OTP records.
pub trait OtpStore: Send + Sync {
    /// Inserts or replaces the record for its phone number.
    fn upsert(&self, record: OtpRecord);

    /// Returns a snapshot of the record for a number.
    fn find(&self, phone_number: &str) -> Option<OtpRecord>;

    /// Removes the record for a number. Returns whether one existed.
    fn delete(&self, phone_number: &str) -> bool;

    /// Runs `apply` on the record slot under the store lock.
    ///
    /// The closure sees `None` when no record exists and decides whether
    /// the record survives. No other store access interleaves with it.
    fn update(
        &self,
        phone_number: &str,
        apply: &mut dyn FnMut(Option<&mut OtpRecord>) -> StoreDisposition,
    );

    /// Aggregate counters at `now`.
    fn stats(&self, now: SystemTime) -> OtpStats;
}

/// How long a record lingers past its expiry before eviction.
///
/// Mirrors the validity window itself, so an expired code still produces
/// the "expired" verification outcome for a while instead of "not found".
/// Verified records age out on the same schedule; the store is a bounded
/// working set, not an archive.
const EVICTION_GRACE: Duration = Duration::from_secs(600);

/// In-memory store.
#[derive(Default)]
pub struct MemoryOtpStore {
    records: Mutex<HashMap<String, OtpRecord>>,
}

impl MemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evicts records whose expiry passed more than the grace period ago,
    /// verified or not. Called opportunistically on writes.
    fn evict_stale(records: &mut HashMap<String, OtpRecord>, now: SystemTime) {
        records.retain(|_, r| now < r.expires_at + EVICTION_GRACE);
    }
}

impl OtpStore for MemoryOtpStore {
    fn upsert(&self, record: OtpRecord) {
        let mut records = self.records.lock();
        Self::evict_stale(&mut records, record.created_at);
        trace!(phone = %record.phone_number, "OTP record stored");
        records.insert(record.phone_number.clone(), record);
    }

    fn find(&self, phone_number: &str) -> Option<OtpRecord> {
        self.records.lock().get(phone_number).cloned()
    }

    fn delete(&self, phone_number: &str) -> bool {
        self.records.lock().remove(phone_number).is_some()
    }

    fn update(
        &self,
        phone_number: &str,
        apply: &mut dyn FnMut(Option<&mut OtpRecord>) -> StoreDisposition,
    ) {
        let mut records = self.records.lock();
        match records.get_mut(phone_number) {
            Some(record) => {
                if apply(Some(record)) == StoreDisposition::Remove {
                    records.remove(phone_number);
                }
            }
            None => {
                apply(None);
            }
        }
    }

    fn stats(&self, now: SystemTime) -> OtpStats {
        let records = self.records.lock();
        let day_ago = now - Duration::from_secs(24 * 60 * 60);
        let total = records.len() as u64;
        let verified = records.values().filter(|r| r.verified).count() as u64;
        let last_24_hours = records
            .values()
            .filter(|r| r.created_at >= day_ago)
            .count() as u64;
        OtpStats {
            total,
            verified,
            pending: total - verified,
            last_24_hours,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(phone: &str, code: &str, now: SystemTime) -> OtpRecord {
        OtpRecord::issue(phone.into(), code.into(), now, Duration::from_secs(600))
    }

    #[test]
    fn test_upsert_replaces_previous_record() {
        let store = MemoryOtpStore::new();
        let now = SystemTime::now();
        store.upsert(record("263719647303", "111111", now));
        store.upsert(record("263719647303", "222222", now));

        let found = store.find("263719647303").unwrap();
        assert_eq!(found.code, "222222");
        assert_eq!(found.attempts, 0);
    }

    #[test]
    fn test_update_remove_disposition_deletes() {
        let store = MemoryOtpStore::new();
        let now = SystemTime::now();
        store.upsert(record("263719647303", "111111", now));

        store.update("263719647303", &mut |slot| {
            assert!(slot.is_some());
            StoreDisposition::Remove
        });
        assert!(store.find("263719647303").is_none());
    }

    #[test]
    fn test_update_sees_missing_record() {
        let store = MemoryOtpStore::new();
        let mut saw_none = false;
        store.update("263719647303", &mut |slot| {
            saw_none = slot.is_none();
            StoreDisposition::Retain
        });
        assert!(saw_none);
    }

    #[test]
    fn test_stats_counts() {
        let store = MemoryOtpStore::new();
        let now = SystemTime::now();
        store.upsert(record("263719647303", "111111", now));

        let mut old = record("14155550100", "222222", now - Duration::from_secs(48 * 60 * 60));
        old.verified = true;
        old.verified_at = Some(now);
        store.upsert(old);

        let stats = store.stats(now);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.verified, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.last_24_hours, 1);
    }

    #[test]
    fn test_stale_records_evicted_on_write() {
        let store = MemoryOtpStore::new();
        let now = SystemTime::now();
        let long_ago = now - Duration::from_secs(2 * 60 * 60);
        store.upsert(record("14155550100", "111111", long_ago));

        // Verification does not pin a record in memory.
        let mut verified = record("919876543210", "333333", long_ago);
        verified.verified = true;
        verified.verified_at = Some(long_ago + Duration::from_secs(30));
        store.upsert(verified);

        store.upsert(record("263719647303", "222222", now));
        assert!(store.find("14155550100").is_none());
        assert!(store.find("919876543210").is_none());
        assert!(store.find("263719647303").is_some());
    }

    #[test]
    fn test_verified_record_survives_within_grace() {
        let store = MemoryOtpStore::new();
        let now = SystemTime::now();

        let mut verified = record("263719647303", "111111", now - Duration::from_secs(60));
        verified.verified = true;
        verified.verified_at = Some(now);
        store.upsert(verified);

        store.upsert(record("14155550100", "222222", now));
        assert!(store.find("263719647303").is_some());
    }
}
