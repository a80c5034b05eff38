//! RocksDB storage backend for the Etomic node.
//!
//! One column family per record family, keyed by the 32 swap id bytes and
//! holding the record as JSON. The `meta` family keeps the node's own state:
//! the last height of the height clock and the reference ledger's books.

use anyhow::Result;
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, DB};
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use etomic_core::{EscrowError, SwapId};
use etomic_escrow::{
    ApprovalSignal, DealRecord, EscrowStores, LedgerSnapshot, LegRecord, PaymentRecord,
    RecordStore, RelayDealRecord,
};

/// Column family names for the record families.
pub const CF_PAYMENTS: &str = "payments";
pub const CF_DEPOSITS: &str = "deposits";
pub const CF_LEGS: &str = "legs";
pub const CF_DEALS: &str = "deals";
pub const CF_RELAY_DEALS: &str = "relay_deals";
pub const CF_SIGNALS: &str = "signals";
pub const CF_META: &str = "meta";

const COLUMN_FAMILIES: [&str; 7] = [
    CF_PAYMENTS,
    CF_DEPOSITS,
    CF_LEGS,
    CF_DEALS,
    CF_RELAY_DEALS,
    CF_SIGNALS,
    CF_META,
];

const KEY_HEIGHT: &[u8] = b"height";
const KEY_LEDGER: &[u8] = b"ledger";

/// RocksDB-backed storage for the Etomic node.
#[derive(Clone)]
pub struct Storage {
    db: Arc<DB>,
}

impl Storage {
    /// Open or create a RocksDB database at the given path with column families.
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Put a value into a column family.
    pub fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| anyhow::anyhow!("column family '{}' not found", cf_name))?;
        self.db.put_cf(&cf, key, value)?;
        Ok(())
    }

    /// Get a value from a column family.
    pub fn get(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| anyhow::anyhow!("column family '{}' not found", cf_name))?;
        let value = self.db.get_cf(&cf, key)?;
        Ok(value)
    }

    /// Every key/value pair of a column family, in key order.
    pub fn scan(&self, cf_name: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| anyhow::anyhow!("column family '{}' not found", cf_name))?;
        let mut entries = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, value) = item?;
            entries.push((key.into_vec(), value.into_vec()));
        }
        Ok(entries)
    }

    /// Whether any record family holds a record.
    pub fn has_records(&self) -> Result<bool> {
        for name in COLUMN_FAMILIES.iter().filter(|name| **name != CF_META) {
            let cf = self
                .db
                .cf_handle(name)
                .ok_or_else(|| anyhow::anyhow!("column family '{}' not found", name))?;
            if let Some(item) = self.db.iterator_cf(&cf, IteratorMode::Start).next() {
                item?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Last height saved by the height clock.
    pub fn load_height(&self) -> Result<Option<u64>> {
        let Some(bytes) = self.get(CF_META, KEY_HEIGHT)? else {
            return Ok(None);
        };
        let bytes: [u8; 8] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| anyhow::anyhow!("stored height has {} bytes", bytes.len()))?;
        Ok(Some(u64::from_be_bytes(bytes)))
    }

    pub fn save_height(&self, height: u64) -> Result<()> {
        self.put(CF_META, KEY_HEIGHT, &height.to_be_bytes())
    }

    /// Reference ledger books as last saved, if any.
    pub fn load_ledger(&self) -> Result<Option<LedgerSnapshot>> {
        match self.get(CF_META, KEY_LEDGER)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn save_ledger(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        self.put(CF_META, KEY_LEDGER, &serde_json::to_vec(snapshot)?)
    }

    /// Typed view of one column family.
    pub fn records<R>(&self, cf_name: &'static str) -> RocksRecordStore<R> {
        RocksRecordStore {
            storage: self.clone(),
            cf_name,
            _record: PhantomData,
        }
    }

    /// Stores for every record family, backed by this database.
    pub fn escrow_stores(&self) -> EscrowStores {
        EscrowStores {
            payments: Arc::new(self.records::<PaymentRecord>(CF_PAYMENTS)),
            deposits: Arc::new(self.records::<LegRecord>(CF_DEPOSITS)),
            legs: Arc::new(self.records::<LegRecord>(CF_LEGS)),
            deals: Arc::new(self.records::<DealRecord>(CF_DEALS)),
            relay_deals: Arc::new(self.records::<RelayDealRecord>(CF_RELAY_DEALS)),
            signals: Arc::new(self.records::<ApprovalSignal>(CF_SIGNALS)),
        }
    }
}

/// A record family persisted as JSON in one column family.
pub struct RocksRecordStore<R> {
    storage: Storage,
    cf_name: &'static str,
    _record: PhantomData<fn() -> R>,
}

fn storage_error(cf_name: &str, err: impl std::fmt::Display) -> EscrowError {
    EscrowError::Storage(format!("{}: {}", cf_name, err))
}

impl<R> RecordStore<R> for RocksRecordStore<R>
where
    R: Serialize + DeserializeOwned + Send + Sync,
{
    fn load(&self, id: &SwapId) -> Result<Option<R>, EscrowError> {
        let Some(bytes) = self
            .storage
            .get(self.cf_name, id.as_bytes())
            .map_err(|e| storage_error(self.cf_name, e))?
        else {
            return Ok(None);
        };
        let record = serde_json::from_slice(&bytes).map_err(|e| storage_error(self.cf_name, e))?;
        Ok(Some(record))
    }

    fn save(&self, id: &SwapId, record: &R) -> Result<(), EscrowError> {
        let bytes = serde_json::to_vec(record).map_err(|e| storage_error(self.cf_name, e))?;
        self.storage
            .put(self.cf_name, id.as_bytes(), &bytes)
            .map_err(|e| storage_error(self.cf_name, e))
    }

    fn entries(&self) -> Result<Vec<(SwapId, R)>, EscrowError> {
        let rows = self
            .storage
            .scan(self.cf_name)
            .map_err(|e| storage_error(self.cf_name, e))?;
        let mut entries = Vec::with_capacity(rows.len());
        for (key, value) in rows {
            let key: [u8; 32] = key.as_slice().try_into().map_err(|_| {
                storage_error(self.cf_name, format!("bad key length {}", key.len()))
            })?;
            let record =
                serde_json::from_slice(&value).map_err(|e| storage_error(self.cf_name, e))?;
            entries.push((SwapId(key), record));
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etomic_core::{Address, Asset, RelayDealStatus};
    use std::path::PathBuf;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("etomic-test-{}", rand::random::<u64>()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn record(status: RelayDealStatus) -> RelayDealRecord {
        RelayDealRecord {
            initiator: Address([1; 20]),
            receiver: Address([2; 20]),
            asset: Asset::Native,
            amount: u128::MAX,
            claim_until: 42,
            status,
        }
    }

    #[test]
    fn test_open_storage() {
        let dir = temp_dir();
        let storage = Storage::open(&dir);
        assert!(storage.is_ok());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_put_get_raw() {
        let dir = temp_dir();
        let storage = Storage::open(&dir).unwrap();

        storage.put(CF_PAYMENTS, b"key", b"test data").unwrap();
        let result = storage.get(CF_PAYMENTS, b"key").unwrap();
        assert_eq!(result, Some(b"test data".to_vec()));
        assert!(storage.get(CF_DEALS, b"key").unwrap().is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_column_family() {
        let dir = temp_dir();
        let storage = Storage::open(&dir).unwrap();
        assert!(storage.get("unknown", b"key").is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_record_store_roundtrip() {
        let dir = temp_dir();
        let storage = Storage::open(&dir).unwrap();
        let store: RocksRecordStore<RelayDealRecord> = storage.records(CF_RELAY_DEALS);

        let id = SwapId([9; 32]);
        assert!(store.load(&id).unwrap().is_none());
        store.save(&id, &record(RelayDealStatus::Initialized)).unwrap();
        store.save(&id, &record(RelayDealStatus::PaidToReceiver)).unwrap();
        assert_eq!(
            store.load(&id).unwrap(),
            Some(record(RelayDealStatus::PaidToReceiver))
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_entries_in_key_order() {
        let dir = temp_dir();
        let storage = Storage::open(&dir).unwrap();
        let store: RocksRecordStore<RelayDealRecord> = storage.records(CF_RELAY_DEALS);

        for n in [3u8, 1, 2] {
            store
                .save(&SwapId([n; 32]), &record(RelayDealStatus::Initialized))
                .unwrap();
        }
        let ids: Vec<SwapId> = store.entries().unwrap().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![SwapId([1; 32]), SwapId([2; 32]), SwapId([3; 32])]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = temp_dir();
        let id = SwapId([7; 32]);
        {
            let storage = Storage::open(&dir).unwrap();
            storage
                .records::<RelayDealRecord>(CF_RELAY_DEALS)
                .save(&id, &record(RelayDealStatus::Initialized))
                .unwrap();
        }
        let storage = Storage::open(&dir).unwrap();
        let loaded = storage
            .records::<RelayDealRecord>(CF_RELAY_DEALS)
            .load(&id)
            .unwrap();
        assert_eq!(loaded, Some(record(RelayDealStatus::Initialized)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_meta_survives_reopen() {
        let dir = temp_dir();
        let snapshot = {
            let ledger = etomic_escrow::MemoryLedger::new(Address([0xee; 20]));
            ledger.mint(Asset::Native, Address([1; 20]), u128::MAX).unwrap();
            ledger.snapshot()
        };
        {
            let storage = Storage::open(&dir).unwrap();
            assert_eq!(storage.load_height().unwrap(), None);
            assert_eq!(storage.load_ledger().unwrap(), None);
            storage.save_height(41).unwrap();
            storage.save_height(42).unwrap();
            storage.save_ledger(&snapshot).unwrap();
        }
        let storage = Storage::open(&dir).unwrap();
        assert_eq!(storage.load_height().unwrap(), Some(42));
        assert_eq!(storage.load_ledger().unwrap(), Some(snapshot));
        // Node state alone is not a record.
        assert!(!storage.has_records().unwrap());
        storage
            .records::<RelayDealRecord>(CF_RELAY_DEALS)
            .save(&SwapId([5; 32]), &record(RelayDealStatus::Initialized))
            .unwrap();
        assert!(storage.has_records().unwrap());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_corrupt_record_is_a_storage_error() {
        let dir = temp_dir();
        let storage = Storage::open(&dir).unwrap();
        let id = SwapId([4; 32]);
        storage.put(CF_DEALS, id.as_bytes(), b"not json").unwrap();
        let store: RocksRecordStore<RelayDealRecord> = storage.records(CF_DEALS);
        assert!(matches!(store.load(&id), Err(EscrowError::Storage(_))));
        std::fs::remove_dir_all(&dir).ok();
    }
}
