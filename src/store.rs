//! Sled-backed persistence for quota and work records
//!
//! Tree layout:
//! - `quotas`: big-endian surrogate id -> CBOR QuotaRecord
//! - `quotas_by_key`: key hash ++ effective day ++ id -> big-endian id
//! - `open_quotas`: key hash -> big-endian id of the single open record
//! - `work_records`: big-endian surrogate id -> CBOR WorkRecord
//!
//! The open-record entry is the conflict point every write for a key passes
//! through; the versioning engine's transaction is what upholds the
//! single-open invariant, the schema cannot express it.
use crate::quota::{CalendarDay, CombinationKey, QuotaRecord};
use crate::worklog::WorkRecord;
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use std::collections::BTreeSet;
use std::sync::Arc;

pub(crate) const QUOTAS_TREE: &str = "quotas";
pub(crate) const BY_KEY_TREE: &str = "quotas_by_key";
pub(crate) const OPEN_TREE: &str = "open_quotas";
pub(crate) const WORK_RECORDS_TREE: &str = "work_records";

/// One distinct (workstation category, operation category, effective date)
/// triple, the axis the matrix selection filters on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterTuple {
    pub cat1_code: String,
    pub cat2_code: String,
    pub effective_date: CalendarDay,
}

pub struct QuotaStore {
    pub(crate) db: Arc<sled::Db>,
    pub(crate) quotas: sled::Tree,
    pub(crate) by_key: sled::Tree,
    pub(crate) open: sled::Tree,
    pub(crate) work_records: sled::Tree,
}

/// Sign-offset day count so big-endian bytes sort chronologically.
pub(crate) fn day_index_bytes(day: CalendarDay) -> [u8; 4] {
    ((day.days_from_ce() as u32) ^ (1 << 31)).to_be_bytes()
}

/// Index entry: key hash ++ effective day ++ id. The id suffix keeps entries
/// unique; prefix scans over the hash walk a key's windows oldest-first.
pub(crate) fn by_key_entry(key_hash: &str, effective_date: CalendarDay, id: u64) -> Vec<u8> {
    let mut entry = Vec::with_capacity(key_hash.len() + 12);
    entry.extend_from_slice(key_hash.as_bytes());
    entry.extend_from_slice(&day_index_bytes(effective_date));
    entry.extend_from_slice(&id.to_be_bytes());
    entry
}

fn id_from_bytes(bytes: &[u8]) -> anyhow::Result<u64> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("malformed id entry in index"))?;
    Ok(u64::from_be_bytes(arr))
}

impl QuotaStore {
    pub fn open(db: Arc<sled::Db>) -> anyhow::Result<Self> {
        let quotas = db.open_tree(QUOTAS_TREE)?;
        let by_key = db.open_tree(BY_KEY_TREE)?;
        let open = db.open_tree(OPEN_TREE)?;
        let work_records = db.open_tree(WORK_RECORDS_TREE)?;

        Ok(Self {
            db,
            quotas,
            by_key,
            open,
            work_records,
        })
    }

    /// Low-level insert of an already-shaped record, assigning its surrogate
    /// id. Indexes and the open entry are written in the same transaction.
    /// Callers uphold the window invariants; `supersede_and_open` on the
    /// service is the checked write path.
    pub fn insert(&self, record: QuotaRecord) -> anyhow::Result<u64> {
        let key_hash = record.key.index_hash()?;

        let result: Result<u64, TransactionError<crate::error::QuotaError>> =
            (&self.quotas, &self.by_key, &self.open).transaction(|(quotas, by_key, open)| {
                let id = quotas.generate_id()?;
                let mut record = record.clone();
                record.id = id;

                let encoded = minicbor::to_vec(&record).map_err(codec_abort)?;
                let id_bytes = id.to_be_bytes();
                quotas.insert(&id_bytes[..], encoded)?;
                by_key.insert(by_key_entry(&key_hash, record.effective_date, id), &id_bytes[..])?;
                if record.is_open() {
                    open.insert(key_hash.as_bytes(), &id_bytes[..])?;
                }
                Ok(id)
            });

        flatten_transaction(result)
    }

    pub fn get(&self, id: u64) -> anyhow::Result<Option<QuotaRecord>> {
        match self.quotas.get(id.to_be_bytes())? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// The record for `key` whose obsolete date is still the sentinel.
    pub fn find_open(&self, key: &CombinationKey) -> anyhow::Result<Option<QuotaRecord>> {
        let key_hash = key.index_hash()?;
        match self.open.get(key_hash.as_bytes())? {
            Some(id_bytes) => self.get(id_from_bytes(&id_bytes)?),
            None => Ok(None),
        }
    }

    /// The record for `key` whose window contains `day`, if any.
    pub fn find_covering(
        &self,
        key: &CombinationKey,
        day: CalendarDay,
    ) -> anyhow::Result<Option<QuotaRecord>> {
        let records = self.find_all_for_key(key)?;
        Ok(records.into_iter().find(|r| r.covers(day)))
    }

    /// Every record for `key`, newest effective date first.
    pub fn find_all_for_key(&self, key: &CombinationKey) -> anyhow::Result<Vec<QuotaRecord>> {
        let key_hash = key.index_hash()?;
        let mut records = Vec::new();

        // index order is oldest-first; reversed below
        for entry in self.by_key.scan_prefix(key_hash.as_bytes()) {
            let (_, id_bytes) = entry?;
            if let Some(record) = self.get(id_from_bytes(&id_bytes)?)? {
                records.push(record);
            }
        }
        records.reverse();

        Ok(records)
    }

    /// Records for the matrix selection: exact match on both categories and
    /// the effective date. Full scan; selection reads are cold-path and the
    /// per-factory quota sheet is small.
    pub fn find_by_selection(
        &self,
        cat1_code: &str,
        cat2_code: &str,
        effective_date: CalendarDay,
    ) -> anyhow::Result<Vec<QuotaRecord>> {
        let mut records = Vec::new();

        for entry in self.quotas.iter() {
            let (_, bytes) = entry?;
            let record: QuotaRecord = minicbor::decode(&bytes)?;
            if record.key.cat1_code == cat1_code
                && record.key.cat2_code == cat2_code
                && record.effective_date == effective_date
            {
                records.push(record);
            }
        }

        Ok(records)
    }

    /// Distinct (cat1, cat2, effective date) triples across all records,
    /// sorted by (effective date, cat1, cat2). Feeds the selection filter.
    pub fn distinct_filter_tuples(&self) -> anyhow::Result<Vec<FilterTuple>> {
        let mut seen: BTreeSet<(CalendarDay, String, String)> = BTreeSet::new();

        for entry in self.quotas.iter() {
            let (_, bytes) = entry?;
            let record: QuotaRecord = minicbor::decode(&bytes)?;
            seen.insert((
                record.effective_date,
                record.key.cat1_code,
                record.key.cat2_code,
            ));
        }

        Ok(seen
            .into_iter()
            .map(|(effective_date, cat1_code, cat2_code)| FilterTuple {
                cat1_code,
                cat2_code,
                effective_date,
            })
            .collect())
    }

    pub fn insert_work_record(&self, record: &WorkRecord) -> anyhow::Result<()> {
        let encoded = minicbor::to_vec(record)?;
        self.work_records
            .insert(record.id.to_be_bytes(), encoded)?;
        Ok(())
    }

    pub fn get_work_record(&self, id: u64) -> anyhow::Result<Option<WorkRecord>> {
        match self.work_records.get(id.to_be_bytes())? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Ids of work records bound to any of the given quota ids. Used by the
    /// purge cascade.
    pub fn work_record_ids_for_quotas(&self, quota_ids: &[u64]) -> anyhow::Result<Vec<u64>> {
        let mut ids = Vec::new();

        for entry in self.work_records.iter() {
            let (_, bytes) = entry?;
            let record: WorkRecord = minicbor::decode(&bytes)?;
            if quota_ids.contains(&record.quota_id) {
                ids.push(record.id);
            }
        }

        Ok(ids)
    }
}

pub(crate) fn codec_abort<E: std::fmt::Display>(
    err: E,
) -> ConflictableTransactionError<crate::error::QuotaError> {
    ConflictableTransactionError::Abort(crate::error::QuotaError::Codec(err.to_string()))
}

pub(crate) fn flatten_transaction<T>(
    result: Result<T, TransactionError<crate::error::QuotaError>>,
) -> anyhow::Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(err)) => Err(err.into()),
        Err(TransactionError::Storage(err)) => Err(err.into()),
    }
}
