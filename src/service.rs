//! Service layer API for quota versioning and wage validation
use crate::error::{QuotaError, WorkRecordError};
use crate::matrix::{self, MatrixProjection};
use crate::quota::{CalendarDay, CombinationKey, QuotaRecord, TimeStamp, UnitPrice};
use crate::resolver::{self, Resolution};
use crate::store::{FilterTuple, QuotaStore, by_key_entry, codec_abort, flatten_transaction};
use crate::worklog::{BoundQuota, WorkRecord};
use sled::transaction::{TransactionError, Transactional, abort};

pub struct QuotaService {
    store: QuotaStore,
}

impl QuotaService {
    pub fn new(store: QuotaStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &QuotaStore {
        &self.store
    }

    /// Close the currently open record for `key` (if any) and open a new one
    /// at `unit_price` from `effective_date`, as one atomic unit.
    ///
    /// The read-close-insert sequence runs in a single sled transaction over
    /// the quota tree and both indexes. Two writers racing on the same key
    /// conflict on the open-index entry; sled re-runs the loser from the
    /// read, so it sees the freshly closed record instead of a stale "no
    /// open record". A new effective date that does not strictly follow the
    /// open record's is rejected with `InvalidSupersession` and storage is
    /// left untouched.
    pub fn supersede_and_open(
        &self,
        key: &CombinationKey,
        unit_price: UnitPrice,
        effective_date: CalendarDay,
        actor: &str,
    ) -> anyhow::Result<QuotaRecord> {
        let key_hash = key.index_hash()?;
        let created_at = TimeStamp::new();

        let result: Result<QuotaRecord, TransactionError<QuotaError>> =
            (&self.store.quotas, &self.store.by_key, &self.store.open).transaction(
                |(quotas, by_key, open)| {
                    if let Some(open_id) = open.get(key_hash.as_bytes())? {
                        let bytes = quotas
                            .get(&open_id)?
                            .ok_or_else(|| codec_abort("open index points at a missing record"))?;
                        let mut current: QuotaRecord =
                            minicbor::decode(&bytes).map_err(codec_abort)?;

                        if effective_date <= current.effective_date {
                            return abort(QuotaError::InvalidSupersession {
                                current: current.effective_date,
                                proposed: effective_date,
                            });
                        }

                        // the one mutation obsolete_date ever sees
                        current.obsolete_date = effective_date.predecessor();
                        let encoded = minicbor::to_vec(&current).map_err(codec_abort)?;
                        quotas.insert(open_id.as_ref(), encoded)?;
                    }

                    let id = quotas.generate_id()?;
                    let record = QuotaRecord {
                        id,
                        key: key.clone(),
                        unit_price,
                        effective_date,
                        obsolete_date: CalendarDay::OPEN_END,
                        created_by: actor.to_string(),
                        created_at: created_at.clone(),
                    };

                    let encoded = minicbor::to_vec(&record).map_err(codec_abort)?;
                    let id_bytes = id.to_be_bytes();
                    quotas.insert(&id_bytes[..], encoded)?;
                    by_key.insert(by_key_entry(&key_hash, effective_date, id), &id_bytes[..])?;
                    open.insert(key_hash.as_bytes(), &id_bytes[..])?;

                    Ok(record)
                },
            );

        flatten_transaction(result)
    }

    /// What price applied to `key` on `day`. See [`Resolution`] for the
    /// four-way classification.
    pub fn resolve(&self, key: &CombinationKey, day: CalendarDay) -> anyhow::Result<Resolution> {
        resolver::resolve(&self.store, key, day)
    }

    /// [`QuotaService::resolve`] against the current day.
    pub fn resolve_today(&self, key: &CombinationKey) -> anyhow::Result<Resolution> {
        self.resolve(key, CalendarDay::today())
    }

    /// Project the (cat1, cat2, effective date) selection into a price grid,
    /// or `None` when the selection matches nothing.
    pub fn project(
        &self,
        cat1_code: &str,
        cat2_code: &str,
        effective_date: CalendarDay,
    ) -> anyhow::Result<Option<MatrixProjection>> {
        matrix::project(&self.store, cat1_code, cat2_code, effective_date)
    }

    /// The distinct selection triples available to the matrix filter.
    pub fn distinct_filter_tuples(&self) -> anyhow::Result<Vec<FilterTuple>> {
        self.store.distinct_filter_tuples()
    }

    /// Check that a record date falls inside the referenced quota's window
    /// before any wage record is created. Callers hold a concrete quota id
    /// from prior selection, so lookup is by id; a stale id is rejected with
    /// the resolver's suggested replacement attached.
    pub fn validate_and_bind(
        &self,
        quota_id: u64,
        record_date: CalendarDay,
    ) -> anyhow::Result<BoundQuota> {
        let quota = self
            .store
            .get(quota_id)?
            .ok_or(WorkRecordError::QuotaNotFound { quota_id })?;

        if record_date < quota.effective_date {
            return Err(WorkRecordError::RecordBeforeEffective {
                effective: quota.effective_date,
                record_date,
            }
            .into());
        }

        if record_date > quota.obsolete_date {
            let suggested_replacement = match self.resolve(&quota.key, record_date)? {
                Resolution::Found(record) => Some(record),
                Resolution::Obsolete {
                    suggested_replacement,
                    ..
                } => suggested_replacement,
                _ => None,
            };
            return Err(WorkRecordError::RecordAfterObsolete {
                obsolete: quota.obsolete_date,
                record_date,
                suggested_replacement,
            }
            .into());
        }

        Ok(BoundQuota::new(quota))
    }

    /// Validate and persist a wage record, copying the bound quota's unit
    /// price and deriving the amount at creation time.
    pub fn record_work(
        &self,
        worker_code: &str,
        quota_id: u64,
        quantity: u32,
        record_date: CalendarDay,
        actor: &str,
    ) -> anyhow::Result<WorkRecord> {
        if quantity == 0 {
            return Err(WorkRecordError::ZeroQuantity.into());
        }

        let bound = self.validate_and_bind(quota_id, record_date)?;
        let amount = bound
            .amount_for(quantity)
            .ok_or(WorkRecordError::AmountOverflow {
                quantity,
                unit_price: bound.unit_price(),
            })?;

        let record = WorkRecord {
            id: self.store.db.generate_id()?,
            worker_code: worker_code.to_string(),
            quota_id: bound.quota_id(),
            quantity,
            unit_price: bound.unit_price(),
            amount,
            record_date,
            created_by: actor.to_string(),
            created_at: TimeStamp::new(),
        };
        self.store.insert_work_record(&record)?;

        Ok(record)
    }

    /// Cascade removal of every quota for `key` and the work records bound
    /// to them, as happens when an owning dimension value is deleted.
    ///
    /// The record set is snapshotted outside the deletion transaction, so
    /// the transaction re-reads the key's open-index entry and only commits
    /// while it still matches the snapshot; a supersession landing in
    /// between moves that entry, the commit is abandoned and the whole
    /// purge re-runs from a fresh snapshot. That keeps the key-scoped
    /// discipline: a purge built on a stale read can never strand an open
    /// record outside the index. Returns the number of quota records
    /// removed.
    pub fn purge_combination(&self, key: &CombinationKey) -> anyhow::Result<usize> {
        struct StaleSnapshot;

        let key_hash = key.index_hash()?;

        loop {
            let records = self.store.find_all_for_key(key)?;
            let quota_ids: Vec<u64> = records.iter().map(|r| r.id).collect();
            let index_entries: Vec<Vec<u8>> = records
                .iter()
                .map(|r| by_key_entry(&key_hash, r.effective_date, r.id))
                .collect();
            let work_ids = self.store.work_record_ids_for_quotas(&quota_ids)?;
            let expected_open: Option<[u8; 8]> = records
                .iter()
                .find(|r| r.is_open())
                .map(|r| r.id.to_be_bytes());

            let result: Result<usize, TransactionError<StaleSnapshot>> = (
                &self.store.quotas,
                &self.store.by_key,
                &self.store.open,
                &self.store.work_records,
            )
                .transaction(|(quotas, by_key, open, work_records)| {
                    // the snapshot must still describe this key: a writer
                    // that committed since moved the open entry
                    let live_open = open.get(key_hash.as_bytes())?;
                    if live_open.as_deref() != expected_open.as_ref().map(|b| &b[..]) {
                        return abort(StaleSnapshot);
                    }

                    for id in &quota_ids {
                        quotas.remove(&id.to_be_bytes()[..])?;
                    }
                    for entry in &index_entries {
                        by_key.remove(entry.clone())?;
                    }
                    open.remove(key_hash.as_bytes())?;
                    for id in &work_ids {
                        work_records.remove(&id.to_be_bytes()[..])?;
                    }
                    Ok(quota_ids.len())
                });

            match result {
                Ok(removed) => return Ok(removed),
                Err(TransactionError::Abort(StaleSnapshot)) => continue,
                Err(TransactionError::Storage(err)) => return Err(err.into()),
            }
        }
    }
}
