//! Wage records derived from quantities reported against a quota
use crate::quota::{CalendarDay, QuotaRecord, TimeStamp, UnitPrice};
use chrono::Utc;

/// A reported quantity priced against a bound quota. The unit price is
/// copied and the amount computed at creation, so later supersessions never
/// reprice history.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct WorkRecord {
    #[n(0)]
    pub id: u64,
    #[n(1)]
    pub worker_code: String,
    #[n(2)]
    pub quota_id: u64,
    #[n(3)]
    pub quantity: u32,
    #[n(4)]
    pub unit_price: UnitPrice,
    #[n(5)]
    pub amount: u64, // minor units, quantity * unit_price
    #[n(6)]
    pub record_date: CalendarDay,
    #[n(7)]
    pub created_by: String,
    #[n(8)]
    pub created_at: TimeStamp<Utc>,
}

/// A quota whose window has been checked against a record date. Handed back
/// by the validator so the caller can compute amounts against a price it
/// knows is applicable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundQuota {
    quota: QuotaRecord,
}

impl BoundQuota {
    pub(crate) fn new(quota: QuotaRecord) -> Self {
        Self { quota }
    }
    pub fn quota(&self) -> &QuotaRecord {
        &self.quota
    }
    pub fn quota_id(&self) -> u64 {
        self.quota.id
    }
    pub fn unit_price(&self) -> UnitPrice {
        self.quota.unit_price
    }
    /// Amount in minor units for a quantity, `None` on overflow.
    pub fn amount_for(&self, quantity: u32) -> Option<u64> {
        self.quota.unit_price.amount_for(quantity)
    }
}
