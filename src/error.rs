use crate::quota::{CalendarDay, QuotaRecord, UnitPrice};

#[derive(thiserror::Error, Debug)]
pub enum QuotaError {
    #[error(
        "new price effective {proposed} must strictly follow the open record effective {current}"
    )]
    InvalidSupersession {
        current: CalendarDay,
        proposed: CalendarDay,
    },
    #[error("quota draft is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("quota draft field `{0}` is blank")]
    BlankCode(&'static str),
    #[error("codec failure inside storage transaction: {0}")]
    Codec(String),
}

/// Hard rejections of a wage write. `RecordAfterObsolete` carries the
/// replacement the resolver suggests for the stale quota's key.
#[derive(thiserror::Error, Debug)]
pub enum WorkRecordError {
    #[error("quota {quota_id} not found")]
    QuotaNotFound { quota_id: u64 },
    #[error("record date {record_date} is before the quota takes effect on {effective}")]
    RecordBeforeEffective {
        effective: CalendarDay,
        record_date: CalendarDay,
    },
    #[error("record date {record_date} is after the quota became obsolete on {obsolete}")]
    RecordAfterObsolete {
        obsolete: CalendarDay,
        record_date: CalendarDay,
        suggested_replacement: Option<QuotaRecord>,
    },
    #[error("quantity must be greater than zero")]
    ZeroQuantity,
    #[error("amount overflows at quantity {quantity} x unit price {unit_price}")]
    AmountOverflow { quantity: u32, unit_price: UnitPrice },
}
