//! Core quota types: combination key, calendar days, money and records
use super::error::QuotaError;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use std::fmt;

/// The 4-part identifier a unit price is quoted against:
/// workstation category, operation category, motor model, process.
/// Immutable once a quota references it.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq, Hash)]
pub struct CombinationKey {
    #[n(0)]
    pub cat1_code: String,
    #[n(1)]
    pub cat2_code: String,
    #[n(2)]
    pub model_code: String,
    #[n(3)]
    pub process_code: String,
}

impl CombinationKey {
    pub fn new(cat1_code: &str, cat2_code: &str, model_code: &str, process_code: &str) -> Self {
        Self {
            cat1_code: cat1_code.to_string(),
            cat2_code: cat2_code.to_string(),
            model_code: model_code.to_string(),
            process_code: process_code.to_string(),
        }
    }
    /// Hash of the CBOR encoding, used as the fixed-width tree-key prefix for
    /// per-key index scans.
    pub fn index_hash(&self) -> anyhow::Result<String> {
        let cbor = minicbor::to_vec(self)?;
        Ok(sha256::digest(&cbor))
    }
}

impl fmt::Display for CombinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.cat1_code, self.cat2_code, self.model_code, self.process_code
        )
    }
}

/// A calendar day. Quota windows are inclusive day ranges.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct CalendarDay(NaiveDate);

impl CalendarDay {
    /// Sentinel meaning "open-ended / currently active".
    pub const OPEN_END: CalendarDay = match NaiveDate::from_ymd_opt(9999, 12, 31) {
        Some(d) => CalendarDay(d),
        None => panic!("sentinel date is valid"),
    };

    pub fn today() -> Self {
        Self(Utc::now().date_naive())
    }
    pub fn new_with(year: i32, month: u32, day: u32) -> Self {
        Self(
            NaiveDate::from_ymd_opt(year, month, day)
                .expect("year/month/day do not form a valid calendar day"),
        )
    }
    /// The previous day. Supersession closes the old window here.
    pub fn predecessor(self) -> Self {
        Self(self.0.pred_opt().expect("calendar day has no predecessor"))
    }
    pub fn is_open_end(self) -> bool {
        self == Self::OPEN_END
    }
    pub(crate) fn days_from_ce(self) -> i32 {
        self.0.num_days_from_ce()
    }
}

impl fmt::Display for CalendarDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl From<NaiveDate> for CalendarDay {
    fn from(value: NaiveDate) -> Self {
        CalendarDay(value)
    }
}

impl<C> minicbor::Encode<C> for CalendarDay {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.i32(self.0.num_days_from_ce())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for CalendarDay {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let days = d.i32()?;

        NaiveDate::from_num_days_from_ce_opt(days)
            .map(CalendarDay)
            .ok_or(minicbor::decode::Error::message(
                "failed to convert day count to a calendar day",
            ))
    }
}

/// Non-negative money at fixed 2-decimal scale, held as integer minor units.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Default)]
pub struct UnitPrice(u64);

impl UnitPrice {
    pub const fn from_minor(minor_units: u64) -> Self {
        Self(minor_units)
    }
    /// `from_major_minor(12, 50)` is 12.50. Callers pass cents < 100.
    pub const fn from_major_minor(major: u64, cents: u8) -> Self {
        Self(major * 100 + cents as u64)
    }
    pub const fn minor_units(self) -> u64 {
        self.0
    }
    /// Amount in minor units for a reported quantity, `None` on overflow.
    pub fn amount_for(self, quantity: u32) -> Option<u64> {
        self.0.checked_mul(u64::from(quantity))
    }
}

impl fmt::Display for UnitPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl<C> minicbor::Encode<C> for UnitPrice {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.u64(self.0)?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for UnitPrice {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        Ok(UnitPrice(d.u64()?))
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// One priced window: this unit price applies to this combination from
/// `effective_date` through `obsolete_date` inclusive. Only `obsolete_date`
/// is ever mutated after insert, only by supersession, only from the
/// sentinel to a concrete day.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct QuotaRecord {
    #[n(0)]
    pub id: u64, // surrogate, assigned on insert
    #[n(1)]
    pub key: CombinationKey,
    #[n(2)]
    pub unit_price: UnitPrice,
    #[n(3)]
    pub effective_date: CalendarDay,
    #[n(4)]
    pub obsolete_date: CalendarDay,
    #[n(5)]
    pub created_by: String,
    #[n(6)]
    pub created_at: TimeStamp<Utc>,
}

impl QuotaRecord {
    pub fn is_open(&self) -> bool {
        self.obsolete_date.is_open_end()
    }
    pub fn covers(&self, day: CalendarDay) -> bool {
        self.effective_date <= day && day <= self.obsolete_date
    }
}

// Used for constructing drafts before the write path runs
#[derive(Debug, Default)]
pub struct QuotaDraft {
    cat1_code: Option<String>,
    cat2_code: Option<String>,
    model_code: Option<String>,
    process_code: Option<String>,
    unit_price: Option<UnitPrice>,
    effective_date: Option<CalendarDay>,
}

impl QuotaDraft {
    /// Construct a new builder object, this becomes the basis for a draft
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_cat1_code(mut self, code: &str) -> Self {
        self.cat1_code = Some(code.to_string());
        self
    }
    pub fn set_cat2_code(mut self, code: &str) -> Self {
        self.cat2_code = Some(code.to_string());
        self
    }
    pub fn set_model_code(mut self, code: &str) -> Self {
        self.model_code = Some(code.to_string());
        self
    }
    pub fn set_process_code(mut self, code: &str) -> Self {
        self.process_code = Some(code.to_string());
        self
    }
    pub fn set_unit_price(mut self, price: UnitPrice) -> Self {
        self.unit_price = Some(price);
        self
    }
    pub fn set_effective_date(mut self, day: CalendarDay) -> Self {
        self.effective_date = Some(day);
        self
    }
    // Checks fields, then hands the parts to the versioning write path
    pub fn validate_and_finalise(self) -> anyhow::Result<(CombinationKey, UnitPrice, CalendarDay)> {
        let cat1_code = Self::required_code(self.cat1_code, "cat1_code")?;
        let cat2_code = Self::required_code(self.cat2_code, "cat2_code")?;
        let model_code = Self::required_code(self.model_code, "model_code")?;
        let process_code = Self::required_code(self.process_code, "process_code")?;

        let unit_price = self
            .unit_price
            .ok_or(QuotaError::MissingField("unit_price"))?;
        let effective_date = self
            .effective_date
            .ok_or(QuotaError::MissingField("effective_date"))?;

        let key = CombinationKey {
            cat1_code,
            cat2_code,
            model_code,
            process_code,
        };

        Ok((key, unit_price, effective_date))
    }
    fn required_code(field: Option<String>, name: &'static str) -> anyhow::Result<String> {
        let code = field.ok_or(QuotaError::MissingField(name))?;
        if code.trim().is_empty() {
            return Err(QuotaError::BlankCode(name).into());
        }
        Ok(code)
    }
}
