//! Date-targeted price resolution
//!
//! "Which price applied on day X" has four answers, and three of them are
//! ordinary outcomes rather than errors: the caller branches on the variant
//! and a stale lookup comes back with an actionable replacement hint.
use crate::quota::{CalendarDay, CombinationKey, QuotaRecord};
use crate::store::QuotaStore;

/// The classified outcome of looking up a price for a key on a given day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A window contains the day.
    Found(QuotaRecord),
    /// The day is before the key's earliest window opens.
    NotYetEffective { first: QuotaRecord },
    /// The day is past a closed window, either in a gap between windows or
    /// after the last one. `last` is the window ending nearest before the
    /// day; the suggested replacement is the next record to take effect, if
    /// one exists.
    Obsolete {
        last: QuotaRecord,
        suggested_replacement: Option<QuotaRecord>,
    },
    /// No record has ever been priced for this key.
    UnknownKey,
}

pub fn resolve(
    store: &QuotaStore,
    key: &CombinationKey,
    day: CalendarDay,
) -> anyhow::Result<Resolution> {
    let records = store.find_all_for_key(key)?;

    let Some(earliest) = records.iter().min_by_key(|r| r.effective_date) else {
        return Ok(Resolution::UnknownKey);
    };

    if let Some(hit) = records.iter().find(|r| r.covers(day)) {
        return Ok(Resolution::Found(hit.clone()));
    }

    if day < earliest.effective_date {
        return Ok(Resolution::NotYetEffective {
            first: earliest.clone(),
        });
    }

    let suggested_replacement = records
        .iter()
        .filter(|r| r.effective_date > day)
        .min_by_key(|r| r.effective_date)
        .cloned();

    match records
        .iter()
        .filter(|r| r.obsolete_date < day)
        .max_by_key(|r| r.obsolete_date)
    {
        Some(last) => Ok(Resolution::Obsolete {
            last: last.clone(),
            suggested_replacement,
        }),
        // unreachable while the no-overlap invariant holds; classify
        // conservatively rather than panic
        None => Ok(Resolution::NotYetEffective {
            first: earliest.clone(),
        }),
    }
}
