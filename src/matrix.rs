//! Price matrix projection for a (cat1, cat2, effective date) selection
use crate::quota::{CalendarDay, UnitPrice};
use crate::store::QuotaStore;
use std::collections::{BTreeMap, BTreeSet};

/// Dense row/column view over the sparse quota set for one selection.
/// A missing cell means "no quota for this pairing", which is not the same
/// thing as a zero price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixProjection {
    pub cat1_code: String,
    pub cat2_code: String,
    pub effective_date: CalendarDay,
    /// Distinct process codes, lexicographic.
    pub columns: Vec<String>,
    /// One row per distinct model code, in display order.
    pub rows: Vec<MatrixRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixRow {
    pub model_code: String,
    pub prices: BTreeMap<String, UnitPrice>,
}

impl MatrixProjection {
    pub fn price_at(&self, model_code: &str, process_code: &str) -> Option<UnitPrice> {
        self.rows
            .iter()
            .find(|row| row.model_code == model_code)
            .and_then(|row| row.prices.get(process_code).copied())
    }
}

/// Display-order key for model rows: the numeric prefix before the first
/// `-`, ties broken lexicographically. Non-numeric prefixes sort as 0 — the
/// rule the matrix screens have always used, preserved as-is even though
/// its intent for non-numeric codes is murky.
pub fn model_sort_key(code: &str) -> (u64, &str) {
    let prefix = code
        .split('-')
        .next()
        .and_then(|p| p.parse::<u64>().ok())
        .unwrap_or(0);
    (prefix, code)
}

/// Project the selection into a grid, or `None` when nothing matches.
pub fn project(
    store: &QuotaStore,
    cat1_code: &str,
    cat2_code: &str,
    effective_date: CalendarDay,
) -> anyhow::Result<Option<MatrixProjection>> {
    let records = store.find_by_selection(cat1_code, cat2_code, effective_date)?;
    if records.is_empty() {
        return Ok(None);
    }

    let columns: BTreeSet<&str> = records.iter().map(|r| r.key.process_code.as_str()).collect();

    let mut models: Vec<&str> = records
        .iter()
        .map(|r| r.key.model_code.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    models.sort_by(|a, b| model_sort_key(a).cmp(&model_sort_key(b)));

    let rows = models
        .into_iter()
        .map(|model_code| {
            let prices = records
                .iter()
                .filter(|r| r.key.model_code == model_code)
                .map(|r| (r.key.process_code.clone(), r.unit_price))
                .collect();
            MatrixRow {
                model_code: model_code.to_string(),
                prices,
            }
        })
        .collect();

    Ok(Some(MatrixProjection {
        cat1_code: cat1_code.to_string(),
        cat2_code: cat2_code.to_string(),
        effective_date,
        columns: columns.into_iter().map(str::to_string).collect(),
        rows,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_prefixes_order_numerically() {
        let mut codes = vec!["10-B", "2-A", "1-Z"];
        codes.sort_by(|a, b| model_sort_key(a).cmp(&model_sort_key(b)));

        assert_eq!(codes, vec!["1-Z", "2-A", "10-B"]);
    }

    #[test]
    fn non_numeric_prefixes_sort_as_zero() {
        let mut codes = vec!["3-X", "ALPHA-1", "BETA-2"];
        codes.sort_by(|a, b| model_sort_key(a).cmp(&model_sort_key(b)));

        // non-numeric prefixes collapse to 0 and fall back to lexicographic
        assert_eq!(codes, vec!["ALPHA-1", "BETA-2", "3-X"]);
    }

    #[test]
    fn dashless_codes_use_whole_code_as_prefix() {
        assert_eq!(model_sort_key("42"), (42, "42"));
        assert_eq!(model_sort_key("MOTOR"), (0, "MOTOR"));
    }
}
