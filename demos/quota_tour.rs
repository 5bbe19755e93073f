//! Walkthrough of the quota engine against a throwaway sled db:
//! price a few combinations, supersede one, resolve dates, validate a
//! wage record against a stale id, and print the selection matrix.
//!
//! Run with `cargo run --example quota_tour`.
use piecework_quota::{
    error::WorkRecordError,
    quota::{CalendarDay, CombinationKey, UnitPrice},
    resolver::Resolution,
    service::QuotaService,
    store::QuotaStore,
    utils,
};
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    let db = sled::Config::new().temporary(true).open()?;
    let store = QuotaStore::open(Arc::new(db))?;
    let service = QuotaService::new(store);

    let actor = utils::new_uuid_to_bech32("user_")?;

    // price a small winding section sheet, effective new year 2024
    let effective = CalendarDay::new_with(2024, 1, 1);
    for (model, process, price) in [
        ("5-11", "P-010", UnitPrice::from_major_minor(10, 0)),
        ("5-11", "P-020", UnitPrice::from_major_minor(7, 50)),
        ("12-3", "P-010", UnitPrice::from_major_minor(9, 25)),
    ] {
        let key = CombinationKey::new("ASSY", "WIND", model, process);
        service.supersede_and_open(&key, price, effective, &actor)?;
    }

    // mid-year price change for one combination
    let key = CombinationKey::new("ASSY", "WIND", "5-11", "P-010");
    let old = match service.resolve(&key, effective)? {
        Resolution::Found(record) => record,
        other => anyhow::bail!("expected a price, got {:?}", other),
    };
    let new = service.supersede_and_open(
        &key,
        UnitPrice::from_major_minor(12, 0),
        CalendarDay::new_with(2024, 6, 1),
        &actor,
    )?;
    println!(
        "superseded {}: {} (until {}) -> {} (from {})",
        key,
        old.unit_price,
        service
            .store()
            .get(old.id)?
            .map(|r| r.obsolete_date.to_string())
            .unwrap_or_default(),
        new.unit_price,
        new.effective_date
    );

    // resolve either side of the change
    for probe in [CalendarDay::new_with(2024, 3, 15), CalendarDay::new_with(2024, 7, 1)] {
        match service.resolve(&key, probe)? {
            Resolution::Found(record) => {
                println!("{} on {} -> {}", key, probe, record.unit_price)
            }
            other => println!("{} on {} -> {:?}", key, probe, other),
        }
    }

    // a wage record against the stale id gets a replacement hint
    match service.record_work("W-104", old.id, 40, CalendarDay::new_with(2024, 7, 1), &actor) {
        Err(err) => {
            if let Some(WorkRecordError::RecordAfterObsolete {
                suggested_replacement: Some(replacement),
                ..
            }) = err.downcast_ref::<WorkRecordError>()
            {
                println!(
                    "stale quota id {} rejected; suggested replacement id {} at {}",
                    old.id, replacement.id, replacement.unit_price
                );
                let record =
                    service.record_work("W-104", replacement.id, 40, CalendarDay::new_with(2024, 7, 1), &actor)?;
                println!(
                    "wage record {}: {} x {} = {} minor units",
                    record.id, record.quantity, record.unit_price, record.amount
                );
            }
        }
        Ok(_) => anyhow::bail!("stale id should have been rejected"),
    }

    // the selection matrix for the sheet
    if let Some(projection) = service.project("ASSY", "WIND", effective)? {
        println!("matrix {} x {}:", projection.rows.len(), projection.columns.len());
        for row in &projection.rows {
            let cells: Vec<String> = projection
                .columns
                .iter()
                .map(|process| match row.prices.get(process) {
                    Some(price) => format!("{}={}", process, price),
                    None => format!("{}=-", process),
                })
                .collect();
            println!("  {}: {}", row.model_code, cells.join(" "));
        }
    }

    Ok(())
}
