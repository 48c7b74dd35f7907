use anyhow::Result;
use serde_json::json;
use std::process;

use morsel_core::service::MorselService;

use super::helpers::{json_error, parse_amount, parse_date};
use super::resolve_item;

pub(crate) fn cmd_log(
    svc: &mut MorselService,
    item: &str,
    amount: Option<&str>,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let item = match resolve_item(svc, item) {
        Ok(item) => item,
        Err(e) => {
            if json {
                println!("{}", json_error(&e.to_string()));
            } else {
                eprintln!("{e}");
            }
            process::exit(2);
        }
    };
    let amount = match amount {
        Some(s) => parse_amount(s)?,
        None => item.default_amount,
    };

    let entry = svc.log_consumption(&date, &item.id, amount)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
        return Ok(());
    }
    let name = &entry.snapshot.name;
    let n = entry.nutrients();
    let cal = n.calories;
    let protein = n.protein_g;
    println!("Logged {name} — {amount:.0} — {cal} kcal | P:{protein:.1}g ({date})");
    Ok(())
}

pub(crate) fn cmd_water(
    svc: &mut MorselService,
    ml: f64,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let total = svc.add_water(&date, ml)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "date": date, "water_ml": total }))?
        );
        return Ok(());
    }
    println!("Water for {date}: {total:.0}ml");
    Ok(())
}

pub(crate) fn cmd_entry_delete(
    svc: &mut MorselService,
    entry_id: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let removed = svc.delete_entry(&date, entry_id)?;

    if !removed {
        if json {
            println!("{}", json_error("entry not found"));
        } else {
            eprintln!("No entry {entry_id} on {date}");
        }
        process::exit(2);
    }
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "deleted": entry_id, "date": date }))?
        );
        return Ok(());
    }
    println!("Deleted entry {entry_id}");
    Ok(())
}

pub(crate) fn cmd_finalize(
    svc: &mut MorselService,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let log = svc.finalize_day(&date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&log)?);
        return Ok(());
    }
    let count = log.entries.len();
    println!("Finalized {date} ({count} entries)");
    Ok(())
}

pub(crate) fn cmd_reset(svc: &mut MorselService, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    let removed = svc.reset_day(&date)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "date": date, "reset": removed }))?
        );
        return Ok(());
    }
    if removed {
        println!("Reset {date}");
    } else {
        println!("Nothing logged for {date}");
    }
    Ok(())
}
