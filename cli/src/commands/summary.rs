use anyhow::Result;
use std::process;

use morsel_core::service::MorselService;

use super::helpers::parse_date;

pub(crate) fn cmd_summary(svc: &MorselService, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    let summary = svc.day_summary(&date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if summary.groups.is_empty() && summary.water_ml == 0.0 {
        eprintln!("No entries for {date}");
        process::exit(2);
    }

    let marker = if summary.finalized { " (finalized)" } else { "" };
    println!("=== {date}{marker} ===\n");

    for group in &summary.groups {
        let label = group.category.to_uppercase();
        let sub = group.subtotal.calories;
        println!("  {label} ({sub} kcal)");
        for e in &group.entries {
            let id = &e.id;
            let name = &e.snapshot.name;
            let amount = e.amount;
            let n = e.nutrients();
            let cal = n.calories;
            let protein = n.protein_g;
            println!("    [{id}] {name} — {amount:.0} — {cal} kcal | P:{protein:.1}g");
        }
        println!();
    }

    let total = summary.total;
    let cal = total.calories;
    let protein = total.protein_g;
    let fluid = total.fluid_ml + summary.water_ml;
    println!("  TOTAL: {cal} kcal | P:{protein:.1}g | fluid:{fluid:.0}ml");
    if summary.water_ml > 0.0 {
        let water = summary.water_ml;
        println!("  (includes {water:.0}ml plain water)");
    }

    Ok(())
}
