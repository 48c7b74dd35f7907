use anyhow::Result;
use serde_json::json;
use std::process;

use morsel_core::models::NewItem;
use morsel_core::service::MorselService;

use super::helpers::{json_error, kind_label, parse_kind, print_item_table};
use super::resolve_item;

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_item_add(
    svc: &mut MorselService,
    name: &str,
    kind: &str,
    category: &str,
    calories: i64,
    protein: Option<f64>,
    fluid: Option<f64>,
    amount: Option<f64>,
    json: bool,
) -> Result<()> {
    let new = NewItem {
        name: name.to_string(),
        kind: parse_kind(kind)?,
        category: category.to_string(),
        calories_per_100: calories,
        protein_per_100: protein.unwrap_or(0.0),
        fluid_per_100: fluid.unwrap_or(0.0),
        default_amount: amount,
    };
    let item = svc.add_item(&new)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        let name = &item.name;
        let cal = item.calories_per_100;
        println!("Added {name} ({cal} kcal/100)");
    }
    Ok(())
}

pub(crate) fn cmd_item_list(
    svc: &MorselService,
    search: Option<&str>,
    json: bool,
) -> Result<()> {
    let items = match search {
        Some(query) => svc.search_items(query),
        None => {
            let mut all: Vec<_> = svc.items().values().collect();
            all.sort_by(|a, b| a.name.cmp(&b.name));
            all
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if items.is_empty() {
        eprintln!("No items found");
        process::exit(2);
    }
    print_item_table(&items);
    Ok(())
}

pub(crate) fn cmd_item_show(svc: &MorselService, query: &str, json: bool) -> Result<()> {
    let item = match resolve_item(svc, query) {
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

    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
        return Ok(());
    }

    let name = &item.name;
    let kind = kind_label(item.kind);
    let category = &item.category;
    println!("{name} [{kind}] ({category})");
    let cal = item.calories_per_100;
    let protein = item.protein_per_100;
    let fluid = item.fluid_per_100;
    println!("  per 100: {cal} kcal | P:{protein:.1}g | fluid:{fluid:.0}ml");
    let amount = item.default_amount;
    println!("  default amount: {amount:.0}");
    if item.is_recipe() {
        if let Some(weight) = item.portion_weight {
            let coeff = item.weight_coefficient;
            println!("  cooked weight: {weight:.0}g (coefficient {coeff:.2})");
        }
        for component in &item.components {
            let label = svc
                .get_item(&component.item_id)
                .map_or("?", |i| i.name.as_str());
            let amount = component.amount;
            println!("  - {label} {amount:.0}");
        }
    }
    if let Some(notes) = &item.notes {
        println!("  notes: {notes}");
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_item_update(
    svc: &mut MorselService,
    query: &str,
    rename: Option<String>,
    calories: Option<i64>,
    protein: Option<f64>,
    fluid: Option<f64>,
    category: Option<String>,
    json: bool,
) -> Result<()> {
    let mut item = resolve_item(svc, query)?;
    if let Some(name) = rename {
        item.name = name;
    }
    if let Some(cal) = calories {
        item.calories_per_100 = cal;
    }
    if let Some(p) = protein {
        item.protein_per_100 = p;
    }
    if let Some(f) = fluid {
        item.fluid_per_100 = f;
    }
    if let Some(c) = category {
        item.category = c;
    }

    let name = item.name.clone();
    let report = svc.update_item(item)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "updated": name,
                "refreshed_recipes": report.updated,
                "failed": report.failed,
            }))?
        );
        return Ok(());
    }
    println!("Updated {name}");
    if !report.updated.is_empty() {
        let count = report.updated.len();
        println!("Refreshed {count} dependent recipe(s)");
    }
    for (id, reason) in &report.failed {
        eprintln!("Warning: failed to refresh {id}: {reason}");
    }
    Ok(())
}

pub(crate) fn cmd_item_delete(svc: &mut MorselService, query: &str, json: bool) -> Result<()> {
    let item = resolve_item(svc, query)?;
    let name = item.name.clone();
    let report = svc.delete_item(&item.id)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "deleted": name,
                "refreshed_recipes": report.updated,
            }))?
        );
        return Ok(());
    }
    println!("Deleted {name}");
    if !report.updated.is_empty() {
        let count = report.updated.len();
        println!("Refreshed {count} recipe(s) that referenced it");
    }
    Ok(())
}

pub(crate) fn cmd_search(svc: &MorselService, query: &str, json: bool) -> Result<()> {
    let hits = svc.search_items(query);

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }
    if hits.is_empty() {
        eprintln!("No items match '{query}'");
        process::exit(2);
    }
    print_item_table(&hits);
    Ok(())
}
