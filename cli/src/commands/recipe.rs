use anyhow::{Result, bail};
use serde_json::json;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use morsel_core::service::{MorselService, RecipeDraft};

use super::helpers::{parse_amount, truncate};
use super::resolve_item;

/// Split a `--with "name:amount"` argument.
fn parse_component_spec(spec: &str) -> Result<(&str, f64)> {
    let Some((name, amount)) = spec.rsplit_once(':') else {
        bail!("Invalid component '{spec}'. Use 'name:amount' (e.g. 'carrot:200')");
    };
    Ok((name.trim(), parse_amount(amount)?))
}

pub(crate) fn cmd_recipe_create(
    svc: &mut MorselService,
    name: &str,
    category: &str,
    cooked_weight: Option<f64>,
    notes: Option<String>,
    with: &[String],
    json: bool,
) -> Result<()> {
    let mut draft = RecipeDraft::new(name);
    draft.category = category.to_string();
    draft.cooked_weight = cooked_weight;
    draft.notes = notes;

    for spec in with {
        let (component_name, amount) = parse_component_spec(spec)?;
        let item = resolve_item(svc, component_name)?;
        svc.add_component(&mut draft, &item.id, amount)?;
    }

    let (recipe, _) = svc.save_recipe(&draft)?;
    print_saved(svc, &recipe.id, json)
}

pub(crate) fn cmd_recipe_add_component(
    svc: &mut MorselService,
    recipe: &str,
    item: &str,
    amount: &str,
    json: bool,
) -> Result<()> {
    let recipe = resolve_item(svc, recipe)?;
    let component = resolve_item(svc, item)?;
    let amount = parse_amount(amount)?;

    let mut draft = svc.draft_from_item(&recipe.id)?;
    svc.add_component(&mut draft, &component.id, amount)?;
    let (saved, report) = svc.save_recipe(&draft)?;

    if !json && !report.updated.is_empty() {
        let count = report.updated.len();
        eprintln!("Refreshed {count} dependent recipe(s)");
    }
    print_saved(svc, &saved.id, json)
}

pub(crate) fn cmd_recipe_remove_component(
    svc: &mut MorselService,
    recipe: &str,
    position: usize,
    json: bool,
) -> Result<()> {
    let recipe = resolve_item(svc, recipe)?;
    let mut draft = svc.draft_from_item(&recipe.id)?;
    if position == 0 {
        bail!("Component positions start at 1");
    }
    svc.remove_component(&mut draft, position - 1)?;
    let (saved, _) = svc.save_recipe(&draft)?;
    print_saved(svc, &saved.id, json)
}

pub(crate) fn cmd_recipe_set_weight(
    svc: &mut MorselService,
    recipe: &str,
    weight: f64,
    json: bool,
) -> Result<()> {
    let recipe = resolve_item(svc, recipe)?;
    let mut draft = svc.draft_from_item(&recipe.id)?;
    draft.cooked_weight = Some(weight);
    let (saved, report) = svc.save_recipe(&draft)?;

    if !json && !report.updated.is_empty() {
        let count = report.updated.len();
        eprintln!("Refreshed {count} dependent recipe(s)");
    }
    print_saved(svc, &saved.id, json)
}

pub(crate) fn cmd_recipe_show(svc: &MorselService, recipe: &str, json: bool) -> Result<()> {
    let item = resolve_item(svc, recipe)?;
    if !item.is_recipe() {
        bail!("'{}' is not a recipe", item.name);
    }
    print_saved(svc, &item.id, json)
}

pub(crate) fn cmd_recipe_list(svc: &MorselService, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Components")]
        components: usize,
        #[tabled(rename = "Cal/100")]
        calories: i64,
        #[tabled(rename = "Cooked")]
        cooked: String,
    }

    let mut recipes: Vec<_> = svc.items().values().filter(|i| i.is_recipe()).collect();
    recipes.sort_by(|a, b| a.name.cmp(&b.name));

    if json {
        println!("{}", serde_json::to_string_pretty(&recipes)?);
        return Ok(());
    }
    if recipes.is_empty() {
        eprintln!("No recipes yet");
        process::exit(2);
    }

    let rows: Vec<RecipeRow> = recipes
        .iter()
        .map(|r| RecipeRow {
            name: truncate(&r.name, 35),
            components: r.components.len(),
            calories: r.calories_per_100,
            cooked: r
                .portion_weight
                .map_or("-".into(), |w| format!("{w:.0}g")),
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

fn print_saved(svc: &MorselService, id: &str, json: bool) -> Result<()> {
    let item = svc.require_item(id)?;

    if json {
        let draft = svc.draft_from_item(id)?;
        let agg = svc.draft_totals(&draft);
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "recipe": item,
                "raw_totals": agg.totals,
                "missing_components": agg.missing,
            }))?
        );
        return Ok(());
    }

    let name = &item.name;
    println!("{name}");
    for component in &item.components {
        let label = svc
            .get_item(&component.item_id)
            .map_or("?", |i| i.name.as_str());
        let amount = component.amount;
        println!("  - {label} {amount:.0}");
    }
    let cal = item.calories_per_100;
    let protein = item.protein_per_100;
    println!("  per 100: {cal} kcal | P:{protein:.1}g");
    if let Some(weight) = item.portion_weight {
        let coeff = item.weight_coefficient;
        println!("  cooked: {weight:.0}g (coefficient {coeff:.2})");
    }

    let draft = svc.draft_from_item(id)?;
    let agg = svc.draft_totals(&draft);
    if !agg.missing.is_empty() {
        let count = agg.missing.len();
        eprintln!("Warning: {count} component(s) reference deleted items");
    }
    Ok(())
}
