use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use morsel_core::models::{Item, ItemKind};

/// Parse an amount with an optional unit suffix: "150", "150g", "250ml".
/// The unit is cosmetic; amounts are always in the item's native unit.
pub(crate) fn parse_amount(s: &str) -> Result<f64> {
    let trimmed = s.trim().trim_end_matches("ml").trim_end_matches('g').trim();
    let value: f64 = trimmed.parse().with_context(|| {
        format!("Invalid amount: '{s}'. Use a number like '150' or '150g'")
    })?;
    if value <= 0.0 {
        bail!("Amount must be greater than 0");
    }
    Ok(value)
}

/// Resolve an optional date argument to an ISO date string. Accepts
/// YYYY-MM-DD plus the today/yesterday keywords; defaults to today.
pub(crate) fn parse_date(date_str: Option<String>) -> Result<String> {
    let date = match date_str {
        None => Local::now().date_naive(),
        Some(s) => match s.as_str() {
            "today" => Local::now().date_naive(),
            "yesterday" => Local::now().date_naive() - chrono::Duration::days(1),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday")
            })?,
        },
    };
    Ok(date.format("%Y-%m-%d").to_string())
}

pub(crate) fn kind_label(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Food => "food",
        ItemKind::Liquid => "liquid",
        ItemKind::Recipe => "recipe",
    }
}

pub(crate) fn parse_kind(s: &str) -> Result<ItemKind> {
    match s {
        "food" => Ok(ItemKind::Food),
        "liquid" => Ok(ItemKind::Liquid),
        _ => bail!("Unknown kind '{s}'. Use 'food' or 'liquid' (recipes via 'recipe create')"),
    }
}

pub(crate) fn print_item_table(items: &[&Item]) {
    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Kind")]
        kind: &'static str,
        #[tabled(rename = "Cal/100")]
        calories: String,
        #[tabled(rename = "P/100")]
        protein: String,
        #[tabled(rename = "Fluid/100")]
        fluid: String,
        #[tabled(rename = "Score")]
        score: String,
    }

    let rows: Vec<ItemRow> = items
        .iter()
        .map(|i| ItemRow {
            name: truncate(&i.name, 35),
            kind: kind_label(i.kind),
            calories: i.calories_per_100.to_string(),
            protein: format!("{:.1}", i.protein_per_100),
            fluid: format!("{:.0}", i.fluid_per_100),
            score: format!("{:.1}", i.usage_score),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert!((parse_amount("150").unwrap() - 150.0).abs() < f64::EPSILON);
        assert!((parse_amount("150g").unwrap() - 150.0).abs() < f64::EPSILON);
        assert!((parse_amount("250ml").unwrap() - 250.0).abs() < f64::EPSILON);
        assert!((parse_amount("2.5 g").unwrap() - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_amount_invalid() {
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("0").is_err());
        assert!(parse_amount("-50g").is_err());
    }

    #[test]
    fn test_parse_date_none_is_today() {
        let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
        assert_eq!(parse_date(None).unwrap(), today);
        assert_eq!(parse_date(Some("today".to_string())).unwrap(), today);
    }

    #[test]
    fn test_parse_date_iso() {
        assert_eq!(
            parse_date(Some("2024-06-15".to_string())).unwrap(),
            "2024-06-15"
        );
        assert!(parse_date(Some("15/06/2024".to_string())).is_err());
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind("food").unwrap(), ItemKind::Food);
        assert_eq!(parse_kind("liquid").unwrap(), ItemKind::Liquid);
        assert!(parse_kind("recipe").is_err());
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world this is long", 10), "hello w...");
        assert_eq!(truncate("Crème fraîche", 10), "Crème f...");
    }
}
