//! Pure nutrient math: scaling a density to an amount, summing a
//! component list, and converting raw totals back into a per-100 density
//! through the cooked-weight coefficient.

use std::collections::HashMap;

use crate::models::{Component, Density, Item, Nutrients, Totals};

/// Scale a per-100-unit density to `amount`. Calories round to the
/// nearest integer at scale time; protein and fluid stay fractional.
/// A non-positive amount yields all zeros.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn scale(density: Density, amount: f64) -> Nutrients {
    if amount.is_nan() || amount <= 0.0 {
        return Nutrients::default();
    }
    let ratio = amount / 100.0;
    Nutrients {
        calories: (density.calories as f64 * ratio).round() as i64,
        protein_g: density.protein_g * ratio,
        fluid_ml: density.fluid_ml * ratio,
    }
}

/// Result of summing a component list. Missing references are skipped,
/// not fatal; their ids are reported so the caller can warn.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub totals: Totals,
    pub missing: Vec<String>,
}

/// Sum the scaled contributions of `components` against the flat item
/// map. Nested recipes contribute via their stored density; keeping
/// those densities current is propagation's job, not aggregation's.
#[must_use]
pub fn aggregate(components: &[Component], items: &HashMap<String, Item>) -> Aggregation {
    let mut agg = Aggregation::default();
    for component in components {
        let Some(item) = items.get(&component.item_id) else {
            agg.missing.push(component.item_id.clone());
            continue;
        };
        let scaled = scale(item.density(), component.amount);
        agg.totals.calories += scaled.calories;
        agg.totals.protein_g += scaled.protein_g;
        agg.totals.fluid_ml += scaled.fluid_ml;
        agg.totals.weight += component.amount;
    }
    agg
}

/// Convert raw totals into a recipe's own per-100 density. A zero or
/// absent cooked weight falls back to 100 so an empty recipe keeps a
/// well-defined density.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn derive_density(totals: &Totals, cooked_weight: f64) -> Density {
    let cooked = if cooked_weight > 0.0 { cooked_weight } else { 100.0 };
    let divisor = cooked / 100.0;
    Density {
        calories: (totals.calories as f64 / divisor).round() as i64,
        protein_g: round1(totals.protein_g / divisor),
        fluid_ml: round1(totals.fluid_ml / divisor),
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemKind;

    fn leaf(id: &str, calories: i64, protein: f64, fluid: f64) -> Item {
        Item {
            id: id.to_string(),
            name: id.to_string(),
            kind: ItemKind::Food,
            category: String::new(),
            calories_per_100: calories,
            protein_per_100: protein,
            fluid_per_100: fluid,
            default_amount: 100.0,
            usage_score: 0.0,
            last_used: None,
            components: Vec::new(),
            weight_coefficient: 1.0,
            portion_weight: None,
            notes: None,
            updated_at: String::new(),
        }
    }

    fn component(id: &str, amount: f64) -> Component {
        Component {
            item_id: id.to_string(),
            amount,
        }
    }

    #[test]
    fn test_scale_at_100_is_identity() {
        let d = Density {
            calories: 215,
            protein_g: 8.5,
            fluid_ml: 12.0,
        };
        let n = scale(d, 100.0);
        assert_eq!(n.calories, 215);
        assert!((n.protein_g - 8.5).abs() < f64::EPSILON);
        assert!((n.fluid_ml - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_scale_zero_and_negative_amounts() {
        let d = Density {
            calories: 100,
            protein_g: 5.0,
            fluid_ml: 1.0,
        };
        assert_eq!(scale(d, 0.0), Nutrients::default());
        assert_eq!(scale(d, -50.0), Nutrients::default());
        assert_eq!(scale(d, f64::NAN), Nutrients::default());
    }

    #[test]
    fn test_scale_rounds_calories_only() {
        let d = Density {
            calories: 333,
            protein_g: 3.33,
            fluid_ml: 0.0,
        };
        let n = scale(d, 50.0);
        // 166.5 rounds to 167; protein stays fractional
        assert_eq!(n.calories, 167);
        assert!((n.protein_g - 1.665).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_basic_scenario() {
        // A = 100 kcal / 5 g protein per 100 g; 200 g of A.
        let mut items = HashMap::new();
        items.insert("a".to_string(), leaf("a", 100, 5.0, 0.0));

        let agg = aggregate(&[component("a", 200.0)], &items);
        assert_eq!(agg.totals.calories, 200);
        assert!((agg.totals.protein_g - 10.0).abs() < f64::EPSILON);
        assert!((agg.totals.fluid_ml - 0.0).abs() < f64::EPSILON);
        assert!((agg.totals.weight - 200.0).abs() < f64::EPSILON);
        assert!(agg.missing.is_empty());
    }

    #[test]
    fn test_aggregate_skips_missing_references() {
        let mut items = HashMap::new();
        items.insert("a".to_string(), leaf("a", 100, 5.0, 0.0));

        let agg = aggregate(&[component("a", 100.0), component("ghost", 300.0)], &items);
        assert_eq!(agg.totals.calories, 100);
        // missing component contributes nothing, not even weight
        assert!((agg.totals.weight - 100.0).abs() < f64::EPSILON);
        assert_eq!(agg.missing, vec!["ghost".to_string()]);
    }

    #[test]
    fn test_aggregate_is_side_effect_free() {
        let mut items = HashMap::new();
        items.insert("a".to_string(), leaf("a", 100, 5.0, 0.0));
        let components = vec![component("a", 150.0)];

        let first = aggregate(&components, &items);
        let second = aggregate(&components, &items);
        assert_eq!(first.totals, second.totals);
    }

    #[test]
    fn test_derive_density_one_to_one_cook_ratio() {
        // Totals from 200 g of A at 100 kcal / 5 g per 100 g.
        let totals = Totals {
            calories: 200,
            protein_g: 10.0,
            fluid_ml: 0.0,
            weight: 200.0,
        };
        let d = derive_density(&totals, 200.0);
        assert_eq!(d.calories, 100);
        assert!((d.protein_g - 5.0).abs() < f64::EPSILON);
        assert!((d.fluid_ml - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_derive_density_cooked_weight_changes_density() {
        // Water loss: 200 g raw cooks down to 160 g.
        let totals = Totals {
            calories: 200,
            protein_g: 10.0,
            fluid_ml: 0.0,
            weight: 200.0,
        };
        let d = derive_density(&totals, 160.0);
        assert_eq!(d.calories, 125);
        assert!((d.protein_g - 6.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_derive_density_zero_cooked_weight_falls_back_to_100() {
        let totals = Totals {
            calories: 50,
            protein_g: 2.0,
            fluid_ml: 0.0,
            weight: 0.0,
        };
        let d = derive_density(&totals, 0.0);
        assert_eq!(d.calories, 50);
        assert!((d.protein_g - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_derive_density_rounds_to_one_decimal() {
        let totals = Totals {
            calories: 100,
            protein_g: 10.0,
            fluid_ml: 10.0,
            weight: 300.0,
        };
        let d = derive_density(&totals, 300.0);
        // 10 / 3 = 3.333... rounds to 3.3
        assert!((d.protein_g - 3.3).abs() < f64::EPSILON);
        assert!((d.fluid_ml - 3.3).abs() < f64::EPSILON);
        assert_eq!(d.calories, 33);
    }
}
