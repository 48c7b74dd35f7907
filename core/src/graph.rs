//! Operations over the composition graph. Items live in a flat id-keyed
//! map; edges are the id references inside recipe component lists. Every
//! traversal carries an explicit visited set so corrupt cyclic data (the
//! edit-time check should make it impossible, but imported or legacy
//! stores may lie) can never hang the engine.

use std::collections::{HashMap, HashSet};

use chrono::Local;
use serde::Serialize;

use crate::models::{Component, Item};
use crate::nutrients;

/// True when putting `candidate` into `into_recipe`'s component list
/// would close a loop: either the two are the same item, or
/// `candidate`'s transitive component closure already contains
/// `into_recipe`. Must be consulted before any component add.
#[must_use]
pub fn creates_cycle(candidate: &str, into_recipe: &str, items: &HashMap<String, Item>) -> bool {
    if candidate == into_recipe {
        return true;
    }
    let mut visited = HashSet::new();
    reaches(candidate, into_recipe, items, &mut visited)
}

fn reaches(
    from: &str,
    target: &str,
    items: &HashMap<String, Item>,
    visited: &mut HashSet<String>,
) -> bool {
    if !visited.insert(from.to_string()) {
        return false;
    }
    let Some(item) = items.get(from) else {
        return false;
    };
    if !item.is_recipe() {
        return false;
    }
    item.components
        .iter()
        .any(|c| c.item_id == target || reaches(&c.item_id, target, items, visited))
}

/// The root item plus every distinct item reachable through component
/// references: root first, then each component's closure in list order,
/// deduplicated on first occurrence. Missing references are silently
/// absent from the result.
#[must_use]
pub fn transitive_closure(root: &str, items: &HashMap<String, Item>) -> Vec<Item> {
    let mut visited = HashSet::new();
    let mut out = Vec::new();
    collect(root, items, &mut visited, &mut out);
    out
}

fn collect(
    id: &str,
    items: &HashMap<String, Item>,
    visited: &mut HashSet<String>,
    out: &mut Vec<Item>,
) {
    if !visited.insert(id.to_string()) {
        return;
    }
    let Some(item) = items.get(id) else {
        return;
    };
    out.push(item.clone());
    if item.is_recipe() {
        for component in &item.components {
            collect(&component.item_id, items, visited, out);
        }
    }
}

/// Outcome of persisting a propagation pass. Failures are per ancestor
/// and never abort the rest of the pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PropagationReport {
    pub updated: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl PropagationReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Recompute the density of every recipe that (transitively) references
/// `changed`, updating `items` in place. Returns the refreshed items in
/// recomputation order; the caller persists them in that order so no
/// later recomputation reads a density that was never stored.
///
/// The guard tracks the current recursion path only, so diamond-shaped
/// graphs still get every intermediate recomputation while genuinely
/// cyclic data terminates instead of looping.
#[must_use]
pub fn propagate_update(changed: &str, items: &mut HashMap<String, Item>) -> Vec<Item> {
    let mut path = HashSet::new();
    let mut out = Vec::new();
    propagate_into(changed, items, &mut path, &mut out);
    out
}

fn propagate_into(
    changed: &str,
    items: &mut HashMap<String, Item>,
    path: &mut HashSet<String>,
    out: &mut Vec<Item>,
) {
    if !path.insert(changed.to_string()) {
        return;
    }

    let parent_ids: Vec<String> = items
        .values()
        .filter(|item| {
            item.is_recipe() && item.components.iter().any(|c| c.item_id == changed)
        })
        .map(|item| item.id.clone())
        .collect();

    for parent_id in parent_ids {
        let Some(parent) = items.get(&parent_id) else {
            continue;
        };
        let components: Vec<Component> = parent.components.clone();
        let coefficient = parent.weight_coefficient;

        let agg = nutrients::aggregate(&components, items);
        let cooked_weight = agg.totals.weight * coefficient;
        let density = nutrients::derive_density(&agg.totals, cooked_weight);

        if let Some(parent) = items.get_mut(&parent_id) {
            parent.calories_per_100 = density.calories;
            parent.protein_per_100 = density.protein_g;
            parent.fluid_per_100 = density.fluid_ml;
            parent.portion_weight = Some(cooked_weight);
            parent.updated_at = Local::now().to_rfc3339();
            out.push(parent.clone());
        }

        propagate_into(&parent_id, items, path, out);
    }

    path.remove(changed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemKind;

    fn leaf(id: &str, calories: i64, protein: f64) -> Item {
        Item {
            id: id.to_string(),
            name: id.to_string(),
            kind: ItemKind::Food,
            category: String::new(),
            calories_per_100: calories,
            protein_per_100: protein,
            fluid_per_100: 0.0,
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

    fn recipe(id: &str, components: &[(&str, f64)]) -> Item {
        let mut item = leaf(id, 0, 0.0);
        item.kind = ItemKind::Recipe;
        item.components = components
            .iter()
            .map(|(cid, amount)| Component {
                item_id: (*cid).to_string(),
                amount: *amount,
            })
            .collect();
        item
    }

    fn index(items: Vec<Item>) -> HashMap<String, Item> {
        items.into_iter().map(|i| (i.id.clone(), i)).collect()
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let items = index(vec![recipe("r", &[])]);
        assert!(creates_cycle("r", "r", &items));
    }

    #[test]
    fn test_direct_and_transitive_cycles_detected() {
        // r2 contains r1; adding r2 into r1 would loop.
        let items = index(vec![
            leaf("a", 100, 5.0),
            recipe("r1", &[("a", 100.0)]),
            recipe("r2", &[("r1", 50.0)]),
        ]);
        assert!(creates_cycle("r2", "r1", &items));
        // r3 -> r2 -> r1; adding r3 into r1 is also a cycle.
        let mut items = items;
        items.insert("r3".to_string(), recipe("r3", &[("r2", 30.0)]));
        assert!(creates_cycle("r3", "r1", &items));
    }

    #[test]
    fn test_acyclic_add_is_allowed() {
        let items = index(vec![
            leaf("a", 100, 5.0),
            recipe("r1", &[("a", 100.0)]),
            recipe("r2", &[]),
        ]);
        assert!(!creates_cycle("r1", "r2", &items));
        assert!(!creates_cycle("a", "r1", &items));
    }

    #[test]
    fn test_cycle_check_terminates_on_corrupt_data() {
        // r1 and r2 already reference each other; the check must not hang.
        let items = index(vec![
            recipe("r1", &[("r2", 100.0)]),
            recipe("r2", &[("r1", 100.0)]),
        ]);
        assert!(creates_cycle("r1", "r2", &items));
        assert!(!creates_cycle("r1", "r3", &items));
    }

    #[test]
    fn test_closure_order_and_dedup() {
        let items = index(vec![
            leaf("a", 100, 5.0),
            leaf("b", 50, 1.0),
            recipe("inner", &[("a", 100.0)]),
            recipe("outer", &[("inner", 150.0), ("b", 30.0), ("a", 20.0)]),
        ]);
        let closure = transitive_closure("outer", &items);
        let ids: Vec<&str> = closure.iter().map(|i| i.id.as_str()).collect();
        // Root first, then depth-first in component-list order, "a" only once.
        assert_eq!(ids, vec!["outer", "inner", "a", "b"]);
    }

    #[test]
    fn test_closure_skips_missing_and_terminates_on_cycles() {
        let items = index(vec![
            recipe("r1", &[("r2", 100.0), ("ghost", 10.0)]),
            recipe("r2", &[("r1", 100.0)]),
        ]);
        let closure = transitive_closure("r1", &items);
        let ids: Vec<&str> = closure.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2"]);
    }

    #[test]
    fn test_closure_of_missing_root_is_empty() {
        let items = index(vec![leaf("a", 100, 5.0)]);
        assert!(transitive_closure("ghost", &items).is_empty());
    }

    #[test]
    fn test_propagate_refreshes_parent_density() {
        // R = 200 g of A, 1:1 cook ratio. A's calories change 100 -> 150.
        let mut r = recipe("r", &[("a", 200.0)]);
        r.calories_per_100 = 100;
        r.protein_per_100 = 5.0;
        let mut items = index(vec![leaf("a", 150, 5.0), r]);

        let updated = propagate_update("a", &mut items);
        assert_eq!(updated.len(), 1);
        assert_eq!(items["r"].calories_per_100, 150);
        assert!((items["r"].protein_per_100 - 5.0).abs() < f64::EPSILON);
        assert!((items["r"].portion_weight.unwrap() - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_propagate_reaches_grandparents() {
        let mut inner = recipe("inner", &[("a", 100.0)]);
        inner.calories_per_100 = 100;
        let mut outer = recipe("outer", &[("inner", 100.0)]);
        outer.calories_per_100 = 100;
        let mut items = index(vec![leaf("a", 200, 0.0), inner, outer]);

        let updated = propagate_update("a", &mut items);
        let ids: Vec<&str> = updated.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["inner", "outer"]);
        assert_eq!(items["inner"].calories_per_100, 200);
        assert_eq!(items["outer"].calories_per_100, 200);
    }

    #[test]
    fn test_propagate_uses_stored_coefficient() {
        // 200 g raw cooks to 160 g (coefficient 0.8).
        let mut r = recipe("r", &[("a", 200.0)]);
        r.weight_coefficient = 0.8;
        let mut items = index(vec![leaf("a", 100, 0.0), r]);

        let _ = propagate_update("a", &mut items);
        // totals: 200 kcal over cooked 160 g -> 125 per 100 g
        assert_eq!(items["r"].calories_per_100, 125);
        assert!((items["r"].portion_weight.unwrap() - 160.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_propagate_is_idempotent() {
        let mut items = index(vec![
            leaf("a", 120, 4.0),
            recipe("inner", &[("a", 150.0)]),
            recipe("outer", &[("inner", 100.0)]),
        ]);

        let _ = propagate_update("a", &mut items);
        let after_first = items["outer"].density();
        let _ = propagate_update("a", &mut items);
        assert_eq!(items["outer"].density(), after_first);
    }

    #[test]
    fn test_propagate_diamond_recomputes_top_with_both_branches() {
        // a feeds r1 and r2; r3 contains both. Either traversal order
        // must leave r3 consistent with the final r1 and r2 densities.
        let mut items = index(vec![
            leaf("a", 100, 0.0),
            recipe("r1", &[("a", 100.0)]),
            recipe("r2", &[("a", 100.0)]),
            recipe("r3", &[("r1", 100.0), ("r2", 100.0)]),
        ]);

        let _ = propagate_update("a", &mut items);
        assert_eq!(items["r1"].calories_per_100, 100);
        assert_eq!(items["r2"].calories_per_100, 100);
        assert_eq!(items["r3"].calories_per_100, 100);

        // Change the leaf and propagate again.
        items.get_mut("a").unwrap().calories_per_100 = 200;
        let _ = propagate_update("a", &mut items);
        assert_eq!(items["r3"].calories_per_100, 200);
    }

    #[test]
    fn test_propagate_terminates_on_cyclic_data() {
        let mut items = index(vec![
            recipe("r1", &[("r2", 100.0)]),
            recipe("r2", &[("r1", 100.0)]),
        ]);
        // Corrupt data must terminate, not hang.
        let updated = propagate_update("r1", &mut items);
        assert!(!updated.is_empty());
    }

    #[test]
    fn test_propagate_after_delete_lowers_totals() {
        let mut r = recipe("r", &[("a", 100.0), ("b", 100.0)]);
        r.calories_per_100 = 150;
        let mut items = index(vec![leaf("a", 100, 0.0), leaf("b", 200, 0.0), r]);

        // Simulate deleting "b": remove it, then propagate its id.
        items.remove("b");
        let _ = propagate_update("b", &mut items);
        // Only "a" resolves now: 100 kcal over 100 g of resolvable weight,
        // against the same coefficient (cooked weight = remaining 100 g).
        assert_eq!(items["r"].calories_per_100, 100);
    }
}
