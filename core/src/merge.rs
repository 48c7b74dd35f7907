//! Classifies an incoming bundle against the local item map and keeps
//! the imported-id to local-id mapping that the import executor commits.
//! The classification is only a default: callers may switch actions or
//! pin an arbitrary local item before executing.

use std::collections::HashMap;

use anyhow::{Result, bail};
use serde::Serialize;

use crate::bundle::Bundle;
use crate::models::Item;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchStatus {
    /// Same name, same calorie/protein density, same kind.
    MatchExact,
    /// Same name and kind, different density.
    MatchName,
    /// No local counterpart.
    New,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResolveAction {
    UseLocal,
    CreateNew,
    Overwrite,
}

/// One imported item with its classification and chosen outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionEntry {
    pub item: Item,
    pub status: MatchStatus,
    pub local_id: Option<String>,
    pub action: ResolveAction,
    /// Terminal override: pins the local id directly, bypassing the
    /// action enum.
    pub manual_link: Option<String>,
}

impl ResolutionEntry {
    /// The action state machine per classification.
    #[must_use]
    pub fn allowed_actions(&self) -> &'static [ResolveAction] {
        match self.status {
            MatchStatus::New => &[ResolveAction::CreateNew],
            MatchStatus::MatchName => &[
                ResolveAction::UseLocal,
                ResolveAction::CreateNew,
                ResolveAction::Overwrite,
            ],
            MatchStatus::MatchExact => &[ResolveAction::UseLocal, ResolveAction::CreateNew],
        }
    }

    /// Choose an action; clears any manual link.
    pub fn set_action(&mut self, action: ResolveAction) -> Result<()> {
        if !self.allowed_actions().contains(&action) {
            bail!(
                "Action {action:?} is not valid for an item classified {:?}",
                self.status
            );
        }
        self.action = action;
        self.manual_link = None;
        Ok(())
    }

    /// Pin this import to an arbitrary local item, regardless of the
    /// automatic classification.
    pub fn link_to(&mut self, local_id: &str) {
        self.manual_link = Some(local_id.to_string());
    }
}

/// Mutable mapping from imported identity to local identity. `None`
/// means "allocate a fresh id at commit time".
#[derive(Debug, Clone, Default)]
pub struct ResolutionState {
    mapping: HashMap<String, Option<String>>,
}

impl ResolutionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mapping(&mut self, imported_id: &str, local_id: Option<String>) {
        self.mapping.insert(imported_id.to_string(), local_id);
    }

    #[must_use]
    pub fn local_id(&self, imported_id: &str) -> Option<&str> {
        self.mapping
            .get(imported_id)
            .and_then(|v| v.as_deref())
    }

    #[must_use]
    pub fn has_mapping(&self, imported_id: &str) -> bool {
        self.mapping.contains_key(imported_id)
    }

    pub fn clear(&mut self) {
        self.mapping.clear();
    }
}

fn density_matches(a: &Item, b: &Item) -> bool {
    a.calories_per_100 == b.calories_per_100
        && (a.protein_per_100 - b.protein_per_100).abs() < f64::EPSILON
}

/// Classify every bundle item against the local map. Exact matches
/// default to reusing the local item; name conflicts also default to
/// the local item but surface the full choice; new items default to
/// creation.
#[must_use]
pub fn analyze(bundle: &Bundle, items: &HashMap<String, Item>) -> Vec<ResolutionEntry> {
    bundle
        .items
        .iter()
        .map(|imported| {
            let exact = items.values().find(|local| {
                local.name == imported.name
                    && local.kind == imported.kind
                    && density_matches(local, imported)
            });
            if let Some(local) = exact {
                return ResolutionEntry {
                    item: imported.clone(),
                    status: MatchStatus::MatchExact,
                    local_id: Some(local.id.clone()),
                    action: ResolveAction::UseLocal,
                    manual_link: None,
                };
            }

            let by_name = items
                .values()
                .find(|local| local.name == imported.name && local.kind == imported.kind);
            if let Some(local) = by_name {
                return ResolutionEntry {
                    item: imported.clone(),
                    status: MatchStatus::MatchName,
                    local_id: Some(local.id.clone()),
                    action: ResolveAction::UseLocal,
                    manual_link: None,
                };
            }

            ResolutionEntry {
                item: imported.clone(),
                status: MatchStatus::New,
                local_id: None,
                action: ResolveAction::CreateNew,
                manual_link: None,
            }
        })
        .collect()
}

/// Derive the id mapping the executor will commit from the (possibly
/// caller-adjusted) analysis entries.
#[must_use]
pub fn resolution_from(analysis: &[ResolutionEntry]) -> ResolutionState {
    let mut state = ResolutionState::new();
    for entry in analysis {
        let local = if let Some(link) = &entry.manual_link {
            Some(link.clone())
        } else {
            match entry.action {
                ResolveAction::CreateNew => None,
                ResolveAction::UseLocal | ResolveAction::Overwrite => entry.local_id.clone(),
            }
        };
        state.add_mapping(&entry.item.id, local);
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::BUNDLE_VERSION;
    use crate::models::ItemKind;

    fn item(id: &str, name: &str, kind: ItemKind, calories: i64, protein: f64) -> Item {
        Item {
            id: id.to_string(),
            name: name.to_string(),
            kind,
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

    fn bundle_of(items: Vec<Item>) -> Bundle {
        let root_id = items[0].id.clone();
        Bundle {
            version: BUNDLE_VERSION,
            root_id,
            items,
        }
    }

    fn local_map() -> HashMap<String, Item> {
        [
            item("l-1", "Carrot", ItemKind::Food, 41, 0.9),
            item("l-2", "Broth", ItemKind::Liquid, 12, 1.0),
        ]
        .into_iter()
        .map(|i| (i.id.clone(), i))
        .collect()
    }

    #[test]
    fn test_exact_match_classified() {
        let bundle = bundle_of(vec![item("i-1", "Carrot", ItemKind::Food, 41, 0.9)]);
        let analysis = analyze(&bundle, &local_map());
        assert_eq!(analysis[0].status, MatchStatus::MatchExact);
        assert_eq!(analysis[0].local_id.as_deref(), Some("l-1"));
        assert_eq!(analysis[0].action, ResolveAction::UseLocal);
    }

    #[test]
    fn test_name_conflict_classified() {
        let bundle = bundle_of(vec![item("i-1", "Carrot", ItemKind::Food, 45, 0.9)]);
        let analysis = analyze(&bundle, &local_map());
        assert_eq!(analysis[0].status, MatchStatus::MatchName);
        assert_eq!(analysis[0].local_id.as_deref(), Some("l-1"));
        assert_eq!(analysis[0].action, ResolveAction::UseLocal);
    }

    #[test]
    fn test_same_name_different_kind_is_new() {
        // A liquid named Carrot does not match the food named Carrot.
        let bundle = bundle_of(vec![item("i-1", "Carrot", ItemKind::Liquid, 41, 0.9)]);
        let analysis = analyze(&bundle, &local_map());
        assert_eq!(analysis[0].status, MatchStatus::New);
        assert!(analysis[0].local_id.is_none());
        assert_eq!(analysis[0].action, ResolveAction::CreateNew);
    }

    #[test]
    fn test_allowed_actions_state_machine() {
        let bundle = bundle_of(vec![
            item("i-1", "Carrot", ItemKind::Food, 41, 0.9),
            item("i-2", "Carrot", ItemKind::Food, 45, 0.9),
            item("i-3", "Parsnip", ItemKind::Food, 75, 1.2),
        ]);
        let analysis = analyze(&bundle, &local_map());

        assert_eq!(
            analysis[0].allowed_actions(),
            &[ResolveAction::UseLocal, ResolveAction::CreateNew]
        );
        assert_eq!(
            analysis[1].allowed_actions(),
            &[
                ResolveAction::UseLocal,
                ResolveAction::CreateNew,
                ResolveAction::Overwrite
            ]
        );
        assert_eq!(analysis[2].allowed_actions(), &[ResolveAction::CreateNew]);
    }

    #[test]
    fn test_set_action_rejects_invalid_transition() {
        let bundle = bundle_of(vec![item("i-1", "Parsnip", ItemKind::Food, 75, 1.2)]);
        let mut analysis = analyze(&bundle, &local_map());
        assert!(analysis[0].set_action(ResolveAction::Overwrite).is_err());
        assert!(analysis[0].set_action(ResolveAction::CreateNew).is_ok());
    }

    #[test]
    fn test_set_action_clears_manual_link() {
        let bundle = bundle_of(vec![item("i-1", "Carrot", ItemKind::Food, 45, 0.9)]);
        let mut analysis = analyze(&bundle, &local_map());
        analysis[0].link_to("l-2");
        assert_eq!(analysis[0].manual_link.as_deref(), Some("l-2"));
        analysis[0].set_action(ResolveAction::CreateNew).unwrap();
        assert!(analysis[0].manual_link.is_none());
    }

    #[test]
    fn test_resolution_from_defaults() {
        let bundle = bundle_of(vec![
            item("i-1", "Carrot", ItemKind::Food, 41, 0.9),
            item("i-2", "Parsnip", ItemKind::Food, 75, 1.2),
        ]);
        let analysis = analyze(&bundle, &local_map());
        let state = resolution_from(&analysis);

        assert_eq!(state.local_id("i-1"), Some("l-1"));
        assert!(state.has_mapping("i-2"));
        assert!(state.local_id("i-2").is_none());
    }

    #[test]
    fn test_resolution_honors_manual_link() {
        let bundle = bundle_of(vec![item("i-1", "Parsnip", ItemKind::Food, 75, 1.2)]);
        let mut analysis = analyze(&bundle, &local_map());
        analysis[0].link_to("l-2");

        let state = resolution_from(&analysis);
        assert_eq!(state.local_id("i-1"), Some("l-2"));
    }

    #[test]
    fn test_resolution_create_new_forces_fresh_id() {
        let bundle = bundle_of(vec![item("i-1", "Carrot", ItemKind::Food, 41, 0.9)]);
        let mut analysis = analyze(&bundle, &local_map());
        analysis[0].set_action(ResolveAction::CreateNew).unwrap();

        let state = resolution_from(&analysis);
        assert!(state.has_mapping("i-1"));
        assert!(state.local_id("i-1").is_none());
    }
}
