//! Applies a resolved bundle to the local store: allocates identities
//! for new items, remaps recipe-internal references, and commits in
//! dependency-safe order (non-recipes before recipes). Commit-phase
//! failures are collected per item, never rolled back.

use std::collections::HashSet;

use anyhow::Result;
use chrono::Local;
use serde::Serialize;

use crate::bundle::Bundle;
use crate::merge::{MatchStatus, ResolutionEntry, ResolutionState, ResolveAction};
use crate::models::Item;
use crate::store::{ITEMS, Store, uid};

/// Knobs without semantic weight. The copy suffix marks a deliberately
/// forked name conflict; its wording is a formatting detail.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub copy_suffix: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            copy_suffix: " (imported)".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub created: Vec<String>,
    pub overwritten: Vec<String>,
    pub reused: Vec<String>,
    /// `(item id, reason)` for items whose commit failed. Retry or
    /// manual reconciliation is up to the caller.
    pub failed: Vec<(String, String)>,
}

impl ImportReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

fn find_entry<'a>(analysis: &'a [ResolutionEntry], imported_id: &str) -> Option<&'a ResolutionEntry> {
    analysis.iter().find(|e| e.item.id == imported_id)
}

/// A manual link is a terminal state that bypasses the action enum.
fn effective_action(entry: Option<&ResolutionEntry>) -> Option<ResolveAction> {
    entry.and_then(|e| {
        if e.manual_link.is_some() {
            None
        } else {
            Some(e.action)
        }
    })
}

fn wants_fresh_id(entry: Option<&ResolutionEntry>, resolution: &ResolutionState, id: &str) -> bool {
    resolution.local_id(id).is_none()
        || effective_action(entry) == Some(ResolveAction::CreateNew)
        || entry.is_some_and(|e| e.status == MatchStatus::New && e.manual_link.is_none())
}

/// Execute an analyzed, resolved import against the store. `items` is
/// the in-memory cache; it is refreshed from the store on completion.
pub fn execute(
    store: &Store,
    items: &mut std::collections::HashMap<String, Item>,
    bundle: &Bundle,
    resolution: &mut ResolutionState,
    analysis: &[ResolutionEntry],
    options: &ImportOptions,
) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    // Phase 1: pre-allocate ids for everything that will be created, so
    // sibling recipes referencing each other by original id remap
    // consistently regardless of processing order.
    let mut allocated: HashSet<String> = HashSet::new();
    for imported in &bundle.items {
        let entry = find_entry(analysis, &imported.id);
        if wants_fresh_id(entry, resolution, &imported.id)
            && resolution.local_id(&imported.id).is_none()
        {
            resolution.add_mapping(&imported.id, Some(uid("m")));
            allocated.insert(imported.id.clone());
        }
    }

    // Phases 2 and 3: non-recipes first, then recipes with their
    // component lists remapped, so a reader right after import never
    // sees a recipe pointing at an uncommitted leaf.
    let (recipes, leaves): (Vec<&Item>, Vec<&Item>) =
        bundle.items.iter().partition(|i| i.is_recipe());

    for imported in leaves {
        commit_item(
            store,
            items,
            imported.clone(),
            analysis,
            resolution,
            &allocated,
            options,
            &mut report,
        );
    }

    for imported in recipes {
        let mut remapped = imported.clone();
        for component in &mut remapped.components {
            if let Some(local) = resolution.local_id(&component.item_id) {
                component.item_id = local.to_string();
            }
        }
        commit_item(
            store,
            items,
            remapped,
            analysis,
            resolution,
            &allocated,
            options,
            &mut report,
        );
    }

    // Phase 4: the cache must reflect exactly what was committed.
    let all: Vec<Item> = store.get_all(ITEMS)?;
    *items = all.into_iter().map(|i| (i.id.clone(), i)).collect();

    Ok(report)
}

#[allow(clippy::too_many_arguments)]
fn commit_item(
    store: &Store,
    items: &std::collections::HashMap<String, Item>,
    imported: Item,
    analysis: &[ResolutionEntry],
    resolution: &ResolutionState,
    allocated: &HashSet<String>,
    options: &ImportOptions,
    report: &mut ImportReport,
) {
    let entry = find_entry(analysis, &imported.id);
    let action = effective_action(entry);
    let local_id = resolution.local_id(&imported.id).map(str::to_string);

    let explicit_new = action == Some(ResolveAction::CreateNew)
        || entry.is_some_and(|e| e.status == MatchStatus::New && e.manual_link.is_none());
    let implicit_new = allocated.contains(&imported.id);

    if action == Some(ResolveAction::Overwrite) {
        let Some(local_id) = local_id else {
            report
                .failed
                .push((imported.id, "overwrite without a local id".to_string()));
            return;
        };
        if !items.contains_key(&local_id) {
            report
                .failed
                .push((imported.id, format!("local item {local_id} vanished")));
            return;
        }
        let mut merged = imported;
        merged.id = local_id.clone();
        merged.updated_at = Local::now().to_rfc3339();
        match store.put(ITEMS, &local_id, &merged) {
            Ok(()) => report.overwritten.push(local_id),
            Err(e) => report.failed.push((merged.id, e.to_string())),
        }
    } else if explicit_new || implicit_new {
        let Some(local_id) = local_id else {
            report
                .failed
                .push((imported.id, "no id allocated for new item".to_string()));
            return;
        };
        let mut fresh = imported;
        fresh.id = local_id.clone();
        // Suffix only a deliberate fork of a conflicting item; genuinely
        // new items keep their name untouched.
        if action == Some(ResolveAction::CreateNew)
            && entry.is_some_and(|e| e.status != MatchStatus::New)
        {
            fresh.name.push_str(&options.copy_suffix);
        }
        fresh.updated_at = Local::now().to_rfc3339();
        match store.put(ITEMS, &local_id, &fresh) {
            Ok(()) => report.created.push(local_id),
            Err(e) => report.failed.push((fresh.id, e.to_string())),
        }
    } else {
        // USE_LOCAL (or manual link): nothing to write.
        report.reused.push(local_id.unwrap_or(imported.id));
    }
}
