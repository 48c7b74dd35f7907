//! `MorselService` is the facade every frontend talks to. Wraps the
//! store plus an in-memory item cache and sequences the engine's
//! operations: CRUD with propagation, the recipe draft builder, daily
//! logging with frozen snapshots, usage-score decay, and the bundle
//! share/import pipeline.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Result, bail};
use chrono::{Local, NaiveDate};

use crate::bundle::{self, Bundle};
use crate::error::EngineError;
use crate::graph::{self, PropagationReport};
use crate::import::{self, ImportOptions, ImportReport};
use crate::merge::{self, ResolutionEntry};
use crate::models::{
    CategoryGroup, Component, DayLog, DaySummary, Item, ItemKind, ItemSnapshot, LogEntry, NewItem,
    validate_amount, validate_date, validate_new_item,
};
use crate::nutrients::{self, Aggregation};
use crate::store::{ITEMS, LOGS, Store, uid};

/// Multiplier applied to every usage score per day of inactivity.
const DECAY_FACTOR: f64 = 0.9;
const LAST_DECAY_KEY: &str = "last_decay_date";

/// An in-progress recipe edit. Explicit state, passed in and out of the
/// builder operations, so repeated or concurrent edit sessions in tests
/// never share anything.
#[derive(Debug, Clone)]
pub struct RecipeDraft {
    /// Present when editing an existing recipe.
    pub id: Option<String>,
    pub name: String,
    pub category: String,
    pub notes: Option<String>,
    pub components: Vec<Component>,
    /// Measured cooked weight; falls back to the raw component weight.
    pub cooked_weight: Option<f64>,
    pub usage_score: f64,
}

impl RecipeDraft {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            category: "lunch".to_string(),
            notes: None,
            components: Vec::new(),
            cooked_weight: None,
            usage_score: 0.0,
        }
    }
}

pub struct MorselService {
    store: Store,
    items: HashMap<String, Item>,
}

impl MorselService {
    pub fn new(path: &Path) -> Result<Self> {
        Self::with_store(Store::open(path)?)
    }

    pub fn new_in_memory() -> Result<Self> {
        Self::with_store(Store::open_in_memory()?)
    }

    fn with_store(store: Store) -> Result<Self> {
        let all: Vec<Item> = store.get_all(ITEMS)?;
        let items = all.into_iter().map(|i| (i.id.clone(), i)).collect();
        Ok(Self { store, items })
    }

    // --- Items ---

    #[must_use]
    pub fn items(&self) -> &HashMap<String, Item> {
        &self.items
    }

    #[must_use]
    pub fn get_item(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn require_item(&self, id: &str) -> Result<&Item> {
        self.items
            .get(id)
            .ok_or_else(|| EngineError::ItemNotFound(id.to_string()).into())
    }

    #[must_use]
    pub fn find_item_by_name(&self, name: &str) -> Option<&Item> {
        self.items
            .values()
            .find(|item| item.name.eq_ignore_ascii_case(name))
    }

    /// Substring search ranked by usage affinity, then name.
    #[must_use]
    pub fn search_items(&self, query: &str) -> Vec<&Item> {
        let needle = query.to_lowercase();
        let mut hits: Vec<&Item> = self
            .items
            .values()
            .filter(|item| item.name.to_lowercase().contains(&needle))
            .collect();
        hits.sort_by(|a, b| {
            b.usage_score
                .partial_cmp(&a.usage_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        hits
    }

    pub fn add_item(&mut self, new: &NewItem) -> Result<Item> {
        validate_new_item(new)?;
        let item = Item {
            id: uid("m"),
            name: new.name.trim().to_string(),
            kind: new.kind,
            category: new.category.clone(),
            calories_per_100: new.calories_per_100,
            protein_per_100: new.protein_per_100,
            fluid_per_100: new.fluid_per_100,
            default_amount: new.default_amount.unwrap_or(100.0),
            usage_score: 0.0,
            last_used: None,
            components: Vec::new(),
            weight_coefficient: 1.0,
            portion_weight: None,
            notes: None,
            updated_at: Local::now().to_rfc3339(),
        };
        self.store.put(ITEMS, &item.id, &item)?;
        self.items.insert(item.id.clone(), item.clone());
        Ok(item)
    }

    /// Persist an edited item and refresh every recipe that depends on
    /// it, directly or transitively.
    pub fn update_item(&mut self, mut item: Item) -> Result<PropagationReport> {
        if !self.items.contains_key(&item.id) {
            return Err(EngineError::ItemNotFound(item.id).into());
        }
        item.updated_at = Local::now().to_rfc3339();
        self.store.put(ITEMS, &item.id, &item)?;
        self.items.insert(item.id.clone(), item.clone());
        Ok(self.propagate(&item.id))
    }

    /// Delete an item and propagate, so parent recipes immediately
    /// reflect the now-missing reference (their totals drop).
    pub fn delete_item(&mut self, id: &str) -> Result<PropagationReport> {
        if self.items.remove(id).is_none() {
            return Err(EngineError::ItemNotFound(id.to_string()).into());
        }
        self.store.delete(ITEMS, id)?;
        Ok(self.propagate(id))
    }

    /// Recompute ancestors in memory, then persist each in dependency
    /// order. A failed write is recorded and the pass continues; the
    /// caller decides what to do with a dirty report.
    fn propagate(&mut self, changed: &str) -> PropagationReport {
        let refreshed = graph::propagate_update(changed, &mut self.items);
        let mut report = PropagationReport::default();
        let mut seen = HashSet::new();
        for item in refreshed {
            match self.store.put(ITEMS, &item.id, &item) {
                Ok(()) => {
                    if seen.insert(item.id.clone()) {
                        report.updated.push(item.id);
                    }
                }
                Err(e) => report.failed.push((item.id, e.to_string())),
            }
        }
        report
    }

    // --- Recipe builder ---

    pub fn draft_from_item(&self, id: &str) -> Result<RecipeDraft> {
        let item = self.require_item(id)?;
        if !item.is_recipe() {
            bail!("Item '{}' is not a recipe", item.name);
        }
        Ok(RecipeDraft {
            id: Some(item.id.clone()),
            name: item.name.clone(),
            category: item.category.clone(),
            notes: item.notes.clone(),
            components: item.components.clone(),
            cooked_weight: item.portion_weight,
            usage_score: item.usage_score,
        })
    }

    /// Add a component to a draft. The cycle check runs here, before
    /// any mutation; a rejected add leaves the draft untouched.
    pub fn add_component(
        &self,
        draft: &mut RecipeDraft,
        item_id: &str,
        amount: f64,
    ) -> Result<()> {
        validate_amount(amount)?;
        let item = self.require_item(item_id)?;
        if let Some(recipe_id) = &draft.id {
            if graph::creates_cycle(item_id, recipe_id, &self.items) {
                return Err(EngineError::CyclicCompositionRejected {
                    candidate: item.name.clone(),
                    recipe: draft.name.clone(),
                }
                .into());
            }
        }
        draft.components.push(Component {
            item_id: item_id.to_string(),
            amount,
        });
        Ok(())
    }

    pub fn remove_component(&self, draft: &mut RecipeDraft, index: usize) -> Result<()> {
        if index >= draft.components.len() {
            bail!("No component at position {index}");
        }
        draft.components.remove(index);
        Ok(())
    }

    /// Raw totals of the draft as currently composed, with any dangling
    /// references surfaced for a warning.
    #[must_use]
    pub fn draft_totals(&self, draft: &RecipeDraft) -> Aggregation {
        nutrients::aggregate(&draft.components, &self.items)
    }

    /// Persist a draft as a recipe item: derive its density from the
    /// component totals and cooked weight, then propagate when this was
    /// an edit of an existing recipe.
    pub fn save_recipe(&mut self, draft: &RecipeDraft) -> Result<(Item, PropagationReport)> {
        if draft.name.trim().is_empty() {
            bail!("Recipe name must not be empty");
        }
        let agg = self.draft_totals(draft);
        let cooked_weight = draft
            .cooked_weight
            .filter(|w| *w > 0.0)
            .unwrap_or(if agg.totals.weight > 0.0 {
                agg.totals.weight
            } else {
                100.0
            });
        let density = nutrients::derive_density(&agg.totals, cooked_weight);
        let weight_coefficient = if agg.totals.weight > 0.0 {
            cooked_weight / agg.totals.weight
        } else {
            1.0
        };

        let is_edit = draft.id.is_some();
        let id = draft.id.clone().unwrap_or_else(|| uid("m"));
        let item = Item {
            id: id.clone(),
            name: draft.name.trim().to_string(),
            kind: ItemKind::Recipe,
            category: draft.category.clone(),
            calories_per_100: density.calories,
            protein_per_100: density.protein_g,
            fluid_per_100: density.fluid_ml,
            default_amount: 100.0,
            usage_score: draft.usage_score,
            last_used: self.items.get(&id).and_then(|i| i.last_used.clone()),
            components: draft.components.clone(),
            weight_coefficient,
            portion_weight: Some(cooked_weight),
            notes: draft.notes.clone(),
            updated_at: Local::now().to_rfc3339(),
        };
        self.store.put(ITEMS, &id, &item)?;
        self.items.insert(id.clone(), item.clone());

        let report = if is_edit {
            self.propagate(&id)
        } else {
            PropagationReport::default()
        };
        Ok((item, report))
    }

    // --- Daily log ---

    pub fn day_log(&self, date: &str) -> Result<DayLog> {
        validate_date(date)?;
        Ok(self
            .store
            .get(LOGS, date)?
            .unwrap_or_else(|| DayLog::empty(date)))
    }

    /// Record a consumption. The entry freezes the item's density and
    /// name; later item edits never touch it.
    pub fn log_consumption(&mut self, date: &str, item_id: &str, amount: f64) -> Result<LogEntry> {
        validate_amount(amount)?;
        let mut log = self.day_log(date)?;
        if log.finalized {
            return Err(EngineError::LogFinalized(date.to_string()).into());
        }
        let item = self.require_item(item_id)?;
        let entry = LogEntry {
            id: uid("e"),
            item_id: item_id.to_string(),
            amount,
            snapshot: ItemSnapshot::of(item),
            logged_at: Local::now().to_rfc3339(),
        };
        log.entries.push(entry.clone());
        self.store.put(LOGS, date, &log)?;
        self.bump_usage(item_id)?;
        Ok(entry)
    }

    pub fn delete_entry(&mut self, date: &str, entry_id: &str) -> Result<bool> {
        let mut log = self.day_log(date)?;
        if log.finalized {
            return Err(EngineError::LogFinalized(date.to_string()).into());
        }
        let before = log.entries.len();
        log.entries.retain(|e| e.id != entry_id);
        if log.entries.len() == before {
            return Ok(false);
        }
        self.store.put(LOGS, date, &log)?;
        Ok(true)
    }

    pub fn add_water(&mut self, date: &str, ml: f64) -> Result<f64> {
        validate_amount(ml)?;
        let mut log = self.day_log(date)?;
        if log.finalized {
            return Err(EngineError::LogFinalized(date.to_string()).into());
        }
        log.water_ml += ml;
        self.store.put(LOGS, date, &log)?;
        Ok(log.water_ml)
    }

    /// Entries grouped by the category frozen in their snapshots, in
    /// first-seen order.
    pub fn day_summary(&self, date: &str) -> Result<DaySummary> {
        let log = self.day_log(date)?;
        let mut groups: Vec<CategoryGroup> = Vec::new();
        for entry in &log.entries {
            let category = &entry.snapshot.category;
            let idx = groups
                .iter()
                .position(|g| g.category == *category)
                .unwrap_or_else(|| {
                    groups.push(CategoryGroup {
                        category: category.clone(),
                        entries: Vec::new(),
                        subtotal: crate::models::Nutrients::default(),
                    });
                    groups.len() - 1
                });
            let n = entry.nutrients();
            groups[idx].subtotal.calories += n.calories;
            groups[idx].subtotal.protein_g += n.protein_g;
            groups[idx].subtotal.fluid_ml += n.fluid_ml;
            groups[idx].entries.push(entry.clone());
        }
        Ok(DaySummary {
            date: log.date.clone(),
            total: log.totals(),
            water_ml: log.water_ml,
            finalized: log.finalized,
            groups,
        })
    }

    /// Freeze a day. From here on the log only changes through
    /// [`MorselService::reset_day`].
    pub fn finalize_day(&mut self, date: &str) -> Result<DayLog> {
        let mut log = self.day_log(date)?;
        log.finalized = true;
        self.store.put(LOGS, date, &log)?;
        Ok(log)
    }

    /// Explicit reset: drop the day's log entirely, finalized or not.
    pub fn reset_day(&mut self, date: &str) -> Result<bool> {
        validate_date(date)?;
        self.store.delete(LOGS, date)
    }

    // --- Usage affinity ---

    /// +1 on the item, cascading into a recipe's components; ranking
    /// should learn the ingredients too. Visited-set guarded like every
    /// other traversal.
    fn bump_usage(&mut self, item_id: &str) -> Result<()> {
        let mut visited = HashSet::new();
        self.bump_usage_inner(item_id, &mut visited)
    }

    fn bump_usage_inner(&mut self, item_id: &str, visited: &mut HashSet<String>) -> Result<()> {
        if !visited.insert(item_id.to_string()) {
            return Ok(());
        }
        let Some(item) = self.items.get_mut(item_id) else {
            return Ok(());
        };
        item.usage_score += 1.0;
        item.last_used = Some(Local::now().to_rfc3339());
        let snapshot = item.clone();
        self.store.put(ITEMS, item_id, &snapshot)?;

        let component_ids: Vec<String> = snapshot
            .components
            .iter()
            .map(|c| c.item_id.clone())
            .collect();
        for child in component_ids {
            self.bump_usage_inner(&child, visited)?;
        }
        Ok(())
    }

    /// Multiplicative decay across all items, once per calendar day gap.
    /// `today` is injected so tests control the clock.
    pub fn apply_decay(&mut self, today: NaiveDate) -> Result<()> {
        let last = self
            .store
            .meta_get(LAST_DECAY_KEY)?
            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok());
        let Some(last) = last else {
            self.store
                .meta_set(LAST_DECAY_KEY, &today.format("%Y-%m-%d").to_string())?;
            return Ok(());
        };
        let days = (today - last).num_days();
        if days <= 0 {
            return Ok(());
        }
        let multiplier = DECAY_FACTOR.powi(i32::try_from(days).unwrap_or(i32::MAX));
        let mut rows = Vec::new();
        for item in self.items.values_mut() {
            if item.usage_score > 0.0 {
                item.usage_score *= multiplier;
            }
            rows.push((item.id.clone(), item.clone()));
        }
        self.store.bulk_put(ITEMS, &rows)?;
        self.store
            .meta_set(LAST_DECAY_KEY, &today.format("%Y-%m-%d").to_string())?;
        Ok(())
    }

    // --- Bundles ---

    pub fn export_bundle(&self, root_id: &str) -> Result<Bundle> {
        bundle::export(root_id, &self.items)
    }

    pub fn export_plain(&self, root_id: &str) -> Result<String> {
        bundle::encode_plain(&self.export_bundle(root_id)?)
    }

    pub fn export_compact(&self, root_id: &str) -> Result<String> {
        bundle::encode_compact(&self.export_bundle(root_id)?)
    }

    pub fn share_link(&self, base_url: &str, root_id: &str) -> Result<String> {
        bundle::share_link(base_url, &self.export_bundle(root_id)?)
    }

    /// Decode pasted/linked text and classify it against local items.
    /// Nothing is written; the caller reviews (and may adjust) the
    /// analysis before executing.
    pub fn analyze_bundle(&self, text: &str) -> Result<(Bundle, Vec<ResolutionEntry>)> {
        let bundle = bundle::decode(text)?;
        let analysis = merge::analyze(&bundle, &self.items);
        Ok((bundle, analysis))
    }

    pub fn execute_import(
        &mut self,
        bundle: &Bundle,
        analysis: &[ResolutionEntry],
        options: &ImportOptions,
    ) -> Result<ImportReport> {
        let mut resolution = merge::resolution_from(analysis);
        import::execute(
            &self.store,
            &mut self.items,
            bundle,
            &mut resolution,
            analysis,
            options,
        )
    }
}
