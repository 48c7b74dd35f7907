use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// What an item is. Recipes carry a component list; everything else is a
/// leaf with a hand-entered density.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Food,
    Liquid,
    Recipe,
}

/// Nutrient values normalized to a 100-unit reference amount
/// (grams for foods, milliliters for liquids).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Density {
    pub calories: i64,
    pub protein_g: f64,
    pub fluid_ml: f64,
}

/// Nutrients scaled to a concrete amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Nutrients {
    pub calories: i64,
    pub protein_g: f64,
    pub fluid_ml: f64,
}

/// Raw sums over a component list, before the cooked-weight conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub calories: i64,
    pub protein_g: f64,
    pub fluid_ml: f64,
    pub weight: f64,
}

/// A reference inside a recipe's composition list. `amount` is in the
/// referenced item's native unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub item_id: String,
    pub amount: f64,
}

fn default_amount() -> f64 {
    100.0
}

fn default_coefficient() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub kind: ItemKind,
    #[serde(default)]
    pub category: String,
    pub calories_per_100: i64,
    #[serde(default)]
    pub protein_per_100: f64,
    #[serde(default)]
    pub fluid_per_100: f64,
    #[serde(default = "default_amount")]
    pub default_amount: f64,
    #[serde(default)]
    pub usage_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<String>,
    /// Recipes only: ordered composition list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,
    /// Ratio of cooked weight to summed raw component weight.
    #[serde(default = "default_coefficient")]
    pub weight_coefficient: f64,
    /// Cooked weight the recipe's own density was derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portion_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub updated_at: String,
}

impl Item {
    #[must_use]
    pub fn is_recipe(&self) -> bool {
        self.kind == ItemKind::Recipe
    }

    #[must_use]
    pub fn density(&self) -> Density {
        Density {
            calories: self.calories_per_100,
            protein_g: self.protein_per_100,
            fluid_ml: self.fluid_per_100,
        }
    }
}

/// Fields for creating a leaf item; recipes go through the draft builder.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub name: String,
    pub kind: ItemKind,
    pub category: String,
    pub calories_per_100: i64,
    pub protein_per_100: f64,
    pub fluid_per_100: f64,
    pub default_amount: Option<f64>,
}

/// Density and name frozen at the moment an entry was recorded, so later
/// item edits never rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub item_id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    pub calories_per_100: i64,
    #[serde(default)]
    pub protein_per_100: f64,
    #[serde(default)]
    pub fluid_per_100: f64,
}

impl ItemSnapshot {
    #[must_use]
    pub fn of(item: &Item) -> Self {
        Self {
            item_id: item.id.clone(),
            name: item.name.clone(),
            category: item.category.clone(),
            calories_per_100: item.calories_per_100,
            protein_per_100: item.protein_per_100,
            fluid_per_100: item.fluid_per_100,
        }
    }

    #[must_use]
    pub fn density(&self) -> Density {
        Density {
            calories: self.calories_per_100,
            protein_g: self.protein_per_100,
            fluid_ml: self.fluid_per_100,
        }
    }
}

/// One consumption record inside a day log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub item_id: String,
    pub amount: f64,
    pub snapshot: ItemSnapshot,
    #[serde(default)]
    pub logged_at: String,
}

impl LogEntry {
    #[must_use]
    pub fn nutrients(&self) -> Nutrients {
        crate::nutrients::scale(self.snapshot.density(), self.amount)
    }
}

/// A day's consumption, keyed by ISO date. Append-only once finalized,
/// except for an explicit reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayLog {
    pub date: String,
    #[serde(default)]
    pub entries: Vec<LogEntry>,
    #[serde(default)]
    pub water_ml: f64,
    #[serde(default)]
    pub finalized: bool,
}

impl DayLog {
    #[must_use]
    pub fn empty(date: &str) -> Self {
        Self {
            date: date.to_string(),
            entries: Vec::new(),
            water_ml: 0.0,
            finalized: false,
        }
    }

    /// Sum of all entry nutrients. Fluid does not include extra water;
    /// see [`DayLog::total_fluid_ml`].
    #[must_use]
    pub fn totals(&self) -> Nutrients {
        let mut out = Nutrients::default();
        for entry in &self.entries {
            let n = entry.nutrients();
            out.calories += n.calories;
            out.protein_g += n.protein_g;
            out.fluid_ml += n.fluid_ml;
        }
        out
    }

    #[must_use]
    pub fn total_fluid_ml(&self) -> f64 {
        self.totals().fluid_ml + self.water_ml
    }
}

/// Entries of one day grouped by the category frozen in their snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryGroup {
    pub category: String,
    pub entries: Vec<LogEntry>,
    pub subtotal: Nutrients,
}

#[derive(Debug, Clone, Serialize)]
pub struct DaySummary {
    pub date: String,
    pub groups: Vec<CategoryGroup>,
    pub total: Nutrients,
    pub water_ml: f64,
    pub finalized: bool,
}

pub fn validate_new_item(item: &NewItem) -> Result<()> {
    if item.name.trim().is_empty() {
        bail!("Item name must not be empty");
    }
    if item.calories_per_100 < 0 {
        bail!("calories_per_100 must not be negative");
    }
    if item.protein_per_100 < 0.0 {
        bail!("protein_per_100 must not be negative");
    }
    if item.fluid_per_100 < 0.0 {
        bail!("fluid_per_100 must not be negative");
    }
    if item.default_amount.is_some_and(|a| a <= 0.0) {
        bail!("default_amount must be greater than 0");
    }
    Ok(())
}

pub fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        bail!("Amount must be greater than 0");
    }
    Ok(())
}

pub fn validate_date(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| anyhow::anyhow!("Invalid date '{date}'. Must be YYYY-MM-DD"))
}
