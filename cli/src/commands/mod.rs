mod helpers;
mod item;
mod log;
mod recipe;
mod share;
mod summary;

use anyhow::{Result, bail};

use morsel_core::models::Item;
use morsel_core::service::MorselService;

use helpers::print_item_table;

pub(crate) use item::{
    cmd_item_add, cmd_item_delete, cmd_item_list, cmd_item_show, cmd_item_update, cmd_search,
};
pub(crate) use log::{cmd_entry_delete, cmd_finalize, cmd_log, cmd_reset, cmd_water};
pub(crate) use recipe::{
    cmd_recipe_add_component, cmd_recipe_create, cmd_recipe_list, cmd_recipe_remove_component,
    cmd_recipe_set_weight, cmd_recipe_show,
};
pub(crate) use share::{cmd_share_export, cmd_share_import};
pub(crate) use summary::cmd_summary;

/// Resolve a name to an item. An exact (case-insensitive) name wins; a
/// single ranked search hit is accepted; anything else asks the user to
/// be more specific.
pub(super) fn resolve_item(svc: &MorselService, query: &str) -> Result<Item> {
    if let Some(item) = svc.find_item_by_name(query) {
        return Ok(item.clone());
    }
    let hits = svc.search_items(query);
    match hits.len() {
        0 => bail!("No item found for '{query}'"),
        1 => Ok(hits[0].clone()),
        _ => {
            print_item_table(&hits);
            bail!("'{query}' is ambiguous; use the exact name")
        }
    }
}
