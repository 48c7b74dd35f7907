mod commands;
mod config;

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use std::process;

use crate::commands::{
    cmd_entry_delete, cmd_finalize, cmd_item_add, cmd_item_delete, cmd_item_list, cmd_item_show,
    cmd_item_update, cmd_log, cmd_recipe_add_component, cmd_recipe_create, cmd_recipe_list,
    cmd_recipe_remove_component, cmd_recipe_set_weight, cmd_recipe_show, cmd_reset, cmd_search,
    cmd_share_export, cmd_share_import, cmd_summary, cmd_water,
};
use crate::config::Config;
use morsel_core::service::MorselService;

#[derive(Parser)]
#[command(
    name = "morsel",
    version,
    about = "Track foods, composable recipes, and daily intake"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a food or liquid to the catalog
    Add {
        /// Item name
        name: String,
        /// Item kind: food or liquid
        #[arg(long, default_value = "food")]
        kind: String,
        /// Category: breakfast, lunch, dinner, snack
        #[arg(short, long, default_value = "snack")]
        category: String,
        /// Calories per 100g/100ml
        #[arg(long)]
        calories: i64,
        /// Protein grams per 100g/100ml
        #[arg(long)]
        protein: Option<f64>,
        /// Fluid milliliters per 100g/100ml (for liquids)
        #[arg(long)]
        fluid: Option<f64>,
        /// Default amount suggested when logging
        #[arg(long)]
        amount: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List catalog items
    List {
        /// Filter by a search query
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one item in detail
    Show {
        /// Item name
        item: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update an item's fields (dependent recipes refresh automatically)
    Update {
        /// Item name
        item: String,
        /// New name
        #[arg(long)]
        rename: Option<String>,
        /// New calories per 100
        #[arg(long)]
        calories: Option<i64>,
        /// New protein per 100
        #[arg(long)]
        protein: Option<f64>,
        /// New fluid per 100
        #[arg(long)]
        fluid: Option<f64>,
        /// New category
        #[arg(long)]
        category: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an item from the catalog
    Delete {
        /// Item name
        item: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search the catalog, ranked by how often you log each item
    Search {
        /// Search query
        query: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log a consumption for a day
    Log {
        /// Item name
        item: String,
        /// Amount (e.g. "150", "150g", "250ml"; default: the item's default amount)
        amount: Option<String>,
        /// Date to log for (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log plain water
    Water {
        /// Milliliters to add
        ml: f64,
        /// Date (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a log entry by ID
    Remove {
        /// Entry ID (shown in the summary)
        entry_id: String,
        /// Date the entry is on (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a day's summary grouped by category
    Summary {
        /// Date to show (YYYY-MM-DD or today/yesterday, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Finalize a day; its log becomes read-only
    Finalize {
        /// Date to finalize (default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Discard a day's log entirely
    Reset {
        /// Date to reset (default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage recipes (items composed of other items)
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Share recipes between devices
    Share {
        #[command(subcommand)]
        command: ShareCommands,
    },
}

#[derive(Subcommand)]
enum RecipeCommands {
    /// Create a recipe from existing items
    Create {
        /// Recipe name
        name: String,
        /// Category: breakfast, lunch, dinner, snack
        #[arg(short, long, default_value = "lunch")]
        category: String,
        /// Measured weight after cooking (default: sum of component amounts)
        #[arg(long)]
        cooked_weight: Option<f64>,
        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
        /// Component as "name:amount" (repeatable)
        #[arg(long = "with", value_name = "NAME:AMOUNT")]
        with: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a component to a recipe
    AddComponent {
        /// Recipe name
        recipe: String,
        /// Component item name
        item: String,
        /// Amount (e.g. "200", "200g")
        amount: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a component from a recipe by position
    RemoveComponent {
        /// Recipe name
        recipe: String,
        /// Component position (1-based, as shown by 'recipe show')
        position: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set a recipe's cooked weight
    SetWeight {
        /// Recipe name
        recipe: String,
        /// Cooked weight in grams
        weight: f64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show recipe details
    Show {
        /// Recipe name
        recipe: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all recipes
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ShareCommands {
    /// Export a recipe with all its dependencies as pasteable text
    Export {
        /// Recipe name
        recipe: String,
        /// Emit the compact URL-safe form instead of readable text
        #[arg(long)]
        compact: bool,
        /// Emit a share link with the given base URL
        #[arg(long, value_name = "URL")]
        link: Option<String>,
        /// Output the raw bundle as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import a shared bundle (from an argument, a file, or stdin)
    Import {
        /// Bundle text
        text: Option<String>,
        /// Read the bundle from a file
        #[arg(long, value_name = "PATH")]
        file: Option<std::path::PathBuf>,
        /// Show the match analysis without importing
        #[arg(long)]
        dry_run: bool,
        /// Keep the local version of the named incoming item (repeatable)
        #[arg(long, value_name = "NAME")]
        use_local: Vec<String>,
        /// Import the named incoming item as a separate copy (repeatable)
        #[arg(long, value_name = "NAME")]
        create_new: Vec<String>,
        /// Replace the local item with the named incoming one (repeatable)
        #[arg(long, value_name = "NAME")]
        overwrite: Vec<String>,
        /// Pin an incoming item to a local one: "incoming=local" (repeatable)
        #[arg(long, value_name = "INCOMING=LOCAL")]
        link: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let mut svc = MorselService::new(&config.db_path)?;
    svc.apply_decay(Local::now().date_naive())?;

    match cli.command {
        Commands::Add {
            name,
            kind,
            category,
            calories,
            protein,
            fluid,
            amount,
            json,
        } => cmd_item_add(
            &mut svc, &name, &kind, &category, calories, protein, fluid, amount, json,
        ),
        Commands::List { search, json } => cmd_item_list(&svc, search.as_deref(), json),
        Commands::Show { item, json } => cmd_item_show(&svc, &item, json),
        Commands::Update {
            item,
            rename,
            calories,
            protein,
            fluid,
            category,
            json,
        } => cmd_item_update(&mut svc, &item, rename, calories, protein, fluid, category, json),
        Commands::Delete { item, json } => cmd_item_delete(&mut svc, &item, json),
        Commands::Search { query, json } => cmd_search(&svc, &query, json),
        Commands::Log {
            item,
            amount,
            date,
            json,
        } => cmd_log(&mut svc, &item, amount.as_deref(), date, json),
        Commands::Water { ml, date, json } => cmd_water(&mut svc, ml, date, json),
        Commands::Remove {
            entry_id,
            date,
            json,
        } => cmd_entry_delete(&mut svc, &entry_id, date, json),
        Commands::Summary { date, json } => cmd_summary(&svc, date, json),
        Commands::Finalize { date, json } => cmd_finalize(&mut svc, date, json),
        Commands::Reset { date, json } => cmd_reset(&mut svc, date, json),
        Commands::Recipe { command } => match command {
            RecipeCommands::Create {
                name,
                category,
                cooked_weight,
                notes,
                with,
                json,
            } => cmd_recipe_create(&mut svc, &name, &category, cooked_weight, notes, &with, json),
            RecipeCommands::AddComponent {
                recipe,
                item,
                amount,
                json,
            } => cmd_recipe_add_component(&mut svc, &recipe, &item, &amount, json),
            RecipeCommands::RemoveComponent {
                recipe,
                position,
                json,
            } => cmd_recipe_remove_component(&mut svc, &recipe, position, json),
            RecipeCommands::SetWeight {
                recipe,
                weight,
                json,
            } => cmd_recipe_set_weight(&mut svc, &recipe, weight, json),
            RecipeCommands::Show { recipe, json } => cmd_recipe_show(&svc, &recipe, json),
            RecipeCommands::List { json } => cmd_recipe_list(&svc, json),
        },
        Commands::Share { command } => match command {
            ShareCommands::Export {
                recipe,
                compact,
                link,
                json,
            } => cmd_share_export(&svc, &recipe, compact, link.as_deref(), json),
            ShareCommands::Import {
                text,
                file,
                dry_run,
                use_local,
                create_new,
                overwrite,
                link,
                json,
            } => cmd_share_import(
                &mut svc,
                text,
                file.as_deref(),
                dry_run,
                &use_local,
                &create_new,
                &overwrite,
                &link,
                json,
            ),
        },
    }
}
