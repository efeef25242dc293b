mod commands;
mod config;
mod server;

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    cmd_card_create, cmd_card_delete, cmd_card_list, cmd_card_preview, cmd_card_show,
    cmd_card_slot, cmd_card_stale, cmd_card_update, cmd_ingredient_add, cmd_ingredient_list,
    cmd_ingredient_refs, cmd_ingredient_remove, cmd_schedule_day, cmd_schedule_move,
    cmd_schedule_place, cmd_schedule_remove, cmd_schedule_show,
};
use crate::config::Config;
use mealgrid_core::db::Database;
use mealgrid_core::models::validate_meal_type;
use mealgrid_core::schedule::DateRange;
use mealgrid_core::service::PlanService;

/// Days loaded into the schedule grid when no window is given.
const WINDOW_DAYS: u64 = 7;

#[derive(Parser)]
#[command(
    name = "mealgrid",
    version,
    about = "Plan meals on a calendar grid from reusable food cards"
)]
struct Cli {
    /// Log debug output to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the nutrition table
    Ingredient {
        #[command(subcommand)]
        command: IngredientCommands,
    },
    /// Manage food cards
    Card {
        #[command(subcommand)]
        command: CardCommands,
    },
    /// Place food cards on the calendar
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommands,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum IngredientCommands {
    /// Add an ingredient to the nutrition table
    Add {
        /// Ingredient name (stored lower-case)
        name: String,
        /// Calories per unit
        #[arg(long, allow_hyphen_values = true)]
        calories: String,
        /// Unit the calories refer to (e.g. "100g", "pcs")
        #[arg(long)]
        unit: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List/search the nutrition table
    List {
        /// Substring to filter by
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove an ingredient
    Remove {
        /// Ingredient name
        name: String,
        /// Remove even if food cards still use it
        #[arg(short, long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show how many food cards use an ingredient
    Refs {
        /// Ingredient name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum CardCommands {
    /// Create a food card
    Create {
        /// Card name
        name: String,
        /// Meal types the card may be placed in (repeatable or comma-separated)
        #[arg(short, long = "category", value_delimiter = ',', required = true)]
        categories: Vec<String>,
        /// Ingredient line as "name=amount" (repeatable)
        #[arg(short, long = "ingredient", required = true)]
        ingredients: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit a food card; removing categories unschedules it from those meals
    Update {
        /// Card ID
        id: String,
        /// New name
        #[arg(short, long)]
        name: Option<String>,
        /// Replace the categories (repeatable or comma-separated)
        #[arg(short, long = "category", value_delimiter = ',')]
        categories: Vec<String>,
        /// Replace the ingredient lines ("name=amount", repeatable)
        #[arg(short, long = "ingredient")]
        ingredients: Vec<String>,
        /// Confirm unscheduling without prompting
        #[arg(short, long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show what a category change would unschedule
    Preview {
        /// Card ID
        id: String,
        /// Proposed categories
        #[arg(short, long = "category", value_delimiter = ',', required = true)]
        categories: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a card with per-ingredient calories
    Show {
        /// Card ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List cards, newest first
    List {
        /// Category filter: all, breakfast, lunch, dinner, snack
        #[arg(short, long)]
        category: Option<String>,
        /// Match card or ingredient names
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List cards that may be placed in a meal slot
    Slot {
        /// Meal type: breakfast, lunch, dinner, snack
        meal: String,
        /// Match card or ingredient names
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a card and all of its schedule entries
    Delete {
        /// Card ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List cards whose saved calories no longer match the nutrition table
    Stale {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ScheduleCommands {
    /// Place a card into a meal slot
    Place {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow)
        date: String,
        /// Meal type: breakfast, lunch, dinner, snack
        meal: String,
        /// Card ID
        card_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a card from a meal slot
    Remove {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow)
        date: String,
        /// Meal type: breakfast, lunch, dinner, snack
        meal: String,
        /// Card ID
        card_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Move a card between slots (e.g. "today:lunch" "tomorrow:dinner")
    Move {
        /// Source in format "date:meal"
        from: String,
        /// Destination in format "date:meal"
        to: String,
        /// Card ID
        card_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the grid for a date range (default: the next 7 days)
    Show {
        /// First date (default: today)
        #[arg(long)]
        start: Option<String>,
        /// Last date (default: start + 6 days)
        #[arg(long)]
        end: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one day's meals and calorie total
    Day {
        /// Date (default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db = Database::open(&config.db_path)?;
    let window = DateRange::starting_at(Local::now().date_naive(), WINDOW_DAYS);
    let mut svc = PlanService::with_store(db, window)?;

    match cli.command {
        Commands::Ingredient { command } => match command {
            IngredientCommands::Add {
                name,
                calories,
                unit,
                json,
            } => cmd_ingredient_add(&mut svc, &name, &calories, &unit, json),
            IngredientCommands::List { search, json } => {
                cmd_ingredient_list(&svc, search.as_deref(), json)
            }
            IngredientCommands::Remove { name, yes, json } => {
                cmd_ingredient_remove(&mut svc, &name, yes, json)
            }
            IngredientCommands::Refs { name, json } => cmd_ingredient_refs(&svc, &name, json),
        },
        Commands::Card { command } => match command {
            CardCommands::Create {
                name,
                categories,
                ingredients,
                json,
            } => cmd_card_create(&mut svc, &name, &categories, &ingredients, json),
            CardCommands::Update {
                id,
                name,
                categories,
                ingredients,
                yes,
                json,
            } => cmd_card_update(&mut svc, &id, name, &categories, &ingredients, yes, json),
            CardCommands::Preview {
                id,
                categories,
                json,
            } => cmd_card_preview(&svc, &id, &categories, json),
            CardCommands::Show { id, json } => cmd_card_show(&svc, &id, json),
            CardCommands::List {
                category,
                search,
                json,
            } => cmd_card_list(&svc, category.as_deref(), search.as_deref(), json),
            CardCommands::Slot { meal, search, json } => {
                let meal_type = validate_meal_type(&meal)?;
                cmd_card_slot(&svc, meal_type, search.as_deref(), json)
            }
            CardCommands::Delete { id, json } => cmd_card_delete(&mut svc, &id, json),
            CardCommands::Stale { json } => cmd_card_stale(&svc, json),
        },
        Commands::Schedule { command } => match command {
            ScheduleCommands::Place {
                date,
                meal,
                card_id,
                json,
            } => cmd_schedule_place(&mut svc, Some(date), &meal, &card_id, json),
            ScheduleCommands::Remove {
                date,
                meal,
                card_id,
                json,
            } => cmd_schedule_remove(&mut svc, Some(date), &meal, &card_id, json),
            ScheduleCommands::Move {
                from,
                to,
                card_id,
                json,
            } => cmd_schedule_move(&mut svc, &from, &to, &card_id, json),
            ScheduleCommands::Show { start, end, json } => {
                cmd_schedule_show(&mut svc, start, end, json)
            }
            ScheduleCommands::Day { date, json } => cmd_schedule_day(&svc, date, json),
        },
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                Some(config.load_or_create_api_key()?)
            };
            server::start_server(svc, port, &bind, api_key).await
        }
    }
}
