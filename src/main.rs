use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

use bitewise::api_connection::connection::FoodLookup;
use bitewise::api_connection::endpoints::{FoodRecord, Provider, SearchRequest};
use bitewise::cli::{parse_args, Command, LogArgs};
use bitewise::config::AppConfig;
use bitewise::daily_log::{format_date_key, today_key, QuantityMode};
use bitewise::export::export_items_csv;
use bitewise::meal_aggregator::meal_totals;
use bitewise::meal_builder::{item_from_food, item_from_manual, meal_with_item};
use bitewise::nutrition::{base_grams_for, display_name, normalize, portion_labels, serving_text, MacroSummary};
use bitewise::search::{BarcodeScanner, FoodDetailLoader, LookupOutcome};
use bitewise::tracking::{FileKeyValueStore, KeyValueStore, MacroStore};

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "bitewise=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn format_macros(m: &MacroSummary) -> String {
    format!("{} kcal | P {} g | C {} g | F {} g", m.calories, m.protein, m.carbs, m.fats)
}

/// "per 100 g" for reference foods, the serving text for branded ones.
fn basis_label(food: &FoodRecord) -> String {
    if food.data_type.is_some() && !food.is_branded() {
        "per 100 g".to_string()
    } else {
        format!("per {}", serving_text(food))
    }
}

fn print_food_line(food: &FoodRecord) {
    println!(
        "{:>9}  {}  ({}: {})",
        food.fdc_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
        display_name(food),
        basis_label(food),
        format_macros(&normalize(food)),
    );
}

async fn fetch_food(provider: &Arc<Provider>, fdc_id: u64) -> Result<FoodRecord> {
    let loader = FoodDetailLoader::new(Arc::clone(provider));
    match loader
        .load(fdc_id)
        .await
        .with_context(|| format!("Failed to fetch food {}", fdc_id))?
    {
        LookupOutcome::Found(food) => Ok(food),
        LookupOutcome::NotFound | LookupOutcome::Busy => bail!("Food {} is not available", fdc_id),
    }
}

async fn log_meal(store: &mut MacroStore, provider: &Arc<Provider>, args: LogArgs) -> Result<()> {
    let date = args.date.unwrap_or_else(today_key);
    let item = match args.fdc_id {
        Some(fdc_id) => {
            let food = fetch_food(provider, fdc_id).await?;
            let (mode, amount) = match (args.grams, args.servings) {
                (Some(grams), _) => (QuantityMode::Grams, grams),
                (None, servings) => (QuantityMode::Servings, servings.unwrap_or(1.0)),
            };
            item_from_food(&food, mode, amount)?
        }
        None => {
            if !args.has_manual_macros() {
                bail!("Give --fdc-id, or at least one of --protein, --carbs, --fat");
            }
            item_from_manual(
                args.name.as_deref().unwrap_or_default(),
                args.protein.unwrap_or(0.0),
                args.carbs.unwrap_or(0.0),
                args.fat.unwrap_or(0.0),
            )
        }
    };

    let meal = meal_with_item(args.title.as_deref(), date, item);
    let totals = meal.totals.unwrap_or_default();
    println!(
        "Logged '{}' on {}: {} kcal | P {} g | C {} g | F {} g",
        meal.title,
        format_date_key(date),
        totals.cals,
        totals.p,
        totals.c,
        totals.f
    );
    store.add_meal(date, meal);
    Ok(())
}

fn print_summary(store: &MacroStore, date: chrono::NaiveDate) {
    println!("{}", format_date_key(date));
    match store.day(date) {
        Some(day) if !day.meals.is_empty() => {
            for meal in &day.meals {
                let totals = meal_totals(meal);
                println!("  {:<30} {:>6.0} kcal", meal.title, totals.cals);
            }
        }
        _ => println!("  nothing logged"),
    }

    let progress = store.progress(date);
    for (label, p, unit) in [
        ("Calories", progress.calories, "kcal"),
        ("Protein", progress.protein, "g"),
        ("Carbs", progress.carbs, "g"),
        ("Fat", progress.fat, "g"),
    ] {
        println!(
            "  {:<9} {:>7.1} / {:<7.0} {:<4} {:>3}%  ({:.1} {} left)",
            label, p.current, p.target, unit, p.percent, p.remaining, unit
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = parse_args();
    let mut config = AppConfig::from_env().context("Invalid configuration")?;
    if let Some(path) = cli.state_file {
        config.state_file = path;
    }
    debug!(state_file = %config.state_file.display(), "Configuration loaded");

    let kv: Arc<dyn KeyValueStore> = Arc::new(FileKeyValueStore::new(&config.state_file));
    let mut store = MacroStore::load(kv).await;
    let provider = Arc::new(config.provider());

    match cli.command {
        Command::Search {
            query,
            page_size,
            page,
            data_types,
        } => {
            let request = SearchRequest::new(query.join(" "))
                .with_page_size(page_size.unwrap_or(config.page_size))
                .with_page_number(page)
                .with_data_types(data_types);
            let response = provider
                .search_foods(&request)
                .await
                .with_context(|| format!("Search for '{}' failed", request.query))?;
            println!(
                "{} hits (page {} of {})",
                response.total_hits, response.current_page, response.total_pages
            );
            for food in &response.foods {
                print_food_line(food);
            }
        }
        Command::Food { fdc_id } => {
            let food = fetch_food(&provider, fdc_id).await?;
            print_food_line(&food);
            match base_grams_for(&food) {
                Some(grams) => println!("  base: {} g (log by grams or servings)", grams),
                None => println!("  base: one serving (log by servings only)"),
            }
            println!("  serving: {}", serving_text(&food));
            for portion in portion_labels(&food) {
                println!("  portion: {}", portion);
            }
        }
        Command::Barcode { upc } => {
            let scanner = BarcodeScanner::new(Arc::clone(&provider));
            match scanner
                .scan(&upc)
                .await
                .with_context(|| format!("Barcode lookup for '{}' failed", upc))?
            {
                LookupOutcome::Found(food) => print_food_line(&food),
                LookupOutcome::NotFound => println!("No product found for {}", upc.trim()),
                LookupOutcome::Busy => println!("A lookup is already running"),
            }
        }
        Command::Log(args) => log_meal(&mut store, &provider, args).await?,
        Command::Targets(args) => {
            let patch = args.to_patch();
            if !patch.is_empty() {
                store.set_targets(&patch);
                info!("Targets updated");
            }
            let t = store.targets();
            println!(
                "Targets: {} kcal | P {} g | C {} g | F {} g",
                t.calories, t.protein, t.carbs, t.fat
            );
        }
        Command::Summary { date } => print_summary(&store, date.unwrap_or_else(today_key)),
        Command::Export { csv } => match csv {
            Some(path) => {
                let rows = export_items_csv(store.logs(), &path)?;
                println!("Wrote {} items to {}", rows, path.display());
            }
            None => {
                let dump = store.export().await.context("Failed to read local data")?;
                println!("{}", serde_json::to_string_pretty(&dump)?);
            }
        },
        Command::Reset => {
            store.reset().await.context("Failed to clear local data")?;
            println!("Local data cleared");
        }
    }

    store.flush().await;
    Ok(())
}
