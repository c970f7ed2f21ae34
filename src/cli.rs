use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::daily_log::parse_date_key;
use crate::tracking::targets::TargetsPatch;

#[derive(Parser, Debug)]
#[command(author, version, about = "Calorie and macro tracking backed by USDA FoodData Central", long_about = None)]
pub struct Cli {
    /// Local state file (overrides BITEWISE_STATE_FILE)
    #[arg(long, global = true)]
    pub state_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search foods by text
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        #[arg(long)]
        page_size: Option<u32>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Restrict to a data type (repeatable), e.g. "Branded"
        #[arg(long = "data-type")]
        data_types: Vec<String>,
    },
    /// Show one food's macros, base weight and portions
    Food { fdc_id: u64 },
    /// Look a product up by UPC/EAN
    Barcode { upc: String },
    /// Log a meal from a food id or from manual macros
    Log(LogArgs),
    /// Show or change daily targets
    Targets(TargetArgs),
    /// Totals and progress for a day
    Summary {
        #[arg(long, value_parser = parse_date_key)]
        date: Option<NaiveDate>,
    },
    /// Dump persisted data as JSON, or logged items as CSV
    Export {
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Delete all local data
    Reset,
}

#[derive(Args, Debug)]
pub struct LogArgs {
    #[arg(long, conflicts_with_all = ["protein", "carbs", "fat"])]
    pub fdc_id: Option<u64>,
    #[arg(long, requires = "fdc_id", conflicts_with = "grams")]
    pub servings: Option<f64>,
    #[arg(long, requires = "fdc_id")]
    pub grams: Option<f64>,
    #[arg(long)]
    pub protein: Option<f64>,
    #[arg(long)]
    pub carbs: Option<f64>,
    #[arg(long)]
    pub fat: Option<f64>,
    /// Item name for manual entries
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long, value_parser = parse_date_key)]
    pub date: Option<NaiveDate>,
}

impl LogArgs {
    pub fn has_manual_macros(&self) -> bool {
        self.protein.is_some() || self.carbs.is_some() || self.fat.is_some()
    }
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    #[arg(long)]
    pub calories: Option<f64>,
    #[arg(long)]
    pub protein: Option<f64>,
    #[arg(long)]
    pub carbs: Option<f64>,
    #[arg(long)]
    pub fat: Option<f64>,
}

impl TargetArgs {
    pub fn to_patch(&self) -> TargetsPatch {
        TargetsPatch {
            calories: self.calories,
            protein: self.protein,
            carbs: self.carbs,
            fat: self.fat,
        }
    }
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_joins_words_and_repeats_data_types() {
        let cli = Cli::try_parse_from([
            "bitewise", "search", "greek", "yogurt", "--data-type", "Branded", "--data-type", "Foundation",
        ])
        .unwrap();
        match cli.command {
            Command::Search {
                query, data_types, page, ..
            } => {
                assert_eq!(query.join(" "), "greek yogurt");
                assert_eq!(data_types, vec!["Branded", "Foundation"]);
                assert_eq!(page, 1);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_log_rejects_mixed_modes() {
        assert!(Cli::try_parse_from(["bitewise", "log", "--fdc-id", "1", "--servings", "1", "--grams", "50"]).is_err());
        assert!(Cli::try_parse_from(["bitewise", "log", "--fdc-id", "1", "--protein", "10"]).is_err());
        assert!(Cli::try_parse_from(["bitewise", "log", "--grams", "50"]).is_err());
    }

    #[test]
    fn test_log_manual_with_date() {
        let cli = Cli::try_parse_from([
            "bitewise", "log", "--protein", "30", "--fat", "5", "--date", "2024-01-31", "--state-file", "x.json",
        ])
        .unwrap();
        assert_eq!(cli.state_file, Some(PathBuf::from("x.json")));
        let Command::Log(args) = cli.command else {
            panic!("expected log");
        };
        assert!(args.fdc_id.is_none());
        assert!(args.has_manual_macros());
        assert_eq!(args.date, NaiveDate::from_ymd_opt(2024, 1, 31));
        assert!(Cli::try_parse_from(["bitewise", "summary", "--date", "31/01/2024"]).is_err());
    }

    #[test]
    fn test_targets_patch() {
        let cli = Cli::try_parse_from(["bitewise", "targets", "--protein", "150"]).unwrap();
        let Command::Targets(args) = cli.command else {
            panic!("expected targets");
        };
        let patch = args.to_patch();
        assert_eq!(patch.protein, Some(150.0));
        assert!(patch.calories.is_none());
    }
}
