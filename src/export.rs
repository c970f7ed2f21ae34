use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;

use crate::daily_log::{format_date_key, DayLog, ItemSource};

/// One CSV line per logged item.
#[derive(Debug, Serialize, PartialEq)]
pub struct ItemRow {
    pub date: String,
    pub meal: String,
    pub item: String,
    pub source: &'static str,
    pub fdc_id: Option<u64>,
    pub servings: Option<f64>,
    pub grams: Option<f64>,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

/// Rows oldest day first; within a day meals keep their stored order.
pub fn item_rows(logs: &BTreeMap<NaiveDate, DayLog>) -> Vec<ItemRow> {
    let mut rows = Vec::new();
    for (date, day) in logs {
        for meal in &day.meals {
            for item in &meal.items {
                let totals = item.totals();
                let (source, fdc_id, servings, grams) = match &item.source {
                    ItemSource::Fdc {
                        fdc_id,
                        servings,
                        grams,
                        ..
                    } => ("fdc", Some(*fdc_id), *servings, *grams),
                    ItemSource::Manual => ("manual", None, None, None),
                };
                rows.push(ItemRow {
                    date: format_date_key(*date),
                    meal: meal.title.clone(),
                    item: item.name.clone(),
                    source,
                    fdc_id,
                    servings,
                    grams,
                    calories: totals.cals,
                    protein_g: totals.p,
                    carbs_g: totals.c,
                    fat_g: totals.f,
                });
            }
        }
    }
    rows
}

pub fn write_items_csv<W: Write>(logs: &BTreeMap<NaiveDate, DayLog>, writer: W) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    let rows = item_rows(logs);
    for row in &rows {
        wtr.serialize(row).context("Failed to write CSV row")?;
    }
    wtr.flush().context("Failed to flush CSV output")?;
    Ok(rows.len())
}

pub fn export_items_csv(logs: &BTreeMap<NaiveDate, DayLog>, path: &Path) -> Result<usize> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create CSV file '{}'", path.display()))?;
    write_items_csv(logs, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daily_log::{Item, Meal, QuantityMode};
    use crate::nutrition::summary::Totals;
    use tempfile::tempdir;

    fn logs() -> BTreeMap<NaiveDate, DayLog> {
        let date = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let meal = Meal {
            title: "Breakfast".to_string(),
            items: vec![
                Item::new(
                    "1",
                    "Oats",
                    ItemSource::Fdc {
                        fdc_id: 173904,
                        mode: QuantityMode::Grams,
                        servings: None,
                        grams: Some(50.0),
                    },
                    Totals::new(190.0, 6.5, 33.0, 3.5),
                ),
                Item::new("2", "Coffee", ItemSource::Manual, Totals::new(5.0, 0.0, 1.0, 0.0)),
            ],
            ..Default::default()
        };
        let mut logs = BTreeMap::new();
        logs.insert(
            date,
            DayLog {
                date,
                meals: vec![meal],
            },
        );
        logs.insert(
            NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
            DayLog::new(NaiveDate::from_ymd_opt(2024, 4, 2).unwrap()),
        );
        logs
    }

    #[test]
    fn test_item_rows() {
        let rows = item_rows(&logs());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].source, "fdc");
        assert_eq!(rows[0].grams, Some(50.0));
        assert_eq!(rows[1].fdc_id, None);
        assert_eq!(rows[1].date, "2024-04-01");
    }

    #[test]
    fn test_csv_export_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("items.csv");
        assert_eq!(export_items_csv(&logs(), &path).unwrap(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "date,meal,item,source,fdc_id,servings,grams,calories,protein_g,carbs_g,fat_g"
        );
        assert_eq!(
            lines.next().unwrap(),
            "2024-04-01,Breakfast,Oats,fdc,173904,,50.0,190.0,6.5,33.0,3.5"
        );
        assert_eq!(lines.next().unwrap(), "2024-04-01,Breakfast,Coffee,manual,,,,5.0,0.0,1.0,0.0");
    }
}
