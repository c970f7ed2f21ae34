use chrono::{NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::api_connection::endpoints::FoodRecord;
use crate::daily_log::{Item, ItemSource, Meal, MealSource, QuantityMode};
use crate::nutrition::labels::{display_name, serving_text};
use crate::nutrition::scaler::{scale, supports_grams, ScaleRequest};
use crate::nutrition::summary::{non_negative, Totals};

#[derive(Debug, Error, PartialEq)]
pub enum MealBuildError {
    #[error("'{0}' has no gram weight to scale against; log it by servings")]
    GramsUnsupported(String),
    #[error("Food record has no FDC id")]
    MissingFdcId,
}

/// Builds a logged item for `amount` of `record`, in servings or grams.
///
/// # Arguments
/// * `record` - The food as returned by the lookup service.
/// * `mode` - Whether `amount` counts servings or grams.
/// * `amount` - Quantity eaten; negative values count as zero.
///
/// # Returns
/// The item with scaled macros, or an error if grams were asked for on a
/// record without a gram base.
pub fn item_from_food(record: &FoodRecord, mode: QuantityMode, amount: f64) -> Result<Item, MealBuildError> {
    let fdc_id = record.fdc_id.ok_or(MealBuildError::MissingFdcId)?;
    let name = display_name(record);
    let amount = non_negative(amount);
    let (request, servings, grams) = match mode {
        QuantityMode::Grams if !supports_grams(record) => return Err(MealBuildError::GramsUnsupported(name)),
        QuantityMode::Grams => (ScaleRequest::grams(amount), None, Some(amount)),
        QuantityMode::Servings => (ScaleRequest::servings(amount), Some(amount), None),
    };
    let totals = Totals::from(scale(record, &request));

    let mut item = Item::new(
        Uuid::new_v4().to_string(),
        name,
        ItemSource::Fdc {
            fdc_id,
            mode,
            servings,
            grams,
        },
        totals,
    );
    item.brand = record.brand_name.clone().or_else(|| record.brand_owner.clone());
    item.serving = Some(serving_text(record));
    item.barcode = record.gtin_upc.clone();
    Ok(item)
}

/// Manual entry; calories come from the macros (4/4/9).
pub fn item_from_manual(name: &str, protein: f64, carbs: f64, fat: f64) -> Item {
    let name = if name.trim().is_empty() { "Manual entry" } else { name.trim() };
    Item::new(
        Uuid::new_v4().to_string(),
        name,
        ItemSource::Manual,
        Totals::from_macros(protein, carbs, fat),
    )
}

/// Wraps a single item in a new meal, with cached totals.
pub fn meal_with_item(title: Option<&str>, date: NaiveDate, item: Item) -> Meal {
    let (source, fdc_id) = match &item.source {
        ItemSource::Fdc { fdc_id, .. } => (MealSource::Fdc, Some(*fdc_id)),
        ItemSource::Manual => (MealSource::Manual, None),
    };
    let title = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| item.name.clone());
    Meal {
        id: Uuid::new_v4().to_string(),
        title,
        created_at: Some(Utc::now()),
        date: Some(date),
        source: Some(source),
        fdc_id,
        totals: Some(item.totals()),
        items: vec![item],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_connection::endpoints::RawFoodNutrient;

    fn oats() -> FoodRecord {
        FoodRecord {
            fdc_id: Some(173904),
            description: "Oats".to_string(),
            data_type: Some("SR Legacy".to_string()),
            food_nutrients: vec![
                RawFoodNutrient {
                    nutrient_number: Some("1008".to_string()),
                    value: Some(380.0),
                    ..Default::default()
                },
                RawFoodNutrient {
                    nutrient_number: Some("1003".to_string()),
                    value: Some(13.0),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_item_from_food_in_grams() {
        let item = item_from_food(&oats(), QuantityMode::Grams, 50.0).unwrap();
        assert_eq!(item.cals, Some(190.0));
        assert_eq!(item.p, Some(6.5));
        assert_eq!(item.macros, Some(item.totals()));
        assert_eq!(
            item.source,
            ItemSource::Fdc {
                fdc_id: 173904,
                mode: QuantityMode::Grams,
                servings: None,
                grams: Some(50.0)
            }
        );
    }

    #[test]
    fn test_negative_amount_is_recorded_as_zero() {
        let item = item_from_food(&oats(), QuantityMode::Servings, -2.0).unwrap();
        assert_eq!(item.totals(), Totals::default());
        assert!(matches!(item.source, ItemSource::Fdc { servings: Some(s), .. } if s == 0.0));
    }

    #[test]
    fn test_grams_rejected_without_base() {
        let record = FoodRecord {
            fdc_id: Some(1),
            description: "Mystery bar".to_string(),
            data_type: Some("Branded".to_string()),
            ..Default::default()
        };
        assert_eq!(
            item_from_food(&record, QuantityMode::Grams, 30.0),
            Err(MealBuildError::GramsUnsupported("Mystery bar".to_string()))
        );
        assert!(item_from_food(&record, QuantityMode::Servings, 1.0).is_ok());
    }

    #[test]
    fn test_manual_meal() {
        let item = item_from_manual("  ", 10.0, 20.0, 5.0);
        assert_eq!(item.name, "Manual entry");
        assert_eq!(item.cals, Some(165.0));

        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let meal = meal_with_item(Some("Snack"), date, item);
        assert_eq!(meal.title, "Snack");
        assert_eq!(meal.source, Some(MealSource::Manual));
        assert_eq!(meal.totals.map(|t| t.cals), Some(165.0));
        assert_eq!(meal.date, Some(date));
    }

    #[test]
    fn test_fdc_meal_defaults_title_to_food_name() {
        let item = item_from_food(&oats(), QuantityMode::Servings, 1.0).unwrap();
        let meal = meal_with_item(None, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(), item);
        assert_eq!(meal.title, "Oats");
        assert_eq!(meal.fdc_id, Some(173904));
        assert_eq!(meal.source, Some(MealSource::Fdc));
    }
}
