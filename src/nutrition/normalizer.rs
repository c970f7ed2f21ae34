//! Folds any FoodData Central record into a [`MacroSummary`].
//!
//! Label values win whenever the record has any; otherwise the nutrient list
//! is searched by nutrient code and then by display name. Nothing in here
//! returns an error: missing or malformed data reads as zero.

use crate::api_connection::endpoints::{FoodRecord, LabelNutrients, LabelValue, RawFoodNutrient};
use crate::nutrition::summary::{non_negative, MacroSummary};

pub const NUTRIENT_ENERGY_KCAL: &str = "1008";
pub const NUTRIENT_PROTEIN: &str = "1003";
pub const NUTRIENT_CARBOHYDRATE: &str = "1005";
pub const NUTRIENT_TOTAL_FAT: &str = "1004";

/// Grams in one base unit for non-branded data (FDC reports those per 100 g).
pub const NON_BRANDED_BASE_GRAMS: f64 = 100.0;

/// A nutrient entry after both wire conventions have been reconciled.
#[derive(Debug, Clone, PartialEq)]
pub struct NutrientEntry {
    pub name: String,
    pub unit: String,
    pub number: String,
    pub id: String,
    pub value: f64,
}

impl From<&RawFoodNutrient> for NutrientEntry {
    fn from(raw: &RawFoodNutrient) -> Self {
        let nested = raw.nutrient.as_ref();
        let pick = |flat: &Option<String>, inner: Option<&Option<String>>| {
            flat.clone()
                .or_else(|| inner.and_then(|v| v.clone()))
                .unwrap_or_default()
        };
        NutrientEntry {
            name: pick(&raw.nutrient_name, nested.map(|n| &n.name)).to_lowercase(),
            unit: pick(&raw.unit_name, nested.map(|n| &n.unit_name)).to_lowercase(),
            number: pick(&raw.nutrient_number, nested.map(|n| &n.number)),
            id: pick(&raw.nutrient_id, nested.map(|n| &n.id)),
            value: non_negative(raw.value.or(raw.amount).unwrap_or(0.0)),
        }
    }
}

impl NutrientEntry {
    fn has_code(&self, code: &str) -> bool {
        self.number == code || self.id == code
    }
}

pub fn nutrient_entries(record: &FoodRecord) -> Vec<NutrientEntry> {
    record.food_nutrients.iter().map(NutrientEntry::from).collect()
}

pub fn normalize(record: &FoodRecord) -> MacroSummary {
    if let Some(label) = record.label_nutrients.as_ref().filter(|l| has_any_label(l)) {
        return from_label(label);
    }

    let entries = nutrient_entries(record);
    let by_code = |code: &str| {
        entries
            .iter()
            .find(|e| e.has_code(code))
            .map(|e| e.value)
            .unwrap_or(0.0)
    };
    let by_name = |matches: &dyn Fn(&NutrientEntry) -> bool| {
        entries.iter().find(|e| matches(e)).map(|e| e.value).unwrap_or(0.0)
    };

    let mut calories = by_code(NUTRIENT_ENERGY_KCAL);
    let mut protein = by_code(NUTRIENT_PROTEIN);
    let mut carbs = by_code(NUTRIENT_CARBOHYDRATE);
    let mut fats = by_code(NUTRIENT_TOTAL_FAT);

    if calories == 0.0 {
        calories = by_name(&|e: &NutrientEntry| e.name.contains("energy") && e.unit == "kcal");
        if calories == 0.0 {
            calories = by_name(&|e: &NutrientEntry| e.name.contains("kcal"));
        }
    }
    if protein == 0.0 {
        protein = by_name(&|e: &NutrientEntry| e.name.contains("protein"));
    }
    if carbs == 0.0 {
        carbs = by_name(&|e: &NutrientEntry| e.name.contains("carbohydrate") || e.name.contains("carb"));
    }
    if fats == 0.0 {
        fats = by_name(&|e: &NutrientEntry| e.name.contains("total lipid") || e.name.contains("fat"));
    }

    MacroSummary::from_raw(calories, protein, carbs, fats)
}

fn has_any_label(label: &LabelNutrients) -> bool {
    label.calories.is_some()
        || label.protein.is_some()
        || label.carbohydrates.is_some()
        || label.fat.is_some()
}

fn from_label(label: &LabelNutrients) -> MacroSummary {
    let read = |v: &Option<LabelValue>| v.as_ref().and_then(|lv| lv.value).unwrap_or(0.0);
    MacroSummary::from_raw(
        read(&label.calories),
        read(&label.protein),
        read(&label.carbohydrates),
        read(&label.fat),
    )
}

/// Grams represented by one base unit of `record`, when that is knowable.
///
/// Non-branded data types are per 100 g. Branded records are per serving, so
/// only a gram-denominated serving size tells us the weight.
pub fn base_grams_for(record: &FoodRecord) -> Option<f64> {
    if record.data_type.is_some() && !record.is_branded() {
        return Some(NON_BRANDED_BASE_GRAMS);
    }
    let size = record.serving_size.filter(|s| s.is_finite() && *s > 0.0)?;
    let unit = record.serving_size_unit.as_deref().unwrap_or("");
    if unit.eq_ignore_ascii_case("g") {
        Some(size)
    } else {
        None
    }
}
