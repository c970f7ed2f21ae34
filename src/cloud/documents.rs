use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lenient;
use crate::nutrition::summary::{kcal_from_macros, non_negative};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServingUnit {
    #[default]
    Serving,
    G,
    Ml,
}

/// What one serving of a saved meal is.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct ServingInfo {
    pub unit: ServingUnit,
    #[serde(deserialize_with = "lenient::number_or_zero")]
    pub size: f64,
}

impl Default for ServingInfo {
    fn default() -> Self {
        Self {
            unit: ServingUnit::Serving,
            size: 1.0,
        }
    }
}

/// Stored macros, per one serving. `calories` is always filled in.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct CloudMacros {
    #[serde(default, deserialize_with = "lenient::number_or_zero")]
    pub protein: f64,
    #[serde(default, deserialize_with = "lenient::number_or_zero")]
    pub carbs: f64,
    #[serde(default, deserialize_with = "lenient::number_or_zero")]
    pub fat: f64,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::number")]
    pub fiber: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number_or_zero")]
    pub calories: f64,
}

/// Macros as supplied by a caller; any field may be missing.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct MacrosInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiber: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
}

impl MacrosInput {
    pub fn new(protein: f64, carbs: f64, fat: f64) -> Self {
        Self {
            protein: Some(protein),
            carbs: Some(carbs),
            fat: Some(fat),
            ..Default::default()
        }
    }

    pub fn with_calories(mut self, calories: f64) -> Self {
        self.calories = Some(calories);
        self
    }

    /// Missing grams count as 0; missing calories become `round(p*4 + c*4 + f*9)`.
    pub fn resolve(&self) -> CloudMacros {
        let protein = non_negative(self.protein.unwrap_or(0.0));
        let carbs = non_negative(self.carbs.unwrap_or(0.0));
        let fat = non_negative(self.fat.unwrap_or(0.0));
        let calories = match self.calories {
            Some(c) => non_negative(c),
            None => kcal_from_macros(protein, carbs, fat),
        };
        CloudMacros {
            protein,
            carbs,
            fat,
            fiber: self.fiber.map(non_negative),
            calories,
        }
    }
}

/// A saved meal document in a user's collection.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CloudMeal {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub macros: CloudMacros,
    #[serde(default)]
    pub serving: ServingInfo,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewCloudMeal {
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub macros: MacrosInput,
    #[serde(default)]
    pub serving: ServingInfo,
}

/// Partial update. Supplied fields replace the stored ones wholesale,
/// `macros` included.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MealPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub macros: Option<MacrosInput>,
    #[serde(default)]
    pub serving: Option<ServingInfo>,
}

/// Fields written on insert; the store adds id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct MealFields {
    pub name: String,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub macros: CloudMacros,
    pub serving: ServingInfo,
}

/// Resolved update handed to the store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MealChanges {
    pub name: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
    pub macros: Option<CloudMacros>,
    pub serving: Option<ServingInfo>,
}

impl MealChanges {
    pub fn apply_to(self, meal: &mut CloudMeal) {
        if let Some(name) = self.name {
            meal.name = name;
        }
        if let Some(notes) = self.notes {
            meal.notes = Some(notes);
        }
        if let Some(tags) = self.tags {
            meal.tags = tags;
        }
        if let Some(macros) = self.macros {
            meal.macros = macros;
        }
        if let Some(serving) = self.serving {
            meal.serving = serving;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_computes_missing_calories() {
        assert_eq!(MacrosInput::new(10.0, 20.0, 5.0).resolve().calories, 165.0);
        assert_eq!(
            MacrosInput::new(10.0, 20.0, 5.0).with_calories(999.0).resolve().calories,
            999.0
        );
        let partial = MacrosInput {
            protein: Some(10.0),
            ..Default::default()
        };
        let m = partial.resolve();
        assert_eq!(m.calories, 40.0);
        assert_eq!(m.carbs, 0.0);
    }

    #[test]
    fn test_cloud_meal_wire_shape() {
        let meal: CloudMeal = serde_json::from_value(json!({
            "id": "m1",
            "name": "Chili",
            "macros": {"protein": 30, "carbs": "40", "fat": 12, "calories": 388},
            "serving": {"unit": "g", "size": 350},
            "createdAt": "2024-05-01T12:00:00Z",
            "updatedAt": "2024-05-02T12:00:00Z"
        }))
        .unwrap();
        assert_eq!(meal.serving.unit, ServingUnit::G);
        assert_eq!(meal.macros.carbs, 40.0);
        assert!(meal.tags.is_empty());
        let back = serde_json::to_value(&meal).unwrap();
        assert_eq!(back["updatedAt"], "2024-05-02T12:00:00Z");
        assert!(back.get("notes").is_none());
    }
}
