use serde::{Deserialize, Serialize};

use crate::lenient;

pub const FDC_BASE_URL: &str = "https://api.nal.usda.gov/fdc/v1";

pub const DATA_TYPE_BRANDED: &str = "Branded";

/// Every FDC data type the search screen queries by default.
pub const DEFAULT_DATA_TYPES: &[&str] = &["Branded", "Survey (FNDDS)", "SR Legacy", "Foundation"];

pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const BARCODE_PAGE_SIZE: u32 = 10;

#[derive(Clone, Debug)]
pub enum Provider {
    UsdaFdc {
        /// Name of the environment variable holding the key, not the key itself.
        api_key: String,
        base_url: String,
        timeout_secs: u64,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct LabelValue {
    #[serde(default, deserialize_with = "lenient::number")]
    pub value: Option<f64>,
}

/// Pre-computed per-serving values printed on a branded label.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct LabelNutrients {
    pub calories: Option<LabelValue>,
    pub protein: Option<LabelValue>,
    pub fat: Option<LabelValue>,
    pub carbohydrates: Option<LabelValue>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NutrientRef {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub number: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub unit_name: Option<String>,
}

/// One `foodNutrients` entry as the API sends it.
///
/// `/foods/search` uses the flat `nutrientName`/`unitName`/`value` fields,
/// `/food/{id}` nests them under `nutrient` and reports `amount`. Both are
/// kept here; `nutrition::normalizer` folds them into one shape.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawFoodNutrient {
    #[serde(default, deserialize_with = "lenient::string")]
    pub nutrient_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub unit_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub nutrient_number: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub nutrient_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub value: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub amount: Option<f64>,
    #[serde(default)]
    pub nutrient: Option<NutrientRef>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FoodPortion {
    #[serde(default, deserialize_with = "lenient::number")]
    pub gram_weight: Option<f64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub modifier: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub portion_description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FoodRecord {
    #[serde(default, deserialize_with = "lenient::id")]
    pub fdc_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub data_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub brand_owner: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub brand_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub gtin_upc: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub serving_size: Option<f64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub serving_size_unit: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub household_serving_full_text: Option<String>,
    #[serde(default)]
    pub label_nutrients: Option<LabelNutrients>,
    #[serde(default)]
    pub food_portions: Vec<FoodPortion>,
    #[serde(default)]
    pub food_nutrients: Vec<RawFoodNutrient>,
}

impl FoodRecord {
    pub fn is_branded(&self) -> bool {
        self.data_type.as_deref() == Some(DATA_TYPE_BRANDED)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub foods: Vec<FoodRecord>,
    #[serde(default)]
    pub total_hits: u64,
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub total_pages: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub page_size: u32,
    pub page_number: u32,
    pub data_types: Vec<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            page_size: DEFAULT_PAGE_SIZE,
            page_number: 1,
            data_types: DEFAULT_DATA_TYPES.iter().map(|d| d.to_string()).collect(),
        }
    }

    /// The branded-only, small-page search used for UPC lookups.
    pub fn barcode(upc: &str) -> Self {
        Self {
            query: upc.to_string(),
            page_size: BARCODE_PAGE_SIZE,
            page_number: 1,
            data_types: vec![DATA_TYPE_BRANDED.to_string()],
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_page_number(mut self, page_number: u32) -> Self {
        self.page_number = page_number.max(1);
        self
    }

    /// Replaces the category filter; an empty list keeps the defaults.
    pub fn with_data_types(mut self, data_types: Vec<String>) -> Self {
        if !data_types.is_empty() {
            self.data_types = data_types;
        }
        self
    }

    /// Query-string pairs, without the api key. `dataType` repeats once per type.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("query", self.query.clone()),
            ("pageSize", self.page_size.to_string()),
            ("pageNumber", self.page_number.to_string()),
        ];
        pairs.extend(self.data_types.iter().map(|d| ("dataType", d.clone())));
        pairs
    }
}
