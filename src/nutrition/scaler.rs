use serde::{Deserialize, Serialize};

use crate::api_connection::endpoints::FoodRecord;
use crate::nutrition::normalizer::{base_grams_for, normalize};
use crate::nutrition::summary::{non_negative, MacroSummary};

/// How much of a food was eaten. With neither field set it means one serving.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq)]
pub struct ScaleRequest {
    pub servings: Option<f64>,
    pub grams: Option<f64>,
}

impl ScaleRequest {
    pub fn servings(servings: f64) -> Self {
        Self {
            servings: Some(servings),
            grams: None,
        }
    }

    pub fn grams(grams: f64) -> Self {
        Self {
            servings: None,
            grams: Some(grams),
        }
    }
}

/// Scales the per-base-unit macros of `record` to the requested quantity.
///
/// Grams are honoured only when the record's base grams are known; otherwise
/// this quietly uses the servings factor (one serving if none was given).
/// Callers that offer a gram input should gate it on [`supports_grams`].
pub fn scale(record: &FoodRecord, request: &ScaleRequest) -> MacroSummary {
    let base = normalize(record);
    base.scaled(scale_factor(base_grams_for(record), request))
}

pub fn scale_factor(grams_base: Option<f64>, request: &ScaleRequest) -> f64 {
    match (request.grams, grams_base) {
        (Some(grams), Some(base)) if base > 0.0 => non_negative(grams) / base,
        _ => non_negative(request.servings.unwrap_or(1.0)),
    }
}

pub fn supports_grams(record: &FoodRecord) -> bool {
    base_grams_for(record).is_some()
}
