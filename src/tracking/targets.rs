use serde::{Deserialize, Serialize};

use crate::lenient;
use crate::nutrition::summary::{non_negative, Totals};

pub const DEFAULT_CALORIES: f64 = 2200.0;
pub const DEFAULT_PROTEIN: f64 = 170.0;
pub const DEFAULT_CARBS: f64 = 220.0;
pub const DEFAULT_FAT: f64 = 70.0;

/// Daily goals. Grams for the macros, kcal for calories.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Targets {
    #[serde(default = "default_calories", deserialize_with = "lenient::number_or_zero")]
    pub calories: f64,
    #[serde(default = "default_protein", deserialize_with = "lenient::number_or_zero")]
    pub protein: f64,
    #[serde(default = "default_carbs", deserialize_with = "lenient::number_or_zero")]
    pub carbs: f64,
    #[serde(default = "default_fat", deserialize_with = "lenient::number_or_zero")]
    pub fat: f64,
}

fn default_calories() -> f64 {
    DEFAULT_CALORIES
}

fn default_protein() -> f64 {
    DEFAULT_PROTEIN
}

fn default_carbs() -> f64 {
    DEFAULT_CARBS
}

fn default_fat() -> f64 {
    DEFAULT_FAT
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            calories: DEFAULT_CALORIES,
            protein: DEFAULT_PROTEIN,
            carbs: DEFAULT_CARBS,
            fat: DEFAULT_FAT,
        }
    }
}

/// Partial update for [`Targets`]; `None` leaves a field alone.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq)]
pub struct TargetsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fat: Option<f64>,
}

impl TargetsPatch {
    pub fn is_empty(&self) -> bool {
        self.calories.is_none() && self.protein.is_none() && self.carbs.is_none() && self.fat.is_none()
    }
}

impl Targets {
    /// Merges the supplied fields. Negative or non-finite values become 0.
    pub fn apply(&mut self, patch: &TargetsPatch) {
        if let Some(v) = patch.calories {
            self.calories = non_negative(v);
        }
        if let Some(v) = patch.protein {
            self.protein = non_negative(v);
        }
        if let Some(v) = patch.carbs {
            self.carbs = non_negative(v);
        }
        if let Some(v) = patch.fat {
            self.fat = non_negative(v);
        }
    }
}

/// Share of `target` reached by `current`, as a whole percent capped at 100.
///
/// A zero, negative or NaN target yields 0, as does a non-finite `current`.
pub fn percent_of(current: f64, target: f64) -> u8 {
    if target.is_nan() || target <= 0.0 || !current.is_finite() {
        return 0;
    }
    let pct = (100.0 * current / target).round();
    pct.clamp(0.0, 100.0) as u8
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct Progress {
    pub current: f64,
    pub target: f64,
    pub percent: u8,
    pub remaining: f64,
}

impl Progress {
    fn new(current: f64, target: f64) -> Self {
        Self {
            current,
            target,
            percent: percent_of(current, target),
            remaining: (target - current).max(0.0),
        }
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct MacroProgress {
    pub calories: Progress,
    pub protein: Progress,
    pub carbs: Progress,
    pub fat: Progress,
}

impl MacroProgress {
    pub fn compute(totals: &Totals, targets: &Targets) -> Self {
        Self {
            calories: Progress::new(totals.cals, targets.calories),
            protein: Progress::new(totals.p, targets.protein),
            carbs: Progress::new(totals.c, targets.carbs),
            fat: Progress::new(totals.f, targets.fat),
        }
    }
}
