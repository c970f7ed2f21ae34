use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

use crate::lenient;

/// Atwater factors, kcal per gram.
pub const KCAL_PER_G_PROTEIN: f64 = 4.0;
pub const KCAL_PER_G_CARBS: f64 = 4.0;
pub const KCAL_PER_G_FAT: f64 = 9.0;

/// Canonical macro breakdown for one base unit (a serving, or 100 g).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq)]
pub struct MacroSummary {
    pub calories: u32,
    pub protein: f64,
    pub carbs: f64,
    pub fats: f64,
}

impl MacroSummary {
    /// Builds a summary from raw numbers, applying the display rounding
    /// (integer kcal, one-decimal grams) and zeroing anything unusable.
    pub fn from_raw(calories: f64, protein: f64, carbs: f64, fats: f64) -> Self {
        Self {
            calories: round_kcal(calories),
            protein: round_grams(protein),
            carbs: round_grams(carbs),
            fats: round_grams(fats),
        }
    }

    pub fn scaled(&self, factor: f64) -> Self {
        let factor = non_negative(factor);
        Self::from_raw(
            f64::from(self.calories) * factor,
            self.protein * factor,
            self.carbs * factor,
            self.fats * factor,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.calories == 0 && self.protein == 0.0 && self.carbs == 0.0 && self.fats == 0.0
    }
}

/// Store-shape totals (`cals`/`p`/`c`/`f`). Plain numbers, never re-rounded.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    #[serde(default, deserialize_with = "lenient::number_or_zero")]
    pub cals: f64,
    #[serde(default, deserialize_with = "lenient::number_or_zero")]
    pub p: f64,
    #[serde(default, deserialize_with = "lenient::number_or_zero")]
    pub c: f64,
    #[serde(default, deserialize_with = "lenient::number_or_zero")]
    pub f: f64,
}

impl Totals {
    pub fn new(cals: f64, p: f64, c: f64, f: f64) -> Self {
        Self { cals, p, c, f }
    }

    /// Manual entry: calories follow from the macros (4/4/9).
    pub fn from_macros(protein: f64, carbs: f64, fat: f64) -> Self {
        let (p, c, f) = (non_negative(protein), non_negative(carbs), non_negative(fat));
        Self {
            cals: kcal_from_macros(p, c, f),
            p,
            c,
            f,
        }
    }
}

impl From<MacroSummary> for Totals {
    fn from(m: MacroSummary) -> Self {
        Self {
            cals: f64::from(m.calories),
            p: m.protein,
            c: m.carbs,
            f: m.fats,
        }
    }
}

impl Add for Totals {
    type Output = Totals;

    fn add(self, rhs: Totals) -> Totals {
        Totals {
            cals: self.cals + rhs.cals,
            p: self.p + rhs.p,
            c: self.c + rhs.c,
            f: self.f + rhs.f,
        }
    }
}

impl AddAssign for Totals {
    fn add_assign(&mut self, rhs: Totals) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for Totals {
    fn sum<I: Iterator<Item = Totals>>(iter: I) -> Self {
        iter.fold(Totals::default(), |acc, t| acc + t)
    }
}

/// `round(p*4 + c*4 + f*9)`.
pub fn kcal_from_macros(protein: f64, carbs: f64, fat: f64) -> f64 {
    (protein * KCAL_PER_G_PROTEIN + carbs * KCAL_PER_G_CARBS + fat * KCAL_PER_G_FAT).round()
}

/// Non-finite and negative inputs become zero.
pub fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

pub fn round_kcal(value: f64) -> u32 {
    let v = non_negative(value).round();
    if v >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        v as u32
    }
}

pub fn round_grams(value: f64) -> f64 {
    (non_negative(value) * 10.0).round() / 10.0
}
