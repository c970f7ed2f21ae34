use crate::daily_log::{DayLog, Meal};
use crate::nutrition::summary::Totals;

/// Sums a meal's items. Values are added as-is, no rounding.
pub fn sum_meal(meal: &Meal) -> Totals {
    meal.items.iter().map(|item| item.totals()).sum()
}

/// A meal's cached `totals` when present, else the sum of its items.
pub fn meal_totals(meal: &Meal) -> Totals {
    meal.totals.unwrap_or_else(|| sum_meal(meal))
}

/// Sums a day, trusting each meal's cached `totals` when it has them.
///
/// # Arguments
/// * `day` - The day's log, or `None` if nothing was logged for that date.
///
/// # Returns
/// All-zero totals for an absent or empty day.
pub fn sum_day(day: Option<&DayLog>) -> Totals {
    let Some(day) = day else {
        return Totals::default();
    };
    day.meals
        .iter()
        .map(meal_totals)
        .sum()
}
