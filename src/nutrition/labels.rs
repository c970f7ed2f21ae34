use crate::api_connection::endpoints::FoodRecord;

/// Description plus brand (brand name, else owner) when there is one.
pub fn display_name(record: &FoodRecord) -> String {
    let brand = record
        .brand_name
        .as_deref()
        .filter(|b| !b.trim().is_empty())
        .or_else(|| record.brand_owner.as_deref().filter(|b| !b.trim().is_empty()));
    match brand {
        Some(brand) => format!("{} · {}", record.description, brand),
        None => record.description.clone(),
    }
}

pub fn serving_text(record: &FoodRecord) -> String {
    if let Some(text) = record
        .household_serving_full_text
        .as_deref()
        .filter(|t| !t.trim().is_empty())
    {
        return text.to_string();
    }
    match (record.serving_size, record.serving_size_unit.as_deref()) {
        (Some(size), Some(unit)) if size > 0.0 && !unit.is_empty() => format!("{} {}", size, unit),
        _ => "per serving".to_string(),
    }
}

/// "1 cup (240 g)"-style lines for the record's household portions.
pub fn portion_labels(record: &FoodRecord) -> Vec<String> {
    record
        .food_portions
        .iter()
        .filter_map(|portion| {
            let grams = portion.gram_weight.filter(|g| *g > 0.0)?;
            let label = portion
                .modifier
                .as_deref()
                .or(portion.portion_description.as_deref())
                .filter(|l| !l.trim().is_empty())
                .unwrap_or("portion");
            Some(format!("{} ({} g)", label, grams))
        })
        .collect()
}
