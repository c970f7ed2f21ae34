use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::lenient;
use crate::nutrition::summary::Totals;

pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuantityMode {
    #[default]
    Servings,
    Grams,
}

/// Where a logged item came from.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ItemSource {
    #[serde(rename_all = "camelCase")]
    Fdc {
        fdc_id: u64,
        #[serde(default)]
        mode: QuantityMode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        servings: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        grams: Option<f64>,
    },
    #[default]
    Manual,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MealSource {
    Fdc,
    Manual,
}

/// One logged food quantity.
///
/// Historical state stores macros either flattened (`cals`/`p`/`c`/`f`) or
/// nested under `macros`, sometimes both. [`Item::totals`] is the only place
/// that decides between them.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase", from = "StoredItem")]
pub struct Item {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serving: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    pub source: ItemSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cals: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macros: Option<Totals>,
}

/// Every item shape found in persisted state. Older entries have no
/// `source` object and keep `fdcId`/`mode`/`servings`/`grams` on the item.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredItem {
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    id: String,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    brand: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    serving: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    barcode: Option<String>,
    #[serde(default)]
    source: Option<Value>,
    #[serde(default, deserialize_with = "lenient::id")]
    fdc_id: Option<u64>,
    #[serde(default)]
    mode: Option<Value>,
    #[serde(default, deserialize_with = "lenient::number")]
    servings: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    grams: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    cals: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    p: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    c: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    f: Option<f64>,
    #[serde(default)]
    macros: Option<Value>,
}

impl StoredItem {
    /// The tagged `source` when it parses, else the flat FDC fields, else manual.
    fn resolve_source(&self) -> ItemSource {
        if let Some(source) = self
            .source
            .clone()
            .and_then(|v| serde_json::from_value::<ItemSource>(v).ok())
        {
            return source;
        }
        let Some(fdc_id) = self.fdc_id else {
            return ItemSource::Manual;
        };
        let mode = self
            .mode
            .clone()
            .and_then(|v| serde_json::from_value::<QuantityMode>(v).ok())
            .unwrap_or(if self.grams.is_some() && self.servings.is_none() {
                QuantityMode::Grams
            } else {
                QuantityMode::Servings
            });
        ItemSource::Fdc {
            fdc_id,
            mode,
            servings: self.servings,
            grams: self.grams,
        }
    }
}

impl From<StoredItem> for Item {
    fn from(stored: StoredItem) -> Self {
        let source = stored.resolve_source();
        Self {
            id: stored.id,
            name: stored.name,
            brand: stored.brand,
            serving: stored.serving,
            barcode: stored.barcode,
            source,
            cals: stored.cals,
            p: stored.p,
            c: stored.c,
            f: stored.f,
            macros: stored.macros.and_then(|v| serde_json::from_value(v).ok()),
        }
    }
}

impl Item {
    /// New items carry both macro shapes so older readers keep working.
    pub fn new(id: impl Into<String>, name: impl Into<String>, source: ItemSource, totals: Totals) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source,
            cals: Some(totals.cals),
            p: Some(totals.p),
            c: Some(totals.c),
            f: Some(totals.f),
            macros: Some(totals),
            ..Default::default()
        }
    }

    fn has_flattened(&self) -> bool {
        self.cals.is_some() || self.p.is_some() || self.c.is_some() || self.f.is_some()
    }

    /// Flattened fields if any of them is present, else the nested object, else zero.
    pub fn totals(&self) -> Totals {
        if self.has_flattened() {
            Totals::new(
                self.cals.unwrap_or(0.0),
                self.p.unwrap_or(0.0),
                self.c.unwrap_or(0.0),
                self.f.unwrap_or(0.0),
            )
        } else {
            self.macros.unwrap_or_default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub title: String,
    #[serde(
        default,
        alias = "when",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::datetime"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::date")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<MealSource>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::id")]
    pub fdc_id: Option<u64>,
    #[serde(default)]
    pub items: Vec<Item>,
    /// Cached rollup. When present it is trusted over the items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totals: Option<Totals>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct DayLog {
    pub date: NaiveDate,
    /// Newest first.
    #[serde(default)]
    pub meals: Vec<Meal>,
}

impl DayLog {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            meals: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
struct StoredDayLog {
    #[serde(default)]
    meals: Option<Vec<Meal>>,
}

/// Reads the date-keyed log map. The key is the day's date; a `date` field
/// inside the entry is ignored, missing or not.
pub fn deserialize_day_logs<'de, D>(deserializer: D) -> Result<BTreeMap<NaiveDate, DayLog>, D::Error>
where
    D: Deserializer<'de>,
{
    let stored = BTreeMap::<NaiveDate, StoredDayLog>::deserialize(deserializer)?;
    Ok(stored
        .into_iter()
        .map(|(date, day)| {
            let meals = day.meals.unwrap_or_default();
            (date, DayLog { date, meals })
        })
        .collect())
}

/// Today's date in the local timezone.
pub fn today_key() -> NaiveDate {
    Local::now().date_naive()
}

pub fn parse_date_key(input: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(input.trim(), DATE_KEY_FORMAT)
}

pub fn format_date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}
