use serde::{Deserialize, Serialize};

use crate::models::{Brew, BrewMethod, BrewParams, TasteSet};

const DEFAULT_GRIND: &str = "medium";
const DEFAULT_WATER_TEMP_C: f64 = 95.0;
const DEFAULT_BREW_TIME_SEC: f64 = 240.0;
const DEFAULT_BREW_TIME_MIN: f64 = 4.0;

/// Old free-text coffee types and the method they brew with today.
const LEGACY_TYPES: &[(&str, BrewMethod)] = &[
    ("espresso", BrewMethod::Espresso),
    ("americano", BrewMethod::Pourover),
    ("latte", BrewMethod::Pourover),
    ("cappuccino", BrewMethod::Espresso),
    ("pourover", BrewMethod::Pourover),
    ("french_press", BrewMethod::Frenchpress),
    ("aeropress", BrewMethod::Pourover),
];

/// Map a legacy coffee type to a brew method. Unknown values fall back to
/// pourover rather than failing.
#[must_use]
pub fn migrate_brew_method(legacy_type: &str) -> BrewMethod {
    if let Ok(method) = legacy_type.parse::<BrewMethod>() {
        return method;
    }
    let lower = legacy_type.trim().to_lowercase();
    LEGACY_TYPES
        .iter()
        .find(|(name, _)| *name == lower)
        .map_or(BrewMethod::Pourover, |(_, method)| *method)
}

/// Old grind sizes were numbers on a 1-6 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyGrind {
    Text(String),
    Number(f64),
}

impl LegacyGrind {
    fn into_text(self) -> String {
        match self {
            LegacyGrind::Text(s) => s,
            LegacyGrind::Number(n) if n.fract() == 0.0 => format!("{n:.0}"),
            LegacyGrind::Number(n) => n.to_string(),
        }
    }
}

/// A brew written before methods existed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyBrew {
    pub id: String,
    pub bean_id: String,
    /// Only set when a record carrying `method` failed to parse as a current brew.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coffee_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brew_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coffee_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brew_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grind_size: Option<LegacyGrind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dose_g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yield_g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_ml: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_temp_c: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brew_time_sec: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brew_time_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure_bar: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pouring_note: Option<String>,
    #[serde(default)]
    pub taste: TasteSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

impl LegacyBrew {
    #[must_use]
    pub fn method(&self) -> BrewMethod {
        self.method
            .as_deref()
            .or(self.brew_method.as_deref())
            .or(self.coffee_type.as_deref())
            .map_or(BrewMethod::Pourover, migrate_brew_method)
    }

    /// Convert to the current record layout. Nothing recorded is dropped unless
    /// the new method has no field for it.
    #[must_use]
    pub fn upgrade(self) -> Brew {
        let method = self.method();
        let mut params = BrewParams {
            dose_g: self.dose_g.or(self.coffee_amount),
            yield_g: self.yield_g,
            water_ml: self.water_ml.or(self.water_amount),
            grind_size: Some(
                self.grind_size
                    .map_or_else(|| DEFAULT_GRIND.to_string(), LegacyGrind::into_text),
            ),
            water_temp_c: Some(self.water_temp_c.unwrap_or(DEFAULT_WATER_TEMP_C)),
            brew_time_sec: None,
            brew_time_min: None,
            pressure_bar: self.pressure_bar,
            pouring_note: self.pouring_note,
        };
        match method {
            BrewMethod::Espresso | BrewMethod::Pourover => {
                params.brew_time_sec = Some(
                    self.brew_time_sec
                        .or(self.brew_time)
                        .unwrap_or(DEFAULT_BREW_TIME_SEC),
                );
            }
            BrewMethod::Frenchpress | BrewMethod::Mokapot => {
                params.brew_time_min = Some(
                    self.brew_time_min
                        .or_else(|| self.brew_time.map(|secs| round1(secs / 60.0)))
                        .unwrap_or(DEFAULT_BREW_TIME_MIN),
                );
            }
        }
        // Not `retain_for`: migrated espresso keeps water, its only ratio input
        if method != BrewMethod::Espresso {
            params.pressure_bar = None;
        }
        if method != BrewMethod::Pourover {
            params.pouring_note = None;
        }

        Brew {
            id: self.id,
            bean_id: self.bean_id,
            method,
            params,
            taste: self.taste,
            notes: self.notes,
            created_at: self.created_at,
        }
    }
}

/// A brew as found in the store, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredBrew {
    Current(Brew),
    Legacy(LegacyBrew),
}

impl StoredBrew {
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        matches!(self, StoredBrew::Legacy(_))
    }

    /// Current records pass through untouched.
    #[must_use]
    pub fn normalize(self) -> Brew {
        match self {
            StoredBrew::Current(brew) => brew,
            StoredBrew::Legacy(legacy) => legacy.upgrade(),
        }
    }
}

pub(crate) fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
