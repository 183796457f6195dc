use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::BrewError;
use crate::methods::{BrewField, method_info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrewMethod {
    Espresso,
    Pourover,
    Frenchpress,
    Mokapot,
}

impl BrewMethod {
    pub const ALL: [BrewMethod; 4] = [
        BrewMethod::Espresso,
        BrewMethod::Pourover,
        BrewMethod::Frenchpress,
        BrewMethod::Mokapot,
    ];

    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            BrewMethod::Espresso => "espresso",
            BrewMethod::Pourover => "pourover",
            BrewMethod::Frenchpress => "frenchpress",
            BrewMethod::Mokapot => "mokapot",
        }
    }
}

impl fmt::Display for BrewMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for BrewMethod {
    type Err = BrewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        BrewMethod::ALL
            .into_iter()
            .find(|m| m.key() == lower)
            .ok_or_else(|| BrewError::UnknownMethod(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TasteTag {
    TooBitter,
    TooSour,
    Balanced,
    Weak,
    Strong,
}

impl TasteTag {
    pub const ALL: [TasteTag; 5] = [
        TasteTag::TooBitter,
        TasteTag::TooSour,
        TasteTag::Balanced,
        TasteTag::Weak,
        TasteTag::Strong,
    ];

    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            TasteTag::TooBitter => "too_bitter",
            TasteTag::TooSour => "too_sour",
            TasteTag::Balanced => "balanced",
            TasteTag::Weak => "weak",
            TasteTag::Strong => "strong",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            TasteTag::TooBitter => "Too Bitter",
            TasteTag::TooSour => "Too Sour",
            TasteTag::Balanced => "Balanced",
            TasteTag::Weak => "Too Weak",
            TasteTag::Strong => "Too Strong",
        }
    }
}

impl fmt::Display for TasteTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for TasteTag {
    type Err = BrewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase().replace(['-', ' '], "_");
        TasteTag::ALL
            .into_iter()
            .find(|t| t.key() == lower)
            .ok_or_else(|| {
                let valid: Vec<&str> = TasteTag::ALL.iter().map(|t| t.key()).collect();
                BrewError::Validation(format!(
                    "Invalid taste '{s}'. Must be one of: {}",
                    valid.join(", ")
                ))
            })
    }
}

/// Taste feedback for one brew. Keeps insertion order and drops duplicates, so
/// [`TasteSet::primary`] is stable across reads.
///
/// Older records stored a single tag instead of a list; both shapes deserialize.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "TasteRepr")]
pub struct TasteSet(Vec<TasteTag>);

#[derive(Deserialize)]
#[serde(untagged)]
enum TasteRepr {
    One(TasteTag),
    Many(Vec<TasteTag>),
}

impl From<TasteRepr> for TasteSet {
    fn from(repr: TasteRepr) -> Self {
        match repr {
            TasteRepr::One(tag) => TasteSet(vec![tag]),
            TasteRepr::Many(tags) => tags.into_iter().collect(),
        }
    }
}

impl Serialize for TasteSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl FromIterator<TasteTag> for TasteSet {
    fn from_iter<I: IntoIterator<Item = TasteTag>>(iter: I) -> Self {
        let mut set = TasteSet::default();
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}

impl TasteSet {
    /// Adds a tag; returns false if it was already present.
    pub fn insert(&mut self, tag: TasteTag) -> bool {
        if self.0.contains(&tag) {
            return false;
        }
        self.0.push(tag);
        true
    }

    #[must_use]
    pub fn primary(&self) -> Option<TasteTag> {
        self.0.first().copied()
    }

    #[must_use]
    pub fn contains(&self, tag: TasteTag) -> bool {
        self.0.contains(&tag)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = TasteTag> + '_ {
        self.0.iter().copied()
    }

    /// Parse a comma separated list such as `"too_bitter,weak"`.
    pub fn parse_list(s: &str) -> Result<Self> {
        let mut set = TasteSet::default();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            set.insert(part.parse()?);
        }
        Ok(set)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoastLevel {
    Light,
    MediumLight,
    #[default]
    Medium,
    MediumDark,
    Dark,
}

impl RoastLevel {
    pub const ALL: [RoastLevel; 5] = [
        RoastLevel::Light,
        RoastLevel::MediumLight,
        RoastLevel::Medium,
        RoastLevel::MediumDark,
        RoastLevel::Dark,
    ];

    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            RoastLevel::Light => "light",
            RoastLevel::MediumLight => "medium-light",
            RoastLevel::Medium => "medium",
            RoastLevel::MediumDark => "medium-dark",
            RoastLevel::Dark => "dark",
        }
    }
}

impl fmt::Display for RoastLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for RoastLevel {
    type Err = BrewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '_'], "-");
        RoastLevel::ALL
            .into_iter()
            .find(|r| r.key() == normalized)
            .ok_or_else(|| {
                let valid: Vec<&str> = RoastLevel::ALL.iter().map(|r| r.key()).collect();
                BrewError::Validation(format!(
                    "Invalid roast level '{s}'. Must be one of: {}",
                    valid.join(", ")
                ))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub method: BrewMethod,
    pub grind_size: String,
    pub ratio: String,
    /// Seconds for espresso/pourover, minutes for frenchpress/mokapot.
    pub brew_time: f64,
    pub water_temp_c: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure_bar: Option<f64>,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bean {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default)]
    pub roast_level: RoastLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: String,
    // Cached suggestion per method
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub suggestions: BTreeMap<BrewMethod, Suggestion>,
}

#[derive(Debug, Clone, Default)]
pub struct NewBean {
    pub name: String,
    pub origin: Option<String>,
    pub roast_level: RoastLevel,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateBean {
    pub name: Option<String>,
    pub origin: Option<String>,
    pub roast_level: Option<RoastLevel>,
    pub notes: Option<String>,
}

/// Method-dependent brew parameters. Which fields apply is decided by the
/// method registry; inapplicable ones are cleared on save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrewParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dose_g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yield_g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_ml: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grind_size: Option<String>,
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
}

impl BrewParams {
    #[must_use]
    pub fn has(&self, field: BrewField) -> bool {
        match field {
            BrewField::DoseG => self.dose_g.is_some(),
            BrewField::YieldG => self.yield_g.is_some(),
            BrewField::WaterMl => self.water_ml.is_some(),
            BrewField::GrindSize => self
                .grind_size
                .as_deref()
                .is_some_and(|g| !g.trim().is_empty()),
            BrewField::WaterTempC => self.water_temp_c.is_some(),
            BrewField::BrewTimeSec => self.brew_time_sec.is_some(),
            BrewField::BrewTimeMin => self.brew_time_min.is_some(),
            BrewField::PressureBar => self.pressure_bar.is_some(),
            BrewField::PouringNote => self.pouring_note.is_some(),
        }
    }

    #[must_use]
    pub fn numeric(&self, field: BrewField) -> Option<f64> {
        match field {
            BrewField::DoseG => self.dose_g,
            BrewField::YieldG => self.yield_g,
            BrewField::WaterMl => self.water_ml,
            BrewField::WaterTempC => self.water_temp_c,
            BrewField::BrewTimeSec => self.brew_time_sec,
            BrewField::BrewTimeMin => self.brew_time_min,
            BrewField::PressureBar => self.pressure_bar,
            BrewField::GrindSize | BrewField::PouringNote => None,
        }
    }

    fn clear(&mut self, field: BrewField) {
        match field {
            BrewField::DoseG => self.dose_g = None,
            BrewField::YieldG => self.yield_g = None,
            BrewField::WaterMl => self.water_ml = None,
            BrewField::GrindSize => self.grind_size = None,
            BrewField::WaterTempC => self.water_temp_c = None,
            BrewField::BrewTimeSec => self.brew_time_sec = None,
            BrewField::BrewTimeMin => self.brew_time_min = None,
            BrewField::PressureBar => self.pressure_bar = None,
            BrewField::PouringNote => self.pouring_note = None,
        }
    }

    /// Drop every field the method does not use.
    #[must_use]
    pub fn retain_for(mut self, method: BrewMethod) -> Self {
        let info = method_info(method);
        for field in BrewField::ALL {
            if !info.fields.contains(&field) {
                self.clear(field);
            }
        }
        self
    }

    /// Brew time in the method's own unit.
    #[must_use]
    pub fn brew_time_for(&self, method: BrewMethod) -> Option<f64> {
        if method_info(method).time_field() == BrewField::BrewTimeMin {
            self.brew_time_min
        } else {
            self.brew_time_sec
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Brew {
    pub id: String,
    pub bean_id: String,
    pub method: BrewMethod,
    #[serde(flatten)]
    pub params: BrewParams,
    #[serde(default)]
    pub taste: TasteSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

/// A brew recorded while offline, waiting in the pending queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingBrew {
    #[serde(flatten)]
    pub brew: Brew,
    pub pending: bool,
}

impl PendingBrew {
    #[must_use]
    pub fn new(brew: Brew) -> Self {
        PendingBrew {
            brew,
            pending: true,
        }
    }

    #[must_use]
    pub fn into_brew(self) -> Brew {
        self.brew
    }
}

#[derive(Debug, Clone)]
pub struct NewBrew {
    pub bean_id: String,
    pub method: BrewMethod,
    pub params: BrewParams,
    pub taste: TasteSet,
    pub notes: Option<String>,
}

impl NewBrew {
    /// Check taste feedback and the method's required fields.
    pub fn validate(&self) -> Result<()> {
        if self.taste.is_empty() {
            return Err(
                BrewError::Validation("Select at least one taste feedback".to_string()).into(),
            );
        }
        let info = method_info(self.method);
        let missing: Vec<&str> = info
            .fields
            .iter()
            .filter(|f| !f.is_optional() && !self.params.has(**f))
            .map(|f| f.key())
            .collect();
        if !missing.is_empty() {
            return Err(BrewError::Validation(format!(
                "Missing required {} fields: {}",
                info.name,
                missing.join(", ")
            ))
            .into());
        }
        for field in info.fields {
            if let Some(v) = self.params.numeric(*field) {
                if !v.is_finite() || v < 0.0 {
                    return Err(BrewError::Validation(format!(
                        "{} must be a non-negative number",
                        field.label()
                    ))
                    .into());
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnboardingStatus {
    #[default]
    NotStarted,
    Skipped,
    Completed,
}

impl OnboardingStatus {
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            OnboardingStatus::NotStarted => "not-started",
            OnboardingStatus::Skipped => "skipped",
            OnboardingStatus::Completed => "completed",
        }
    }
}

pub fn validate_bean_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(BrewError::Validation("Bean name must not be empty".to_string()).into());
    }
    Ok(trimmed.to_string())
}
