use anyhow::Result;
use serde::Serialize;

use crate::models::{BrewMethod, BrewParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Seconds,
    Minutes,
}

impl TimeUnit {
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "min",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BrewField {
    DoseG,
    YieldG,
    WaterMl,
    GrindSize,
    WaterTempC,
    BrewTimeSec,
    BrewTimeMin,
    PressureBar,
    PouringNote,
}

impl BrewField {
    pub const ALL: [BrewField; 9] = [
        BrewField::DoseG,
        BrewField::YieldG,
        BrewField::WaterMl,
        BrewField::GrindSize,
        BrewField::WaterTempC,
        BrewField::BrewTimeSec,
        BrewField::BrewTimeMin,
        BrewField::PressureBar,
        BrewField::PouringNote,
    ];

    /// Key used in stored records.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            BrewField::DoseG => "doseG",
            BrewField::YieldG => "yieldG",
            BrewField::WaterMl => "waterMl",
            BrewField::GrindSize => "grindSize",
            BrewField::WaterTempC => "waterTempC",
            BrewField::BrewTimeSec => "brewTimeSec",
            BrewField::BrewTimeMin => "brewTimeMin",
            BrewField::PressureBar => "pressureBar",
            BrewField::PouringNote => "pouringNote",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            BrewField::DoseG => "Dose (g)",
            BrewField::YieldG => "Yield (g)",
            BrewField::WaterMl => "Water (ml)",
            BrewField::GrindSize => "Grind Size",
            BrewField::WaterTempC => "Water Temperature (°C)",
            BrewField::BrewTimeSec => "Brew Time (seconds)",
            BrewField::BrewTimeMin => "Brew Time (minutes)",
            BrewField::PressureBar => "Pressure (bar)",
            BrewField::PouringNote => "Pouring Instructions",
        }
    }

    #[must_use]
    pub fn is_optional(self) -> bool {
        matches!(self, BrewField::PressureBar | BrewField::PouringNote)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Range { min, max }
    }

    #[must_use]
    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }

    #[must_use]
    pub fn clamp(&self, v: f64) -> f64 {
        v.clamp(self.min, self.max)
    }
}

pub const TEMP_RANGE: Range = Range::new(80.0, 100.0);
const DOSE_RANGE: Range = Range::new(5.0, 40.0);
const YIELD_RANGE: Range = Range::new(10.0, 70.0);
const PRESSURE_RANGE: Range = Range::new(6.0, 12.0);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodInfo {
    pub method: BrewMethod,
    pub name: &'static str,
    pub fields: &'static [BrewField],
    pub ratio_label: &'static str,
    pub time_unit: TimeUnit,
    /// Recommended brew time, in `time_unit`. Also the hard bounds for
    /// suggestion adjustments.
    pub time_range: Range,
    pub water_range: Option<Range>,
}

impl MethodInfo {
    #[must_use]
    pub fn time_field(&self) -> BrewField {
        match self.time_unit {
            TimeUnit::Seconds => BrewField::BrewTimeSec,
            TimeUnit::Minutes => BrewField::BrewTimeMin,
        }
    }

    #[must_use]
    pub fn range_for(&self, field: BrewField) -> Option<Range> {
        match field {
            BrewField::DoseG => Some(DOSE_RANGE),
            BrewField::YieldG => Some(YIELD_RANGE),
            BrewField::WaterMl => self.water_range,
            BrewField::WaterTempC => Some(TEMP_RANGE),
            BrewField::PressureBar => Some(PRESSURE_RANGE),
            BrewField::BrewTimeSec | BrewField::BrewTimeMin => Some(self.time_range),
            BrewField::GrindSize | BrewField::PouringNote => None,
        }
    }
}

static METHODS: [MethodInfo; 4] = [
    MethodInfo {
        method: BrewMethod::Espresso,
        name: "Espresso",
        fields: &[
            BrewField::DoseG,
            BrewField::YieldG,
            BrewField::GrindSize,
            BrewField::WaterTempC,
            BrewField::BrewTimeSec,
            BrewField::PressureBar,
        ],
        ratio_label: "Yield/Dose",
        time_unit: TimeUnit::Seconds,
        time_range: Range::new(15.0, 45.0),
        water_range: None,
    },
    MethodInfo {
        method: BrewMethod::Pourover,
        name: "Pour Over",
        fields: &[
            BrewField::DoseG,
            BrewField::WaterMl,
            BrewField::GrindSize,
            BrewField::WaterTempC,
            BrewField::BrewTimeSec,
            BrewField::PouringNote,
        ],
        ratio_label: "Water/Dose",
        time_unit: TimeUnit::Seconds,
        time_range: Range::new(120.0, 360.0),
        water_range: Some(Range::new(150.0, 1000.0)),
    },
    MethodInfo {
        method: BrewMethod::Frenchpress,
        name: "French Press",
        fields: &[
            BrewField::DoseG,
            BrewField::WaterMl,
            BrewField::GrindSize,
            BrewField::WaterTempC,
            BrewField::BrewTimeMin,
        ],
        ratio_label: "Water/Dose",
        time_unit: TimeUnit::Minutes,
        time_range: Range::new(3.0, 8.0),
        water_range: Some(Range::new(250.0, 1000.0)),
    },
    MethodInfo {
        method: BrewMethod::Mokapot,
        name: "Moka Pot",
        fields: &[
            BrewField::DoseG,
            BrewField::WaterMl,
            BrewField::GrindSize,
            BrewField::WaterTempC,
            BrewField::BrewTimeMin,
        ],
        ratio_label: "Water/Dose",
        time_unit: TimeUnit::Minutes,
        time_range: Range::new(2.0, 6.0),
        water_range: Some(Range::new(50.0, 400.0)),
    },
];

#[must_use]
pub fn method_info(method: BrewMethod) -> &'static MethodInfo {
    match method {
        BrewMethod::Espresso => &METHODS[0],
        BrewMethod::Pourover => &METHODS[1],
        BrewMethod::Frenchpress => &METHODS[2],
        BrewMethod::Mokapot => &METHODS[3],
    }
}

#[must_use]
pub fn all_methods() -> &'static [MethodInfo] {
    &METHODS
}

/// Look up a method by key. Fails with `BrewError::UnknownMethod`.
pub fn lookup(key: &str) -> Result<&'static MethodInfo> {
    let method: BrewMethod = key.parse()?;
    Ok(method_info(method))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ratio {
    pub value: String,
    pub label: &'static str,
}

/// Placeholder shown when a ratio cannot be computed.
pub const NO_RATIO: &str = "--";

/// Compute the brew ratio shown next to the form: yield over dose for espresso,
/// water over dose for everything else.
#[must_use]
pub fn calculate_ratio(method: BrewMethod, params: &BrewParams) -> Ratio {
    let info = method_info(method);
    let numerator = match method {
        // Migrated espresso records only carry water
        BrewMethod::Espresso => params.yield_g.or(params.water_ml),
        _ => params.water_ml,
    };
    let value = match (numerator, params.dose_g) {
        (Some(n), Some(d)) if n > 0.0 && d > 0.0 => format!("{:.1}:1", n / d),
        _ => NO_RATIO.to_string(),
    };
    Ratio {
        value,
        label: info.ratio_label,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeWarning {
    pub field: BrewField,
    pub value: f64,
    pub range: Range,
}

impl std::fmt::Display for RangeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} outside recommended range {}-{}",
            self.field.label(),
            self.value,
            self.range.min,
            self.range.max
        )
    }
}

/// Values outside the recommended range for the method. These are hints; a
/// brew with warnings is still saved.
#[must_use]
pub fn range_warnings(method: BrewMethod, params: &BrewParams) -> Vec<RangeWarning> {
    let info = method_info(method);
    info.fields
        .iter()
        .filter_map(|field| {
            let value = params.numeric(*field)?;
            let range = info.range_for(*field)?;
            (!range.contains(value)).then_some(RangeWarning {
                field: *field,
                value,
                range,
            })
        })
        .collect()
}
