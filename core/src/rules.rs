//! Rule-based next-brew suggestions, used whenever the remote suggestion
//! service is not configured or fails.
//!
//! Everything here is pure: the same history always yields the same
//! suggestion, and no timestamp is attached.

use crate::methods::{NO_RATIO, TEMP_RANGE, TimeUnit, calculate_ratio, method_info};
use crate::migration::round1;
use crate::models::{Brew, BrewMethod, Suggestion, TasteTag};

const BASELINE_EXPLANATION: &str = "Using previous parameters as baseline for next brew.";

const COARSER: &str = "slightly coarser";
const FINER: &str = "slightly finer";

struct MethodDefaults {
    grind: &'static str,
    ratio: &'static str,
    brew_time: f64,
    water_temp_c: f64,
    pressure_bar: Option<f64>,
    explanation: &'static str,
}

fn defaults(method: BrewMethod) -> MethodDefaults {
    match method {
        BrewMethod::Espresso => MethodDefaults {
            grind: "fine",
            ratio: "2:1",
            brew_time: 28.0,
            water_temp_c: 93.0,
            pressure_bar: Some(9.0),
            explanation: "Standard espresso: a 1:2 shot in about 28 seconds at 9 bar.",
        },
        BrewMethod::Pourover => MethodDefaults {
            grind: "medium-fine",
            ratio: "15:1",
            brew_time: 180.0,
            water_temp_c: 94.0,
            pressure_bar: None,
            explanation: "Medium-fine grind at 15:1 for a clean, bright cup in about three minutes.",
        },
        BrewMethod::Frenchpress => MethodDefaults {
            grind: "coarse",
            ratio: "15:1",
            brew_time: 4.0,
            water_temp_c: 95.0,
            pressure_bar: None,
            explanation: "Coarse grind and a four minute steep for a full-bodied cup.",
        },
        BrewMethod::Mokapot => MethodDefaults {
            grind: "fine",
            ratio: "7:1",
            brew_time: 3.0,
            water_temp_c: 90.0,
            pressure_bar: None,
            explanation: "Fine grind with pre-heated water, off the heat as soon as it gurgles.",
        },
    }
}

/// The fixed starting point for a method with no brew history.
#[must_use]
pub fn default_suggestion(method: BrewMethod) -> Suggestion {
    let d = defaults(method);
    Suggestion {
        method,
        grind_size: d.grind.to_string(),
        ratio: d.ratio.to_string(),
        brew_time: d.brew_time,
        water_temp_c: d.water_temp_c,
        pressure_bar: d.pressure_bar,
        explanation: d.explanation.to_string(),
        updated_at: None,
    }
}

#[derive(Debug, Clone, Copy)]
enum TimeChange {
    Add(f64),
    Scale(f64),
}

struct Adjustment {
    grind: &'static str,
    time: TimeChange,
    temp_delta: Option<f64>,
    ratio: Option<&'static str>,
    explanation: &'static str,
}

fn adjustment(method: BrewMethod, tag: TasteTag) -> Option<Adjustment> {
    let adj = match (method, tag) {
        (BrewMethod::Espresso, TasteTag::TooBitter) => Adjustment {
            grind: COARSER,
            time: TimeChange::Add(-3.0),
            temp_delta: None,
            ratio: Some("1.9:1"),
            explanation: "Grind slightly coarser and stop the shot 3 seconds earlier to reduce bitterness.",
        },
        (BrewMethod::Espresso, TasteTag::TooSour) => Adjustment {
            grind: FINER,
            time: TimeChange::Add(3.0),
            temp_delta: None,
            ratio: Some("2.3:1"),
            explanation: "Grind slightly finer and let the shot run 3 seconds longer to pull more sweetness.",
        },
        (BrewMethod::Pourover, TasteTag::TooBitter) => Adjustment {
            grind: COARSER,
            time: TimeChange::Scale(0.9),
            temp_delta: Some(-2.0),
            ratio: Some("16:1"),
            explanation: "Go coarser with a shorter brew and slightly cooler water to tame over-extraction.",
        },
        (BrewMethod::Pourover, TasteTag::TooSour) => Adjustment {
            grind: FINER,
            time: TimeChange::Scale(1.1),
            temp_delta: Some(2.0),
            ratio: Some("14:1"),
            explanation: "Go finer with a longer brew and slightly hotter water to extract more.",
        },
        (BrewMethod::Frenchpress, TasteTag::TooBitter) => Adjustment {
            grind: COARSER,
            time: TimeChange::Add(-0.5),
            temp_delta: Some(-2.0),
            ratio: None,
            explanation: "Go coarser and press 30 seconds sooner with slightly cooler water.",
        },
        (BrewMethod::Frenchpress, TasteTag::TooSour) => Adjustment {
            grind: FINER,
            time: TimeChange::Add(0.5),
            temp_delta: Some(2.0),
            ratio: None,
            explanation: "Go finer and steep 30 seconds longer with slightly hotter water.",
        },
        (BrewMethod::Mokapot, TasteTag::TooBitter) => Adjustment {
            grind: COARSER,
            time: TimeChange::Scale(0.85),
            temp_delta: Some(-3.0),
            ratio: None,
            explanation: "Go coarser and take the pot off the heat sooner to avoid a burnt taste.",
        },
        (BrewMethod::Mokapot, TasteTag::TooSour) => Adjustment {
            grind: FINER,
            time: TimeChange::Scale(1.15),
            temp_delta: Some(3.0),
            ratio: None,
            explanation: "Go finer and start with hotter water for a fuller extraction.",
        },
        _ => return None,
    };
    Some(adj)
}

/// Parameters of the previous brew, with method defaults filling the gaps.
fn baseline(previous: &Brew, method: BrewMethod) -> Suggestion {
    let d = defaults(method);
    let p = &previous.params;
    let ratio = calculate_ratio(method, p).value;
    Suggestion {
        method,
        grind_size: p
            .grind_size
            .clone()
            .filter(|g| !g.trim().is_empty())
            .unwrap_or_else(|| d.grind.to_string()),
        ratio: if ratio == NO_RATIO {
            d.ratio.to_string()
        } else {
            ratio
        },
        brew_time: p.brew_time_for(method).unwrap_or(d.brew_time),
        water_temp_c: p.water_temp_c.unwrap_or(d.water_temp_c),
        pressure_bar: d.pressure_bar.map(|default| p.pressure_bar.unwrap_or(default)),
        explanation: BASELINE_EXPLANATION.to_string(),
        updated_at: None,
    }
}

fn round_time(v: f64, unit: TimeUnit) -> f64 {
    match unit {
        TimeUnit::Seconds => v.round(),
        TimeUnit::Minutes => round1(v),
    }
}

/// Suggest the next brew from `history`, newest first.
///
/// Only the most recent brew is inspected. Its primary taste tag (first in
/// insertion order) selects the adjustment; numeric results are clamped to the
/// method's bounds.
#[must_use]
pub fn suggest(history: &[Brew], method: BrewMethod) -> Suggestion {
    let Some(previous) = history.first() else {
        return default_suggestion(method);
    };

    let mut next = baseline(previous, method);
    let Some(adj) = previous.taste.primary().and_then(|t| adjustment(method, t)) else {
        return next;
    };

    let info = method_info(method);
    let time = match adj.time {
        TimeChange::Add(delta) => next.brew_time + delta,
        TimeChange::Scale(factor) => next.brew_time * factor,
    };
    next.brew_time = info.time_range.clamp(round_time(time, info.time_unit));
    if let Some(delta) = adj.temp_delta {
        next.water_temp_c = TEMP_RANGE.clamp(next.water_temp_c + delta);
    }
    next.grind_size = adj.grind.to_string();
    if let Some(ratio) = adj.ratio {
        next.ratio = ratio.to_string();
    }
    next.explanation = adj.explanation.to_string();
    next
}
