use std::process;

use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use brewlog_core::error::BrewError;
use brewlog_core::methods::{calculate_ratio, method_info};
use brewlog_core::models::{Bean, Brew, Suggestion, TasteSet};

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn is_not_found(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<BrewError>(),
        Some(BrewError::NotFound { .. })
    )
}

/// Print a not-found error and exit 2. Any other error is returned.
pub(crate) fn exit_if_not_found(err: anyhow::Error, json: bool) -> anyhow::Error {
    if !is_not_found(&err) {
        return err;
    }
    if json {
        println!("{}", json_error(&err.to_string()));
    } else {
        eprintln!("{err}");
    }
    process::exit(2);
}

/// Render a number without a trailing `.0`.
pub(crate) fn fmt_num(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.0}")
    } else {
        format!("{v:.1}")
    }
}

pub(crate) fn fmt_opt(v: Option<f64>, suffix: &str) -> String {
    v.map_or_else(|| "-".to_string(), |v| format!("{}{suffix}", fmt_num(v)))
}

pub(crate) fn fmt_taste(taste: &TasteSet) -> String {
    if taste.is_empty() {
        return "-".to_string();
    }
    taste.iter().map(|t| t.label()).collect::<Vec<_>>().join(", ")
}

pub(crate) fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Date part of an RFC 3339 timestamp.
pub(crate) fn fmt_date(ts: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(ts).map_or_else(
        |_| "-".to_string(),
        |dt| dt.format("%Y-%m-%d %H:%M").to_string(),
    )
}

pub(crate) fn print_brew_table(brews: &[&Brew], beans: &[Bean]) {
    #[derive(Tabled)]
    struct BrewRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Bean")]
        bean: String,
        #[tabled(rename = "Method")]
        method: String,
        #[tabled(rename = "Ratio")]
        ratio: String,
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Taste")]
        taste: String,
    }

    let rows: Vec<BrewRow> = brews
        .iter()
        .map(|b| {
            let info = method_info(b.method);
            let bean = beans
                .iter()
                .find(|bean| bean.id == b.bean_id)
                .map_or("?", |bean| bean.name.as_str());
            BrewRow {
                id: short_id(&b.id).to_string(),
                date: fmt_date(&b.created_at),
                bean: truncate(bean, 25),
                method: info.name.to_string(),
                ratio: calculate_ratio(b.method, &b.params).value,
                time: fmt_opt(b.params.brew_time_for(b.method), info.time_unit.suffix()),
                taste: fmt_taste(&b.taste),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(4..6)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_suggestion(s: &Suggestion) {
    let info = method_info(s.method);
    println!("Suggestion for {}:", info.name);
    println!("  Grind:       {}", s.grind_size);
    println!("  Ratio:       {} ({})", s.ratio, info.ratio_label);
    println!(
        "  Brew time:   {}{}",
        fmt_num(s.brew_time),
        info.time_unit.suffix()
    );
    println!("  Water temp:  {}°C", fmt_num(s.water_temp_c));
    if let Some(p) = s.pressure_bar {
        println!("  Pressure:    {} bar", fmt_num(p));
    }
    println!("  {}", s.explanation);
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
