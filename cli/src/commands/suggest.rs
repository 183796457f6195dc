use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use brewlog_core::BrewService;
use brewlog_core::db::Database;
use brewlog_core::methods::{all_methods, calculate_ratio, lookup};
use brewlog_core::models::{BrewMethod, BrewParams};

use crate::openai::OpenAiClient;

use super::helpers::{exit_if_not_found, fmt_num, print_suggestion};

pub(crate) async fn cmd_suggest(
    svc: &BrewService<Database>,
    provider: &OpenAiClient,
    bean: &str,
    method: &str,
    offline: bool,
    json: bool,
) -> Result<()> {
    let bean = svc
        .resolve_bean(bean)
        .map_err(|e| exit_if_not_found(e, json))?;
    let method: BrewMethod = method.parse()?;

    if offline {
        svc.reconciler().observe(false);
    }
    let suggestion = svc.suggestion_for_bean(provider, &bean.id, method).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&suggestion)?);
    } else {
        println!("Bean: {}", bean.name);
        print_suggestion(&suggestion);
    }
    Ok(())
}

pub(crate) fn cmd_ratio(
    method: &str,
    dose: Option<f64>,
    yield_g: Option<f64>,
    water: Option<f64>,
    json: bool,
) -> Result<()> {
    let info = lookup(method)?;
    let params = BrewParams {
        dose_g: dose,
        yield_g,
        water_ml: water,
        ..Default::default()
    };
    let ratio = calculate_ratio(info.method, &params);

    if json {
        println!("{}", serde_json::to_string_pretty(&ratio)?);
    } else {
        println!("{} ({}): {}", info.name, ratio.label, ratio.value);
    }
    Ok(())
}

pub(crate) fn cmd_methods(json: bool) -> Result<()> {
    let methods = all_methods();

    if json {
        println!("{}", serde_json::to_string_pretty(methods)?);
        return Ok(());
    }

    #[derive(Tabled)]
    struct MethodRow {
        #[tabled(rename = "Key")]
        key: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Ratio")]
        ratio: String,
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Water (ml)")]
        water: String,
        #[tabled(rename = "Fields")]
        fields: String,
    }

    let rows: Vec<MethodRow> = methods
        .iter()
        .map(|m| {
            let suffix = m.time_unit.suffix();
            MethodRow {
                key: m.method.key().to_string(),
                name: m.name.to_string(),
                ratio: m.ratio_label.to_string(),
                time: format!(
                    "{}-{}{suffix}",
                    fmt_num(m.time_range.min),
                    fmt_num(m.time_range.max)
                ),
                water: m.water_range.map_or_else(
                    || "-".to_string(),
                    |r| format!("{}-{}", fmt_num(r.min), fmt_num(r.max)),
                ),
                fields: m
                    .fields
                    .iter()
                    .map(|f| {
                        if f.is_optional() {
                            format!("{}?", f.key())
                        } else {
                            f.key().to_string()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(", "),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..5)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}
