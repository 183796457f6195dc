use anyhow::Result;
use clap::Args;

use brewlog_core::db::Database;
use brewlog_core::methods::{TimeUnit, calculate_ratio, method_info, range_warnings};
use brewlog_core::models::{BrewMethod, BrewParams, NewBrew, TasteSet};
use brewlog_core::{BrewService, RecordOutcome};

use crate::openai::OpenAiClient;

use super::helpers::{
    exit_if_not_found, fmt_opt, fmt_taste, json_error, print_brew_table, print_suggestion,
    short_id,
};

/// Brew parameters as typed on the command line.
#[derive(Debug, Args)]
pub(crate) struct BrewParamArgs {
    /// Brew method: espresso, pourover, frenchpress, mokapot
    #[arg(short, long)]
    pub method: String,
    /// Coffee dose in grams
    #[arg(long)]
    pub dose: Option<f64>,
    /// Espresso yield in grams
    #[arg(long = "yield")]
    pub yield_g: Option<f64>,
    /// Water in ml
    #[arg(long)]
    pub water: Option<f64>,
    /// Grind size (e.g. "fine", "medium-coarse")
    #[arg(long)]
    pub grind: Option<String>,
    /// Water temperature in °C
    #[arg(long)]
    pub temp: Option<f64>,
    /// Brew time: seconds for espresso/pourover, minutes for frenchpress/mokapot
    #[arg(long)]
    pub time: Option<f64>,
    /// Pump pressure in bar (espresso)
    #[arg(long)]
    pub pressure: Option<f64>,
    /// Pouring technique note (pour over)
    #[arg(long)]
    pub pour_note: Option<String>,
}

impl BrewParamArgs {
    fn into_params(self, method: BrewMethod) -> BrewParams {
        let mut params = BrewParams {
            dose_g: self.dose,
            yield_g: self.yield_g,
            water_ml: self.water,
            grind_size: self.grind,
            water_temp_c: self.temp,
            pressure_bar: self.pressure,
            pouring_note: self.pour_note,
            ..Default::default()
        };
        match method_info(method).time_unit {
            TimeUnit::Seconds => params.brew_time_sec = self.time,
            TimeUnit::Minutes => params.brew_time_min = self.time,
        }
        params
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn cmd_brew_log(
    svc: &BrewService<Database>,
    provider: &OpenAiClient,
    bean: &str,
    args: BrewParamArgs,
    taste: &str,
    notes: Option<String>,
    offline: bool,
    json: bool,
) -> Result<()> {
    let bean = svc
        .resolve_bean(bean)
        .map_err(|e| exit_if_not_found(e, json))?;
    let method: BrewMethod = args.method.parse()?;
    let params = args.into_params(method);
    let taste = TasteSet::parse_list(taste)?;

    for warning in range_warnings(method, &params) {
        eprintln!("Warning: {warning}");
    }

    if offline {
        svc.reconciler().observe(false);
    }
    let outcome = svc
        .record_brew(
            provider,
            NewBrew {
                bean_id: bean.id.clone(),
                method,
                params,
                taste,
                notes,
            },
        )
        .await?;

    match outcome {
        RecordOutcome::Saved { brew, suggestion } => {
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "brew": brew,
                        "ratio": calculate_ratio(brew.method, &brew.params),
                        "suggestion": suggestion,
                    }))?
                );
            } else {
                let info = method_info(brew.method);
                let ratio = calculate_ratio(brew.method, &brew.params);
                println!(
                    "Logged {} brew {} for '{}': {} {} ({}), {}",
                    info.name,
                    short_id(&brew.id),
                    bean.name,
                    ratio.label,
                    ratio.value,
                    fmt_opt(brew.params.brew_time_for(brew.method), info.time_unit.suffix()),
                    fmt_taste(&brew.taste)
                );
                if let Some(ref s) = suggestion {
                    println!();
                    print_suggestion(s);
                }
            }
        }
        RecordOutcome::Queued(pending) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&pending)?);
            } else {
                println!(
                    "Offline: queued brew {} for '{}'. Run `brewlog sync` to add it to the log.",
                    short_id(&pending.brew.id),
                    bean.name
                );
            }
        }
    }
    Ok(())
}

pub(crate) fn cmd_brew_list(
    svc: &BrewService<Database>,
    bean: Option<&str>,
    limit: usize,
    json: bool,
) -> Result<()> {
    let brews = match bean {
        Some(b) => {
            let bean = svc
                .resolve_bean(b)
                .map_err(|e| exit_if_not_found(e, json))?;
            let mut brews = svc.get_brews_for_bean(&bean.id)?;
            brews.truncate(limit);
            brews
        }
        None => svc.get_recent_brews(limit)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&brews)?);
    } else if brews.is_empty() {
        eprintln!("No brews yet. Use `brewlog brew log` to record one.");
    } else {
        let beans = svc.get_beans()?;
        let refs: Vec<_> = brews.iter().collect();
        print_brew_table(&refs, &beans);
    }
    Ok(())
}

pub(crate) fn cmd_brew_delete(svc: &BrewService<Database>, id: &str, json: bool) -> Result<()> {
    // Accept the short id shown in tables
    let matches: Vec<String> = svc
        .get_recent_brews(usize::MAX)?
        .into_iter()
        .map(|b| b.id)
        .chain(svc.get_pending_brews()?.into_iter().map(|p| p.brew.id))
        .filter(|full| full == id || full.starts_with(id))
        .collect();

    let full_id = match matches.as_slice() {
        [one] => one.clone(),
        [] => id.to_string(),
        _ => {
            let message = format!("Brew id '{id}' is ambiguous ({} matches)", matches.len());
            if json {
                println!("{}", json_error(&message));
            } else {
                eprintln!("{message}");
            }
            std::process::exit(2);
        }
    };

    svc.delete_brew(&full_id)
        .map_err(|e| exit_if_not_found(e, json))?;

    if json {
        println!("{}", serde_json::json!({ "deleted": full_id }));
    } else {
        println!("Deleted brew {}", short_id(&full_id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(method: &str, time: f64) -> BrewParamArgs {
        BrewParamArgs {
            method: method.to_string(),
            dose: Some(18.0),
            yield_g: Some(36.0),
            water: None,
            grind: Some("fine".to_string()),
            temp: Some(93.0),
            time: Some(time),
            pressure: Some(9.0),
            pour_note: None,
        }
    }

    #[test]
    fn test_time_goes_to_method_unit() {
        let espresso = args("espresso", 28.0).into_params(BrewMethod::Espresso);
        assert_eq!(espresso.brew_time_sec, Some(28.0));
        assert!(espresso.brew_time_min.is_none());

        let french = args("frenchpress", 4.0).into_params(BrewMethod::Frenchpress);
        assert_eq!(french.brew_time_min, Some(4.0));
        assert!(french.brew_time_sec.is_none());
    }
}
