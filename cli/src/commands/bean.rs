use anyhow::{Result, bail};
use tabled::{Table, Tabled, settings::Style};

use brewlog_core::BrewService;
use brewlog_core::db::Database;
use brewlog_core::methods::method_info;
use brewlog_core::models::{NewBean, RoastLevel, UpdateBean};

use super::helpers::{exit_if_not_found, fmt_date, fmt_num, print_brew_table, short_id, truncate};

pub(crate) fn cmd_bean_add(svc: &BrewService<Database>, new: NewBean, json: bool) -> Result<()> {
    let bean = svc.create_bean(new)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&bean)?);
    } else {
        println!(
            "Added bean '{}' ({}, {} roast)",
            bean.name,
            short_id(&bean.id),
            bean.roast_level
        );
    }
    Ok(())
}

pub(crate) fn cmd_bean_list(svc: &BrewService<Database>, json: bool) -> Result<()> {
    let beans = svc.get_beans()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&beans)?);
    } else if beans.is_empty() {
        eprintln!("No beans yet. Use `brewlog bean add <name>` to add one.");
    } else {
        #[derive(Tabled)]
        struct BeanRow {
            #[tabled(rename = "ID")]
            id: String,
            #[tabled(rename = "Name")]
            name: String,
            #[tabled(rename = "Origin")]
            origin: String,
            #[tabled(rename = "Roast")]
            roast: String,
            #[tabled(rename = "Added")]
            added: String,
        }

        let rows: Vec<BeanRow> = beans
            .iter()
            .map(|b| BeanRow {
                id: short_id(&b.id).to_string(),
                name: truncate(&b.name, 30),
                origin: b
                    .origin
                    .as_deref()
                    .map(|o| truncate(o, 20))
                    .unwrap_or_default(),
                roast: b.roast_level.to_string(),
                added: fmt_date(&b.created_at),
            })
            .collect();

        let table = Table::new(&rows).with(Style::rounded()).to_string();
        println!("{table}");
    }
    Ok(())
}

pub(crate) fn cmd_bean_show(svc: &BrewService<Database>, bean: &str, json: bool) -> Result<()> {
    let bean = svc
        .resolve_bean(bean)
        .map_err(|e| exit_if_not_found(e, json))?;
    let brews = svc.get_brews_for_bean(&bean.id)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "bean": bean,
                "brews": brews,
            }))?
        );
        return Ok(());
    }

    println!("{} ({})", bean.name, bean.id);
    if let Some(ref origin) = bean.origin {
        println!("  Origin: {origin}");
    }
    println!("  Roast:  {}", bean.roast_level);
    if let Some(ref notes) = bean.notes {
        println!("  Notes:  {notes}");
    }
    for (method, s) in &bean.suggestions {
        let info = method_info(*method);
        println!(
            "  Next {}: {}, {}, {}{} ({})",
            info.name,
            s.grind_size,
            s.ratio,
            fmt_num(s.brew_time),
            info.time_unit.suffix(),
            s.updated_at.as_deref().map_or_else(|| "-".to_string(), fmt_date)
        );
    }
    if brews.is_empty() {
        println!("\nNo brews logged for this bean.");
    } else {
        println!();
        let refs: Vec<_> = brews.iter().collect();
        print_brew_table(&refs, std::slice::from_ref(&bean));
    }
    Ok(())
}

pub(crate) fn cmd_bean_update(
    svc: &BrewService<Database>,
    bean: &str,
    update: UpdateBean,
    json: bool,
) -> Result<()> {
    if update.name.is_none()
        && update.origin.is_none()
        && update.roast_level.is_none()
        && update.notes.is_none()
    {
        bail!("Nothing to update. Provide at least one of --name, --origin, --roast, or --notes");
    }
    let existing = svc
        .resolve_bean(bean)
        .map_err(|e| exit_if_not_found(e, json))?;
    let bean = svc.update_bean(&existing.id, update)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&bean)?);
    } else {
        println!("Updated bean '{}'", bean.name);
    }
    Ok(())
}

pub(crate) fn cmd_bean_delete(svc: &BrewService<Database>, bean: &str, json: bool) -> Result<()> {
    let bean = svc
        .resolve_bean(bean)
        .map_err(|e| exit_if_not_found(e, json))?;
    let deleted = svc.delete_bean(&bean.id)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "deleted": bean.id,
                "brews": deleted.brews,
                "pending": deleted.pending,
            })
        );
    } else {
        println!(
            "Deleted bean '{}' and {} brew(s){}",
            bean.name,
            deleted.brews,
            if deleted.pending > 0 {
                format!(", {} pending", deleted.pending)
            } else {
                String::new()
            }
        );
    }
    Ok(())
}

pub(crate) fn parse_roast(s: Option<&str>) -> Result<Option<RoastLevel>> {
    Ok(s.map(str::parse::<RoastLevel>).transpose()?)
}
