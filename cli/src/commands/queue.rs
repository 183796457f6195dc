use anyhow::{Result, bail};

use brewlog_core::BrewService;
use brewlog_core::db::Database;
use brewlog_core::models::OnboardingStatus;

use super::helpers::print_brew_table;

pub(crate) fn cmd_migrate(svc: &BrewService<Database>, json: bool) -> Result<()> {
    let report = svc.migrate_brew_data()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    if report.migrated == 0 {
        let readable = report.total - report.unreadable;
        println!("All {readable} brew(s) already use the current format");
    } else {
        println!(
            "Migrated {} of {} brew(s) to the current format",
            report.migrated, report.total
        );
    }
    if report.unreadable > 0 {
        eprintln!(
            "Warning: {} brew record(s) could not be read and were left as they are",
            report.unreadable
        );
    }
    Ok(())
}

pub(crate) fn cmd_pending(svc: &BrewService<Database>, json: bool) -> Result<()> {
    let pending = svc.get_pending_brews()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&pending)?);
    } else if pending.is_empty() {
        eprintln!("No brews waiting to sync.");
    } else {
        let beans = svc.get_beans()?;
        let refs: Vec<_> = pending.iter().map(|p| &p.brew).collect();
        print_brew_table(&refs, &beans);
        println!("{} brew(s) waiting. Run `brewlog sync` to add them.", pending.len());
    }
    Ok(())
}

/// Replay a reconnect: wait out the settle delay, then flush the queue.
pub(crate) async fn cmd_sync(svc: &BrewService<Database>, json: bool) -> Result<()> {
    svc.reconciler().observe(false);
    let report = svc.on_connectivity_change(true).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match report {
            Some(r) if r.flushed == 0 && r.duplicates == 0 => println!("Nothing to sync"),
            Some(r) => {
                println!("Synced {} brew(s)", r.flushed);
                if r.duplicates > 0 {
                    println!("Dropped {} already-synced brew(s) from the queue", r.duplicates);
                }
            }
            None => eprintln!("Sync skipped: connection changed before it settled"),
        }
    }
    Ok(())
}

fn parse_onboarding(s: &str) -> Result<OnboardingStatus> {
    match s.trim().to_lowercase().as_str() {
        "not-started" | "not_started" | "reset" => Ok(OnboardingStatus::NotStarted),
        "skipped" | "skip" => Ok(OnboardingStatus::Skipped),
        "completed" | "complete" | "done" => Ok(OnboardingStatus::Completed),
        _ => bail!("Invalid onboarding status '{s}'. Use not-started, skipped, or completed"),
    }
}

pub(crate) fn cmd_onboarding(
    svc: &BrewService<Database>,
    status: Option<&str>,
    json: bool,
) -> Result<()> {
    let status = match status {
        Some(s) => {
            let status = parse_onboarding(s)?;
            svc.set_onboarding_status(status)?;
            status
        }
        None => svc.get_onboarding_status()?,
    };

    if json {
        println!("{}", serde_json::json!({ "onboarding": status }));
    } else {
        println!("Onboarding: {}", status.key());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_onboarding() {
        assert_eq!(parse_onboarding("Completed").unwrap(), OnboardingStatus::Completed);
        assert_eq!(parse_onboarding("skip").unwrap(), OnboardingStatus::Skipped);
        assert_eq!(parse_onboarding("not-started").unwrap(), OnboardingStatus::NotStarted);
        assert!(parse_onboarding("maybe").is_err());
    }
}
