use std::cmp::Reverse;
use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Local};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::BrewError;
use crate::migration::StoredBrew;
use crate::models::{
    Bean, Brew, BrewMethod, NewBean, NewBrew, OnboardingStatus, PendingBrew, Suggestion,
    UpdateBean, validate_bean_name,
};
use crate::store::KeyValueStore;

pub const BEANS_KEY: &str = "coffee_beans";
pub const BREWS_KEY: &str = "coffee_brews";
pub const PENDING_KEY: &str = "coffee_pending_brews";
pub const ONBOARDING_KEY: &str = "onboarding_status";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedBean {
    pub brews: usize,
    pub pending: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushReport {
    /// Appended to the brew log.
    pub flushed: usize,
    /// Already in the brew log, dropped from the queue.
    pub duplicates: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub total: usize,
    pub migrated: usize,
    /// Records matching no known layout. They stay in the log untouched.
    pub unreadable: usize,
}

/// One record of the stored brew log.
enum LogEntry {
    Brew { brew: Brew, legacy: bool },
    /// Written back verbatim on every rewrite.
    Unreadable(Value),
}

impl LogEntry {
    fn parse(index: usize, value: Value) -> Self {
        match StoredBrew::deserialize(&value) {
            Ok(stored) => LogEntry::Brew {
                legacy: stored.is_legacy(),
                brew: stored.normalize(),
            },
            Err(e) => {
                let id = value.get("id").and_then(Value::as_str).unwrap_or("?");
                warn!(index, id, "keeping unreadable brew record as is: {e}");
                LogEntry::Unreadable(value)
            }
        }
    }

    fn current(brew: Brew) -> Self {
        LogEntry::Brew { brew, legacy: false }
    }

    fn brew(&self) -> Option<&Brew> {
        match self {
            LogEntry::Brew { brew, .. } => Some(brew),
            LogEntry::Unreadable(_) => None,
        }
    }

    fn into_value(self) -> Result<Value> {
        match self {
            LogEntry::Brew { brew, .. } => Ok(serde_json::to_value(brew)?),
            LogEntry::Unreadable(value) => Ok(value),
        }
    }
}

/// Typed access to the persisted collections. Every collection is one JSON
/// document under a fixed key, rewritten whole on change.
pub struct Repository<S> {
    store: S,
}

fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s).ok()
}

fn now() -> String {
    Local::now().to_rfc3339()
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl<S: KeyValueStore> Repository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn read<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        match self.store.get(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse '{key}' from the store")),
            None => Ok(T::default()),
        }
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.store
            .set(key, &raw)
            .map_err(|e| BrewError::StoreWrite {
                key: key.to_string(),
                source: e.into(),
            })?;
        Ok(())
    }

    fn read_log(&self) -> Result<Vec<LogEntry>> {
        let raw: Vec<Value> = self.read(BREWS_KEY)?;
        Ok(raw
            .into_iter()
            .enumerate()
            .map(|(index, value)| LogEntry::parse(index, value))
            .collect())
    }

    fn write_log(&self, log: Vec<LogEntry>) -> Result<()> {
        let values = log
            .into_iter()
            .map(LogEntry::into_value)
            .collect::<Result<Vec<_>>>()?;
        self.write(BREWS_KEY, &values)
    }

    // --- Beans ---

    pub fn get_beans(&self) -> Result<Vec<Bean>> {
        self.read(BEANS_KEY)
    }

    pub fn get_bean(&self, id: &str) -> Result<Bean> {
        self.get_beans()?
            .into_iter()
            .find(|b| b.id == id)
            .ok_or_else(|| BrewError::not_found("Bean", id).into())
    }

    /// Look a bean up by id, then by case-insensitive name.
    pub fn resolve_bean(&self, id_or_name: &str) -> Result<Bean> {
        let beans = self.get_beans()?;
        let needle = id_or_name.trim();
        if let Some(bean) = beans.iter().find(|b| b.id == needle) {
            return Ok(bean.clone());
        }
        beans
            .into_iter()
            .find(|b| b.name.eq_ignore_ascii_case(needle))
            .ok_or_else(|| BrewError::not_found("Bean", needle).into())
    }

    pub fn create_bean(&self, new: NewBean) -> Result<Bean> {
        let name = validate_bean_name(&new.name)?;
        let bean = Bean {
            id: Uuid::new_v4().to_string(),
            name,
            origin: non_empty(new.origin),
            roast_level: new.roast_level,
            notes: non_empty(new.notes),
            created_at: now(),
            suggestions: std::collections::BTreeMap::new(),
        };
        let mut beans = self.get_beans()?;
        beans.push(bean.clone());
        self.write(BEANS_KEY, &beans)?;
        debug!(bean_id = %bean.id, "created bean");
        Ok(bean)
    }

    /// Empty strings clear `origin` and `notes`.
    pub fn update_bean(&self, id: &str, update: UpdateBean) -> Result<Bean> {
        let mut beans = self.get_beans()?;
        let bean = beans
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| BrewError::not_found("Bean", id))?;

        if let Some(name) = update.name {
            bean.name = validate_bean_name(&name)?;
        }
        if let Some(origin) = update.origin {
            bean.origin = non_empty(Some(origin));
        }
        if let Some(roast_level) = update.roast_level {
            bean.roast_level = roast_level;
        }
        if let Some(notes) = update.notes {
            bean.notes = non_empty(Some(notes));
        }
        let updated = bean.clone();
        self.write(BEANS_KEY, &beans)?;
        Ok(updated)
    }

    /// Remove a bean together with its brews and queued brews.
    pub fn delete_bean(&self, id: &str) -> Result<DeletedBean> {
        let mut beans = self.get_beans()?;
        let before = beans.len();
        beans.retain(|b| b.id != id);
        if beans.len() == before {
            return Err(BrewError::not_found("Bean", id).into());
        }

        let mut log = self.read_log()?;
        let brews_before = log.len();
        log.retain(|e| e.brew().is_none_or(|b| b.bean_id != id));

        let mut pending = self.get_pending_brews()?;
        let pending_before = pending.len();
        pending.retain(|p| p.brew.bean_id != id);

        let deleted = DeletedBean {
            brews: brews_before - log.len(),
            pending: pending_before - pending.len(),
        };
        // Dependents first so a failure never leaves orphaned brews
        if deleted.brews > 0 {
            self.write_log(log)?;
        }
        if deleted.pending > 0 {
            self.write(PENDING_KEY, &pending)?;
        }
        self.write(BEANS_KEY, &beans)?;
        info!(
            bean_id = id,
            brews = deleted.brews,
            pending = deleted.pending,
            "deleted bean"
        );
        Ok(deleted)
    }

    // --- Suggestion cache ---

    /// Cache a suggestion on its bean, stamping `updatedAt`.
    pub fn save_bean_suggestion(
        &self,
        bean_id: &str,
        suggestion: Suggestion,
    ) -> Result<Suggestion> {
        let mut beans = self.get_beans()?;
        let bean = beans
            .iter_mut()
            .find(|b| b.id == bean_id)
            .ok_or_else(|| BrewError::not_found("Bean", bean_id))?;
        let stamped = Suggestion {
            updated_at: Some(now()),
            ..suggestion
        };
        bean.suggestions.insert(stamped.method, stamped.clone());
        self.write(BEANS_KEY, &beans)?;
        Ok(stamped)
    }

    pub fn get_bean_suggestion(
        &self,
        bean_id: &str,
        method: BrewMethod,
    ) -> Result<Option<Suggestion>> {
        let bean = self.get_bean(bean_id)?;
        Ok(bean.suggestions.get(&method).cloned())
    }

    // --- Brews ---

    /// Every readable brew in log order, legacy records upgraded in memory.
    pub fn get_brews(&self) -> Result<Vec<Brew>> {
        Ok(self
            .read_log()?
            .into_iter()
            .filter_map(|e| match e {
                LogEntry::Brew { brew, .. } => Some(brew),
                LogEntry::Unreadable(_) => None,
            })
            .collect())
    }

    /// Brews for a bean, newest first. Records without a parseable timestamp
    /// sort last; ties keep the later log position first.
    pub fn get_brews_for_bean(&self, bean_id: &str) -> Result<Vec<Brew>> {
        let brews = self
            .get_brews()?
            .into_iter()
            .filter(|b| b.bean_id == bean_id)
            .collect();
        Ok(newest_first(brews))
    }

    /// History fed to the suggestion engines: one bean, one method, newest first.
    pub fn recent_history(
        &self,
        bean_id: &str,
        method: BrewMethod,
        limit: usize,
    ) -> Result<Vec<Brew>> {
        Ok(self
            .get_brews_for_bean(bean_id)?
            .into_iter()
            .filter(|b| b.method == method)
            .take(limit)
            .collect())
    }

    pub fn get_recent_brews(&self, limit: usize) -> Result<Vec<Brew>> {
        let mut brews = newest_first(self.get_brews()?);
        brews.truncate(limit);
        Ok(brews)
    }

    /// Validate a new brew and assign its id and timestamp without storing it.
    pub fn prepare_brew(&self, new: NewBrew) -> Result<Brew> {
        new.validate()?;
        self.get_bean(&new.bean_id)?;
        Ok(Brew {
            id: Uuid::new_v4().to_string(),
            bean_id: new.bean_id,
            method: new.method,
            params: new.params.retain_for(new.method),
            taste: new.taste,
            notes: non_empty(new.notes),
            created_at: now(),
        })
    }

    pub fn append_brew(&self, brew: Brew) -> Result<Brew> {
        let mut log = self.read_log()?;
        log.push(LogEntry::current(brew.clone()));
        self.write_log(log)?;
        debug!(brew_id = %brew.id, method = %brew.method, "saved brew");
        Ok(brew)
    }

    pub fn save_brew(&self, new: NewBrew) -> Result<Brew> {
        let brew = self.prepare_brew(new)?;
        self.append_brew(brew)
    }

    /// Delete from the log, or from the pending queue if the brew has not been
    /// flushed yet.
    pub fn delete_brew(&self, id: &str) -> Result<()> {
        let mut log = self.read_log()?;
        let before = log.len();
        log.retain(|e| e.brew().is_none_or(|b| b.id != id));
        if log.len() != before {
            return self.write_log(log);
        }

        let mut pending = self.get_pending_brews()?;
        let before = pending.len();
        pending.retain(|p| p.brew.id != id);
        if pending.len() != before {
            return self.write(PENDING_KEY, &pending);
        }
        Err(BrewError::not_found("Brew", id).into())
    }

    /// Rewrite the brew log with legacy records upgraded. Writes nothing when
    /// every record is already current. Unreadable records are kept in place.
    pub fn migrate_brew_data(&self) -> Result<MigrationReport> {
        let log = self.read_log()?;
        let mut report = MigrationReport {
            total: log.len(),
            ..MigrationReport::default()
        };
        for entry in &log {
            match entry {
                LogEntry::Brew { legacy: true, .. } => report.migrated += 1,
                LogEntry::Brew { .. } => {}
                LogEntry::Unreadable(_) => report.unreadable += 1,
            }
        }
        if report.migrated == 0 {
            debug!(total = report.total, "brew log already current");
            return Ok(report);
        }
        self.write_log(log)?;
        info!(
            total = report.total,
            migrated = report.migrated,
            unreadable = report.unreadable,
            "migrated legacy brews"
        );
        Ok(report)
    }

    // --- Pending queue ---

    pub fn get_pending_brews(&self) -> Result<Vec<PendingBrew>> {
        self.read(PENDING_KEY)
    }

    pub fn enqueue_pending_brew(&self, brew: Brew) -> Result<PendingBrew> {
        let mut pending = self.get_pending_brews()?;
        let entry = PendingBrew::new(brew);
        pending.push(entry.clone());
        self.write(PENDING_KEY, &pending)?;
        info!(brew_id = %entry.brew.id, queued = pending.len(), "queued brew while offline");
        Ok(entry)
    }

    /// Move queued brews into the log in queue order. The log is written
    /// before the queue is cleared; if that write fails the queue is untouched.
    pub fn flush_pending_brews(&self) -> Result<FlushReport> {
        let pending = self.get_pending_brews()?;
        if pending.is_empty() {
            return Ok(FlushReport::default());
        }

        let mut log = self.read_log()?;
        let mut seen: HashSet<String> = log
            .iter()
            .filter_map(|e| e.brew().map(|b| b.id.clone()))
            .collect();
        let mut report = FlushReport::default();
        for entry in pending {
            let brew = entry.into_brew();
            if seen.insert(brew.id.clone()) {
                log.push(LogEntry::current(brew));
                report.flushed += 1;
            } else {
                report.duplicates += 1;
            }
        }

        if report.flushed > 0 {
            self.write_log(log)?;
        }
        self.write(PENDING_KEY, &Vec::<PendingBrew>::new())?;
        info!(
            flushed = report.flushed,
            duplicates = report.duplicates,
            "flushed pending brews"
        );
        Ok(report)
    }

    // --- Onboarding ---

    pub fn get_onboarding_status(&self) -> Result<OnboardingStatus> {
        self.read(ONBOARDING_KEY)
    }

    pub fn set_onboarding_status(&self, status: OnboardingStatus) -> Result<()> {
        self.write(ONBOARDING_KEY, &status)
    }
}

fn newest_first(brews: Vec<Brew>) -> Vec<Brew> {
    let mut indexed: Vec<(usize, Brew)> = brews.into_iter().enumerate().collect();
    indexed.sort_by_key(|(index, brew)| Reverse((parse_timestamp(&brew.created_at), *index)));
    indexed.into_iter().map(|(_, brew)| brew).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::anyhow;

    use super::*;
    use crate::models::{BrewParams, RoastLevel, TasteSet, TasteTag};
    use crate::store::MemoryStore;

    /// Memory store that can be told to reject writes to one key.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_key: Mutex<Option<&'static str>>,
    }

    impl FlakyStore {
        fn fail_writes_to(&self, key: Option<&'static str>) {
            *self.fail_key.lock().unwrap() = key;
        }
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            if self.fail_key.lock().unwrap().is_some_and(|k| k == key) {
                return Err(anyhow!("disk full"));
            }
            self.inner.set(key, value)
        }
    }

    fn repo() -> Repository<MemoryStore> {
        Repository::new(MemoryStore::new())
    }

    fn bean<S: KeyValueStore>(repo: &Repository<S>, name: &str) -> Bean {
        repo.create_bean(NewBean {
            name: name.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    fn pourover(bean_id: &str, tag: TasteTag) -> NewBrew {
        NewBrew {
            bean_id: bean_id.to_string(),
            method: BrewMethod::Pourover,
            params: BrewParams {
                dose_g: Some(20.0),
                water_ml: Some(300.0),
                grind_size: Some("medium-fine".to_string()),
                water_temp_c: Some(94.0),
                brew_time_sec: Some(180.0),
                pressure_bar: Some(9.0),
                ..Default::default()
            },
            taste: [tag].into_iter().collect(),
            notes: None,
        }
    }

    fn brew_at(id: &str, bean_id: &str, created_at: &str) -> Brew {
        Brew {
            id: id.to_string(),
            bean_id: bean_id.to_string(),
            method: BrewMethod::Pourover,
            params: BrewParams::default(),
            taste: TasteSet::default(),
            notes: None,
            created_at: created_at.to_string(),
        }
    }

    fn is_not_found(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<BrewError>(),
            Some(BrewError::NotFound { .. })
        )
    }

    #[test]
    fn test_create_and_get_bean() {
        let repo = repo();
        let created = repo
            .create_bean(NewBean {
                name: "  Ethiopia Guji  ".to_string(),
                origin: Some("Guji".to_string()),
                roast_level: RoastLevel::Light,
                notes: Some("  ".to_string()),
            })
            .unwrap();
        assert_eq!(created.name, "Ethiopia Guji");
        assert!(created.notes.is_none());
        assert!(!created.id.is_empty());

        let fetched = repo.get_bean(&created.id).unwrap();
        assert_eq!(fetched, created);
        assert_eq!(repo.resolve_bean("ethiopia guji").unwrap().id, created.id);
    }

    #[test]
    fn test_create_bean_requires_name() {
        let repo = repo();
        assert!(repo.create_bean(NewBean::default()).is_err());
        assert!(repo.get_beans().unwrap().is_empty());
    }

    #[test]
    fn test_get_bean_not_found() {
        let err = repo().get_bean("missing").unwrap_err();
        assert!(is_not_found(&err));
    }

    #[test]
    fn test_update_bean() {
        let repo = repo();
        let b = bean(&repo, "House");
        let updated = repo
            .update_bean(
                &b.id,
                UpdateBean {
                    name: Some("House Blend".to_string()),
                    origin: Some("Brazil".to_string()),
                    roast_level: Some(RoastLevel::Dark),
                    notes: None,
                },
            )
            .unwrap();
        assert_eq!(updated.name, "House Blend");
        assert_eq!(updated.origin.as_deref(), Some("Brazil"));
        assert_eq!(updated.roast_level, RoastLevel::Dark);

        let cleared = repo
            .update_bean(
                &b.id,
                UpdateBean {
                    origin: Some(String::new()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(cleared.origin.is_none());
        assert_eq!(cleared.name, "House Blend");
    }

    #[test]
    fn test_save_brew_clears_inapplicable_fields() {
        let repo = repo();
        let b = bean(&repo, "Kenya");
        let brew = repo.save_brew(pourover(&b.id, TasteTag::Balanced)).unwrap();
        assert!(brew.params.pressure_bar.is_none());
        assert_eq!(brew.params.water_ml, Some(300.0));
        assert_eq!(repo.get_brews().unwrap(), vec![brew]);
    }

    #[test]
    fn test_save_brew_unknown_bean() {
        let err = repo()
            .save_brew(pourover("ghost", TasteTag::Balanced))
            .unwrap_err();
        assert!(is_not_found(&err));
    }

    #[test]
    fn test_save_brew_requires_taste() {
        let repo = repo();
        let b = bean(&repo, "Kenya");
        let mut new = pourover(&b.id, TasteTag::Balanced);
        new.taste = TasteSet::default();
        assert!(repo.save_brew(new).is_err());
        assert!(repo.get_brews().unwrap().is_empty());
    }

    #[test]
    fn test_brews_for_bean_newest_first() {
        let repo = repo();
        let brews = vec![
            brew_at("old", "b1", "2024-01-01T08:00:00+00:00"),
            brew_at("other", "b2", "2024-06-01T08:00:00+00:00"),
            brew_at("new", "b1", "2024-03-01T08:00:00+00:00"),
            brew_at("undated", "b1", ""),
            brew_at("same-a", "b1", "2024-02-01T08:00:00+00:00"),
            brew_at("same-b", "b1", "2024-02-01T08:00:00+00:00"),
        ];
        repo.write(BREWS_KEY, &brews).unwrap();

        let ids: Vec<String> = repo
            .get_brews_for_bean("b1")
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids, ["new", "same-b", "same-a", "old", "undated"]);
    }

    #[test]
    fn test_recent_history_filters_method_and_limits() {
        let repo = repo();
        let b = bean(&repo, "Kenya");
        for _ in 0..3 {
            repo.save_brew(pourover(&b.id, TasteTag::TooSour)).unwrap();
        }
        let mut espresso = brew_at("e1", &b.id, "2030-01-01T00:00:00+00:00");
        espresso.method = BrewMethod::Espresso;
        repo.append_brew(espresso).unwrap();

        let history = repo.recent_history(&b.id, BrewMethod::Pourover, 2).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|h| h.method == BrewMethod::Pourover));
    }

    #[test]
    fn test_delete_bean_cascades() {
        let repo = repo();
        let keep = bean(&repo, "Keep");
        let gone = bean(&repo, "Gone");
        repo.save_brew(pourover(&keep.id, TasteTag::Balanced)).unwrap();
        repo.save_brew(pourover(&gone.id, TasteTag::Balanced)).unwrap();
        repo.save_brew(pourover(&gone.id, TasteTag::Weak)).unwrap();
        let queued = repo.prepare_brew(pourover(&gone.id, TasteTag::Strong)).unwrap();
        repo.enqueue_pending_brew(queued).unwrap();

        let deleted = repo.delete_bean(&gone.id).unwrap();
        assert_eq!(deleted, DeletedBean { brews: 2, pending: 1 });
        assert_eq!(repo.get_beans().unwrap().len(), 1);
        assert!(repo.get_brews().unwrap().iter().all(|b| b.bean_id == keep.id));
        assert!(repo.get_pending_brews().unwrap().is_empty());

        assert!(is_not_found(&repo.delete_bean(&gone.id).unwrap_err()));
    }

    #[test]
    fn test_delete_brew_from_log_and_queue() {
        let repo = repo();
        let b = bean(&repo, "Kenya");
        let saved = repo.save_brew(pourover(&b.id, TasteTag::Balanced)).unwrap();
        let queued = repo.prepare_brew(pourover(&b.id, TasteTag::Weak)).unwrap();
        repo.enqueue_pending_brew(queued.clone()).unwrap();

        repo.delete_brew(&saved.id).unwrap();
        repo.delete_brew(&queued.id).unwrap();
        assert!(repo.get_brews().unwrap().is_empty());
        assert!(repo.get_pending_brews().unwrap().is_empty());
        assert!(is_not_found(&repo.delete_brew(&saved.id).unwrap_err()));
    }

    #[test]
    fn test_bean_suggestion_cache() {
        let repo = repo();
        let b = bean(&repo, "Kenya");
        assert!(repo.get_bean_suggestion(&b.id, BrewMethod::Espresso).unwrap().is_none());

        let suggestion = crate::rules::default_suggestion(BrewMethod::Espresso);
        let cached = repo.save_bean_suggestion(&b.id, suggestion.clone()).unwrap();
        assert!(cached.updated_at.is_some());

        let fetched = repo
            .get_bean_suggestion(&b.id, BrewMethod::Espresso)
            .unwrap()
            .unwrap();
        assert_eq!(fetched.grind_size, suggestion.grind_size);
        assert!(repo.get_bean_suggestion(&b.id, BrewMethod::Mokapot).unwrap().is_none());
    }

    #[test]
    fn test_migrate_brew_data_is_idempotent() {
        let repo = repo();
        repo.store()
            .set(
                BREWS_KEY,
                r#"[
                    {"id":"1","beanId":"b1","coffeeType":"Espresso","coffeeAmount":18,
                     "waterAmount":36,"brewTime":27,"grindSize":2,"taste":"too_bitter",
                     "createdAt":"2023-01-01T00:00:00Z"},
                    {"id":"2","beanId":"b1","method":"pourover","doseG":20,"waterMl":320,
                     "grindSize":"medium","waterTempC":94,"brewTimeSec":200,
                     "taste":["balanced"],"createdAt":"2024-01-01T00:00:00Z"}
                ]"#,
            )
            .unwrap();

        let first = repo.migrate_brew_data().unwrap();
        assert_eq!(
            first,
            MigrationReport {
                total: 2,
                migrated: 1,
                unreadable: 0
            }
        );
        let after_first = repo.store().get(BREWS_KEY).unwrap();

        let second = repo.migrate_brew_data().unwrap();
        assert_eq!(
            second,
            MigrationReport {
                total: 2,
                migrated: 0,
                unreadable: 0
            }
        );
        assert_eq!(repo.store().get(BREWS_KEY).unwrap(), after_first);

        let brews = repo.get_brews().unwrap();
        assert_eq!(brews[0].method, BrewMethod::Espresso);
        assert_eq!(brews[0].params.dose_g, Some(18.0));
        assert_eq!(brews[0].params.brew_time_sec, Some(27.0));
        assert!(brews[0].taste.contains(TasteTag::TooBitter));
        assert_eq!(brews[1].id, "2");
    }

    #[test]
    fn test_unreadable_record_is_kept_and_skipped() {
        let repo = repo();
        let b = bean(&repo, "Kenya");
        let raw = format!(
            r#"[
                {{"id":"1","beanId":"{id}","method":"pourover","doseG":20,"waterMl":320,
                 "taste":["balanced"],"createdAt":"2024-01-01T00:00:00Z"}},
                {{"id":"2","beanId":null,"method":"pourover","doseG":20,
                 "taste":["weak"],"createdAt":"2024-01-02T00:00:00Z"}},
                {{"id":"3","beanId":"{id}","coffeeType":"latte","coffeeAmount":15,
                 "waterAmount":250,"brewTime":200,"taste":"too_sour",
                 "createdAt":"2023-06-01T00:00:00Z"}}
            ]"#,
            id = b.id
        );
        repo.store().set(BREWS_KEY, &raw).unwrap();

        let brews = repo.get_brews_for_bean(&b.id).unwrap();
        let ids: Vec<&str> = brews.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);

        let report = repo.migrate_brew_data().unwrap();
        assert_eq!(
            report,
            MigrationReport {
                total: 3,
                migrated: 1,
                unreadable: 1
            }
        );

        // Rewrites of the log carry the bad record along untouched
        let saved = repo.save_brew(pourover(&b.id, TasteTag::Weak)).unwrap();
        repo.delete_brew(&saved.id).unwrap();
        let stored: Vec<Value> =
            serde_json::from_str(&repo.store().get(BREWS_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[1]["id"], "2");
        assert!(stored[1]["beanId"].is_null());
        assert_eq!(stored[2]["method"], "pourover");
        assert!(stored[2].get("coffeeType").is_none());
    }

    #[test]
    fn test_migrate_empty_store() {
        let report = repo().migrate_brew_data().unwrap();
        assert_eq!(report, MigrationReport::default());
    }

    #[test]
    fn test_flush_moves_queue_into_log_in_order() {
        let repo = repo();
        let b = bean(&repo, "Kenya");
        let first = repo.prepare_brew(pourover(&b.id, TasteTag::TooSour)).unwrap();
        let second = repo.prepare_brew(pourover(&b.id, TasteTag::Weak)).unwrap();
        repo.enqueue_pending_brew(first.clone()).unwrap();
        repo.enqueue_pending_brew(second.clone()).unwrap();

        let pending = repo.get_pending_brews().unwrap();
        assert!(pending.iter().all(|p| p.pending));

        let report = repo.flush_pending_brews().unwrap();
        assert_eq!(report, FlushReport { flushed: 2, duplicates: 0 });
        assert_eq!(repo.get_brews().unwrap(), vec![first, second]);
        assert!(repo.get_pending_brews().unwrap().is_empty());

        let raw = repo.store().get(BREWS_KEY).unwrap().unwrap();
        assert!(!raw.contains("pending"));
    }

    #[test]
    fn test_flush_empty_queue_writes_nothing() {
        let repo = repo();
        assert_eq!(repo.flush_pending_brews().unwrap(), FlushReport::default());
        assert!(repo.store().get(BREWS_KEY).unwrap().is_none());
    }

    #[test]
    fn test_failed_log_write_keeps_queue() {
        let repo = Repository::new(FlakyStore::default());
        let b = bean(&repo, "Kenya");
        let queued = repo.prepare_brew(pourover(&b.id, TasteTag::Balanced)).unwrap();
        repo.enqueue_pending_brew(queued.clone()).unwrap();

        repo.store().fail_writes_to(Some(BREWS_KEY));
        let err = repo.flush_pending_brews().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BrewError>(),
            Some(BrewError::StoreWrite { key, .. }) if key == BREWS_KEY
        ));
        assert_eq!(repo.get_pending_brews().unwrap().len(), 1);
        assert!(repo.get_brews().unwrap().is_empty());

        repo.store().fail_writes_to(None);
        repo.flush_pending_brews().unwrap();
        assert_eq!(repo.get_brews().unwrap(), vec![queued]);
    }

    #[test]
    fn test_retry_after_failed_queue_clear_does_not_duplicate() {
        let repo = Repository::new(FlakyStore::default());
        let b = bean(&repo, "Kenya");
        let queued = repo.prepare_brew(pourover(&b.id, TasteTag::Balanced)).unwrap();
        repo.enqueue_pending_brew(queued).unwrap();

        repo.store().fail_writes_to(Some(PENDING_KEY));
        assert!(repo.flush_pending_brews().is_err());
        assert_eq!(repo.get_brews().unwrap().len(), 1);
        assert_eq!(repo.get_pending_brews().unwrap().len(), 1);

        repo.store().fail_writes_to(None);
        let report = repo.flush_pending_brews().unwrap();
        assert_eq!(report, FlushReport { flushed: 0, duplicates: 1 });
        assert_eq!(repo.get_brews().unwrap().len(), 1);
        assert!(repo.get_pending_brews().unwrap().is_empty());
    }

    #[test]
    fn test_onboarding_status() {
        let repo = repo();
        assert_eq!(repo.get_onboarding_status().unwrap(), OnboardingStatus::NotStarted);
        repo.set_onboarding_status(OnboardingStatus::Skipped).unwrap();
        assert_eq!(repo.get_onboarding_status().unwrap(), OnboardingStatus::Skipped);
    }

    #[test]
    fn test_works_over_sqlite() {
        let repo = Repository::new(crate::db::Database::open_in_memory().unwrap());
        let b = bean(&repo, "Colombia");
        repo.save_brew(pourover(&b.id, TasteTag::TooBitter)).unwrap();
        assert_eq!(repo.get_brews_for_bean(&b.id).unwrap().len(), 1);
    }
}
