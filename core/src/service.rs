use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::models::{
    Bean, Brew, BrewMethod, NewBean, NewBrew, OnboardingStatus, PendingBrew, Suggestion,
    UpdateBean,
};
use crate::remote::{SuggestionProvider, SuggestionRequest};
use crate::repo::{DeletedBean, FlushReport, MigrationReport, Repository};
use crate::rules;
use crate::store::{KeyValueStore, MemoryStore};
use crate::sync::{Reconciler, SlotTicket, SuggestionSlot};

/// Brews of one bean and method handed to the suggestion engines.
pub const HISTORY_LIMIT: usize = 5;

/// Ask the remote provider when it is configured, otherwise (or on any
/// failure) apply the local rules. Never fails.
pub async fn get_suggestion<P: SuggestionProvider>(
    provider: &P,
    history: &[Brew],
    method: BrewMethod,
    bean_name: &str,
) -> Suggestion {
    if provider.is_configured() {
        let request = SuggestionRequest {
            history,
            method,
            bean_name,
        };
        match provider.fetch_suggestion(&request).await {
            Ok(suggestion) if suggestion.method == method => return suggestion,
            Ok(suggestion) => warn!(
                expected = %method,
                got = %suggestion.method,
                "remote suggestion was for another method, using local rules"
            ),
            Err(e) => warn!("remote suggestion failed, using local rules: {e:#}"),
        }
    } else {
        debug!("no remote suggestion service configured");
    }
    rules::suggest(history, method)
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// Written to the brew log. `suggestion` is the refreshed suggestion for
    /// the bean and method, if it could be stored.
    Saved {
        brew: Brew,
        suggestion: Option<Suggestion>,
    },
    /// Recorded while offline; waits in the pending queue.
    Queued(PendingBrew),
}

pub struct BrewService<S> {
    repo: Repository<S>,
    reconciler: Reconciler,
    slot: SuggestionSlot,
}

impl BrewService<Database> {
    /// Open the database and upgrade any legacy brews still in it.
    pub fn open(db_path: &Path, settle_delay: Duration) -> Result<Self> {
        let db = Database::open(db_path)?;
        let svc = Self::with_store(db, Reconciler::new(settle_delay, true));
        svc.migrate_brew_data()?;
        Ok(svc)
    }
}

impl BrewService<MemoryStore> {
    #[must_use]
    pub fn new_in_memory() -> Self {
        Self::with_store(MemoryStore::new(), Reconciler::default())
    }
}

impl<S: KeyValueStore> BrewService<S> {
    pub fn with_store(store: S, reconciler: Reconciler) -> Self {
        Self {
            repo: Repository::new(store),
            reconciler,
            slot: SuggestionSlot::new(),
        }
    }

    pub fn repo(&self) -> &Repository<S> {
        &self.repo
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn is_online(&self) -> bool {
        self.reconciler.is_online()
    }

    // --- Beans ---

    pub fn create_bean(&self, new: NewBean) -> Result<Bean> {
        self.repo.create_bean(new)
    }

    pub fn get_beans(&self) -> Result<Vec<Bean>> {
        self.repo.get_beans()
    }

    pub fn resolve_bean(&self, id_or_name: &str) -> Result<Bean> {
        self.repo.resolve_bean(id_or_name)
    }

    pub fn update_bean(&self, id: &str, update: UpdateBean) -> Result<Bean> {
        self.repo.update_bean(id, update)
    }

    pub fn delete_bean(&self, id: &str) -> Result<DeletedBean> {
        self.repo.delete_bean(id)
    }

    // --- Brews ---

    pub fn get_brews_for_bean(&self, bean_id: &str) -> Result<Vec<Brew>> {
        self.repo.get_brews_for_bean(bean_id)
    }

    pub fn get_recent_brews(&self, limit: usize) -> Result<Vec<Brew>> {
        self.repo.get_recent_brews(limit)
    }

    pub fn delete_brew(&self, id: &str) -> Result<()> {
        self.repo.delete_brew(id)
    }

    pub fn get_pending_brews(&self) -> Result<Vec<PendingBrew>> {
        self.repo.get_pending_brews()
    }

    pub fn migrate_brew_data(&self) -> Result<MigrationReport> {
        self.repo.migrate_brew_data()
    }

    /// Save a brew. Online it goes to the log and the bean's suggestion for
    /// that method is refreshed; offline it is queued.
    pub async fn record_brew<P: SuggestionProvider>(
        &self,
        provider: &P,
        new: NewBrew,
    ) -> Result<RecordOutcome> {
        let brew = self.repo.prepare_brew(new)?;
        if !self.is_online() {
            let pending = self.repo.enqueue_pending_brew(brew)?;
            return Ok(RecordOutcome::Queued(pending));
        }

        let brew = self.repo.append_brew(brew)?;
        let suggestion = match self
            .refresh_suggestion(provider, &brew.bean_id, brew.method)
            .await
        {
            Ok(suggestion) => suggestion,
            Err(e) => {
                warn!(brew_id = %brew.id, "brew saved but suggestion refresh failed: {e:#}");
                None
            }
        };
        Ok(RecordOutcome::Saved { brew, suggestion })
    }

    // --- Suggestions ---

    /// Make `(bean_id, method)` the current selection. Suggestions requested
    /// for an earlier selection are dropped when they resolve.
    pub fn select(&self, bean_id: &str, method: BrewMethod) -> SlotTicket {
        self.slot.select(bean_id, method)
    }

    /// Compute and cache a fresh suggestion. `None` if the selection moved on
    /// while the request was in flight.
    pub async fn refresh_suggestion<P: SuggestionProvider>(
        &self,
        provider: &P,
        bean_id: &str,
        method: BrewMethod,
    ) -> Result<Option<Suggestion>> {
        let ticket = self.slot.select(bean_id, method);
        let bean = self.repo.get_bean(bean_id)?;
        let history = self.repo.recent_history(bean_id, method, HISTORY_LIMIT)?;

        let suggestion = get_suggestion(provider, &history, method, &bean.name).await;
        if !self.slot.is_current(&ticket) {
            debug!(bean_id, %method, "discarding suggestion for a stale selection");
            return Ok(None);
        }
        self.repo.save_bean_suggestion(bean_id, suggestion).map(Some)
    }

    /// Cached suggestion, or the local rules over the stored history when
    /// nothing is cached. Never touches the network.
    pub fn cached_suggestion(&self, bean_id: &str, method: BrewMethod) -> Result<Suggestion> {
        if let Some(cached) = self.repo.get_bean_suggestion(bean_id, method)? {
            return Ok(cached);
        }
        let history = self.repo.recent_history(bean_id, method, HISTORY_LIMIT)?;
        Ok(rules::suggest(&history, method))
    }

    /// Suggestion for the next brew. Offline, or when superseded, this is the
    /// cached one.
    pub async fn suggestion_for_bean<P: SuggestionProvider>(
        &self,
        provider: &P,
        bean_id: &str,
        method: BrewMethod,
    ) -> Result<Suggestion> {
        if !self.is_online() {
            debug!(bean_id, %method, "offline, using cached suggestion");
            return self.cached_suggestion(bean_id, method);
        }
        match self.refresh_suggestion(provider, bean_id, method).await? {
            Some(suggestion) => Ok(suggestion),
            None => self.cached_suggestion(bean_id, method),
        }
    }

    // --- Offline queue ---

    /// Feed a connectivity signal. On a reconnect that survives the settle
    /// delay, the pending queue is flushed.
    pub async fn on_connectivity_change(&self, online: bool) -> Result<Option<FlushReport>> {
        let Some(ticket) = self.reconciler.observe(online) else {
            return Ok(None);
        };
        if !self.reconciler.settle(ticket).await {
            return Ok(None);
        }
        self.flush_pending_brews()
    }

    /// Move pending brews into the log. `None` when another flush is running.
    pub fn flush_pending_brews(&self) -> Result<Option<FlushReport>> {
        let Some(_guard) = self.reconciler.try_begin_flush() else {
            debug!("flush already in progress");
            return Ok(None);
        };
        let report = self.repo.flush_pending_brews()?;
        if report.flushed > 0 {
            info!(flushed = report.flushed, "synced offline brews");
        }
        Ok(Some(report))
    }

    // --- Onboarding ---

    pub fn get_onboarding_status(&self) -> Result<OnboardingStatus> {
        self.repo.get_onboarding_status()
    }

    pub fn set_onboarding_status(&self, status: OnboardingStatus) -> Result<()> {
        self.repo.set_onboarding_status(status)
    }
}
