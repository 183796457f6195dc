use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tracing::debug;

use crate::models::BrewMethod;

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Issued on an offline to online transition. Only the newest ticket settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconnect {
    generation: u64,
}

/// Connectivity state for the offline queue.
///
/// Every transition bumps a generation counter, so a reconnect that is
/// followed by another drop (or a flap back online) before the settle delay
/// runs out is abandoned.
#[derive(Debug)]
pub struct Reconciler {
    online: AtomicBool,
    generation: AtomicU64,
    flushing: AtomicBool,
    settle_delay: Duration,
}

impl Reconciler {
    #[must_use]
    pub fn new(settle_delay: Duration, online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
            generation: AtomicU64::new(0),
            flushing: AtomicBool::new(false),
            settle_delay,
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Record a connectivity signal. Repeated signals for the current state
    /// are ignored.
    pub fn observe(&self, online: bool) -> Option<Reconnect> {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if was_online == online {
            return None;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(online, generation, "connectivity changed");
        online.then_some(Reconnect { generation })
    }

    /// Wait out the settle delay. True when nothing changed in the meantime.
    pub async fn settle(&self, ticket: Reconnect) -> bool {
        tokio::time::sleep(self.settle_delay).await;
        let current = self.generation.load(Ordering::SeqCst);
        let settled = self.is_online() && current == ticket.generation;
        if !settled {
            debug!(ticket = ticket.generation, current, "reconnect superseded");
        }
        settled
    }

    /// Claim the flush. `None` while another flush holds the guard.
    pub fn try_begin_flush(&self) -> Option<FlushGuard<'_>> {
        self.flushing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlushGuard {
                flag: &self.flushing,
            })
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE_DELAY, true)
    }
}

#[derive(Debug)]
pub struct FlushGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Identifies one suggestion request against the selection it was made for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTicket {
    generation: u64,
    pub bean_id: String,
    pub method: BrewMethod,
}

/// The (bean, method) pair whose suggestion is being shown. Results that
/// resolve after the selection moved on are discarded.
#[derive(Debug, Default)]
pub struct SuggestionSlot {
    generation: AtomicU64,
}

impl SuggestionSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&self, bean_id: &str, method: BrewMethod) -> SlotTicket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        SlotTicket {
            generation,
            bean_id: bean_id.to_string(),
            method,
        }
    }

    pub fn is_current(&self, ticket: &SlotTicket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_only_tickets_reconnects() {
        let r = Reconciler::new(DEFAULT_SETTLE_DELAY, true);
        assert!(r.observe(true).is_none());
        assert!(r.observe(false).is_none());
        assert!(!r.is_online());
        assert!(r.observe(false).is_none());
        assert!(r.observe(true).is_some());
        assert!(r.is_online());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_after_stable_reconnect() {
        let r = Reconciler::new(Duration::from_secs(1), false);
        let ticket = r.observe(true).unwrap();
        let start = tokio::time::Instant::now();
        assert!(r.settle(ticket).await);
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_aborts_when_connection_drops() {
        let r = Reconciler::new(Duration::from_secs(1), false);
        let ticket = r.observe(true).unwrap();
        let (settled, ()) = tokio::join!(r.settle(ticket), async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            r.observe(false);
        });
        assert!(!settled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_aborts_on_flap() {
        let r = Reconciler::new(Duration::from_secs(1), false);
        let first = r.observe(true).unwrap();
        let (first_settled, second) = tokio::join!(r.settle(first), async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            r.observe(false);
            r.observe(true)
        });
        assert!(!first_settled);
        // The newer reconnect still gets its own full delay
        assert!(r.settle(second.unwrap()).await);
    }

    #[test]
    fn test_flush_guard_is_exclusive() {
        let r = Reconciler::default();
        let guard = r.try_begin_flush().unwrap();
        assert!(r.try_begin_flush().is_none());
        drop(guard);
        assert!(r.try_begin_flush().is_some());
    }

    #[test]
    fn test_slot_discards_stale_tickets() {
        let slot = SuggestionSlot::new();
        let first = slot.select("b1", BrewMethod::Espresso);
        assert!(slot.is_current(&first));

        let second = slot.select("b1", BrewMethod::Pourover);
        assert!(!slot.is_current(&first));
        assert!(slot.is_current(&second));

        // Reselecting the same pair still invalidates the older request
        let third = slot.select("b1", BrewMethod::Pourover);
        assert!(!slot.is_current(&second));
        assert!(slot.is_current(&third));
        assert_eq!(third.bean_id, "b1");
        assert_eq!(third.method, BrewMethod::Pourover);
    }
}
