//! Watch-list state machine: per-symbol price threshold polling.
//!
//! Each watched symbol gets its own tokio task that fires on an interval.
//! A tick re-reads the entry's *current* bounds, so one bound can be
//! cleared mid-flight without restarting the timer. Bounds fire one-shot;
//! once both are gone the watch tears itself down.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, interval};

/// A standing watch on one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEntry {
    pub low: Option<f64>,
    pub high: Option<f64>,
    /// User to mention when a bound is crossed.
    pub requested_by: u64,
    /// Channel the watch was requested in.
    pub channel_id: u64,
}

/// One price check request handed to the checker.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchCheck {
    pub symbol: String,
    pub low: Option<f64>,
    pub high: Option<f64>,
    pub requested_by: u64,
    pub channel_id: u64,
}

/// Which bounds a check found crossed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOutcome {
    pub passed_low: bool,
    pub passed_high: bool,
}

/// Price check capability invoked on every tick. The checker resolves the
/// current price, sends any notifications, and reports which bounds fired.
#[async_trait::async_trait]
pub trait WatchChecker: Send + Sync {
    async fn check(&self, check: &WatchCheck) -> WatchOutcome;
}

type EntryMap = Arc<RwLock<HashMap<String, WatchEntry>>>;
type TimerMap = Arc<RwLock<HashMap<String, tokio::task::JoinHandle<()>>>>;

/// Owns all watch entries and their timers. Injected wherever watches are
/// registered or torn down; never a process-wide singleton.
pub struct WatchListService {
    entries: EntryMap,
    timers: TimerMap,
    poll_interval: Duration,
    checker: Arc<dyn WatchChecker>,
}

impl std::fmt::Debug for WatchListService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchListService").finish_non_exhaustive()
    }
}

impl WatchListService {
    pub fn new(poll_interval: Duration, checker: Arc<dyn WatchChecker>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            timers: Arc::new(RwLock::new(HashMap::new())),
            poll_interval,
            checker,
        }
    }

    /// Register a watch. Replaces any existing watch for the symbol, and
    /// checks once immediately so a fresh watch reports on its very next
    /// opportunity rather than a full interval later.
    pub async fn start(&self, symbol: &str, low: f64, high: f64, requested_by: u64, channel_id: u64) {
        let symbol = symbol.to_uppercase();
        self.stop(&symbol).await;

        tracing::info!(symbol = %symbol, low, high, "begin watching");
        {
            let mut entries = self.entries.write().await;
            entries.insert(
                symbol.clone(),
                WatchEntry {
                    low: Some(low),
                    high: Some(high),
                    requested_by,
                    channel_id,
                },
            );
        }

        let entries = self.entries.clone();
        let timers = self.timers.clone();
        let checker = self.checker.clone();
        let poll_interval = self.poll_interval;
        let task_symbol = symbol.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(poll_interval);
            // The first tick fires immediately.
            loop {
                ticker.tick().await;

                let check = {
                    let map = entries.read().await;
                    match map.get(&task_symbol) {
                        Some(entry) if entry.low.is_none() && entry.high.is_none() => {
                            tracing::info!(symbol = %task_symbol, "watch complete, no points left");
                            None
                        }
                        Some(entry) => Some(WatchCheck {
                            symbol: task_symbol.clone(),
                            low: entry.low,
                            high: entry.high,
                            requested_by: entry.requested_by,
                            channel_id: entry.channel_id,
                        }),
                        None => {
                            tracing::debug!(symbol = %task_symbol, "watch entry removed, stopping timer");
                            None
                        }
                    }
                };

                let Some(check) = check else {
                    remove_entry(&entries, &timers, &task_symbol).await;
                    break;
                };

                let outcome = checker.check(&check).await;
                if outcome.passed_low {
                    mark_passed(&entries, &task_symbol, Bound::Low).await;
                }
                if outcome.passed_high {
                    mark_passed(&entries, &task_symbol, Bound::High).await;
                }
            }
        });

        let mut timers = self.timers.write().await;
        timers.insert(symbol, handle);
    }

    /// Clear the low bound one-shot. If both bounds were already clear the
    /// watch stops entirely.
    pub async fn passed_low(&self, symbol: &str) {
        self.passed(symbol, Bound::Low).await;
    }

    /// Clear the high bound one-shot; symmetric to [`passed_low`].
    ///
    /// [`passed_low`]: WatchListService::passed_low
    pub async fn passed_high(&self, symbol: &str) {
        self.passed(symbol, Bound::High).await;
    }

    async fn passed(&self, symbol: &str, bound: Bound) {
        let symbol = symbol.to_uppercase();
        let both_clear = {
            let entries = self.entries.read().await;
            entries
                .get(&symbol)
                .is_some_and(|entry| entry.low.is_none() && entry.high.is_none())
        };

        if both_clear {
            self.stop(&symbol).await;
            return;
        }

        mark_passed(&self.entries, &symbol, bound).await;
    }

    /// Cancel the watch for one symbol unconditionally.
    pub async fn stop(&self, symbol: &str) -> bool {
        let symbol = symbol.to_uppercase();
        let handle = {
            let mut timers = self.timers.write().await;
            timers.remove(&symbol)
        };
        let existed = {
            let mut entries = self.entries.write().await;
            entries.remove(&symbol).is_some()
        };

        if let Some(handle) = handle {
            handle.abort();
        }
        if existed {
            tracing::info!(symbol = %symbol, "stopped watching");
        }
        existed
    }

    /// Cancel every watch. Used on explicit request, market close, and
    /// gateway error recovery.
    pub async fn clear(&self) {
        let symbols: Vec<String> = {
            let entries = self.entries.read().await;
            entries.keys().cloned().collect()
        };
        for symbol in symbols {
            self.stop(&symbol).await;
        }
    }

    /// Current entry for a symbol, if watched.
    pub async fn entry(&self, symbol: &str) -> Option<WatchEntry> {
        let entries = self.entries.read().await;
        entries.get(&symbol.to_uppercase()).cloned()
    }
}

#[derive(Debug, Clone, Copy)]
enum Bound {
    Low,
    High,
}

async fn mark_passed(entries: &EntryMap, symbol: &str, bound: Bound) {
    let mut entries = entries.write().await;
    let Some(entry) = entries.get_mut(symbol) else {
        return;
    };
    match bound {
        Bound::Low => {
            if entry.low.take().is_some() {
                tracing::info!(symbol, "passed low point");
            }
        }
        Bound::High => {
            if entry.high.take().is_some() {
                tracing::info!(symbol, "passed high point");
            }
        }
    }
}

async fn remove_entry(entries: &EntryMap, timers: &TimerMap, symbol: &str) {
    {
        let mut entries = entries.write().await;
        entries.remove(symbol);
    }
    let mut timers = timers.write().await;
    timers.remove(symbol);
}
