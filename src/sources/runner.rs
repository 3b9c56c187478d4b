//! Runs store calls as background tasks and funnels their results into a
//! single receiver for the event loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{LogStore, StoreError};
use crate::chart::{ChartOutcome, ChartRequest};
use crate::model::LogInfo;
use crate::session::{FetchOutcome, FetchRequest};

/// Results delivered back to the event loop
#[derive(Debug)]
pub enum StoreEvent {
    Logs(FetchOutcome),
    Chart(ChartOutcome),
    Lookups {
        categories: Vec<String>,
        functions: Vec<String>,
    },
    Cleared(Result<(), StoreError>),
    /// `None` when the info endpoint failed; the export goes ahead without it
    Info(Option<LogInfo>),
}

/// Spawns store calls and owns their task handles
pub struct FetchRunner {
    store: Arc<dyn LogStore>,
    tx: mpsc::Sender<StoreEvent>,
    handles: Vec<JoinHandle<()>>,
    min_loading: Duration,
}

impl FetchRunner {
    /// Create a runner and return the receiver its results arrive on
    pub fn new(
        store: Arc<dyn LogStore>,
        buffer_size: usize,
        min_loading: Duration,
    ) -> (Self, mpsc::Receiver<StoreEvent>) {
        let (tx, rx) = mpsc::channel(buffer_size);
        let runner = Self {
            store,
            tx,
            handles: Vec::new(),
            min_loading,
        };
        (runner, rx)
    }

    pub fn store_name(&self) -> String {
        self.store.name()
    }

    fn spawn<F>(&mut self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.handles.retain(|h| !h.is_finished());
        self.handles.push(tokio::spawn(task));
    }

    /// Run a logs fetch. Quick round trips are padded to the minimum loading
    /// duration so the indicator doesn't flicker.
    pub fn fetch_logs(&mut self, request: FetchRequest) {
        let store = Arc::clone(&self.store);
        let tx = self.tx.clone();
        let hold = request
            .trigger
            .holds_min_loading()
            .then_some(self.min_loading);

        self.spawn(async move {
            let started = Instant::now();
            let result = store.logs(&request.query).await;
            if let Some(min) = hold {
                tokio::time::sleep_until(started + min).await;
            }
            let outcome = FetchOutcome {
                generation: request.generation,
                result,
            };
            if tx.send(StoreEvent::Logs(outcome)).await.is_err() {
                debug!("event loop gone, dropping fetch result");
            }
        });
    }

    pub fn fetch_chart(&mut self, request: ChartRequest) {
        let store = Arc::clone(&self.store);
        let tx = self.tx.clone();

        self.spawn(async move {
            let result = store
                .chart_data(request.period, request.levels.as_deref())
                .await;
            let outcome = ChartOutcome {
                generation: request.generation,
                result,
            };
            if tx.send(StoreEvent::Chart(outcome)).await.is_err() {
                debug!("event loop gone, dropping chart result");
            }
        });
    }

    /// Load the category and function lists. Failures are non-fatal.
    pub fn load_lookups(&mut self) {
        let store = Arc::clone(&self.store);
        let tx = self.tx.clone();

        self.spawn(async move {
            let (categories, functions) = tokio::join!(store.categories(), store.functions());
            let event = StoreEvent::Lookups {
                categories: lookup_or_empty("categories", categories),
                functions: lookup_or_empty("functions", functions),
            };
            if tx.send(event).await.is_err() {
                debug!("event loop gone, dropping lookup lists");
            }
        });
    }

    /// Truncate the store. Callers must have confirmed with the user.
    pub fn clear_logs(&mut self) {
        let store = Arc::clone(&self.store);
        let tx = self.tx.clone();

        self.spawn(async move {
            let result = store.clear().await;
            if tx.send(StoreEvent::Cleared(result)).await.is_err() {
                debug!("event loop gone, dropping clear result");
            }
        });
    }

    pub fn fetch_info(&mut self) {
        let store = Arc::clone(&self.store);
        let tx = self.tx.clone();

        self.spawn(async move {
            let info = match store.log_info().await {
                Ok(info) => Some(info),
                Err(e) => {
                    warn!(error = %e, "log info unavailable for export header");
                    None
                }
            };
            if tx.send(StoreEvent::Info(info)).await.is_err() {
                debug!("event loop gone, dropping store info");
            }
        });
    }

    /// Number of tasks still running
    pub fn active_tasks(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// Abort every outstanding task
    pub fn shutdown(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for FetchRunner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lookup_or_empty(what: &str, result: Result<Vec<String>, StoreError>) -> Vec<String> {
    match result {
        Ok(mut values) => {
            values.sort();
            values.dedup();
            values
        }
        Err(e) if e.is_not_found() => {
            debug!(what, "lookup endpoint not available");
            Vec::new()
        }
        Err(e) => {
            warn!(what, error = %e, "failed to load lookup list");
            Vec::new()
        }
    }
}
