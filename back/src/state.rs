//! Shared, observable state read by the presentation layer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::alert::{Alert, MonitoredEntry};
use crate::product::Snapshot;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Checking,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateView {
    pub current_products: Snapshot,
    pub alerts: Vec<Alert>,
    pub monitored_products: Vec<MonitoredEntry>,
    pub last_updated: String,
    pub is_scraping: bool,
    pub status: RunStatus,
    pub sound_enabled: bool,
    /// Bumped once per publish.
    pub version: u64,
}

impl Default for StateView {
    fn default() -> Self {
        Self {
            current_products: Snapshot::new(),
            alerts: Vec::new(),
            monitored_products: Vec::new(),
            last_updated: "Never".to_string(),
            is_scraping: false,
            status: RunStatus::Idle,
            sound_enabled: true,
            version: 0,
        }
    }
}

impl StateView {
    pub fn in_stock_count(&self) -> usize {
        self.current_products.in_stock_count()
    }
}

/// Fields to merge into the state; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    pub current_products: Option<Snapshot>,
    pub alerts: Option<Vec<Alert>>,
    pub monitored_products: Option<Vec<MonitoredEntry>>,
    pub last_updated: Option<String>,
    pub is_scraping: Option<bool>,
    pub status: Option<RunStatus>,
}

#[derive(Debug, Clone)]
pub struct ProcessState {
    tx: Arc<watch::Sender<StateView>>,
}

impl Default for ProcessState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StateView::default());
        Self { tx: Arc::new(tx) }
    }

    /// Merges `patch` and notifies subscribers once.
    pub fn update(&self, patch: StatePatch) {
        self.tx.send_modify(|view| {
            if let Some(products) = patch.current_products {
                view.current_products = products;
            }
            if let Some(alerts) = patch.alerts {
                view.alerts = alerts;
            }
            if let Some(monitored) = patch.monitored_products {
                view.monitored_products = monitored;
            }
            if let Some(last_updated) = patch.last_updated {
                view.last_updated = last_updated;
            }
            if let Some(is_scraping) = patch.is_scraping {
                view.is_scraping = is_scraping;
            }
            if let Some(status) = patch.status {
                view.status = status;
            }
            view.version += 1;
        });
    }

    pub fn read(&self) -> StateView {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StateView> {
        self.tx.subscribe()
    }

    /// Flips the audio notification preference and returns the new value.
    pub fn toggle_sound(&self) -> bool {
        let mut enabled = false;
        self.tx.send_modify(|view| {
            view.sound_enabled = !view.sound_enabled;
            view.version += 1;
            enabled = view.sound_enabled;
        });
        enabled
    }
}
