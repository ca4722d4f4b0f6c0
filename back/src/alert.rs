//! Alert records and the two bounded feeds they land in: the alert ledger
//! and the monitored set.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::feed::BoundedFeed;
use crate::product::{Product, Snapshot};

pub const LEDGER_CAPACITY: usize = 50;
pub const MONITORED_CAPACITY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertKind {
    /// First sighting of a product that is already in stock.
    New,
    /// Product went from out of stock to in stock.
    Stock,
}

impl AlertKind {
    fn message_for(self, name: &str) -> String {
        match self {
            AlertKind::New => format!("New Product: {name}"),
            AlertKind::Stock => format!("Back in Stock: {name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub message: String,
    pub link: String,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredEntry {
    #[serde(flatten)]
    pub product: Product,
    #[serde(rename = "alert_type")]
    pub alert_kind: AlertKind,
    pub alert_time: String,
}

/// A change the detector wants to report, before deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertIntent {
    pub kind: AlertKind,
    pub product: Product,
}

pub type AlertLedger = BoundedFeed<Alert, (String, AlertKind)>;
pub type MonitoredSet = BoundedFeed<MonitoredEntry, String>;

/// Formats a wall-clock time the way alerts display it (`HH:MM:SS`).
pub fn alert_time(now: &DateTime<Local>) -> String {
    now.format("%H:%M:%S").to_string()
}

fn ledger_key(alert: &Alert) -> (String, AlertKind) {
    (alert.link.clone(), alert.kind)
}

fn monitored_key(entry: &MonitoredEntry) -> String {
    entry.product.link.clone()
}

#[derive(Debug, Clone)]
pub struct AlertBook {
    ledger: AlertLedger,
    monitored: MonitoredSet,
}

impl Default for AlertBook {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertBook {
    pub fn new() -> Self {
        Self {
            ledger: BoundedFeed::new(LEDGER_CAPACITY, ledger_key),
            monitored: BoundedFeed::new(MONITORED_CAPACITY, monitored_key),
        }
    }

    pub fn ledger(&self) -> &AlertLedger {
        &self.ledger
    }

    pub fn monitored(&self) -> &MonitoredSet {
        &self.monitored
    }

    /// Records each intent unless an alert with the same link and kind is
    /// still in the ledger. Returns the alerts that were actually recorded,
    /// in emission order.
    pub fn record(&mut self, intents: Vec<AlertIntent>, now: &DateTime<Local>) -> Vec<Alert> {
        let time = alert_time(now);
        let mut recorded = Vec::new();

        for AlertIntent { kind, product } in intents {
            if self.ledger.contains_key(&(product.link.clone(), kind)) {
                tracing::debug!(link = %product.link, ?kind, "duplicate alert dropped");
                continue;
            }

            let alert = Alert {
                kind,
                message: kind.message_for(&product.name),
                link: product.link.clone(),
                time: time.clone(),
            };
            self.ledger.push_front(alert.clone());
            recorded.push(alert);

            if !self.monitored.contains_key(&product.link) {
                self.monitored.push_front(MonitoredEntry {
                    product,
                    alert_kind: kind,
                    alert_time: time.clone(),
                });
            }
        }

        recorded
    }

    /// Keeps only monitored products that are still listed and in stock.
    pub fn prune(&mut self, current: &Snapshot) {
        let before = self.monitored.len();
        self.monitored.retain(|entry| current.is_in_stock(&entry.product.link));
        let dropped = before - self.monitored.len();
        if dropped > 0 {
            tracing::debug!(dropped, "pruned monitored products no longer in stock");
        }
    }
}
