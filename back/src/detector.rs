use std::collections::HashMap;

use crate::alert::{AlertIntent, AlertKind};
use crate::product::{Product, Snapshot};

/// Last observed state of every product id ever seen by this process.
///
/// Ids that drop off the listing are never removed; they simply stop being
/// compared.
#[derive(Debug, Clone, Default)]
pub struct SeenProducts {
    table: HashMap<String, Product>,
}

impl SeenProducts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Product> {
        self.table.get(id)
    }

    /// Compares `current` with what was seen before and records it.
    ///
    /// Unseen products that are in stock yield [`AlertKind::New`], except on
    /// the first cycle where there is no baseline. Known products moving from
    /// out of stock to in stock yield [`AlertKind::Stock`]. Intents come out
    /// in the snapshot's order.
    pub fn detect(&mut self, current: &Snapshot, first_run: bool) -> Vec<AlertIntent> {
        let mut intents = Vec::new();

        for (id, product) in current.iter() {
            let kind = match self.table.get(id) {
                None if !first_run && product.in_stock => Some(AlertKind::New),
                Some(previous) if !previous.in_stock && product.in_stock => {
                    Some(AlertKind::Stock)
                }
                _ => None,
            };

            if let Some(kind) = kind {
                tracing::info!(link = %product.link, name = %product.name, ?kind, "stock change detected");
                intents.push(AlertIntent {
                    kind,
                    product: product.clone(),
                });
            }

            self.table.insert(id.to_string(), product.clone());
        }

        intents
    }
}
