use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One product as observed on the listing page during a single cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub in_stock: bool,
    pub link: String,
    pub image: String,
}

impl Product {
    /// Stable key of the product: its canonical link.
    pub fn id(&self) -> &str {
        &self.link
    }
}

/// A complete view of the listing, keyed by product id in page order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    products: IndexMap<String, Product>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a product under its id. A repeated id keeps its original
    /// position but takes the newer value.
    pub fn insert(&mut self, product: Product) {
        self.products.insert(product.link.clone(), product);
    }

    pub fn get(&self, id: &str) -> Option<&Product> {
        self.products.get(id)
    }

    /// True when `id` is present and currently in stock.
    pub fn is_in_stock(&self, id: &str) -> bool {
        self.get(id).is_some_and(|p| p.in_stock)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Product)> {
        self.products.iter().map(|(id, p)| (id.as_str(), p))
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn in_stock_count(&self) -> usize {
        self.products.values().filter(|p| p.in_stock).count()
    }
}

impl FromIterator<Product> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Product>>(iter: I) -> Self {
        let mut snapshot = Snapshot::new();
        for product in iter {
            snapshot.insert(product);
        }
        snapshot
    }
}
